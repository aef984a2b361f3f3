//! # Cone search controller
//!
//! Recovers a missed cone by turning on the spot through two overlapping
//! sweeps: first the back half circle (the cone was most likely passed), then
//! the forward half. If both sweeps complete without a sighting the cone is
//! skipped when waypoints remain, otherwise the mission has failed.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{info, warn};
use std::time::Instant;

use comms_if::ap::{ApCommand, ApMode};
use util::maths::normalise_angle;

use crate::mission;

use super::{NavSm, NavSmError, NavState};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Angle of one search sweep, radians.
///
/// Two sweeps cover just under a full turn, leaving a small overlap margin
/// so that accumulated drift cannot open a blind gap.
const SWEEP_ANGLE_RAD: f64 = 175.0 * std::f64::consts::PI / 180.0;

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl NavSm {

    /// Begin the search for a missed cone with the back-half sweep.
    pub(crate) fn begin_circling_back(&mut self, _now: Instant) {
        let pose = match self.ctx.robot_pose {
            Some(p) => p,
            None => {
                warn!("No pose available, cannot search for the cone");
                self.emit(ApCommand::manual_speed(0.0, 0.0));
                return;
            }
        };

        self.ctx.target_heading_rad =
            normalise_angle(pose.heading_rad() + SWEEP_ANGLE_RAD);

        info!(
            "Searching for the cone, sweeping back toward {:.2} rad",
            self.ctx.target_heading_rad
        );

        self.emit(ApCommand::set_mode(ApMode::Manual));

        self.set_state(NavState::CirclingBack);

        // Start turning immediately rather than waiting for the next frame
        if let Err(e) = self.circling_tick() {
            warn!("Error starting the search sweep: {}", e);
        }
    }

    /// Advance the current sweep against the latest pose.
    ///
    /// Called for each cone-less camera frame while circling. Keeps turning
    /// until the sweep target is reached, then either starts the forward
    /// sweep or ends the search.
    pub(crate) fn circling_tick(&mut self) -> Result<(), NavSmError> {
        let yaw_rad = match self.ctx.robot_pose {
            Some(p) => p.heading_rad(),
            None => return Ok(())
        };

        let diff_rad = normalise_angle(self.ctx.target_heading_rad - yaw_rad);

        if diff_rad.abs() > self.params.circling_angle_tolerance {
            let speed = self.circling_speed();
            let turning = diff_rad.signum() * self.params.max_turning;

            self.emit(ApCommand::manual_speed(speed, turning));
            return Ok(());
        }

        match self.state {
            NavState::CirclingBack => {
                self.ctx.target_heading_rad =
                    normalise_angle(self.ctx.target_heading_rad + SWEEP_ANGLE_RAD);

                info!(
                    "Back sweep complete, sweeping forward toward {:.2} rad",
                    self.ctx.target_heading_rad
                );

                self.set_state(NavState::CirclingForward);
                Ok(())
            },
            NavState::CirclingForward => self.end_search(),
            _ => Ok(())
        }
    }

    /// The normalised speed of the in-place search turn.
    fn circling_speed(&self) -> f64 {
        let max_speed = self.ctx.cone_wp_index
            .and_then(|ix| {
                self.ctx.waypoints.as_ref().and_then(|l| mission::meta_at(l, ix))
            })
            .map(|m| m.cruise_factor)
            .unwrap_or(1.0);

        (self.params.min_speed * self.params.circling_relative_speed).min(max_speed)
    }

    /// End an unsuccessful search: skip the cone if waypoints remain,
    /// otherwise the mission has failed.
    fn end_search(&mut self) -> Result<(), NavSmError> {
        let cone_ix = self.ctx.cone_wp_index.ok_or(NavSmError::ConeWaypointUnset)?;
        let last_ix = self.ctx.waypoints.as_ref()
            .and_then(mission::last_index)
            .ok_or(NavSmError::NoWaypointList)?;

        if cone_ix < last_ix {
            warn!("Cone {} not found, skipping it", cone_ix);
            self.follow_waypoints(cone_ix + 1)
        }
        else {
            warn!("Cone {} not found and no waypoints remain, mission failed", cone_ix);

            self.emit(ApCommand::manual_speed(0.0, 0.0));
            self.emit(ApCommand::set_mode(ApMode::Hold));

            self.ctx.cone_wp_index = None;
            self.ctx.driving_since = None;

            self.set_state(NavState::Failed);
            Ok(())
        }
    }
}
