//! # Cone approach controller
//!
//! Drives the rover toward a sighted cone with a two-term proportional law:
//! speed is proportional to the estimated distance and turning to the
//! estimated heading, each clamped to its limits. Once the cone comes within
//! the close distance the speed is capped to the waypoint's minimum approach
//! speed for the rest of the episode.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info};
use std::time::Instant;

use comms_if::{
    ap::{ApCommand, ApMode, VelocitySetpoint},
    msg::cone::ConeSighting
};

use crate::mission;

use super::{NavSm, NavState};

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl NavSm {

    /// Begin driving toward a sighted cone.
    ///
    /// Switches the autopilot into the output mode of the approach
    /// controller: manual for servo-override driving, guided for velocity
    /// setpoints.
    pub(crate) fn begin_driving_to_cone(&mut self, now: Instant) {
        info!("Cone sighted, driving to it");

        let mode = if self.params.cone_approach_use_throttle {
            ApMode::Manual
        }
        else {
            ApMode::Guided
        };
        self.emit(ApCommand::set_mode(mode));

        self.ctx.cone_lost_count = 0;
        self.ctx.driving_since = Some(now);

        self.set_state(NavState::DrivingToCone);
    }

    /// Issue the approach command for one cone sighting.
    pub(crate) fn drive_to_sighting(&mut self, sighting: &ConeSighting) {
        let distance_m = self.vision.distance_m(sighting);
        let heading_rad = self.vision.heading_rad(sighting);

        // The close latch holds for the rest of the episode
        if distance_m <= self.params.cone_close_distance {
            self.ctx.cone_is_close = true;
        }

        // Speed limits come from the targeted waypoint's metadata; near the
        // cone the upper limit collapses onto the minimum
        let meta = self.ctx.cone_wp_index
            .and_then(|ix| {
                self.ctx.waypoints.as_ref().and_then(|l| mission::meta_at(l, ix))
            });

        let (min_speed, max_speed) = match meta {
            Some(m) => (m.cone_min_speed_factor, m.cruise_factor),
            None => (self.params.min_speed, 1.0)
        };

        let speed_cap = if self.ctx.cone_is_close { min_speed } else { max_speed };

        let speed = (self.params.cone_approach_k_speed * distance_m)
            .max(min_speed)
            .min(speed_cap.max(min_speed));

        let turning = heading_rad.signum()
            * (self.params.cone_approach_k_turning * heading_rad.abs())
                .min(self.params.max_turning);

        debug!(
            "Cone at {:.2} m, {:.3} rad: speed {:.2}, turning {:.2}",
            distance_m, heading_rad, speed, turning
        );

        if self.params.cone_approach_use_throttle {
            self.emit(ApCommand::manual_speed(speed, turning));
        }
        else {
            self.emit(ApCommand::Velocity(VelocitySetpoint {
                linear_x_ms: self.params.min_speed.max(speed * self.params.normal_speed),
                angular_z_rads: turning * self.params.max_turning
            }));
        }
    }
}
