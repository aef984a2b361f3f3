//! # Cone escape controller
//!
//! Handles the maneuver between touching a cone and resuming the mission.
//! The touch itself triggers a timed reverse-and-settle sequence; the escape
//! proper then either backs up blind for a fixed duration (simple backup) or
//! reverses while aligning the heading with the bearing from the touched
//! cone to the next waypoint (aligned backup).

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info, warn};
use std::time::Instant;

use comms_if::ap::ApCommand;
use util::maths::{bearing, normalise_angle};

use crate::loc::Pose;

use super::{AfterLimbo, EscapeStrategy, LimboPhase, NavSm, NavSmError, NavState};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Settling time after the simple backup before the mission resumes,
/// seconds.
const POST_BACKUP_HOLD_S: f64 = 2.0;

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl NavSm {

    /// Begin the timed reverse-and-settle sequence after a cone touch.
    ///
    /// The rover is in a mechanical transient here, so the whole sequence
    /// runs in limbo: reverse away from the cone, settle, then dispatch the
    /// configured escape strategy.
    pub(crate) fn begin_touch_sequence(&mut self, now: Instant) {
        let phases = vec![
            LimboPhase {
                commands: vec![
                    ApCommand::set_mode(comms_if::ap::ApMode::Manual),
                    ApCommand::manual_speed(
                        self.params.direction_change_reverse_speed,
                        0.0
                    )
                ],
                duration_s: self.params.direction_change_reverse_duration
            },
            LimboPhase {
                commands: vec![ApCommand::manual_speed(0.0, 0.0)],
                duration_s: self.params.direction_change_idle_duration
            }
        ];

        self.enter_limbo(now, phases, AfterLimbo::DispatchEscape);
    }

    /// Dispatch the configured escape strategy.
    pub(crate) fn dispatch_escape(&mut self, now: Instant)
        -> Result<(), NavSmError>
    {
        let cone_ix = self.ctx.cone_wp_index.ok_or(NavSmError::ConeWaypointUnset)?;
        let resume_ix = cone_ix + 1;

        match self.params.escape_strategy {
            EscapeStrategy::SimpleBackup => {
                self.simple_backup(now, resume_ix);
                Ok(())
            },
            EscapeStrategy::AlignedBackup => {
                match self.aligned_target_heading(cone_ix) {
                    Some(target_rad) => {
                        self.ctx.target_heading_rad = target_rad;

                        info!(
                            "Escaping the cone, aligning with bearing {:.2} rad to waypoint {}",
                            target_rad, resume_ix
                        );

                        self.set_state(NavState::EscapingCone);
                        Ok(())
                    },
                    None => {
                        warn!(
                            "No map waypoints available for the aligned backup, \
                            backing up blind"
                        );
                        self.simple_backup(now, resume_ix);
                        Ok(())
                    }
                }
            }
        }
    }

    /// Reverse blind for the configured duration, settle, then resume the
    /// mission.
    fn simple_backup(&mut self, now: Instant, resume_ix: usize) {
        info!("Escaping the cone, backing up toward waypoint {}", resume_ix);

        let phases = vec![
            LimboPhase {
                commands: vec![
                    ApCommand::manual_speed(-self.params.escape_min_speed, 0.0)
                ],
                duration_s: self.params.escape_backup_duration
            },
            LimboPhase {
                commands: vec![ApCommand::manual_speed(0.0, 0.0)],
                duration_s: POST_BACKUP_HOLD_S
            }
        ];

        self.enter_limbo(now, phases, AfterLimbo::FollowWaypoints(resume_ix));
    }

    /// The map-frame bearing from the touched cone to the next waypoint.
    fn aligned_target_heading(&self, cone_ix: usize) -> Option<f64> {
        let map = self.ctx.map_waypoints.as_ref()?;

        let cone = map.waypoints.get(cone_ix)?;
        let next = map.waypoints.get(cone_ix + 1)?;

        Some(bearing(
            &[cone.x_lat, cone.y_long],
            &[next.x_lat, next.y_long]
        ))
    }

    /// One tick of the aligned backup, run on each pose update.
    ///
    /// Reverses with turning proportional to the heading error until the
    /// rover faces the next waypoint, then settles and resumes the mission.
    pub(crate) fn escape_align_tick(&mut self, pose: &Pose, now: Instant)
        -> Result<(), NavSmError>
    {
        let diff_rad = normalise_angle(
            self.ctx.target_heading_rad - pose.heading_rad()
        );

        if diff_rad.abs() > self.params.escape_angle_tolerance {
            let speed = (self.params.escape_k_speed * diff_rad.abs())
                .max(self.params.escape_min_speed)
                .min(1.0);
            let turning = diff_rad.signum()
                * (self.params.escape_k_turning * diff_rad.abs())
                    .min(self.params.max_turning);

            debug!(
                "Aligning while reversing: error {:.3} rad, speed {:.2}, turning {:.2}",
                diff_rad, speed, turning
            );

            self.emit(ApCommand::manual_speed(-speed, turning));
            return Ok(());
        }

        info!("Aligned with the next waypoint, resuming the mission");

        let cone_ix = self.ctx.cone_wp_index.ok_or(NavSmError::ConeWaypointUnset)?;

        self.emit(ApCommand::manual_speed(0.0, 0.0));

        self.enter_limbo(
            now,
            vec![LimboPhase {
                commands: vec![],
                duration_s: self.params.direction_change_idle_duration
            }],
            AfterLimbo::FollowWaypoints(cone_ix + 1)
        );

        Ok(())
    }
}
