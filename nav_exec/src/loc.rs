//! # Localisation module
//!
//! Provides the navigator's view of the robot pose. Pose estimation itself is
//! performed upstream; this module only converts the wire message into the
//! maths types used by the rest of the executable.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Quaternion, UnitQuaternion, Vector3};

// Internal
use comms_if::msg::pose::PoseMsg;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The current pose (position and attitude in the map frame) of the rover.
#[derive(Debug, Copy, Clone)]
pub struct Pose {
    /// The position in the map frame
    pub position_m: Vector3<f64>,

    /// The attitude of the rover in the map frame.
    pub attitude_q: UnitQuaternion<f64>
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {

    /// Build a pose from the wire message.
    ///
    /// The message's quaternion is in (x, y, z, w) component order and is
    /// renormalised here so that downstream maths can assume a unit
    /// quaternion.
    pub fn from_msg(msg: &PoseMsg) -> Self {
        let [x, y, z, w] = msg.attitude_q;

        Self {
            position_m: Vector3::from(msg.position_m),
            attitude_q: UnitQuaternion::from_quaternion(
                Quaternion::new(w, x, y, z)
            )
        }
    }

    /// Return the heading (yaw about the map Z axis) of the rover in radians,
    /// in the range (-pi, pi].
    pub fn heading_rad(&self) -> f64 {
        // ZYX Euler decomposition, yaw is the last element
        self.attitude_q.euler_angles().2
    }

    /// The map-frame position projected onto the ground plane.
    pub fn position2_m(&self) -> [f64; 2] {
        [self.position_m.x, self.position_m.y]
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    fn pose_with_yaw(yaw_rad: f64) -> Pose {
        Pose {
            position_m: Vector3::default(),
            attitude_q: UnitQuaternion::from_euler_angles(0.0, 0.0, yaw_rad)
        }
    }

    #[test]
    fn test_heading() {
        assert!((pose_with_yaw(0.0).heading_rad() - 0.0).abs() < 1e-9);
        assert!((pose_with_yaw(0.5 * PI).heading_rad() - 0.5 * PI).abs() < 1e-9);
        assert!((pose_with_yaw(-0.25 * PI).heading_rad() + 0.25 * PI).abs() < 1e-9);
    }

    #[test]
    fn test_from_msg_normalises() {
        // A non-unit quaternion representing a 90 degree yaw, scaled by 2
        let msg = PoseMsg {
            position_m: [1.0, 2.0, 0.0],
            attitude_q: [0.0, 0.0, 2.0 * (0.25 * PI).sin(), 2.0 * (0.25 * PI).cos()],
            timestamp: chrono::Utc::now()
        };

        let pose = Pose::from_msg(&msg);
        assert!((pose.heading_rad() - 0.5 * PI).abs() < 1e-9);
        assert_eq!(pose.position2_m(), [1.0, 2.0]);
    }
}
