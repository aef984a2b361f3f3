//! # Robot pose messages

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The robot's pose in the map frame.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct PoseMsg {
    /// Position in the map frame, meters.
    pub position_m: [f64; 3],

    /// Attitude as a unit quaternion in (x, y, z, w) component order.
    pub attitude_q: [f64; 4],

    /// Time at which the pose was estimated.
    pub timestamp: DateTime<Utc>
}
