//! # Mission waypoint messages

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single mission waypoint.
///
/// Waypoints are either geodetic (latitude/longitude) or map-frame metric
/// positions depending on the topic they arrive on. The altitude field is
/// overloaded to carry the waypoint metadata encoding (see
/// `nav_exec::mission`).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub x_lat: f64,
    pub y_long: f64,
    pub z_alt: f64
}

/// An ordered list of mission waypoints.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WaypointList {
    /// The waypoints making up the mission, in visit order.
    pub waypoints: Vec<Waypoint>,

    /// Index of the waypoint the autopilot is currently navigating toward.
    ///
    /// This field is owned by the autopilot; the navigator only requests
    /// changes to it via the bridge.
    pub current_seq: usize
}
