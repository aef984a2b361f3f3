//! # Navigation Executable Parameters
//!
//! This module provides parameters for the navigation executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct NavExecParams {

    /// Frequency of the cyclic event loop in hertz.
    pub rate: f64,

    /// Network endpoint for the mission waypoint topic
    pub waypoints_endpoint: String,

    /// Network endpoint for the map-frame waypoint topic
    pub map_waypoints_endpoint: String,

    /// Network endpoint for the robot pose topic
    pub pose_endpoint: String,

    /// Network endpoint for the cone sightings topic
    pub cones_endpoint: String,

    /// Network endpoint for the touch sensor topic
    pub touch_endpoint: String,

    /// Network endpoint for the executive command topic
    pub exec_cmd_endpoint: String,

    /// Network endpoint for the autopilot state topic
    pub ap_state_endpoint: String,

    /// Network endpoint for the autopilot bridge request socket
    pub ap_request_endpoint: String,

    /// Network endpoint for the servo override topic
    pub rc_override_endpoint: String,

    /// Network endpoint for the guided-mode velocity setpoint topic
    pub velocity_endpoint: String,

    /// Network endpoint for the navigator state topic
    pub nav_state_endpoint: String,

    /// Network endpoint for the adjusted waypoint list topic
    pub adjusted_waypoints_endpoint: String
}
