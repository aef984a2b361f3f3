//! # Autopilot Bridge Commands
//!
//! Request, response, and override definitions for the autopilot bridge.
//! Requests ride a REQ/REP socket pair; servo overrides and velocity
//! setpoints are published fire-and-forget.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::msg::mission::Waypoint;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Sentinel channel value indicating "no change" in an [`RcOverride`].
pub const RC_NO_CHANGE: u16 = 0;

/// Number of servo channels carried by an [`RcOverride`].
pub const NUM_RC_CHANNELS: usize = 8;

/// Servo channel index driving the throttle.
pub const THROTTLE_CHANNEL: usize = 2;

/// Servo channel index driving the steering.
pub const STEERING_CHANNEL: usize = 0;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Servo channel override demand sent to the autopilot.
///
/// Channels not being driven carry [`RC_NO_CHANGE`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RcOverride {
    pub channels: [u16; NUM_RC_CHANNELS]
}

/// Velocity setpoint demand for the autopilot's guided mode.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct VelocitySetpoint {
    /// Forward velocity demand in meters/second.
    pub linear_x_ms: f64,

    /// Yaw rate demand in radians/second, positive about the body Z axis.
    pub angular_z_rads: f64
}

/// The state reported by the autopilot on its state topic.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ApStateMsg {
    /// The autopilot's current mode string.
    pub mode: String
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Modes the autopilot can be commanded into.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq)]
pub enum ApMode {
    Manual,
    Hold,
    Auto,
    Guided,
    Rtl
}

/// A parameter value accepted by the autopilot.
///
/// The autopilot's parameter protocol accepts either integer or real values,
/// so the variant is carried across the bridge rather than a raw dynamic
/// type.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Real(f64)
}

/// Requests that are sent from the navigator to the autopilot bridge.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum ApRequest {
    /// Change the autopilot's mode.
    SetMode(ApMode),

    /// Arm (`true`) or disarm (`false`) the autopilot.
    Arm(bool),

    /// Write a named autopilot parameter.
    SetParam {
        name: String,
        value: ParamValue
    },

    /// Set the mission item the autopilot is navigating toward.
    SetCurrentWaypoint(usize),

    /// Upload a fresh mission waypoint list.
    PushWaypoints(Vec<Waypoint>)
}

/// Response from the autopilot bridge to a request.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum ApResponse {
    /// Request was valid and has been actioned.
    Accepted,

    /// Request was rejected by the autopilot, with the reported reason.
    Rejected(String)
}

/// A command for the autopilot bridge to execute.
///
/// Commands are either requests (acknowledged over the service socket) or
/// fire-and-forget demands published to the autopilot.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum ApCommand {
    /// An acknowledged request.
    Request(ApRequest),

    /// Drive the vehicle directly via servo override.
    ///
    /// `speed` and `turning` are normalised demands in [-1, 1], converted to
    /// PWM values by the bridge's servo calibration.
    ManualSpeed {
        speed: f64,
        turning: f64
    },

    /// Publish a guided-mode velocity setpoint.
    Velocity(VelocitySetpoint)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RcOverride {
    /// An override demanding no change on any channel.
    pub fn none() -> Self {
        Self {
            channels: [RC_NO_CHANGE; NUM_RC_CHANNELS]
        }
    }
}

impl ApCommand {
    pub fn set_mode(mode: ApMode) -> Self {
        ApCommand::Request(ApRequest::SetMode(mode))
    }

    pub fn arm(arm: bool) -> Self {
        ApCommand::Request(ApRequest::Arm(arm))
    }

    pub fn set_param(name: &str, value: ParamValue) -> Self {
        ApCommand::Request(ApRequest::SetParam {
            name: name.into(),
            value
        })
    }

    pub fn set_current_waypoint(index: usize) -> Self {
        ApCommand::Request(ApRequest::SetCurrentWaypoint(index))
    }

    pub fn push_waypoints(waypoints: Vec<Waypoint>) -> Self {
        ApCommand::Request(ApRequest::PushWaypoints(waypoints))
    }

    pub fn manual_speed(speed: f64, turning: f64) -> Self {
        ApCommand::ManualSpeed { speed, turning }
    }
}

impl ApMode {
    /// Parse a mode from the string reported by the autopilot.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "MANUAL" => Some(ApMode::Manual),
            "HOLD" => Some(ApMode::Hold),
            "AUTO" => Some(ApMode::Auto),
            "GUIDED" => Some(ApMode::Guided),
            "RTL" => Some(ApMode::Rtl),
            _ => None
        }
    }

    /// Get the mode string understood by the autopilot.
    pub fn as_wire(&self) -> &'static str {
        match self {
            ApMode::Manual => "MANUAL",
            ApMode::Hold => "HOLD",
            ApMode::Auto => "AUTO",
            ApMode::Guided => "GUIDED",
            ApMode::Rtl => "RTL"
        }
    }
}
