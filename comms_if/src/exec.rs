//! # Executive command module
//!
//! This module provides the commands which the ground executive can send to
//! the navigator over the exec command topic.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Serialize, Deserialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A command sent by the ground executive to drive the navigator.
#[derive(Debug, Serialize, Deserialize, Eq, PartialEq, Copy, Clone)]
pub enum ExecCmd {
    /// Begin the mission from the first waypoint.
    Start,

    /// Stop and return to the waiting state.
    Reset,

    /// Republish the map-frame waypoint list relative to waypoint 0.
    AdjustWaypoints
}

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum ExecCmdParseError {
    #[error("{0} is not a recognised exec command")]
    UnknownCommand(String)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ExecCmd {

    /// Parse a command from its wire representation.
    pub fn from_wire(s: &str) -> Result<Self, ExecCmdParseError> {
        match s.trim() {
            "START" => Ok(ExecCmd::Start),
            "RESET" => Ok(ExecCmd::Reset),
            "ADJUST_WAYPOINTS" => Ok(ExecCmd::AdjustWaypoints),
            other => Err(ExecCmdParseError::UnknownCommand(other.into()))
        }
    }

    /// Get the wire representation of the command.
    pub fn as_wire(&self) -> &'static str {
        match self {
            ExecCmd::Start => "START",
            ExecCmd::Reset => "RESET",
            ExecCmd::AdjustWaypoints => "ADJUST_WAYPOINTS"
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_wire_round_trip() {
        for cmd in [ExecCmd::Start, ExecCmd::Reset, ExecCmd::AdjustWaypoints] {
            assert_eq!(ExecCmd::from_wire(cmd.as_wire()).unwrap(), cmd);
        }

        assert!(ExecCmd::from_wire("PAUSE").is_err());
    }
}
