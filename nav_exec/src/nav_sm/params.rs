//! # Navigation state machine parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the navigation state machine.
///
/// Speeds and turnings fall into two regimes: `normal_speed` and `min_speed`
/// are absolute values in meters/second used for the autopilot's cruise
/// parameter and guided-mode setpoints, while the per-waypoint factors and
/// the controller outputs are normalised demands in [-1, 1] driven through
/// the servo override.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NavSmParams {
    /// Nominal cruise speed of the rover in meters/second.
    pub normal_speed: f64,

    /// Minimum commanded speed, as both a guided-mode floor in
    /// meters/second and a normalised manual demand floor.
    pub min_speed: f64,

    /// Limit on the turning demand magnitude.
    pub max_turning: f64,

    /// Minimum sighting area to keep tracking a cone while driving to it,
    /// pixels squared.
    pub cone_normal_min_area: f64,

    /// Minimum sighting area to acquire (or reacquire) a cone, pixels
    /// squared.
    pub cone_recovery_min_area: f64,

    /// Distance at which the cone is considered close and the approach is
    /// capped to the waypoint's minimum speed, meters.
    pub cone_close_distance: f64,

    /// If true the cone approach drives the servo override directly; if
    /// false it emits guided-mode velocity setpoints.
    pub cone_approach_use_throttle: bool,

    /// Proportional gain from cone distance to approach speed.
    pub cone_approach_k_speed: f64,

    /// Proportional gain from cone heading to turning demand.
    pub cone_approach_k_turning: f64,

    /// Maximum time to spend driving toward a cone before treating it as
    /// lost, seconds.
    pub cone_timeout_seconds: f64,

    /// The escape maneuver used after touching a non-final cone.
    pub escape_strategy: EscapeStrategy,

    /// Duration of the simple-backup reverse, seconds.
    pub escape_backup_duration: f64,

    /// Proportional gain from heading error to reverse speed while
    /// escaping.
    pub escape_k_speed: f64,

    /// Proportional gain from heading error to turning while escaping.
    pub escape_k_turning: f64,

    /// Speed of the simple backup, and the floor of the aligned-backup
    /// speed, normalised.
    pub escape_min_speed: f64,

    /// Heading error below which the aligned backup is complete, radians.
    pub escape_angle_tolerance: f64,

    /// Normalised speed demanded while reversing away from a touched cone.
    pub direction_change_reverse_speed: f64,

    /// Time spent reversing away from a touched cone, seconds.
    pub direction_change_reverse_duration: f64,

    /// Settling time between direction changes, seconds.
    pub direction_change_idle_duration: f64,

    /// Circling speed as a multiple of `min_speed`.
    pub circling_relative_speed: f64,

    /// Heading error below which a circling sweep is complete, radians.
    pub circling_angle_tolerance: f64,

    /// Horizontal field of view of the camera, degrees.
    pub horz_fov: f64,

    /// Horizontal resolution of the camera, pixels.
    pub horz_pixels: f64,

    /// Number of consecutive cone-less frames tolerated while driving to a
    /// cone before starting a search.
    pub cone_lost_limit: u32,

    /// When present, written to the autopilot's `SYSID_MYGCS` parameter at
    /// mission start.
    pub gcs_id: Option<i64>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Escape maneuver strategies.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize)]
pub enum EscapeStrategy {
    /// Reverse blind for a fixed duration, then resume the mission.
    #[serde(rename = "simple_backup")]
    SimpleBackup,

    /// Reverse while aligning the heading with the bearing to the next
    /// waypoint, then resume the mission.
    #[serde(rename = "aligned_backup")]
    AlignedBackup
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for NavSmParams {
    fn default() -> Self {
        Self {
            normal_speed: 2.0,
            min_speed: 0.1,
            max_turning: 5.0,
            cone_normal_min_area: 100.0,
            cone_recovery_min_area: 400.0,
            cone_close_distance: 2.0,
            cone_approach_use_throttle: false,
            cone_approach_k_speed: 0.25,
            cone_approach_k_turning: 0.5,
            cone_timeout_seconds: 60.0,
            escape_strategy: EscapeStrategy::SimpleBackup,
            escape_backup_duration: 1.0,
            escape_k_speed: 2.0,
            escape_k_turning: 2.0,
            escape_min_speed: 0.7,
            escape_angle_tolerance: 0.15,
            direction_change_reverse_speed: -1.0,
            direction_change_reverse_duration: 1.5,
            direction_change_idle_duration: 1.0,
            circling_relative_speed: 1.5,
            circling_angle_tolerance: 0.15,
            horz_fov: 70.0,
            horz_pixels: 640.0,
            cone_lost_limit: 15,
            gcs_id: None
        }
    }
}
