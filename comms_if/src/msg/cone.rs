//! # Cone sighting messages

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single candidate cone found by the vision pipeline.
///
/// Fields describe the bounding box of the candidate in pixel space. The
/// navigator only reads `x` (the horizontal offset of the box centre from
/// the image centre, positive right) and `area`; the remaining fields are
/// carried for ground display.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ConeSighting {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
    pub h: f64,
    pub d: f64,

    /// Contour area of the candidate in pixels squared.
    pub area: f64
}

/// All cone candidates found in one camera frame.
///
/// The vision pipeline's ordering of candidates is preserved.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ConeSightings {
    pub sightings: Vec<ConeSighting>
}
