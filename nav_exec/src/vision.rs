//! # Cone vision adapter module
//!
//! Converts the candidate cone sightings produced by the vision pipeline
//! into a selected target with heading and distance estimates. Detection
//! itself (colour filtering, contour extraction) happens upstream; this
//! module only interprets the resulting bounding boxes.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use comms_if::msg::cone::{ConeSighting, ConeSightings};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Contour area of the reference cone used for distance calibration, in
/// pixels squared.
const REF_CONE_AREA_PX2: f64 = 3900.0;

/// Distance at which the reference cone was observed, in meters.
const REF_CONE_DISTANCE_M: f64 = 3.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Monocular cone estimator built from the camera intrinsics.
#[derive(Debug, Clone, Copy)]
pub struct ConeVision {
    /// Focal length of the camera in pixels, derived from the horizontal
    /// field of view and image width.
    focal_length_px: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ConeVision {

    /// Create an estimator for a camera with the given horizontal field of
    /// view (radians) and image width (pixels).
    pub fn new(horz_fov_rad: f64, horz_pixels: f64) -> Self {
        Self {
            focal_length_px: (horz_pixels / 2.0) / (horz_fov_rad / 2.0).tan()
        }
    }

    /// Select the target sighting from a frame's candidates.
    ///
    /// The first sighting with `area >= min_area` is chosen; the pipeline's
    /// ordering of candidates is preserved.
    pub fn select<'a>(
        &self,
        sightings: &'a ConeSightings,
        min_area: f64
    ) -> Option<&'a ConeSighting> {
        sightings.sightings.iter().find(|s| s.area >= min_area)
    }

    /// Heading to the sighting in radians.
    ///
    /// Positive offsets are to the right of the image centre, so a positive
    /// heading means "turn right".
    pub fn heading_rad(&self, sighting: &ConeSighting) -> f64 {
        sighting.x.atan2(self.focal_length_px)
    }

    /// Estimated distance to the sighting in meters.
    ///
    /// Apparent area falls with the square of distance, so the estimate
    /// scales the reference calibration by `sqrt(ref_area / area)`.
    pub fn distance_m(&self, sighting: &ConeSighting) -> f64 {
        REF_CONE_DISTANCE_M * (REF_CONE_AREA_PX2 / sighting.area).sqrt()
    }
}
