//! # Topic payload messages
//!
//! Serialisable payloads for the topics consumed and produced by the
//! navigator. All payloads cross the wire as JSON.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Cone sighting messages produced by the vision pipeline
pub mod cone;

/// Mission waypoint messages
pub mod mission;

/// Robot pose messages
pub mod pose;
