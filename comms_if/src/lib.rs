//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the software.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Autopilot bridge request, response, and command definitions
pub mod ap;

/// Executive command definitions
pub mod exec;

/// Topic payload message definitions
pub mod msg;

/// Network module
pub mod net;
