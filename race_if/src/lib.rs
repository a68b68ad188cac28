//! # Race interface crate.
//!
//! Provides the data structures exchanged between the race controller and the
//! host simulator or vehicle harness.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Control commands sent to the vehicle's actuation layer
pub mod ctrl;

/// Recorded drive logs which can be replayed through the controller
pub mod drive_log;

/// Vehicle and environment data provided by the host simulator
pub mod sim;
