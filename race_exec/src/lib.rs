//! # Race library.
//!
//! This library allows other crates in the workspace, and the benchmarks, to access items defined
//! inside the race executable crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Centerline module - the reference path the vehicle follows and projection onto it
pub mod centerline;

/// Drive log replay - feeds a recorded drive through trajectory control offline
pub mod replay;

/// Trajectory control module - keeps the vehicle on the centerline
pub mod traj_ctrl;
