//! # Trajectory control module
//!
//! Trajectory control keeps the vehicle on the track centerline at a speed
//! suited to the corners ahead. It runs once per simulator tick.
//!
//! Each tick the vehicle's position is projected onto the centerline to find
//! its *progress* (arc length along the path) and its lateral error, the
//! signed distance to the path. The search is restricted to a small window
//! around the previous progress, see [`bound`].
//!
//! The lateral error drives a PD controller which outputs the steer demand.
//! Negative steer is to the left, so a vehicle to the right of the path
//! (negative error) is steered back left. The throttle demand comes from the
//! curvature of the centerline a short distance ahead: the tighter the
//! corners coming up the lower the throttle, with a hard cap when braking
//! for a sharp corner.
//!
//! Faults during a tick (bad input, failed projection, overruns) never stop
//! the loop. The previous command is held and the fault is counted and
//! reported.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod bound;
pub mod controllers;
pub mod frames;
pub mod params;
pub mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use controllers::*;
pub use params::{LateralStrategy, Params};
pub use state::*;
