//! # Centerline module
//!
//! The centerline is the reference path the vehicle races along. It is
//! parameterised by arc length, which we call *progress*, running from 0 at the
//! first point of the track up to (but not including) the total track length,
//! after which it wraps back round to 0.
//!
//! Trajectory control only interacts with the centerline through the
//! [`ReferencePath`] trait, so any arc-length parameterised curve can be
//! swapped in. [`Centerline`] is the polyline implementation used by the
//! executable.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod polyline;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
pub use polyline::*;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// An arc-length parameterised reference path.
pub trait ReferencePath {
    /// Total arc length of the path in meters. Constant for the lifetime of
    /// the path.
    fn length(&self) -> f64;

    /// Find the point on the path nearest to `(x, y)`.
    ///
    /// If a bound is given only the arc covered by the bound is searched,
    /// otherwise the whole path is.
    fn project(
        &self,
        x: f64,
        y: f64,
        bound: Option<&ProgressBound>
    ) -> Result<Projection, ProjectionError>;

    /// Which side of the path `(x, y)` lies on, relative to the path at the
    /// given progress. `+1` is left of the path, `-1` is right.
    fn error_sign(&self, x: f64, y: f64, progress: f64) -> f64;

    /// Curvature of the path at the given progress, in 1/meters. Left turns
    /// are positive.
    ///
    /// Progress outside `[0, length)` is wrapped onto the path.
    fn curvature(&self, progress: f64) -> f64;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Result of projecting a point onto the path.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Projection {
    /// Arc length position of the nearest point, in `[0, length)`
    pub progress: f64,

    /// Unsigned distance from the point to the path in meters
    pub distance: f64
}

/// A window of progress values to restrict a projection to.
///
/// `lo <= hi` always holds. If `wraps` is false the window is `[lo, hi]`.
/// If `wraps` is true the window straddles the start of the path and covers
/// `[hi, length)` and `[0, lo]`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct ProgressBound {
    pub lo: f64,
    pub hi: f64,
    pub wraps: bool
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Reasons a projection can fail.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, thiserror::Error)]
pub enum ProjectionError {
    #[error("Cannot project non-finite point ({0}, {1})")]
    NonFinitePoint(f64, f64),

    #[error("No part of the path lies within the bound {0:?}")]
    NothingInBound(Option<ProgressBound>),

    #[error("The bound {0:?} is malformed")]
    MalformedBound(ProgressBound)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ProgressBound {
    /// Returns true if the given progress lies in the window.
    pub fn contains(&self, progress: f64) -> bool {
        if self.wraps {
            progress >= self.hi || progress <= self.lo
        }
        else {
            progress >= self.lo && progress <= self.hi
        }
    }

    /// Returns true if `lo` and `hi` are ordered, finite and inside
    /// `[0, length)`.
    pub fn is_valid(&self, length: f64) -> bool {
        self.lo.is_finite()
            && self.hi.is_finite()
            && self.lo <= self.hi
            && self.lo >= 0.0
            && self.hi < length
    }

    /// The non-wrapping arc intervals covered by the window on a path of the
    /// given length.
    pub fn intervals(&self, length: f64) -> Vec<(f64, f64)> {
        if self.wraps {
            vec![(self.hi, length), (0.0, self.lo)]
        }
        else {
            vec![(self.lo, self.hi)]
        }
    }
}
