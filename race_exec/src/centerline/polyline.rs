//! # Polyline centerline
//!
//! A closed track centerline made of straight segments joining a sequence of
//! points, the last point joining back onto the first.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use ordered_float::NotNan;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// Internal
use super::{ProgressBound, Projection, ProjectionError, ReferencePath};
use util::maths::{normalise_pi, rem_euclid};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Points closer together than this are considered duplicates.
const MIN_POINT_SEP_M: f64 = 1e-6;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A closed polyline centerline, parameterised by arc length.
#[derive(Clone, Debug, Serialize)]
pub struct Centerline {
    /// The points of the track, without the closing point
    points_m: Vec<Vector2<f64>>,

    /// Arc length at the start of each segment, plus the total length as the
    /// last element.
    cum_length_m: Vec<f64>,

    /// Discrete curvature at each point
    vertex_curv_m: Vec<f64>
}

/// A row of a track file
#[derive(Deserialize)]
struct TrackPoint {
    x: f64,
    y: f64
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CenterlineError {
    #[error("Cannot read the track file {0:?}: {1}")]
    FileReadError(PathBuf, csv::Error),

    #[error("Point {0} of the track is not finite")]
    NonFinitePoint(usize),

    #[error("A closed centerline needs at least 3 distinct points, found {0}")]
    TooFewPoints(usize)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Centerline {
    /// Build a closed centerline from a sequence of points.
    ///
    /// Consecutive duplicate points are removed, as is a final point which
    /// repeats the first one.
    pub fn from_points(points: Vec<Vector2<f64>>) -> Result<Self, CenterlineError> {
        if let Some(i) = points.iter().position(|p| !(p.x.is_finite() && p.y.is_finite())) {
            return Err(CenterlineError::NonFinitePoint(i));
        }

        let mut points_m: Vec<Vector2<f64>> = Vec::with_capacity(points.len());
        for p in points {
            if points_m
                .last()
                .map_or(true, |last| (p - last).norm() > MIN_POINT_SEP_M)
            {
                points_m.push(p);
            }
        }
        while points_m.len() > 1
            && (points_m[0] - points_m[points_m.len() - 1]).norm() <= MIN_POINT_SEP_M
        {
            points_m.pop();
        }

        let n = points_m.len();
        if n < 3 {
            return Err(CenterlineError::TooFewPoints(n));
        }

        // Cumulative arc length, including the closing segment
        let mut cum_length_m = Vec::with_capacity(n + 1);
        cum_length_m.push(0.0);
        for i in 0..n {
            let seg_length_m = (points_m[(i + 1) % n] - points_m[i]).norm();
            cum_length_m.push(cum_length_m[i] + seg_length_m);
        }

        // The curvature at each point is the turn between the segments either
        // side of it divided by the mean length of those segments.
        let headings_rad: Vec<f64> = (0..n)
            .map(|i| {
                let d = points_m[(i + 1) % n] - points_m[i];
                d.y.atan2(d.x)
            })
            .collect();
        let vertex_curv_m = (0..n)
            .map(|v| {
                let prev = (v + n - 1) % n;
                let turn_rad = normalise_pi(headings_rad[v] - headings_rad[prev]);
                let prev_len_m = cum_length_m[prev + 1] - cum_length_m[prev];
                let next_len_m = cum_length_m[v + 1] - cum_length_m[v];
                turn_rad / (0.5 * (prev_len_m + next_len_m))
            })
            .collect();

        Ok(Self {
            points_m,
            cum_length_m,
            vertex_curv_m
        })
    }

    /// Load a centerline from a CSV track file with `x` and `y` columns.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self, CenterlineError> {
        let path = path.as_ref();

        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| CenterlineError::FileReadError(path.to_path_buf(), e))?;

        let points = reader
            .deserialize::<TrackPoint>()
            .map(|row| row.map(|p| Vector2::new(p.x, p.y)))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CenterlineError::FileReadError(path.to_path_buf(), e))?;

        Self::from_points(points)
    }

    /// Get the number of points in the centerline
    pub fn num_points(&self) -> usize {
        self.points_m.len()
    }

    /// The points making up the centerline
    pub fn points(&self) -> &[Vector2<f64>] {
        &self.points_m
    }

    /// Position of the centerline at the given progress.
    pub fn point_at(&self, progress: f64) -> Vector2<f64> {
        let s = self.wrap(progress);
        let i = self.segment_index(s);
        let (start, _) = self.segment(i);

        start + self.segment_direction(i) * (s - self.cum_length_m[i])
    }

    /// Unit vector along the centerline at the given progress.
    pub fn tangent_at(&self, progress: f64) -> Vector2<f64> {
        self.segment_direction(self.segment_index(self.wrap(progress)))
    }

    fn wrap(&self, progress: f64) -> f64 {
        rem_euclid(progress, self.length())
    }

    /// Index of the segment containing an already wrapped progress.
    fn segment_index(&self, progress: f64) -> usize {
        self.cum_length_m
            .partition_point(|&c| c <= progress)
            .saturating_sub(1)
            .min(self.points_m.len() - 1)
    }

    fn segment(&self, i: usize) -> (Vector2<f64>, Vector2<f64>) {
        let n = self.points_m.len();
        (self.points_m[i], self.points_m[(i + 1) % n])
    }

    fn segment_direction(&self, i: usize) -> Vector2<f64> {
        let (start, end) = self.segment(i);
        (end - start) / (self.cum_length_m[i + 1] - self.cum_length_m[i])
    }

    /// Closest point to `point` on segment `i`, restricted to the progress
    /// interval `[lo, hi]`. Returns the distance and progress of that point,
    /// or `None` if the segment doesn't overlap the interval.
    fn closest_on_segment(
        &self,
        i: usize,
        point: &Vector2<f64>,
        lo: f64,
        hi: f64
    ) -> Option<(NotNan<f64>, f64)> {
        let s0 = self.cum_length_m[i];
        let s1 = self.cum_length_m[i + 1];

        let lo = lo.max(s0);
        let hi = hi.min(s1);
        if lo > hi {
            return None;
        }

        let (start, end) = self.segment(i);
        let seg = end - start;
        let len_m = s1 - s0;

        // Distance along a segment is convex, so the foot of the
        // perpendicular clamped into the interval is the closest point.
        let t = ((point - start).dot(&seg) / (len_m * len_m)).max(0.0).min(1.0);
        let s = (s0 + t * len_m).max(lo).min(hi);

        let closest = start + seg * ((s - s0) / len_m);
        let dist_m = NotNan::new((point - closest).norm()).ok()?;

        Some((dist_m, s))
    }
}

impl ReferencePath for Centerline {
    fn length(&self) -> f64 {
        self.cum_length_m[self.cum_length_m.len() - 1]
    }

    fn project(
        &self,
        x: f64,
        y: f64,
        bound: Option<&ProgressBound>
    ) -> Result<Projection, ProjectionError> {
        if !(x.is_finite() && y.is_finite()) {
            return Err(ProjectionError::NonFinitePoint(x, y));
        }

        let length = self.length();

        let intervals = match bound {
            Some(b) => {
                if !b.is_valid(length) {
                    return Err(ProjectionError::MalformedBound(*b));
                }
                b.intervals(length)
            }
            None => vec![(0.0, length)]
        };

        let point = &Vector2::new(x, y);
        let intervals = &intervals;

        let closest = (0..self.points_m.len())
            .flat_map(move |i| {
                intervals
                    .iter()
                    .filter_map(move |&(lo, hi)| self.closest_on_segment(i, point, lo, hi))
            })
            .min_by_key(|&(dist_m, _)| dist_m);

        match closest {
            Some((dist_m, s)) => Ok(Projection {
                progress: self.wrap(s),
                distance: dist_m.into_inner()
            }),
            None => Err(ProjectionError::NothingInBound(bound.copied()))
        }
    }

    fn error_sign(&self, x: f64, y: f64, progress: f64) -> f64 {
        let foot = self.point_at(progress);
        let tangent = self.tangent_at(progress);

        // Z component of tangent x (point - foot), positive on the left
        let cross = tangent.x * (y - foot.y) - tangent.y * (x - foot.x);

        if cross < 0.0 { -1.0 } else { 1.0 }
    }

    fn curvature(&self, progress: f64) -> f64 {
        let s = self.wrap(progress);
        let i = self.segment_index(s);
        let n = self.points_m.len();

        // Linear blend between the curvatures at either end of the segment
        let t = (s - self.cum_length_m[i]) / (self.cum_length_m[i + 1] - self.cum_length_m[i]);

        (1.0 - t) * self.vertex_curv_m[i] + t * self.vertex_curv_m[(i + 1) % n]
    }
}
