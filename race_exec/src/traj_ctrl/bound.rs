//! # Progress bound calculation
//!
//! Projection onto the centerline is restricted to a window around the last
//! known progress. This keeps the search cheap and stops the projection from
//! snapping to a different part of the track where it passes close to itself.
//!
//! The window relies on the progress not moving more than the window half
//! width between ticks. Trajectory control flags a jump when the new progress
//! lands on the edge of the window, which is the symptom of that assumption
//! failing.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use crate::centerline::ProgressBound;
use util::maths::rem_euclid;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Calculate the window of progress to search in.
///
/// `None` is returned, meaning a global search should be performed, if:
/// - there is no previous progress estimate,
/// - the previous progress or window isn't finite,
/// - the window covers the whole path.
///
/// When the window straddles the start of the path the returned bound has
/// `wraps` set, so that `[hi, length)` and `[0, lo]` are searched rather than
/// the complement of the window.
pub fn progress_bound(
    progress: Option<f64>,
    window_m: f64,
    length_m: f64
) -> Option<ProgressBound> {
    let progress = progress?;

    if !progress.is_finite() || !window_m.is_finite() || !length_m.is_finite() {
        return None
    }

    if 2.0 * window_m >= length_m {
        return None
    }

    let lower = rem_euclid(progress - window_m, length_m);
    let upper = rem_euclid(progress + window_m, length_m);

    if lower <= upper {
        Some(ProgressBound { lo: lower, hi: upper, wraps: false })
    }
    else {
        Some(ProgressBound { lo: upper, hi: lower, wraps: true })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_no_progress() {
        assert_eq!(progress_bound(None, 2.0, 100.0), None);
    }

    #[test]
    fn test_window_covers_path() {
        assert_eq!(progress_bound(Some(1.0), 2.0, 4.0), None);
        assert_eq!(progress_bound(Some(1.0), 2.0, 3.0), None);
    }

    #[test]
    fn test_interior() {
        let b = progress_bound(Some(50.0), 2.0, 100.0).unwrap();
        assert_eq!(b, ProgressBound { lo: 48.0, hi: 52.0, wraps: false });
        assert!(b.contains(50.0));
    }

    #[test]
    fn test_wrap_low() {
        let b = progress_bound(Some(1.0), 2.0, 100.0).unwrap();
        assert_eq!(b, ProgressBound { lo: 3.0, hi: 99.0, wraps: true });
        assert!(b.contains(1.0));
        assert!(b.contains(99.5));
        assert!(b.contains(2.5));
        assert!(!b.contains(50.0));
    }

    #[test]
    fn test_wrap_high() {
        let b = progress_bound(Some(99.0), 2.0, 100.0).unwrap();
        assert_eq!(b, ProgressBound { lo: 1.0, hi: 97.0, wraps: true });
        assert!(b.contains(99.0));
        assert!(b.contains(0.5));
        assert!(!b.contains(96.0));
    }

    /// Every bound over a sweep of progress values is ordered, inside the
    /// path and contains the progress it was built around.
    #[test]
    fn test_bound_properties() {
        let length_m = 37.3;

        for window_m in [0.1, 2.0, 10.0, 18.0].iter() {
            for i in 0..1000 {
                let progress = length_m * (i as f64) / 1000.0;

                let b = progress_bound(Some(progress), *window_m, length_m)
                    .unwrap();

                assert!(b.lo <= b.hi, "{:?}", b);
                assert!(b.lo >= 0.0 && b.lo < length_m, "{:?}", b);
                assert!(b.hi >= 0.0 && b.hi < length_m, "{:?}", b);
                assert!(b.is_valid(length_m));
                assert!(b.contains(progress), "{} not in {:?}", progress, b);
            }
        }
    }
}
