//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Map a value from one range into another.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where
    T: Float
{
    target_range.0
        + ((value - source_range.0)
        * (target_range.1 - target_range.0)
        / (source_range.1 - source_range.0))
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
///
/// Due to floating point round-off the std version can return `rhs.abs()`
/// when `lhs` is a tiny negative number. That value is folded back to zero
/// here so that the result always satisfies `0 <= r < rhs.abs()`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    let r = if r < T::zero() { r + rhs.abs() } else { r };

    if r >= rhs.abs() { T::zero() } else { r }
}

/// Get the shortest signed distance from `a` to `b` on a circle of the given
/// circumference.
///
/// The result lies in `[-circumference/2, circumference/2]`, positive when
/// `b` is ahead of `a`.
pub fn wrapped_delta<T>(a: T, b: T, circumference: T) -> T
where
    T: Float
{
    let half = circumference / (T::one() + T::one());

    let d = rem_euclid(b - a, circumference);

    if d > half { d - circumference } else { d }
}

/// Normalise an angle into the range `(-pi, pi]`.
pub fn normalise_pi<T>(angle: T) -> T
where
    T: Float
{
    let pi = T::from(std::f64::consts::PI).unwrap_or_else(T::zero);

    let mut a = rem_euclid(angle, pi + pi);
    if a > pi {
        a = a - pi - pi;
    }

    a
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_lin_map() {
        assert_eq!(lin_map((0.0, 1.0), (0.76, 0.40), 0.0), 0.76);
        assert!((lin_map((0.0, 1.0), (0.76, 0.40), 1.0) - 0.40).abs() < 1e-12);
        assert_eq!(lin_map((-1.0, 1.0), (0.0, 10.0), 0.0), 5.0);
    }

    #[test]
    fn test_rem_euclid() {
        assert_eq!(rem_euclid(-1.0, 100.0), 99.0);
        assert_eq!(rem_euclid(101.0, 100.0), 1.0);
        assert_eq!(rem_euclid(100.0, 100.0), 0.0);
        assert_eq!(rem_euclid(-1e-20, 100.0), 0.0);
        assert!(rem_euclid(-1e-20f64, 100.0) < 100.0);
    }

    #[test]
    fn test_wrapped_delta() {
        assert_eq!(wrapped_delta(1.0, 3.0, 100.0), 2.0);
        assert_eq!(wrapped_delta(3.0, 1.0, 100.0), -2.0);
        assert_eq!(wrapped_delta(99.0, 1.0, 100.0), 2.0);
        assert_eq!(wrapped_delta(1.0, 99.0, 100.0), -2.0);
        assert_eq!(wrapped_delta(0.0, 50.0, 100.0), 50.0);
    }

    #[test]
    fn test_normalise_pi() {
        assert!((normalise_pi(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-12);
        assert!((normalise_pi(-3.0 * PI / 2.0) - PI / 2.0).abs() < 1e-12);
        assert!((normalise_pi(PI) - PI).abs() < 1e-12);
        assert_eq!(normalise_pi(0.5), 0.5);
    }
}
