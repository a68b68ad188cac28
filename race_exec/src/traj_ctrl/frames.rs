//! # Frame transforms
//!
//! The world frame is the simulator's fixed frame. The vehicle (body) frame
//! has X forward along the vehicle's heading and Y to the left. Yaw is the
//! anticlockwise angle from the world X axis to the vehicle X axis.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Rotation2, Vector2};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Express a world frame vector in the vehicle frame.
///
/// This is a rotation of the vector by `-yaw_rad`, so a positive Y component
/// of the result is motion to the vehicle's left.
pub fn world_to_vehicle(vx_world: f64, vy_world: f64, yaw_rad: f64) -> (f64, f64) {
    let v = Rotation2::new(-yaw_rad) * Vector2::new(vx_world, vy_world);

    (v[0], v[1])
}

/// Express a world frame point in the vehicle frame of a vehicle at `origin`
/// with the given yaw.
pub fn world_point_to_vehicle(
    point: Vector2<f64>,
    origin: Vector2<f64>,
    yaw_rad: f64
) -> Vector2<f64> {
    let (x, y) = world_to_vehicle(point[0] - origin[0], point[1] - origin[1], yaw_rad);

    Vector2::new(x, y)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_identity_at_zero_yaw() {
        for &(vx, vy) in [(1.0, 0.0), (-3.5, 2.25), (0.0, 0.0), (1e6, -1e-6)].iter() {
            assert_eq!(world_to_vehicle(vx, vy, 0.0), (vx, vy));
        }
    }

    #[test]
    fn test_preserves_norm() {
        for i in 0..100 {
            let yaw = -4.0 * PI + 8.0 * PI * (i as f64) / 100.0;
            let (vx, vy) = (3.0 * (i as f64).sin(), -2.0 + 0.1 * i as f64);

            let (bx, by) = world_to_vehicle(vx, vy, yaw);

            assert!(((bx * bx + by * by) - (vx * vx + vy * vy)).abs() < 1e-9);
        }
    }

    /// A vehicle facing world +Y moving towards world -X is moving to its
    /// right.
    #[test]
    fn test_sign_convention() {
        let (bx, by) = world_to_vehicle(0.0, 1.0, FRAC_PI_2);
        assert!((bx - 1.0).abs() < 1e-12);
        assert!(by.abs() < 1e-12);

        let (bx, by) = world_to_vehicle(1.0, 0.0, FRAC_PI_2);
        assert!(bx.abs() < 1e-12);
        assert!((by + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_point_to_vehicle() {
        let p = world_point_to_vehicle(
            Vector2::new(10.0, 12.0),
            Vector2::new(10.0, 10.0),
            0.0
        );
        assert_eq!(p, Vector2::new(0.0, 2.0));

        let p = world_point_to_vehicle(
            Vector2::new(10.0, 12.0),
            Vector2::new(10.0, 10.0),
            FRAC_PI_2
        );
        assert!((p[0] - 2.0).abs() < 1e-12);
        assert!(p[1].abs() < 1e-12);
    }
}
