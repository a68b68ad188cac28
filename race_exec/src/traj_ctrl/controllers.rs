//! # Trajectory controllers module
//!
//! This module provides the control laws used by TrajCtrl:
//!
//! - [`PdController`] converts the lateral error into a steer demand.
//! - [`CurvatureSpeedMap`] converts the curvature of the path ahead into a
//!   throttle demand, so that the vehicle slows before it reaches a corner
//!   rather than once it is already in it.
//! - [`LookaheadController`] is an alternative steering law which aims the
//!   vehicle at a point on the upcoming waypoints.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::Serialize;

// Internal
use super::{frames, Params};
use crate::centerline::ReferencePath;
use race_if::sim::{Vector3D, VehicleTransform};
use util::maths::lin_map;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A proportional-derivative controller.
///
/// The controller holds no memory of its own, the previous error is part of
/// the control state and is passed in on each call.
#[derive(Debug, Serialize, Clone)]
pub struct PdController {
    /// Proportional gain
    k_p: f64,

    /// Derivative gain
    k_d: f64
}

/// The terms of a PD controller output.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize)]
pub struct PdOutput {
    pub p_term: f64,
    pub d_term: f64,
    pub output: f64
}

/// Maps upcoming path curvature to a throttle demand.
#[derive(Debug, Serialize, Clone)]
pub struct CurvatureSpeedMap {
    /// Offsets ahead of the current progress to sample curvature at
    offsets_m: Vec<f64>,

    gain: f64,
    max_throttle: f64,
    min_throttle: f64,
    brake_curv_threshold: f64,
    brake_throttle_cap: f64
}

/// The output of the curvature speed map.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize)]
pub struct SpeedDemand {
    /// Summed curvature ahead scaled and saturated to `[0, 1]`
    pub curvature_param: f64,

    /// Throttle blended between the maximum and minimum by the curvature
    /// parameter, before the braking cap.
    pub target_throttle: f64,

    /// The final throttle demand
    pub throttle: f64,

    /// True if the braking cap lowered the throttle
    pub brake_cap_applied: bool
}

/// Steers towards a point a fixed distance along the upcoming waypoints.
#[derive(Debug, Serialize, Clone)]
pub struct LookaheadController {
    k_alpha: f64,
    distance_m: f64
}

/// The output of the lookahead controller.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct LookaheadOutput {
    /// Angle from the vehicle's heading to the aim point, positive to the
    /// left.
    pub alpha_rad: f64,

    pub steer: f64
}

/// The trajectory controllers
#[derive(Debug, Serialize, Clone)]
pub struct TrajControllers {
    /// Lateral error controller
    pub lat_ctrl: PdController,

    /// Throttle from curvature
    pub speed_map: CurvatureSpeedMap,

    /// Waypoint pursuit controller
    pub lookahead: LookaheadController
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PdController {

    /// Create a new controller with the given gains.
    pub fn new(k_p: f64, k_d: f64) -> Self {
        Self { k_p, k_d }
    }

    /// Get the value of the controller for the given error.
    ///
    /// The derivative is the change in error since the previous tick, it is
    /// not divided by the tick period.
    pub fn get(&self, error: f64, last_error: f64) -> PdOutput {
        let p_term = self.k_p * error;
        let d_term = self.k_d * (error - last_error);

        PdOutput {
            p_term,
            d_term,
            output: d_term + p_term
        }
    }
}

impl CurvatureSpeedMap {

    /// Create a new speed map from the parameters.
    pub fn new(params: &Params) -> Self {
        Self {
            offsets_m: params.curv_lookahead_offsets_m.clone(),
            gain: params.curv_gain,
            max_throttle: params.max_throttle,
            min_throttle: params.min_throttle,
            brake_curv_threshold: params.brake_curv_threshold,
            brake_throttle_cap: params.brake_throttle_cap
        }
    }

    /// Sum of the curvature magnitudes ahead of `progress`, scaled by the
    /// gain and saturated to `[0, 1]`.
    pub fn curvature_param<P: ReferencePath + ?Sized>(
        &self,
        path: &P,
        progress: f64
    ) -> f64 {
        let score: f64 = self.offsets_m
            .iter()
            .map(|o| path.curvature(progress + o).abs())
            .sum::<f64>()
            * self.gain;

        // NaN falls through to the clamp and is caught by the command check
        score.clamp(0.0, 1.0)
    }

    /// Get the throttle demand for a given curvature parameter.
    ///
    /// The throttle never increases with increasing curvature parameter.
    pub fn throttle(&self, curvature_param: f64) -> SpeedDemand {
        let target_throttle = lin_map(
            (0.0, 1.0),
            (self.max_throttle, self.min_throttle),
            curvature_param
        );

        let mut throttle = target_throttle;
        let mut brake_cap_applied = false;

        if curvature_param > self.brake_curv_threshold
            && throttle > self.brake_throttle_cap
        {
            throttle = self.brake_throttle_cap;
            brake_cap_applied = true;
        }

        SpeedDemand {
            curvature_param,
            target_throttle,
            throttle,
            brake_cap_applied
        }
    }

    /// Get the throttle demand for the path ahead of `progress`.
    pub fn get<P: ReferencePath + ?Sized>(&self, path: &P, progress: f64) -> SpeedDemand {
        self.throttle(self.curvature_param(path, progress))
    }
}

impl LookaheadController {

    pub fn new(k_alpha: f64, distance_m: f64) -> Self {
        Self { k_alpha, distance_m }
    }

    /// Get the steer demand towards the upcoming waypoints.
    ///
    /// Waypoints are taken in the order given and those behind the vehicle
    /// are ignored. The aim point is the midpoint of the first pair of
    /// consecutive waypoints which brackets the lookahead distance, or the
    /// last pair if none do.
    ///
    /// Returns `None` if fewer than two waypoints lie ahead of the vehicle.
    pub fn get(
        &self,
        transform: &VehicleTransform,
        waypoints: &[Vector3D]
    ) -> Option<LookaheadOutput> {
        let origin = Vector2::new(transform.location.x, transform.location.y);
        let yaw_rad = transform.rotation.yaw.to_radians();

        let ahead: Vec<Vector2<f64>> = waypoints
            .iter()
            .filter(|w| w.is_planar_finite())
            .map(|w| frames::world_point_to_vehicle(
                Vector2::new(w.x, w.y), origin, yaw_rad
            ))
            .filter(|p| p[0] > 0.0)
            .collect();

        if ahead.len() < 2 {
            return None
        }

        let far_idx = ahead
            .iter()
            .position(|p| p.norm() >= self.distance_m)
            .unwrap_or(ahead.len() - 1)
            .max(1);

        let aim = (ahead[far_idx - 1] + ahead[far_idx]) / 2.0;

        // Both points are ahead so the aim point is too
        let alpha_rad = aim[1].atan2(aim[0]);

        Some(LookaheadOutput {
            alpha_rad,
            steer: -self.k_alpha * alpha_rad
        })
    }
}

impl TrajControllers {

    /// Create a new instance of the controllers from the parameters
    pub fn new(params: &Params) -> Self {
        Self {
            lat_ctrl: PdController::new(params.lat_k_p, params.lat_k_d),
            speed_map: CurvatureSpeedMap::new(params),
            lookahead: LookaheadController::new(
                params.lookahead_k_alpha,
                params.lookahead_distance_m
            )
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::centerline::{Projection, ProgressBound, ProjectionError};

    /// A path of constant curvature.
    struct ConstCurv(f64);

    impl ReferencePath for ConstCurv {
        fn length(&self) -> f64 {
            1000.0
        }

        fn project(
            &self,
            _x: f64,
            _y: f64,
            _bound: Option<&ProgressBound>
        ) -> Result<Projection, ProjectionError> {
            Ok(Projection { progress: 0.0, distance: 0.0 })
        }

        fn error_sign(&self, _x: f64, _y: f64, _progress: f64) -> f64 {
            1.0
        }

        fn curvature(&self, _progress: f64) -> f64 {
            self.0
        }
    }

    #[test]
    fn test_pd() {
        let pd = PdController::new(0.5, 15.0);

        assert_eq!(pd.get(0.0, 0.0).output, 0.0);
        assert_eq!(pd.get(-1.0, 0.0).output, -15.5);
        assert_eq!(pd.get(2.0, 0.0).output, 15.5 * 2.0);

        let out = pd.get(1.0, 0.5);
        assert_eq!(out.p_term, 0.5);
        assert_eq!(out.d_term, 7.5);
        assert_eq!(out.output, 8.0);
    }

    #[test]
    fn test_straight_full_throttle() {
        let map = CurvatureSpeedMap::new(&Params::default());

        let demand = map.get(&ConstCurv(0.0), 10.0);
        assert_eq!(demand.curvature_param, 0.0);
        assert_eq!(demand.throttle, 0.76);
        assert!(!demand.brake_cap_applied);
    }

    #[test]
    fn test_sharp_corner_braking() {
        let map = CurvatureSpeedMap::new(&Params::default());

        // 4 samples * 0.1 * 5 = 2, saturated to 1
        let demand = map.get(&ConstCurv(-0.1), 10.0);
        assert_eq!(demand.curvature_param, 1.0);
        assert!((demand.target_throttle - 0.40).abs() < 1e-12);
        assert_eq!(demand.throttle, 0.39);
        assert!(demand.brake_cap_applied);
    }

    #[test]
    fn test_moderate_corner() {
        let map = CurvatureSpeedMap::new(&Params::default());

        // 4 * 0.025 * 5 = 0.5
        let demand = map.get(&ConstCurv(0.025), 10.0);
        assert!((demand.curvature_param - 0.5).abs() < 1e-12);
        assert!((demand.throttle - 0.58).abs() < 1e-12);
        assert!(!demand.brake_cap_applied);
    }

    #[test]
    fn test_throttle_monotonic() {
        let map = CurvatureSpeedMap::new(&Params::default());

        let mut prev = std::f64::INFINITY;
        for i in 0..=1000 {
            let demand = map.throttle(i as f64 / 1000.0);
            assert!(demand.throttle <= prev);
            assert!(demand.target_throttle <= 0.76 + 1e-12);
            assert!(demand.target_throttle >= 0.40 - 1e-12);
            prev = demand.throttle;
        }
    }

    #[test]
    fn test_lookahead() {
        let ctrl = LookaheadController::new(1.0, 5.0);
        let transform = VehicleTransform::planar(0.0, 0.0, 0.0);

        // Straight ahead
        let wps: Vec<Vector3D> = (1..10)
            .map(|i| Vector3D::new(i as f64 * 2.0, 0.0, 0.0))
            .collect();
        let out = ctrl.get(&transform, &wps).unwrap();
        assert_eq!(out.alpha_rad, 0.0);

        // Waypoints off to the left give a left (negative) steer
        let wps: Vec<Vector3D> = (1..10)
            .map(|i| Vector3D::new(i as f64 * 2.0, 2.0, 0.0))
            .collect();
        let out = ctrl.get(&transform, &wps).unwrap();
        assert!(out.alpha_rad > 0.0);
        assert!(out.steer < 0.0);

        // Midpoint of (4, 2) and (6, 2)
        assert!((out.alpha_rad - 2f64.atan2(5.0)).abs() < 1e-12);
    }

    #[test]
    fn test_lookahead_too_few_waypoints() {
        let ctrl = LookaheadController::new(1.0, 5.0);
        let transform = VehicleTransform::planar(0.0, 0.0, 90.0);

        assert!(ctrl.get(&transform, &[]).is_none());

        // Both waypoints are behind a vehicle facing world +Y
        let wps = vec![
            Vector3D::new(0.0, -2.0, 0.0),
            Vector3D::new(0.0, -4.0, 0.0)
        ];
        assert!(ctrl.get(&transform, &wps).is_none());
    }
}
