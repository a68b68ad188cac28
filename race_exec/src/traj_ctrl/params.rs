//! Trajectory control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for trajectory control
///
/// Any parameter missing from a parameter file takes its default value, the
/// defaults being the tuned race values.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Params {

    /// Which law computes the steering demand
    pub lateral_strategy: LateralStrategy,

    /// Lateral controller proportional gain
    pub lat_k_p: f64,

    /// Lateral controller derivative gain, applied to the change in lateral
    /// error between consecutive ticks.
    pub lat_k_d: f64,

    /// If true the steer demand is saturated to `+/- steer_limit`
    pub clamp_steer: bool,

    /// Magnitude limit of the steer demand
    pub steer_limit: f64,

    /// Half width of the progress search window around the previous
    /// progress, in meters. The true progress must not move further than this
    /// in a single tick.
    pub progress_window_m: f64,

    /// If true the search window is widened to cover the distance the vehicle
    /// can travel in one tick at its current speed.
    pub adaptive_window: bool,

    /// Nominal period between ticks, used by the adaptive window
    pub tick_period_s: f64,

    /// Multiplier applied to the per-tick travel distance by the adaptive
    /// window.
    pub adaptive_window_margin: f64,

    /// Distances ahead of the current progress at which the path curvature
    /// is sampled, in meters.
    pub curv_lookahead_offsets_m: Vec<f64>,

    /// Gain converting the summed curvature magnitudes into the curvature
    /// parameter.
    pub curv_gain: f64,

    /// Throttle demand on a straight
    pub max_throttle: f64,

    /// Throttle demand at the maximum curvature parameter
    pub min_throttle: f64,

    /// Curvature parameter above which the braking cap is applied
    pub brake_curv_threshold: f64,

    /// Throttle cap applied when braking for a sharp corner
    pub brake_throttle_cap: f64,

    /// Lookahead strategy gain on the angle to the lookahead point
    pub lookahead_k_alpha: f64,

    /// Lookahead strategy target distance ahead of the vehicle, in meters
    pub lookahead_distance_m: f64,

    /// Maximum time a tick may take before its result is discarded
    pub tick_budget_s: f64
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Available steering laws.
#[derive(Deserialize, Serialize, Debug, Copy, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LateralStrategy {
    /// PD control on the lateral error to the centerline
    Pd,

    /// Steer towards the upcoming waypoints provided by the host, falling back
    /// on PD control when there aren't enough of them.
    Lookahead
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            lateral_strategy: LateralStrategy::Pd,
            lat_k_p: 0.5,
            lat_k_d: 15.0,
            clamp_steer: true,
            steer_limit: 1.0,
            progress_window_m: 2.0,
            adaptive_window: false,
            tick_period_s: 0.05,
            adaptive_window_margin: 2.0,
            curv_lookahead_offsets_m: vec![5.0, 10.0, 15.0, 20.0],
            curv_gain: 5.0,
            max_throttle: 0.76,
            min_throttle: 0.40,
            brake_curv_threshold: 0.7,
            brake_throttle_cap: 0.39,
            lookahead_k_alpha: 1.0,
            lookahead_distance_m: 5.0,
            tick_budget_s: 10.0
        }
    }
}

impl Params {
    /// Check that the parameters are consistent.
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        let finite = [
            ("lat_k_p", self.lat_k_p),
            ("lat_k_d", self.lat_k_d),
            ("curv_gain", self.curv_gain),
            ("lookahead_k_alpha", self.lookahead_k_alpha),
        ];
        for (name, value) in finite.iter() {
            if !value.is_finite() {
                return Err(format!("{} must be finite, found {}", name, value));
            }
        }

        let positive = [
            ("steer_limit", self.steer_limit),
            ("progress_window_m", self.progress_window_m),
            ("tick_period_s", self.tick_period_s),
            ("adaptive_window_margin", self.adaptive_window_margin),
            ("lookahead_distance_m", self.lookahead_distance_m),
            ("tick_budget_s", self.tick_budget_s),
        ];
        for (name, value) in positive.iter() {
            if !(value.is_finite() && *value > 0.0) {
                return Err(format!("{} must be positive, found {}", name, value));
            }
        }

        let unit = [
            ("max_throttle", self.max_throttle),
            ("min_throttle", self.min_throttle),
            ("brake_curv_threshold", self.brake_curv_threshold),
            ("brake_throttle_cap", self.brake_throttle_cap),
        ];
        for (name, value) in unit.iter() {
            if !(*value >= 0.0 && *value <= 1.0) {
                return Err(format!("{} must be in [0, 1], found {}", name, value));
            }
        }

        if self.min_throttle > self.max_throttle {
            return Err(format!(
                "min_throttle ({}) must not exceed max_throttle ({})",
                self.min_throttle, self.max_throttle
            ));
        }

        if self.curv_gain < 0.0 {
            return Err(format!("curv_gain must not be negative, found {}", self.curv_gain));
        }

        if let Some(o) = self.curv_lookahead_offsets_m.iter().find(|o| !o.is_finite()) {
            return Err(format!("curv_lookahead_offsets_m contains non-finite offset {}", o));
        }

        Ok(())
    }
}
