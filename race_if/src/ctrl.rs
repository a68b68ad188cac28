//! # Vehicle control commands

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Range of the normalised steer command accepted by the actuation layer.
pub const STEER_RANGE: (f64, f64) = (-1.0, 1.0);

/// Range of the normalised throttle command accepted by the actuation layer.
pub const THROTTLE_RANGE: (f64, f64) = (0.0, 1.0);

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A command for the vehicle's low level actuation layer.
///
/// Both fields are normalised actuator demands rather than physical units.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlCommand {
    /// Steering demand. Negative values steer to the left, positive to the right, so a vehicle
    /// which is right of its path (negative lateral error) receives a negative demand.
    pub steer: f64,

    /// Throttle demand, between 0 (coast) and 1 (full throttle).
    pub throttle: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl ControlCommand {
    /// Create a new command.
    pub fn new(steer: f64, throttle: f64) -> Self {
        Self { steer, throttle }
    }

    /// Returns true if both demands are finite and within the actuator ranges.
    pub fn is_valid(&self) -> bool {
        self.steer.is_finite()
            && self.throttle.is_finite()
            && self.steer >= STEER_RANGE.0
            && self.steer <= STEER_RANGE.1
            && self.throttle >= THROTTLE_RANGE.0
            && self.throttle <= THROTTLE_RANGE.1
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_is_valid() {
        assert!(ControlCommand::default().is_valid());
        assert!(ControlCommand::new(-1.0, 0.76).is_valid());
        assert!(!ControlCommand::new(-15.5, 0.76).is_valid());
        assert!(!ControlCommand::new(0.0, 1.2).is_valid());
        assert!(!ControlCommand::new(std::f64::NAN, 0.5).is_valid());
    }

    #[test]
    fn test_json() {
        let cmd: ControlCommand =
            serde_json::from_str(r#"{ "steer": 0.25, "throttle": 0.39 }"#).unwrap();
        assert_eq!(cmd, ControlCommand::new(0.25, 0.39));
    }
}
