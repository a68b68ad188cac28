//! # Drive log records
//!
//! A drive log is a CSV file with one [`DriveLogRecord`] per simulator tick. It captures the ego
//! vehicle's planar pose and world velocity so that a drive can be replayed through the controller
//! offline.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::sim::{Vector3D, VehicleTransform};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single recorded tick.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveLogRecord {
    /// Time since the start of the log in seconds
    pub time_s: f64,

    /// World X position in meters
    pub x: f64,

    /// World Y position in meters
    pub y: f64,

    /// Yaw in degrees
    pub yaw_deg: f64,

    /// World X velocity in meters/second
    pub vx: f64,

    /// World Y velocity in meters/second
    pub vy: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl DriveLogRecord {
    /// The recorded vehicle transform.
    pub fn transform(&self) -> VehicleTransform {
        VehicleTransform::planar(self.x, self.y, self.yaw_deg)
    }

    /// The recorded world frame velocity.
    pub fn velocity(&self) -> Vector3D {
        Vector3D::new(self.vx, self.vy, 0.0)
    }
}
