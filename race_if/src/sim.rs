//! # Simulator Interface
//!
//! Vehicle state and environment data as provided by the host simulator each tick. Positions and
//! velocities are given in the simulator's world frame, angles in degrees.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A 3D vector in the world frame.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// The orientation of an actor in degrees.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub pitch: f64,

    /// Heading of the actor, anticlockwise from the world X axis.
    pub yaw: f64,

    pub roll: f64,
}

/// The pose of the ego vehicle in the world frame.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleTransform {
    /// Position in meters
    pub location: Vector3D,

    /// Attitude in degrees
    pub rotation: Rotation,
}

/// Another actor within sensing distance of the ego vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    /// Simulator ID of the actor
    pub id: u64,

    /// Position of the actor in meters
    pub location: Vector3D,

    /// Velocity of the actor in meters/second
    pub velocity: Vector3D,
}

/// Left and right track boundary samples covering the next stretch of track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackBoundary {
    pub left: Vec<[f64; 3]>,
    pub right: Vec<[f64; 3]>,
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl Vector3D {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Returns true if the horizontal components are finite. The vertical component is ignored.
    pub fn is_planar_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl VehicleTransform {
    /// Create a planar transform at the given position with the given yaw in degrees.
    pub fn planar(x: f64, y: f64, yaw_deg: f64) -> Self {
        Self {
            location: Vector3D::new(x, y, 0.0),
            rotation: Rotation {
                yaw: yaw_deg,
                ..Default::default()
            },
        }
    }

    /// Returns true if the planar components of the transform (x, y and yaw) are finite.
    pub fn is_finite(&self) -> bool {
        self.location.x.is_finite() && self.location.y.is_finite() && self.rotation.yaw.is_finite()
    }
}
