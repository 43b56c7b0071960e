//! Euler rotation state and camera orientation
use nalgebra::{Rotation3, Vector3};

use crate::projection::OrthoCamera;

/// Rotation state around three axes (in radians)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationState {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl RotationState {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }

    /// Rotate by delta amounts (in radians)
    pub fn rotate(&mut self, dx: f64, dy: f64, dz: f64) {
        self.x += dx;
        self.y += dy;
        self.z += dz;
    }
}

impl Default for RotationState {
    fn default() -> Self {
        Self::zero()
    }
}

/// Rotations applied to the model before it is viewed
pub struct Transform;

impl Transform {
    /// Rotation for a rotation state, applied in order X, Y, Z
    pub fn rotation(rotation: &RotationState) -> Rotation3<f64> {
        let rx = Rotation3::from_axis_angle(&Vector3::x_axis(), rotation.x);
        let ry = Rotation3::from_axis_angle(&Vector3::y_axis(), rotation.y);
        let rz = Rotation3::from_axis_angle(&Vector3::z_axis(), rotation.z);
        rz * ry * rx
    }

    /// Camera that sees the unrotated model the way `camera` sees it rotated.
    ///
    /// Projecting `p` with the result equals projecting `R * p` with `camera`,
    /// so meshes never need to be rebuilt to change the view.
    pub fn orient(camera: &OrthoCamera, rotation: &RotationState) -> OrthoCamera {
        let inverse = Self::rotation(rotation).inverse();
        OrthoCamera::from_axes(&(inverse * camera.x_axis()), &(inverse * camera.y_axis()))
    }
}
