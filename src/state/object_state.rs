use nalgebra::{UnitQuaternion, Vector3};

use crate::geometry::SE3;

/// Pose and velocity of a single rigid body.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectState {
    /// Object frame in the camera frame (T_co).
    pub pose: SE3,
    /// Linear velocity of the center of mass (camera frame, m/s).
    pub linear_velocity: Vector3<f64>,
    /// Angular velocity (camera frame, rad/s).
    pub angular_velocity: Vector3<f64>,
}

impl ObjectState {
    /// Object at rest with the given pose.
    pub fn at_rest(pose: SE3) -> Self {
        Self {
            pose,
            linear_velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
        }
    }

    /// Object at rest at `position` with identity orientation.
    pub fn at_position(position: Vector3<f64>) -> Self {
        Self::at_rest(SE3::from_translation(position))
    }

    pub fn position(&self) -> &Vector3<f64> {
        &self.pose.translation
    }

    pub fn orientation(&self) -> &UnitQuaternion<f64> {
        &self.pose.rotation
    }
}

impl Default for ObjectState {
    fn default() -> Self {
        Self::at_rest(SE3::identity())
    }
}
