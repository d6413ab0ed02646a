//! SE(3) rigid-body pose.

use nalgebra::{Matrix4, Rotation3, UnitQuaternion, Vector3, Vector6};

/// Rigid transform: rotation followed by translation.
///
/// For tracked objects this is T_co, the object frame expressed in the camera
/// frame. The rotation is a unit quaternion, so it always stays a valid
/// rotation.
#[derive(Debug, Clone, PartialEq)]
pub struct SE3 {
    pub rotation: UnitQuaternion<f64>,
    pub translation: Vector3<f64>,
}

impl SE3 {
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
        }
    }

    pub fn new(rotation: UnitQuaternion<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Pure translation.
    pub fn from_translation(translation: Vector3<f64>) -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation,
        }
    }

    /// Build from a homogeneous 4x4 matrix. The rotation block is
    /// re-orthonormalized through the quaternion.
    pub fn from_matrix(mat: Matrix4<f64>) -> Self {
        let rot = Rotation3::from_matrix(&mat.fixed_view::<3, 3>(0, 0).into_owned());
        Self {
            rotation: UnitQuaternion::from_rotation_matrix(&rot),
            translation: Vector3::new(mat[(0, 3)], mat[(1, 3)], mat[(2, 3)]),
        }
    }

    pub fn to_matrix(&self) -> Matrix4<f64> {
        let mut mat = Matrix4::identity();
        mat.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(self.rotation.to_rotation_matrix().matrix());
        mat.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        mat
    }

    /// Build from `[tx, ty, tz, rx, ry, rz]` where `r` is a rotation vector
    /// (axis * angle).
    pub fn from_vector(v: &Vector6<f64>) -> Self {
        Self {
            rotation: UnitQuaternion::from_scaled_axis(Vector3::new(v[3], v[4], v[5])),
            translation: Vector3::new(v[0], v[1], v[2]),
        }
    }

    /// Inverse of [`SE3::from_vector`].
    pub fn to_vector(&self) -> Vector6<f64> {
        let r = self.rotation.scaled_axis();
        Vector6::new(
            self.translation.x,
            self.translation.y,
            self.translation.z,
            r.x,
            r.y,
            r.z,
        )
    }

    pub fn inverse(&self) -> Self {
        let rot_inv = self.rotation.inverse();
        Self {
            rotation: rot_inv,
            translation: -(rot_inv * self.translation),
        }
    }

    /// `self * other`.
    pub fn compose(&self, other: &SE3) -> Self {
        Self {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }

    pub fn transform_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * p + self.translation
    }
}

impl Default for SE3 {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_pose() -> SE3 {
        SE3::new(
            UnitQuaternion::from_euler_angles(0.1, -0.4, 0.7),
            Vector3::new(0.3, -0.2, 1.1),
        )
    }

    #[test]
    fn test_inverse_composes_to_identity() {
        let pose = sample_pose();
        let id = pose.compose(&pose.inverse());

        assert_relative_eq!(id.translation, Vector3::zeros(), epsilon = 1e-12);
        assert_relative_eq!(id.rotation.angle(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_vector_roundtrip() {
        let pose = sample_pose();
        let back = SE3::from_vector(&pose.to_vector());

        assert_relative_eq!(back.translation, pose.translation, epsilon = 1e-12);
        assert_relative_eq!(back.rotation.angle_to(&pose.rotation), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_matrix_matches_transform_point() {
        let pose = sample_pose();
        let p = Vector3::new(1.0, 2.0, 3.0);
        let homogeneous = pose.to_matrix() * p.push(1.0);

        assert_relative_eq!(
            pose.transform_point(&p),
            Vector3::new(homogeneous.x, homogeneous.y, homogeneous.z),
            epsilon = 1e-12
        );
        let from_mat = SE3::from_matrix(pose.to_matrix());
        assert_relative_eq!(from_mat.translation, pose.translation, epsilon = 1e-12);
    }
}
