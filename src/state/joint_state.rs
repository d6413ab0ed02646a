use std::ops::{Index, IndexMut};

use nalgebra::{DVector, UnitQuaternion, Vector3};

use crate::geometry::{weighted_mean_rotation, SE3};

use super::{ObjectState, DOF_PER_OBJECT};

/// Ordered per-object states of every tracked body.
///
/// Object ordering is the registration order and never changes during a
/// tracking session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JointState {
    objects: Vec<ObjectState>,
}

impl JointState {
    pub fn new(objects: Vec<ObjectState>) -> Self {
        Self { objects }
    }

    /// `num_objects` copies of `object`.
    pub fn uniform(num_objects: usize, object: ObjectState) -> Self {
        Self {
            objects: vec![object; num_objects],
        }
    }

    /// Joint state of bodies at rest with the given poses.
    pub fn from_poses(poses: impl IntoIterator<Item = SE3>) -> Self {
        Self {
            objects: poses.into_iter().map(ObjectState::at_rest).collect(),
        }
    }

    pub fn num_objects(&self) -> usize {
        self.objects.len()
    }

    /// Number of addressable pose DOFs (`6 * num_objects`).
    pub fn dimension(&self) -> usize {
        self.objects.len() * DOF_PER_OBJECT
    }

    pub fn objects(&self) -> &[ObjectState] {
        &self.objects
    }

    pub fn object(&self, index: usize) -> Option<&ObjectState> {
        self.objects.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ObjectState> {
        self.objects.iter()
    }

    /// Flatten poses into `[t_0, r_0, t_1, r_1, ...]` (rotation vectors).
    pub fn to_pose_vector(&self) -> DVector<f64> {
        let mut v = DVector::zeros(self.dimension());
        for (i, object) in self.objects.iter().enumerate() {
            v.fixed_rows_mut::<DOF_PER_OBJECT>(i * DOF_PER_OBJECT)
                .copy_from(&object.pose.to_vector());
        }
        v
    }

    /// Weighted mean of `states` with already normalized `weights`.
    ///
    /// Positions and velocities are averaged arithmetically, orientations with
    /// the hemisphere-aligned quaternion mean. All states must have the same
    /// object count; an empty input yields an empty state.
    pub fn weighted_mean<'a, I>(states: I, weights: &[f64]) -> Self
    where
        I: IntoIterator<Item = &'a JointState>,
    {
        let states: Vec<&JointState> = states.into_iter().collect();
        let Some(first) = states.first() else {
            return Self::default();
        };

        let objects = (0..first.num_objects())
            .map(|obj| {
                let mut position = Vector3::zeros();
                let mut linear_velocity = Vector3::zeros();
                let mut angular_velocity = Vector3::zeros();
                let mut rotations: Vec<UnitQuaternion<f64>> = Vec::with_capacity(states.len());

                for (state, &w) in states.iter().zip(weights.iter()) {
                    let o = &state.objects[obj];
                    position += o.pose.translation * w;
                    linear_velocity += o.linear_velocity * w;
                    angular_velocity += o.angular_velocity * w;
                    rotations.push(o.pose.rotation);
                }

                ObjectState {
                    pose: SE3::new(weighted_mean_rotation(&rotations, weights), position),
                    linear_velocity,
                    angular_velocity,
                }
            })
            .collect();

        Self { objects }
    }
}

impl Index<usize> for JointState {
    type Output = ObjectState;

    fn index(&self, index: usize) -> &Self::Output {
        &self.objects[index]
    }
}

impl IndexMut<usize> for JointState {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.objects[index]
    }
}

impl From<Vec<ObjectState>> for JointState {
    fn from(objects: Vec<ObjectState>) -> Self {
        Self::new(objects)
    }
}
