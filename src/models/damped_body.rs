//! Damped constant-velocity rigid-body dynamics.
//!
//! Each body keeps a linear and an angular velocity. Over an interval `dt`
//! the velocities decay and pick up a random acceleration:
//!
//! ```text
//! a = S * n                      (S S^T = acceleration covariance, n ~ N(0, I))
//! v' = exp(-damping * dt) * v + a * dt
//! ```
//!
//! The center of mass moves with the average of old and new velocity, and the
//! body rotates about its center of mass, not about the object origin.

use nalgebra::{DVector, Matrix3, SymmetricEigen, Vector3};
use tracing::debug;

use crate::error::{Result, TrackerError};
use crate::geometry::{rotate_by, SE3};
use crate::state::{object_dofs, JointState, ObjectState};

use super::process::{ObjectParameters, ProcessModel};

#[derive(Debug, Clone)]
struct BodyDynamics {
    params: ObjectParameters,
    linear_sqrt: Matrix3<f64>,
    angular_sqrt: Matrix3<f64>,
}

impl BodyDynamics {
    fn step(&self, object: &ObjectState, dt: f64, noise: &[f64]) -> ObjectState {
        let linear_accel = self.linear_sqrt * Vector3::new(noise[0], noise[1], noise[2]);
        let angular_accel = self.angular_sqrt * Vector3::new(noise[3], noise[4], noise[5]);

        let decay = (-self.params.damping * dt).exp();
        let linear_velocity = object.linear_velocity * decay + linear_accel * dt;
        let angular_velocity = object.angular_velocity * decay + angular_accel * dt;

        let center = self.params.center;
        let center_of_mass = object.pose.transform_point(&center)
            + (object.linear_velocity + linear_velocity) * (0.5 * dt);
        let rotation = rotate_by(
            &object.pose.rotation,
            &((object.angular_velocity + angular_velocity) * (0.5 * dt)),
        );
        let translation = center_of_mass - rotation * center;

        ObjectState {
            pose: SE3::new(rotation, translation),
            linear_velocity,
            angular_velocity,
        }
    }
}

/// Square root `S` of a symmetric positive semi-definite matrix, `S S^T = cov`.
fn covariance_sqrt(cov: &Matrix3<f64>, what: &str) -> Result<Matrix3<f64>> {
    if !cov.iter().all(|v| v.is_finite()) || (cov - cov.transpose()).amax() > 1e-9 {
        return Err(TrackerError::InvalidConfig(format!(
            "{what} covariance must be finite and symmetric"
        )));
    }
    let eigen = SymmetricEigen::new(*cov);
    if eigen.eigenvalues.iter().any(|&l| l < -1e-12) {
        return Err(TrackerError::InvalidConfig(format!(
            "{what} covariance must be positive semi-definite"
        )));
    }
    let sqrt_values = eigen.eigenvalues.map(|l| l.max(0.0).sqrt());
    Ok(eigen.eigenvectors * Matrix3::from_diagonal(&sqrt_values) * eigen.eigenvectors.transpose())
}

/// [`ProcessModel`] for independently moving damped rigid bodies.
#[derive(Debug, Clone)]
pub struct DampedBodyProcess {
    bodies: Vec<BodyDynamics>,
}

impl DampedBodyProcess {
    pub fn new(parameters: Vec<ObjectParameters>) -> Result<Self> {
        let bodies = parameters
            .into_iter()
            .map(|params| -> Result<BodyDynamics> {
                params.validate()?;
                Ok(BodyDynamics {
                    linear_sqrt: covariance_sqrt(
                        &params.linear_acceleration_covariance,
                        "linear acceleration",
                    )?,
                    angular_sqrt: covariance_sqrt(
                        &params.angular_acceleration_covariance,
                        "angular acceleration",
                    )?,
                    params,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(objects = bodies.len(), "damped body process configured");
        Ok(Self { bodies })
    }

    /// `count` bodies sharing the same isotropic noise and damping, with the
    /// center of mass at the object origin.
    pub fn isotropic(
        count: usize,
        damping: f64,
        linear_acceleration_sigma: f64,
        angular_acceleration_sigma: f64,
    ) -> Result<Self> {
        Self::new(vec![
            ObjectParameters::isotropic(
                Vector3::zeros(),
                damping,
                linear_acceleration_sigma,
                angular_acceleration_sigma,
            );
            count
        ])
    }
}

impl ProcessModel for DampedBodyProcess {
    fn object_count(&self) -> usize {
        self.bodies.len()
    }

    fn object_parameters(&self, index: usize) -> Option<ObjectParameters> {
        self.bodies.get(index).map(|b| b.params.clone())
    }

    /// A non-positive `dt` returns the state unchanged.
    ///
    /// `state` must hold exactly `object_count()` objects and `noise` at least
    /// `noise_dimension()` values; this is checked in debug builds.
    fn predict(&self, state: &JointState, dt: f64, noise: &DVector<f64>) -> JointState {
        debug_assert_eq!(
            state.num_objects(),
            self.bodies.len(),
            "state object count does not match the process model"
        );
        debug_assert!(
            noise.len() >= self.noise_dimension(),
            "noise vector has {} values, process model needs {}",
            noise.len(),
            self.noise_dimension()
        );
        if dt <= 0.0 {
            return state.clone();
        }
        state
            .iter()
            .zip(&self.bodies)
            .enumerate()
            .map(|(i, (object, body))| body.step(object, dt, &noise.as_slice()[object_dofs(i)]))
            .collect::<Vec<_>>()
            .into()
    }
}
