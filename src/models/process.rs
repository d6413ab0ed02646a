//! Process model interface and per-object physical parameters.

use nalgebra::{DVector, Matrix3, Vector3};
use rand::{Rng, RngCore};
use rand_distr::StandardNormal;

use crate::error::{Result, TrackerError};
use crate::state::{JointState, DOF_PER_OBJECT};

/// Physical parameters of one tracked body, fixed for a session.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectParameters {
    /// Center of mass in the object frame; rotations happen about this point.
    pub center: Vector3<f64>,
    /// Velocity damping rate (1/s). Velocities decay as `exp(-damping * dt)`.
    pub damping: f64,
    pub linear_acceleration_covariance: Matrix3<f64>,
    pub angular_acceleration_covariance: Matrix3<f64>,
}

impl ObjectParameters {
    /// Isotropic acceleration noise with the given 1-sigma values.
    pub fn isotropic(
        center: Vector3<f64>,
        damping: f64,
        linear_acceleration_sigma: f64,
        angular_acceleration_sigma: f64,
    ) -> Self {
        Self {
            center,
            damping,
            linear_acceleration_covariance: Matrix3::identity()
                * linear_acceleration_sigma.powi(2),
            angular_acceleration_covariance: Matrix3::identity()
                * angular_acceleration_sigma.powi(2),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.damping >= 0.0 && self.damping.is_finite()) {
            return Err(TrackerError::InvalidConfig(format!(
                "damping must be finite and non-negative, got {}",
                self.damping
            )));
        }
        if !self.center.iter().all(|c| c.is_finite()) {
            return Err(TrackerError::InvalidConfig(
                "object center must be finite".into(),
            ));
        }
        Ok(())
    }
}

/// Stochastic rigid-body dynamics for the joint state.
///
/// `predict` is deterministic given a standard-normal noise vector of
/// length `noise_dimension()`; all randomness enters through `advance`,
/// which takes an explicit RNG so runs are reproducible.
pub trait ProcessModel: Send + Sync {
    /// Number of bodies this model was configured for.
    fn object_count(&self) -> usize;

    /// Parameters of body `index`, if configured.
    fn object_parameters(&self, index: usize) -> Option<ObjectParameters>;

    /// Propagate `state` by `dt` seconds driven by standard-normal `noise`
    /// (6 values per object: linear then angular acceleration).
    fn predict(&self, state: &JointState, dt: f64, noise: &DVector<f64>) -> JointState;

    fn noise_dimension(&self) -> usize {
        self.object_count() * DOF_PER_OBJECT
    }

    /// Redraw the noise of the DOFs in `block` for every particle, then
    /// predict each particle from its prior.
    ///
    /// `noises` keeps the values of DOFs outside `block`, so successive
    /// blocks of one filter step accumulate into a full noise vector.
    fn advance(
        &self,
        priors: &[JointState],
        noises: &mut [DVector<f64>],
        dt: f64,
        block: &[usize],
        rng: &mut dyn RngCore,
    ) -> Vec<JointState> {
        priors
            .iter()
            .zip(noises.iter_mut())
            .map(|(prior, noise)| {
                for &dof in block {
                    noise[dof] = rng.sample(StandardNormal);
                }
                self.predict(prior, dt, noise)
            })
            .collect()
    }
}
