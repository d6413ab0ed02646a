//! KLD-sampling: adaptive particle counts from state-space bin occupancy.
//!
//! Fox, "Adapting the Sample Size in Particle Filters Through KLD-Sampling"
//! (IJRR 2003). With `b` occupied bins, drawing
//!
//! ```text
//! n = (b - 1) / (2ε) * (1 - 2/(9(b-1)) + sqrt(2/(9(b-1))) * z)^3
//! ```
//!
//! samples bounds the KL divergence between the sample-based and the true
//! posterior by `ε` with probability `1 - δ`, where `z` is the upper `1 - δ`
//! quantile of the standard normal.

use std::collections::HashSet;

use serde::Deserialize;

use crate::error::{Result, TrackerError};
use crate::state::JointState;

use super::particles::ParticleSet;

/// Fixed discretization of the joint pose space.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct StateGrid {
    /// Bin edge for translation components (metres).
    pub translation_bin: f64,
    /// Bin edge for rotation-vector components (radians).
    pub rotation_bin: f64,
}

impl Default for StateGrid {
    fn default() -> Self {
        Self {
            translation_bin: 0.01,
            rotation_bin: 0.05,
        }
    }
}

impl StateGrid {
    pub fn validate(&self) -> Result<()> {
        if !(self.translation_bin > 0.0 && self.rotation_bin > 0.0) {
            return Err(TrackerError::InvalidConfig(format!(
                "bin sizes must be positive, got translation {} rotation {}",
                self.translation_bin, self.rotation_bin
            )));
        }
        Ok(())
    }

    /// Integer bin coordinates of a joint state.
    pub fn bin_of(&self, state: &JointState) -> Vec<i64> {
        let mut key = Vec::with_capacity(state.dimension());
        for object in state.iter() {
            let v = object.pose.to_vector();
            for k in 0..3 {
                key.push((v[k] / self.translation_bin).floor() as i64);
            }
            for k in 3..6 {
                key.push((v[k] / self.rotation_bin).floor() as i64);
            }
        }
        key
    }
}

/// Number of samples required so that the KL divergence to the posterior
/// stays below `kl_bound` with the confidence implied by `quantile`.
///
/// Only particles with a non-zero weight occupy bins. Never returns less
/// than 1.
pub fn required_sample_count(
    particles: &ParticleSet,
    kl_bound: f64,
    quantile: f64,
    grid: &StateGrid,
) -> usize {
    let occupied: HashSet<Vec<i64>> = particles
        .iter()
        .filter(|p| p.log_weight.is_finite())
        .map(|p| grid.bin_of(&p.state))
        .collect();

    kld_bound(occupied.len(), kl_bound, quantile)
}

fn kld_bound(bins: usize, kl_bound: f64, quantile: f64) -> usize {
    if bins <= 1 {
        return 1;
    }
    let k = (bins - 1) as f64;
    let a = 2.0 / (9.0 * k);
    let n = k / (2.0 * kl_bound) * (1.0 - a + a.sqrt() * quantile).powi(3);
    if n.is_finite() {
        n.ceil().max(1.0) as usize
    } else {
        usize::MAX
    }
}

/// Adaptive target count clamped to configured limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KldSizing {
    /// Upper bound `ε` on the KL divergence.
    pub kl_bound: f64,
    /// Upper standard-normal quantile `z_{1-δ}`.
    pub quantile: f64,
    pub grid: StateGrid,
    pub min_sample_count: usize,
}

impl KldSizing {
    pub fn validate(&self) -> Result<()> {
        if !(self.kl_bound > 0.0) {
            return Err(TrackerError::InvalidConfig(format!(
                "KL bound must be positive, got {}",
                self.kl_bound
            )));
        }
        if !self.quantile.is_finite() {
            return Err(TrackerError::InvalidConfig(
                "KLD quantile must be finite".into(),
            ));
        }
        if self.min_sample_count == 0 {
            return Err(TrackerError::InvalidConfig(
                "min_sample_count must be at least 1".into(),
            ));
        }
        self.grid.validate()
    }

    /// `required_sample_count` clamped to `[min_sample_count, ceiling]`.
    pub fn target_count(&self, particles: &ParticleSet, ceiling: usize) -> usize {
        let ceiling = ceiling.max(self.min_sample_count);
        required_sample_count(particles, self.kl_bound, self.quantile, &self.grid)
            .clamp(self.min_sample_count, ceiling)
    }
}
