//! Systematic resampling.

use rand::Rng;

use crate::error::{Result, TrackerError};

use super::particles::{normalize_log_weights, Particle, ParticleSet};

/// Walks `k` pointers spaced `1/k` apart from `offset` through the
/// cumulative weights.
fn systematic_indices(weights: &[f64], k: usize, offset: f64) -> Vec<usize> {
    let n = weights.len();
    // rounding can leave the last pointer past the cumulative sum
    let last_nonzero = weights.iter().rposition(|&w| w > 0.0).unwrap_or(0);
    let step = 1.0 / k as f64;

    let mut indices = Vec::with_capacity(k);
    let mut cumulative = weights[0];
    let mut j = 0;
    for i in 0..k {
        let pointer = offset + i as f64 * step;
        // zero-weight particles are never selected, even at pointer 0
        while (pointer > cumulative || weights[j] == 0.0) && j + 1 < n {
            j += 1;
            cumulative += weights[j];
        }
        indices.push(j.min(last_nonzero));
    }
    indices
}

/// Draws `k` ancestors with a single uniform offset and `k` evenly spaced
/// pointers into the cumulative weights.
///
/// The expected number of copies of particle `i` is `k * w_i`, and the draw
/// depends only on the weights and the RNG stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystematicResampler;

impl SystematicResampler {
    pub fn new() -> Self {
        Self
    }

    /// Ancestor indices for a target size `k`.
    pub fn draw_indices<R: Rng + ?Sized>(
        &self,
        log_weights: &[f64],
        k: usize,
        rng: &mut R,
    ) -> Result<Vec<usize>> {
        if k == 0 {
            return Err(TrackerError::DegenerateDistribution(
                "resample target size is zero".into(),
            ));
        }
        let weights = normalize_log_weights(log_weights)?;
        let step = 1.0 / k as f64;
        let offset: f64 = rng.gen::<f64>() * step;
        Ok(systematic_indices(&weights, k, offset))
    }

    /// New unweighted set of exactly `k` particles drawn proportionally to
    /// weight.
    pub fn resample<R: Rng + ?Sized>(
        &self,
        set: &ParticleSet,
        k: usize,
        rng: &mut R,
    ) -> Result<ParticleSet> {
        let indices = self.draw_indices(&set.log_weights(), k, rng)?;
        let particles = set.particles();
        ParticleSet::new(
            indices
                .into_iter()
                .map(|i| Particle::new(particles[i].state.clone()))
                .collect(),
        )
    }
}
