//! Weighted sample representation of the joint state distribution.

use crate::error::{Result, TrackerError};
use crate::state::JointState;

/// One joint-state hypothesis with an unnormalized log-weight.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub state: JointState,
    pub log_weight: f64,
}

impl Particle {
    /// Particle with log-weight 0 (uniform once normalized).
    pub fn new(state: JointState) -> Self {
        Self {
            state,
            log_weight: 0.0,
        }
    }

    pub fn weighted(state: JointState, log_weight: f64) -> Self {
        Self { state, log_weight }
    }
}

/// Ordered collection of particles sharing the same object count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParticleSet {
    particles: Vec<Particle>,
}

impl ParticleSet {
    /// Build a set, rejecting particles whose object count differs from the
    /// first one.
    pub fn new(particles: Vec<Particle>) -> Result<Self> {
        if let Some(first) = particles.first() {
            let expected = first.state.num_objects();
            if let Some(bad) = particles
                .iter()
                .find(|p| p.state.num_objects() != expected)
            {
                return Err(TrackerError::DimensionMismatch {
                    what: "particle object count",
                    expected,
                    got: bad.state.num_objects(),
                });
            }
        }
        Ok(Self { particles })
    }

    /// Unweighted set from joint states.
    pub fn from_states(states: impl IntoIterator<Item = JointState>) -> Result<Self> {
        Self::new(states.into_iter().map(Particle::new).collect())
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Object count shared by every particle (0 for an empty set).
    pub fn num_objects(&self) -> usize {
        self.particles
            .first()
            .map(|p| p.state.num_objects())
            .unwrap_or(0)
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Particle> {
        self.particles.iter()
    }

    pub fn states(&self) -> impl Iterator<Item = &JointState> {
        self.particles.iter().map(|p| &p.state)
    }

    pub fn log_weights(&self) -> Vec<f64> {
        self.particles.iter().map(|p| p.log_weight).collect()
    }

    /// Add per-particle log-likelihood increments.
    pub fn add_log_weights(&mut self, deltas: &[f64]) -> Result<()> {
        if deltas.len() != self.particles.len() {
            return Err(TrackerError::DimensionMismatch {
                what: "log-likelihood count",
                expected: self.particles.len(),
                got: deltas.len(),
            });
        }
        for (p, d) in self.particles.iter_mut().zip(deltas) {
            p.log_weight += d;
        }
        Ok(())
    }

    /// Normalized weights; fails on an empty set, NaN or all-zero weights.
    pub fn normalized_weights(&self) -> Result<Vec<f64>> {
        normalize_log_weights(&self.log_weights())
    }

    /// Kish effective sample size `1 / Σ w²` of the normalized weights.
    pub fn effective_sample_size(&self) -> Result<f64> {
        let weights = self.normalized_weights()?;
        Ok(1.0 / weights.iter().map(|w| w * w).sum::<f64>())
    }

    /// Weight-normalized mean joint state.
    pub fn mean(&self) -> Result<JointState> {
        let weights = self.normalized_weights()?;
        Ok(JointState::weighted_mean(self.states(), &weights))
    }
}

/// Exponentiate and normalize log-weights with the log-sum-exp shift.
///
/// NaN anywhere, an empty input, or no finite log-weight (every weight is
/// zero) is a degenerate distribution. Positive infinity is rejected too,
/// since it cannot be normalized.
pub fn normalize_log_weights(log_weights: &[f64]) -> Result<Vec<f64>> {
    if log_weights.is_empty() {
        return Err(TrackerError::DegenerateDistribution(
            "empty particle set".into(),
        ));
    }
    if log_weights.iter().any(|w| w.is_nan() || *w == f64::INFINITY) {
        return Err(TrackerError::DegenerateDistribution(
            "non-finite log-weight".into(),
        ));
    }

    let max = log_weights.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return Err(TrackerError::DegenerateDistribution(
            "all particle weights are zero".into(),
        ));
    }

    let mut weights: Vec<f64> = log_weights.iter().map(|w| (w - max).exp()).collect();
    let sum: f64 = weights.iter().sum();
    for w in &mut weights {
        *w /= sum;
    }
    Ok(weights)
}
