//! A tracking session: the particle distribution and its update cycle.
//!
//! Initialization bootstraps the joint distribution from candidate states,
//! either all objects at once or one object at a time. Every later frame runs
//! a coordinate-wise predict/score/resample sweep over the active sampling
//! blocks.

use std::sync::Arc;
use std::time::Instant;

use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::error::{Result, TrackerError};
use crate::filter::{
    normalize_log_weights, BlockController, Particle, ParticleSet, SamplingBlocks,
    SystematicResampler,
};
use crate::models::{ObservationModel, ProcessModel};
use crate::sensor::DepthFrame;
use crate::state::{JointState, ObjectState};

use super::config::{BootstrapSizing, TrackerConfig};
use super::result::{StepMetrics, TimingStats};

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Elapsed time since the previous frame, never negative.
fn delta_time(last_timestamp: Option<f64>, timestamp: f64) -> f64 {
    let Some(last) = last_timestamp else {
        return 0.0;
    };
    let dt = timestamp - last;
    if !dt.is_finite() {
        warn!(timestamp, last, "non-finite frame interval, using zero");
        return 0.0;
    }
    if dt < 0.0 {
        warn!(dt, "frame is older than the previous one, clamping elapsed time to zero");
        return 0.0;
    }
    dt
}

/// One log-likelihood per state; a wrong count or NaN is an error.
fn score(
    observation: &dyn ObservationModel,
    states: &[JointState],
    frame: &DepthFrame,
) -> Result<Vec<f64>> {
    let scores = observation.log_likelihoods(states, frame);
    if scores.len() != states.len() {
        return Err(TrackerError::DimensionMismatch {
            what: "observation model output",
            expected: states.len(),
            got: scores.len(),
        });
    }
    if scores.iter().any(|s| s.is_nan()) {
        return Err(TrackerError::DegenerateDistribution(
            "observation model returned NaN log-likelihood".into(),
        ));
    }
    Ok(scores)
}

/// Per-particle data carried through the blocks of one sweep.
///
/// Resampling selects rows of all columns together, so every particle keeps
/// its own prior, noise and likelihood history.
#[derive(Debug, Clone)]
struct Generation {
    priors: Vec<JointState>,
    noises: Vec<DVector<f64>>,
    states: Vec<JointState>,
    log_likelihoods: Vec<f64>,
    log_weights: Vec<f64>,
}

impl Generation {
    fn start(states: Vec<JointState>, dimension: usize) -> Self {
        let n = states.len();
        Self {
            priors: states.clone(),
            noises: vec![DVector::zeros(dimension); n],
            states,
            log_likelihoods: vec![0.0; n],
            log_weights: vec![0.0; n],
        }
    }

    fn len(&self) -> usize {
        self.states.len()
    }

    /// Re-predict from the priors with fresh noise on `block`, then reweight
    /// by the likelihood change since the previous block.
    #[allow(clippy::too_many_arguments)]
    fn propagate(
        &mut self,
        process: &dyn ProcessModel,
        observation: &dyn ObservationModel,
        frame: &DepthFrame,
        dt: f64,
        block: &[usize],
        rng: &mut StdRng,
        timing: &mut TimingStats,
    ) -> Result<()> {
        let t = Instant::now();
        self.states = process.advance(&self.priors, &mut self.noises, dt, block, rng);
        timing.predict_ms += elapsed_ms(t);

        let t = Instant::now();
        let scores = score(observation, &self.states, frame)?;
        timing.observe_ms += elapsed_ms(t);

        for ((weight, previous), new) in self
            .log_weights
            .iter_mut()
            .zip(self.log_likelihoods.iter_mut())
            .zip(scores)
        {
            *weight += new - *previous;
            *previous = new;
        }
        Ok(())
    }

    fn weighted_set(&self) -> Result<ParticleSet> {
        ParticleSet::new(
            self.states
                .iter()
                .zip(&self.log_weights)
                .map(|(state, &w)| Particle::weighted(state.clone(), w))
                .collect(),
        )
    }

    /// `k` rows drawn by weight, all with log-weight 0.
    fn resample(&self, k: usize, rng: &mut StdRng) -> Result<Self> {
        let indices = SystematicResampler.draw_indices(&self.log_weights, k, rng)?;
        let pick = |column: &[JointState]| -> Vec<JointState> {
            indices.iter().map(|&i| column[i].clone()).collect()
        };
        Ok(Self {
            priors: pick(&self.priors),
            noises: indices.iter().map(|&i| self.noises[i].clone()).collect(),
            states: pick(&self.states),
            log_likelihoods: indices.iter().map(|&i| self.log_likelihoods[i]).collect(),
            log_weights: vec![0.0; k],
        })
    }

    fn into_particles(self) -> Result<ParticleSet> {
        ParticleSet::new(
            self.states
                .into_iter()
                .zip(self.log_weights)
                .map(|(state, w)| Particle::weighted(state, w))
                .collect(),
        )
    }
}

/// Particle distribution plus everything needed to advance it.
///
/// Cloning yields an independent working copy; the models are shared.
#[derive(Clone)]
pub(crate) struct TrackerSession {
    particles: ParticleSet,
    blocks: BlockController,
    last_timestamp: Option<f64>,
    target_count: usize,
    rng: StdRng,
    process: Arc<dyn ProcessModel>,
    observation: Arc<dyn ObservationModel>,
}

impl TrackerSession {
    /// Build a session from candidate states scored against `frame`.
    ///
    /// `frame` must already be downsampled.
    pub(crate) fn initialize(
        config: &TrackerConfig,
        process: Arc<dyn ProcessModel>,
        observation: Arc<dyn ObservationModel>,
        hints: &[JointState],
        frame: &DepthFrame,
        partial: bool,
    ) -> Result<Self> {
        validate_hints(hints, config.num_objects(), partial)?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let dimension = config.dimension();
        let mut timing = TimingStats::zero();

        let bootstrap = if partial {
            refine_objects(
                config,
                process.as_ref(),
                observation.as_ref(),
                hints,
                frame,
                &mut rng,
                &mut timing,
            )?
        } else {
            let mut generation = Generation::start(hints.to_vec(), dimension);
            let dense = SamplingBlocks::dense(dimension);
            for block in dense.blocks() {
                generation.propagate(
                    process.as_ref(),
                    observation.as_ref(),
                    frame,
                    0.0,
                    block,
                    &mut rng,
                    &mut timing,
                )?;
            }
            generation
        };

        let steady_blocks = config.steady_state_blocks()?;
        let ceiling = config.sample_ceiling(steady_blocks.len());
        let target_count = config
            .kld_sizing()
            .target_count(&bootstrap.weighted_set()?, ceiling);
        let particles = bootstrap.resample(target_count, &mut rng)?.into_particles()?;

        let mut blocks = BlockController::new(dimension);
        blocks.set_blocks(steady_blocks)?;

        info!(
            candidates = hints.len(),
            partial,
            particles = particles.len(),
            blocks = blocks.active_blocks().len(),
            "tracker session initialized"
        );

        Ok(Self {
            particles,
            blocks,
            last_timestamp: frame.timestamp_s.is_finite().then_some(frame.timestamp_s),
            target_count,
            rng,
            process,
            observation,
        })
    }

    /// One predict/score/resample sweep over the active blocks.
    ///
    /// Mutates `self` even on error; callers run it on a working copy.
    pub(crate) fn step(
        &mut self,
        config: &TrackerConfig,
        frame: &DepthFrame,
    ) -> Result<(StepMetrics, TimingStats)> {
        let start = Instant::now();
        let mut timing = TimingStats::zero();
        let dt = delta_time(self.last_timestamp, frame.timestamp_s);

        let blocks = self.blocks.active_blocks().clone();
        let ceiling = config.sample_ceiling(blocks.len());
        let sizing = config.kld_sizing();

        let mut generation = Generation::start(
            self.particles.states().cloned().collect(),
            blocks.dimension(),
        );
        let mut effective_sample_size = generation.len() as f64;

        for (index, block) in blocks.blocks().iter().enumerate() {
            generation.propagate(
                self.process.as_ref(),
                self.observation.as_ref(),
                frame,
                dt,
                block,
                &mut self.rng,
                &mut timing,
            )?;

            let t = Instant::now();
            let k = if index + 1 == blocks.len() {
                let weights = normalize_log_weights(&generation.log_weights)?;
                effective_sample_size = 1.0 / weights.iter().map(|w| w * w).sum::<f64>();
                sizing.target_count(&generation.weighted_set()?, ceiling)
            } else {
                generation.len()
            };
            generation = generation.resample(k, &mut self.rng)?;
            timing.resample_ms += elapsed_ms(t);
        }

        self.particles = generation.into_particles()?;
        self.target_count = self.particles.len();
        // a frame without a usable timestamp keeps the previous reference
        if frame.timestamp_s.is_finite() {
            self.last_timestamp = Some(frame.timestamp_s);
        }
        timing.total_ms = elapsed_ms(start);

        let metrics = StepMetrics {
            sample_count: self.particles.len(),
            effective_sample_size,
            delta_time_s: dt,
            blocks: blocks.len(),
        };
        debug!(
            dt,
            particles = metrics.sample_count,
            ess = effective_sample_size,
            total_ms = timing.total_ms,
            "filter step"
        );
        Ok((metrics, timing))
    }

    pub(crate) fn mean(&self) -> Result<JointState> {
        self.particles.mean()
    }

    pub(crate) fn particles(&self) -> &ParticleSet {
        &self.particles
    }

    pub(crate) fn target_count(&self) -> usize {
        self.target_count
    }

    pub(crate) fn active_blocks(&self) -> &SamplingBlocks {
        self.blocks.active_blocks()
    }
}

fn validate_hints(hints: &[JointState], num_objects: usize, partial: bool) -> Result<()> {
    if hints.is_empty() {
        return Err(TrackerError::NoCandidateState);
    }
    for hint in hints {
        let count = hint.num_objects();
        let accepted = count == num_objects || (partial && count == 1);
        if !accepted {
            return Err(TrackerError::DimensionMismatch {
                what: "candidate state object count",
                expected: num_objects,
                got: count,
            });
        }
    }
    Ok(())
}

/// Candidate for `object` taken from a single-object or a full hint.
fn candidate_for(hint: &JointState, object: usize) -> &ObjectState {
    if hint.num_objects() == 1 {
        &hint[0]
    } else {
        &hint[object]
    }
}

/// Sequential per-object bootstrap.
///
/// All particles start at the default state. Pass `i` places hint `j`'s
/// candidate for object `i` into particle `j`, scores with every other object
/// held at its current value and resamples. Only object `i`'s DOFs are
/// perturbed in pass `i`.
fn refine_objects(
    config: &TrackerConfig,
    process: &dyn ProcessModel,
    observation: &dyn ObservationModel,
    hints: &[JointState],
    frame: &DepthFrame,
    rng: &mut StdRng,
    timing: &mut TimingStats,
) -> Result<Generation> {
    let num_objects = config.num_objects();
    let mut states = vec![config.default_state(); hints.len()];
    let mut generation = Generation::start(states.clone(), config.dimension());

    for object in 0..num_objects {
        for (j, state) in states.iter_mut().enumerate() {
            state[object] = candidate_for(&hints[j % hints.len()], object).clone();
        }

        let block = SamplingBlocks::single_object(num_objects, object)?;
        generation = Generation::start(states, config.dimension());
        for dofs in block.blocks() {
            generation.propagate(process, observation, frame, 0.0, dofs, rng, timing)?;
        }

        let k = match config.bootstrap_sizing {
            BootstrapSizing::KeepCount => generation.len(),
            BootstrapSizing::Adaptive => config
                .kld_sizing()
                .target_count(&generation.weighted_set()?, config.max_sample_count),
        };
        generation = generation.resample(k, rng)?;
        states = generation.states.clone();

        debug!(object, particles = generation.len(), "object refined");
    }

    Ok(generation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_time_is_clamped() {
        assert_eq!(delta_time(None, 3.0), 0.0);
        assert_eq!(delta_time(Some(1.0), 1.5), 0.5);
        assert_eq!(delta_time(Some(2.0), 1.0), 0.0);
        assert_eq!(delta_time(Some(f64::NAN), 1.0), 0.0);
    }

    #[test]
    fn test_hint_shapes() {
        let one = JointState::uniform(1, ObjectState::default());
        let two = JointState::uniform(2, ObjectState::default());
        let three = JointState::uniform(3, ObjectState::default());

        assert_eq!(validate_hints(&[], 2, true), Err(TrackerError::NoCandidateState));
        assert!(validate_hints(&[two.clone()], 2, false).is_ok());
        assert!(validate_hints(&[one.clone(), two.clone()], 2, true).is_ok());
        assert!(validate_hints(&[one], 2, false).is_err());
        assert!(validate_hints(&[three], 2, true).is_err());
    }

    #[test]
    fn test_candidate_selection() {
        let single = JointState::from_poses([crate::geometry::SE3::identity()]);
        let mut full = JointState::uniform(2, ObjectState::default());
        full[1].linear_velocity.x = 4.0;

        assert_eq!(candidate_for(&single, 1), &single[0]);
        assert_eq!(candidate_for(&full, 1).linear_velocity.x, 4.0);
    }

    #[test]
    fn test_resample_keeps_rows_together() {
        let states: Vec<JointState> = (0..3)
            .map(|i| {
                let mut s = JointState::uniform(1, ObjectState::default());
                s[0].pose.translation.x = i as f64;
                s
            })
            .collect();
        let mut generation = Generation::start(states, 6);
        generation.log_likelihoods = vec![0.0, 1.0, 2.0];
        generation.log_weights = vec![f64::NEG_INFINITY, f64::NEG_INFINITY, 0.0];
        for (i, noise) in generation.noises.iter_mut().enumerate() {
            noise[0] = i as f64;
        }

        let out = generation
            .resample(4, &mut StdRng::seed_from_u64(1))
            .unwrap();
        assert_eq!(out.len(), 4);
        for i in 0..4 {
            assert_eq!(out.states[i][0].pose.translation.x, 2.0);
            assert_eq!(out.priors[i][0].pose.translation.x, 2.0);
            assert_eq!(out.noises[i][0], 2.0);
            assert_eq!(out.log_likelihoods[i], 2.0);
            assert_eq!(out.log_weights[i], 0.0);
        }
    }
}
