//! Tracker configuration.
//!
//! Mirrors the parameter set of a tracker deployment: the objects to track,
//! image downsampling, sample budgets, KLD bounds, steady-state sampling
//! blocks and process noise. Loaded from YAML; every key is optional.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result as AnyResult};
use nalgebra::Vector3;
use serde::Deserialize;

use crate::error::{Result, TrackerError};
use crate::filter::{KldSizing, SamplingBlocks, StateGrid};
use crate::models::ObjectParameters;
use crate::state::{JointState, ObjectState, DOF_PER_OBJECT};

/// Particle count used between per-object passes of a partial
/// initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapSizing {
    /// Keep the number of candidate states.
    #[default]
    KeepCount,
    /// KLD target of the weighted pass, capped by `max_sample_count`.
    Adaptive,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Tracked objects in registration order.
    pub object_names: Vec<String>,

    /// Keep every n-th depth pixel before scoring.
    pub downsampling_factor: usize,

    /// Hard ceiling on the steady-state particle count.
    pub max_sample_count: usize,

    pub min_sample_count: usize,

    /// Likelihood evaluations per frame. Divided across the sampling blocks
    /// to cap the particle count further.
    pub evaluation_count: Option<usize>,

    /// KL bound `ε` of the adaptive sample count.
    pub max_kl_divergence: f64,

    /// Upper standard-normal quantile `z_{1-δ}` (2.326 for δ = 0.01).
    pub kld_quantile: f64,

    /// KLD grid bin edge for translations (m).
    pub translation_bin_size: f64,

    /// KLD grid bin edge for rotation-vector components (rad).
    pub rotation_bin_size: f64,

    /// Steady-state blocks of joint DOF indices. One block per object when
    /// absent.
    pub sampling_blocks: Option<Vec<Vec<usize>>>,

    pub linear_acceleration_sigma: f64,
    pub angular_acceleration_sigma: f64,
    pub damping: f64,

    /// Position objects start at in a partial initialization, outside the
    /// camera view.
    pub default_position: [f64; 3],

    pub bootstrap_sizing: BootstrapSizing,

    /// RNG seed; seeded from entropy when absent.
    pub seed: Option<u64>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            object_names: vec!["object".to_string()],
            downsampling_factor: 1,
            max_sample_count: 1000,
            min_sample_count: 10,
            evaluation_count: None,
            max_kl_divergence: 0.05,
            kld_quantile: 2.326,
            translation_bin_size: 0.01,
            rotation_bin_size: 0.05,
            sampling_blocks: None,
            linear_acceleration_sigma: 1.0,
            angular_acceleration_sigma: 10.0,
            damping: 5.0,
            default_position: [0.0, 0.0, 1.5],
            bootstrap_sizing: BootstrapSizing::KeepCount,
            seed: None,
        }
    }
}

impl TrackerConfig {
    /// Default configuration for the given objects.
    pub fn with_objects<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            object_names: names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Load and validate a YAML configuration file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> AnyResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        let config: Self = serde_yaml::from_reader(file)
            .with_context(|| format!("Failed to parse tracker config {:?}", path))?;
        config
            .validate()
            .with_context(|| format!("Invalid tracker config {:?}", path))?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> AnyResult<Self> {
        let config: Self = serde_yaml::from_str(yaml).context("Failed to parse tracker config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn num_objects(&self) -> usize {
        self.object_names.len()
    }

    pub fn dimension(&self) -> usize {
        self.num_objects() * DOF_PER_OBJECT
    }

    pub fn validate(&self) -> Result<()> {
        if self.object_names.is_empty() {
            return Err(TrackerError::InvalidConfig(
                "at least one object name is required".into(),
            ));
        }
        if self.downsampling_factor == 0 {
            return Err(TrackerError::InvalidConfig(
                "downsampling_factor must be at least 1".into(),
            ));
        }
        if self.max_sample_count < self.min_sample_count {
            return Err(TrackerError::InvalidConfig(format!(
                "max_sample_count {} is below min_sample_count {}",
                self.max_sample_count, self.min_sample_count
            )));
        }
        if self.evaluation_count == Some(0) {
            return Err(TrackerError::InvalidConfig(
                "evaluation_count must be positive".into(),
            ));
        }
        for (name, sigma) in [
            ("linear_acceleration_sigma", self.linear_acceleration_sigma),
            ("angular_acceleration_sigma", self.angular_acceleration_sigma),
            ("damping", self.damping),
        ] {
            if !(sigma >= 0.0 && sigma.is_finite()) {
                return Err(TrackerError::InvalidConfig(format!(
                    "{name} must be finite and non-negative, got {sigma}"
                )));
            }
        }
        if !self.default_position.iter().all(|v| v.is_finite()) {
            return Err(TrackerError::InvalidConfig(
                "default_position must be finite".into(),
            ));
        }
        self.kld_sizing().validate()?;
        let blocks = self.steady_state_blocks()?;
        let ceiling = self.sample_ceiling(blocks.len());
        if self.min_sample_count > ceiling {
            return Err(TrackerError::InvalidConfig(format!(
                "min_sample_count {} exceeds the per-step ceiling {} \
                 (evaluation_count {:?} over {} blocks)",
                self.min_sample_count,
                ceiling,
                self.evaluation_count,
                blocks.len()
            )));
        }
        Ok(())
    }

    pub fn grid(&self) -> StateGrid {
        StateGrid {
            translation_bin: self.translation_bin_size,
            rotation_bin: self.rotation_bin_size,
        }
    }

    pub fn kld_sizing(&self) -> KldSizing {
        KldSizing {
            kl_bound: self.max_kl_divergence,
            quantile: self.kld_quantile,
            grid: self.grid(),
            min_sample_count: self.min_sample_count,
        }
    }

    /// Configured steady-state partition, validated against the joint
    /// dimension.
    pub fn steady_state_blocks(&self) -> Result<SamplingBlocks> {
        match &self.sampling_blocks {
            Some(blocks) => SamplingBlocks::new(blocks.clone(), self.dimension()),
            None => Ok(SamplingBlocks::per_object(self.num_objects())),
        }
    }

    /// Particle ceiling for a step over `num_blocks` blocks.
    pub fn sample_ceiling(&self, num_blocks: usize) -> usize {
        match self.evaluation_count {
            Some(evaluations) => (evaluations / num_blocks.max(1))
                .max(1)
                .min(self.max_sample_count),
            None => self.max_sample_count,
        }
    }

    /// Every object at rest at `default_position` with identity rotation.
    pub fn default_state(&self) -> JointState {
        let [x, y, z] = self.default_position;
        JointState::uniform(
            self.num_objects(),
            ObjectState::at_position(Vector3::new(x, y, z)),
        )
    }

    /// Isotropic process parameters shared by all objects, with the center
    /// of mass at each object origin.
    pub fn object_parameters(&self) -> Vec<ObjectParameters> {
        vec![
            ObjectParameters::isotropic(
                Vector3::zeros(),
                self.damping,
                self.linear_acceleration_sigma,
                self.angular_acceleration_sigma,
            );
            self.num_objects()
        ]
    }
}
