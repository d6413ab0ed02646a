//! Particle filter building blocks.
//!
//! - Weighted particle sets and their mean state
//! - Sampling block configurations (dense vs. coordinate-wise)
//! - Systematic resampling
//! - KLD-adaptive sample sizing

pub mod blocks;
pub mod kld;
pub mod particles;
pub mod resampling;

pub use blocks::{BlockController, SamplingBlocks};
pub use kld::{required_sample_count, KldSizing, StateGrid};
pub use particles::{normalize_log_weights, Particle, ParticleSet};
pub use resampling::SystematicResampler;
