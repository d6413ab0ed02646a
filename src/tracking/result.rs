//! Per-frame filter results and diagnostics.
//!
//! These types describe what happened during one filter step:
//! - the mean joint state returned to the caller
//! - particle count and weight degeneracy
//! - timing information for profiling

use crate::state::JointState;

/// Outcome of one `filter` call.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterResult {
    /// Weighted mean of the committed particle set.
    pub mean: JointState,
    pub metrics: StepMetrics,
    pub timing: TimingStats,
}

/// Scalar diagnostics of a filter step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepMetrics {
    /// Particles after the final resample.
    pub sample_count: usize,
    /// Kish effective sample size of the last block's weights, before the
    /// final resample.
    pub effective_sample_size: f64,
    /// Elapsed time used for prediction after clamping.
    pub delta_time_s: f64,
    /// Number of sampling blocks processed.
    pub blocks: usize,
}

/// Timing breakdown for a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingStats {
    pub total_ms: f64,
    pub predict_ms: f64,
    pub observe_ms: f64,
    pub resample_ms: f64,
}

impl TimingStats {
    pub fn zero() -> Self {
        Self {
            total_ms: 0.0,
            predict_ms: 0.0,
            observe_ms: 0.0,
            resample_ms: 0.0,
        }
    }
}
