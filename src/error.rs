//! Error types for the tracker core.

use thiserror::Error;

/// Errors surfaced by the particle filter and the tracker controller.
///
/// None of these are retried or masked internally.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackerError {
    /// `initialize` was called without any candidate states.
    #[error("no candidate state supplied for initialization")]
    NoCandidateState,

    /// Resampling cannot proceed: empty set, NaN weights or all weights zero.
    #[error("degenerate particle distribution: {0}")]
    DegenerateDistribution(String),

    /// A hint, block configuration or model output does not match the
    /// registered object count / state dimensionality.
    #[error("dimension mismatch in {what}: expected {expected}, got {got}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    /// `filter` was called before a successful `initialize`.
    #[error("tracker session is not initialized")]
    NotInitialized,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_display() {
        let err = TrackerError::DimensionMismatch {
            what: "hint",
            expected: 2,
            got: 3,
        };
        assert_eq!(
            err.to_string(),
            "dimension mismatch in hint: expected 2, got 3"
        );
    }
}
