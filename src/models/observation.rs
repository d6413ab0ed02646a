//! Observation model interface.

use crate::sensor::DepthFrame;
use crate::state::JointState;

/// Scores joint-state hypotheses against one depth frame.
///
/// Implementations render the hypotheses and compare them with the measured
/// depths (CPU or GPU). The tracker only relies on this contract:
/// one log-likelihood per input state, in input order, without mutating
/// the frame. Evaluation may be parallel across states.
pub trait ObservationModel: Send + Sync {
    fn log_likelihoods(&self, states: &[JointState], frame: &DepthFrame) -> Vec<f64>;
}

impl<F> ObservationModel for F
where
    F: Fn(&[JointState], &DepthFrame) -> Vec<f64> + Send + Sync,
{
    fn log_likelihoods(&self, states: &[JointState], frame: &DepthFrame) -> Vec<f64> {
        self(states, frame)
    }
}
