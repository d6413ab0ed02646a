//! Multi-object tracker: owns the session and serializes access to it.
//!
//! - One `parking_lot::Mutex` guards the whole session, so an `initialize`
//!   or `filter` call runs start to finish without interleaving
//! - `filter` works on a copy of the session and commits it only on success
//! - Models are shared trait objects chosen at construction

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::{Result, TrackerError};
use crate::models::{ObjectParameters, ObservationModel, ProcessModel};
use crate::sensor::DepthFrame;
use crate::state::JointState;
use crate::tracking::config::TrackerConfig;
use crate::tracking::result::FilterResult;
use crate::tracking::session::TrackerSession;
use crate::tracking::TrackingState;

/// Particle-filter tracker for a fixed set of rigid objects.
pub struct MultiObjectTracker {
    config: TrackerConfig,
    process: Arc<dyn ProcessModel>,
    observation: Arc<dyn ObservationModel>,

    /// Per-object process parameters, read once at construction.
    object_params: Vec<ObjectParameters>,

    /// `None` until a successful `initialize`.
    session: Mutex<Option<TrackerSession>>,
}

impl MultiObjectTracker {
    pub fn new(
        config: TrackerConfig,
        process: Arc<dyn ProcessModel>,
        observation: Arc<dyn ObservationModel>,
    ) -> Result<Self> {
        config.validate()?;
        if process.object_count() != config.num_objects() {
            return Err(TrackerError::DimensionMismatch {
                what: "process model object count",
                expected: config.num_objects(),
                got: process.object_count(),
            });
        }
        let object_params = (0..config.num_objects())
            .map(|i| {
                process.object_parameters(i).ok_or_else(|| {
                    TrackerError::InvalidConfig(format!(
                        "process model has no parameters for object {i}"
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            objects = ?config.object_names,
            max_sample_count = config.max_sample_count,
            downsampling_factor = config.downsampling_factor,
            "tracker configured"
        );

        Ok(Self {
            config,
            process,
            observation,
            object_params,
            session: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn object_parameters(&self) -> &[ObjectParameters] {
        &self.object_params
    }

    /// Bootstrap the particle distribution from candidate states.
    ///
    /// With `partial`, objects are placed one at a time and each hint may
    /// hold a single candidate (used for every object) or one per object.
    /// Otherwise each hint is a full joint state. Any existing session is
    /// discarded first, so a failure leaves the tracker uninitialized.
    pub fn initialize(
        &self,
        hints: &[JointState],
        first_frame: &DepthFrame,
        partial: bool,
    ) -> Result<()> {
        let start = Instant::now();
        let mut session = self.session.lock();
        *session = None;

        let frame = first_frame.downsample(self.config.downsampling_factor);
        let fresh = TrackerSession::initialize(
            &self.config,
            Arc::clone(&self.process),
            Arc::clone(&self.observation),
            hints,
            &frame,
            partial,
        )?;
        debug!(
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "initialization finished"
        );
        *session = Some(fresh);
        Ok(())
    }

    /// Advance the distribution to `frame` and return the mean joint state.
    pub fn filter(&self, frame: &DepthFrame) -> Result<JointState> {
        self.filter_with_metrics(frame).map(|result| result.mean)
    }

    /// Like [`filter`](Self::filter), with step diagnostics.
    pub fn filter_with_metrics(&self, frame: &DepthFrame) -> Result<FilterResult> {
        let mut guard = self.session.lock();
        let session = guard.as_mut().ok_or(TrackerError::NotInitialized)?;

        let frame = frame.downsample(self.config.downsampling_factor);
        let mut working = session.clone();
        let (metrics, timing) = working.step(&self.config, &frame)?;
        let mean = working.mean()?;

        *session = working;
        Ok(FilterResult {
            mean,
            metrics,
            timing,
        })
    }

    /// Mean joint state of the current distribution.
    pub fn mean_state(&self) -> Result<JointState> {
        self.session
            .lock()
            .as_ref()
            .ok_or(TrackerError::NotInitialized)?
            .mean()
    }

    /// Current particle count, 0 when uninitialized.
    pub fn sample_count(&self) -> usize {
        self.session
            .lock()
            .as_ref()
            .map_or(0, |s| s.particles().len())
    }

    /// Steady-state particle target chosen by the last step.
    pub fn target_count(&self) -> Option<usize> {
        self.session.lock().as_ref().map(TrackerSession::target_count)
    }

    /// Active sampling blocks as DOF index lists.
    pub fn active_blocks(&self) -> Option<Vec<Vec<usize>>> {
        self.session
            .lock()
            .as_ref()
            .map(|s| s.active_blocks().blocks().to_vec())
    }

    pub fn state(&self) -> TrackingState {
        if self.session.lock().is_some() {
            TrackingState::Tracking
        } else {
            TrackingState::NotInitialized
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.state() == TrackingState::Tracking
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DampedBodyProcess;
    use crate::state::ObjectState;
    use crate::tracking::config::BootstrapSizing;
    use crate::tracking::fixtures::{
        frame_at, gaussian_likelihood, line_hints, RecordingObservation, SwitchableObservation,
    };
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn config(objects: usize) -> TrackerConfig {
        let mut config = TrackerConfig::with_objects((0..objects).map(|i| format!("object_{i}")));
        config.max_sample_count = 200;
        config.min_sample_count = 10;
        config.linear_acceleration_sigma = 0.5;
        config.angular_acceleration_sigma = 1.0;
        config.damping = 1.0;
        config.seed = Some(17);
        config
    }

    fn tracker(
        config: TrackerConfig,
        observation: Arc<dyn ObservationModel>,
    ) -> MultiObjectTracker {
        let process = DampedBodyProcess::new(config.object_parameters()).unwrap();
        MultiObjectTracker::new(config, Arc::new(process), observation).unwrap()
    }

    #[test]
    fn test_filter_before_initialize() {
        let t = tracker(config(1), gaussian_likelihood(vec![Vector3::new(0.0, 0.0, 1.0)], 0.1));
        assert_eq!(t.filter(&frame_at(0.0)), Err(TrackerError::NotInitialized));
        assert_eq!(t.mean_state(), Err(TrackerError::NotInitialized));
        assert_eq!(t.sample_count(), 0);
        assert!(!t.is_initialized());
    }

    #[test]
    fn test_process_object_count_must_match() {
        let process = DampedBodyProcess::isotropic(1, 1.0, 0.5, 0.5).unwrap();
        let result = MultiObjectTracker::new(
            config(2),
            Arc::new(process),
            gaussian_likelihood(vec![Vector3::zeros(); 2], 0.1),
        );
        assert!(matches!(
            result,
            Err(TrackerError::DimensionMismatch { expected: 2, got: 1, .. })
        ));
    }

    #[test]
    fn test_initialize_without_candidates() {
        let t = tracker(config(1), gaussian_likelihood(vec![Vector3::new(0.0, 0.0, 1.0)], 0.1));
        assert_eq!(
            t.initialize(&[], &frame_at(0.0), false),
            Err(TrackerError::NoCandidateState)
        );
        assert!(!t.is_initialized());
    }

    #[test]
    fn test_failed_initialize_discards_previous_session() {
        let t = tracker(config(1), gaussian_likelihood(vec![Vector3::new(0.0, 0.0, 1.0)], 0.1));
        t.initialize(&line_hints(1, 20, 1.0), &frame_at(0.0), false).unwrap();
        assert!(t.is_initialized());

        let wrong = vec![JointState::uniform(2, ObjectState::default())];
        assert!(matches!(
            t.initialize(&wrong, &frame_at(0.0), false),
            Err(TrackerError::DimensionMismatch { .. })
        ));
        assert!(!t.is_initialized());
        assert_eq!(t.filter(&frame_at(0.1)), Err(TrackerError::NotInitialized));
    }

    #[test]
    fn test_partial_two_objects_reaches_steady_state_ceiling() {
        let target = vec![Vector3::new(0.1, 0.0, 1.0), Vector3::new(-0.2, 0.1, 1.0)];
        let t = tracker(config(2), gaussian_likelihood(target, 0.5));

        let hints = line_hints(1, 100, 0.5);
        t.initialize(&hints, &frame_at(0.0), true).unwrap();

        assert_eq!(t.sample_count(), 200);
        assert_eq!(t.target_count(), Some(200));
        assert_eq!(t.active_blocks().map(|b| b.len()), Some(2));

        let mean = t.mean_state().unwrap();
        let default = t.config().default_state();
        assert!((mean[1].pose.translation - default[1].pose.translation).norm() > 0.1);
        assert!((mean[0].pose.translation - default[0].pose.translation).norm() > 0.1);
    }

    #[test]
    fn test_partial_refines_one_object_per_pass() {
        let recorder = Arc::new(RecordingObservation::default());
        let t = tracker(config(3), recorder.clone());
        let hints = line_hints(1, 12, 0.3);
        t.initialize(&hints, &frame_at(0.0), true).unwrap();

        let calls = recorder.calls();
        assert_eq!(calls.len(), 3);

        let default = t.config().default_state();
        let candidates: Vec<Vector3<f64>> = hints.iter().map(|h| h[0].pose.translation).collect();
        for (pass, states) in calls.iter().enumerate() {
            assert_eq!(states.len(), hints.len());
            for state in states {
                // placed objects hold hint candidates, later ones stay at default
                for object in 0..=pass {
                    assert!(candidates.contains(&state[object].pose.translation));
                }
                for object in pass + 1..3 {
                    assert_eq!(state[object], default[object]);
                }
            }
        }
    }

    #[test]
    fn test_partial_accepts_per_object_hints() {
        let mut config = config(2);
        config.bootstrap_sizing = BootstrapSizing::Adaptive;
        let target = vec![Vector3::new(0.0, 0.0, 1.0), Vector3::new(0.5, 0.0, 1.0)];
        let t = tracker(config, gaussian_likelihood(target, 0.05));

        let hints: Vec<JointState> = (0..30)
            .map(|i| {
                let offset = (i as f64 - 15.0) * 0.005;
                JointState::new(vec![
                    ObjectState::at_position(Vector3::new(offset, 0.0, 1.0)),
                    ObjectState::at_position(Vector3::new(0.5 + offset, 0.0, 1.0)),
                ])
            })
            .collect();
        t.initialize(&hints, &frame_at(0.0), true).unwrap();

        let mean = t.mean_state().unwrap();
        assert_relative_eq!(mean[0].pose.translation.x, 0.0, epsilon = 0.05);
        assert_relative_eq!(mean[1].pose.translation.x, 0.5, epsilon = 0.05);
    }

    #[test]
    fn test_zero_elapsed_filter_keeps_mean() {
        let target = vec![Vector3::new(0.0, 0.0, 1.0)];
        let t = tracker(config(1), gaussian_likelihood(target, 0.1));
        t.initialize(&line_hints(1, 50, 0.2), &frame_at(1.0), false).unwrap();
        let before = t.mean_state().unwrap();

        let result = t.filter_with_metrics(&frame_at(1.0)).unwrap();
        assert_eq!(result.metrics.delta_time_s, 0.0);
        assert_eq!(result.metrics.blocks, 1);
        assert_relative_eq!(
            result.mean[0].pose.translation,
            before[0].pose.translation,
            epsilon = 0.05
        );
    }

    #[test]
    fn test_earlier_timestamp_clamps_elapsed_time() {
        let target = vec![Vector3::new(0.0, 0.0, 1.0)];
        let t = tracker(config(1), gaussian_likelihood(target, 0.1));
        t.initialize(&line_hints(1, 50, 0.2), &frame_at(5.0), false).unwrap();

        let result = t.filter_with_metrics(&frame_at(4.0)).unwrap();
        assert_eq!(result.metrics.delta_time_s, 0.0);
        assert!(result.metrics.sample_count >= 10);

        let result = t.filter_with_metrics(&frame_at(4.5)).unwrap();
        assert_relative_eq!(result.metrics.delta_time_s, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_non_finite_timestamp_keeps_previous_reference() {
        let target = vec![Vector3::new(0.0, 0.0, 1.0)];
        let t = tracker(config(1), gaussian_likelihood(target, 0.1));
        t.initialize(&line_hints(1, 50, 0.2), &frame_at(1.0), false).unwrap();

        let result = t.filter_with_metrics(&frame_at(f64::NAN)).unwrap();
        assert_eq!(result.metrics.delta_time_s, 0.0);

        let result = t.filter_with_metrics(&frame_at(1.5)).unwrap();
        assert_relative_eq!(result.metrics.delta_time_s, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_non_finite_first_timestamp_starts_at_zero_elapsed() {
        let target = vec![Vector3::new(0.0, 0.0, 1.0)];
        let t = tracker(config(1), gaussian_likelihood(target, 0.1));
        t.initialize(&line_hints(1, 50, 0.2), &frame_at(f64::NAN), false).unwrap();

        let result = t.filter_with_metrics(&frame_at(2.0)).unwrap();
        assert_eq!(result.metrics.delta_time_s, 0.0);
        let result = t.filter_with_metrics(&frame_at(2.25)).unwrap();
        assert_relative_eq!(result.metrics.delta_time_s, 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_failed_filter_leaves_session_unchanged() {
        let observation = Arc::new(SwitchableObservation::new(Vector3::new(0.0, 0.0, 1.0), 0.1));
        let t = tracker(config(1), observation.clone());
        t.initialize(&line_hints(1, 40, 0.2), &frame_at(0.0), false).unwrap();
        t.filter(&frame_at(0.1)).unwrap();

        let count = t.sample_count();
        let mean = t.mean_state().unwrap();

        observation.set_nan(true);
        assert!(matches!(
            t.filter(&frame_at(0.2)),
            Err(TrackerError::DegenerateDistribution(_))
        ));
        assert_eq!(t.sample_count(), count);
        assert_eq!(t.mean_state().unwrap(), mean);

        observation.set_nan(false);
        let result = t.filter_with_metrics(&frame_at(0.2)).unwrap();
        // elapsed time still measured from the last committed frame
        assert_relative_eq!(result.metrics.delta_time_s, 0.1, epsilon = 1e-9);
    }

    #[test]
    fn test_wrong_likelihood_count_is_rejected() {
        let short: Arc<dyn ObservationModel> = Arc::new(|states: &[JointState], _: &DepthFrame| {
            vec![0.0; states.len().saturating_sub(1)]
        });
        let t = tracker(config(1), short);
        assert!(matches!(
            t.initialize(&line_hints(1, 5, 0.1), &frame_at(0.0), false),
            Err(TrackerError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_all_zero_likelihood_is_degenerate() {
        let impossible: Arc<dyn ObservationModel> =
            Arc::new(|states: &[JointState], _: &DepthFrame| {
                vec![f64::NEG_INFINITY; states.len()]
            });
        let t = tracker(config(1), impossible);
        assert!(matches!(
            t.initialize(&line_hints(1, 5, 0.1), &frame_at(0.0), false),
            Err(TrackerError::DegenerateDistribution(_))
        ));
    }

    #[test]
    fn test_steady_state_scores_once_per_block() {
        let recorder = Arc::new(RecordingObservation::default());
        let t = tracker(config(2), recorder.clone());
        let hints: Vec<JointState> = (0..10)
            .map(|i| {
                JointState::uniform(
                    2,
                    ObjectState::at_position(Vector3::new(i as f64 * 0.1, 0.0, 1.0)),
                )
            })
            .collect();
        t.initialize(&hints, &frame_at(0.0), false).unwrap();
        assert_eq!(recorder.calls().len(), 1);

        t.filter(&frame_at(0.1)).unwrap();
        assert_eq!(recorder.calls().len(), 3);
    }

    #[test]
    fn test_evaluation_budget_caps_sample_count() {
        let mut config = config(2);
        config.evaluation_count = Some(100);
        let recorder = Arc::new(RecordingObservation::default());
        let t = tracker(config, recorder);

        t.initialize(&line_hints(1, 80, 1.0), &frame_at(0.0), true).unwrap();
        assert!(t.sample_count() <= 50);

        let result = t.filter_with_metrics(&frame_at(0.1)).unwrap();
        assert!(result.metrics.sample_count <= 50);
    }

    #[test]
    fn test_frames_are_downsampled_before_scoring() {
        let mut config = config(1);
        config.downsampling_factor = 2;
        let recorder = Arc::new(RecordingObservation::default());
        let t = tracker(config, recorder.clone());

        t.initialize(&line_hints(1, 5, 0.1), &frame_at(0.0), false).unwrap();
        assert_eq!(recorder.frame_widths(), vec![frame_at(0.0).width() / 2]);
    }

    #[test]
    fn test_follows_moving_target() {
        let mut config = config(1);
        config.max_sample_count = 300;
        config.damping = 0.0;
        config.linear_acceleration_sigma = 1.0;
        let observation = Arc::new(SwitchableObservation::new(Vector3::new(0.0, 0.0, 1.0), 0.02));
        let t = tracker(config, observation.clone());
        t.initialize(&line_hints(1, 100, 0.1), &frame_at(0.0), false).unwrap();

        for step in 1..=10 {
            observation.set_target(Vector3::new(0.01 * step as f64, 0.0, 1.0));
            t.filter(&frame_at(0.1 * step as f64)).unwrap();
        }
        let mean = t.mean_state().unwrap();
        assert_relative_eq!(mean[0].pose.translation.x, 0.1, epsilon = 0.05);
    }
}
