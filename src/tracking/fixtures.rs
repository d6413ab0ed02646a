//! Test doubles for tracker tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nalgebra::{DMatrix, Vector3};
use parking_lot::Mutex;

use crate::models::ObservationModel;
use crate::sensor::{CameraIntrinsics, DepthFrame};
use crate::state::{JointState, ObjectState};

/// Small constant-depth frame.
pub(crate) fn frame_at(timestamp_s: f64) -> DepthFrame {
    DepthFrame::new(
        timestamp_s,
        CameraIntrinsics::new(50.0, 50.0, 3.5, 2.5),
        DMatrix::from_element(6, 8, 1.0_f32),
    )
}

/// `count` hints with `num_objects` objects each, scattered over a
/// `spread`-wide square at depth 1 m and centered on the optical axis.
pub(crate) fn line_hints(num_objects: usize, count: usize, spread: f64) -> Vec<JointState> {
    (0..count)
        .map(|i| {
            let u = i as f64 / count as f64 - 0.5;
            let v = ((i * 7) % count) as f64 / count as f64 - 0.5;
            JointState::uniform(
                num_objects,
                ObjectState::at_position(Vector3::new(spread * u, spread * v, 1.0)),
            )
        })
        .collect()
}

fn gaussian_score(state: &JointState, targets: &[Vector3<f64>], sigma: f64) -> f64 {
    state
        .iter()
        .zip(targets)
        .map(|(object, target)| -(object.pose.translation - target).norm_squared())
        .sum::<f64>()
        / (2.0 * sigma * sigma)
}

/// Isotropic Gaussian likelihood of each object's position around a target.
pub(crate) fn gaussian_likelihood(
    targets: Vec<Vector3<f64>>,
    sigma: f64,
) -> Arc<dyn ObservationModel> {
    Arc::new(move |states: &[JointState], _: &DepthFrame| {
        states
            .iter()
            .map(|s| gaussian_score(s, &targets, sigma))
            .collect::<Vec<f64>>()
    })
}

/// Uniform likelihood that remembers every batch it scored.
#[derive(Default)]
pub(crate) struct RecordingObservation {
    calls: Mutex<Vec<Vec<JointState>>>,
    frame_widths: Mutex<Vec<usize>>,
}

impl RecordingObservation {
    pub(crate) fn calls(&self) -> Vec<Vec<JointState>> {
        self.calls.lock().clone()
    }

    pub(crate) fn frame_widths(&self) -> Vec<usize> {
        self.frame_widths.lock().clone()
    }
}

impl ObservationModel for RecordingObservation {
    fn log_likelihoods(&self, states: &[JointState], frame: &DepthFrame) -> Vec<f64> {
        self.calls.lock().push(states.to_vec());
        self.frame_widths.lock().push(frame.width());
        vec![0.0; states.len()]
    }
}

/// Single-object Gaussian likelihood with a movable target that can be
/// switched to emit NaN.
pub(crate) struct SwitchableObservation {
    target: Mutex<Vector3<f64>>,
    sigma: f64,
    emit_nan: AtomicBool,
}

impl SwitchableObservation {
    pub(crate) fn new(target: Vector3<f64>, sigma: f64) -> Self {
        Self {
            target: Mutex::new(target),
            sigma,
            emit_nan: AtomicBool::new(false),
        }
    }

    pub(crate) fn set_nan(&self, value: bool) {
        self.emit_nan.store(value, Ordering::SeqCst);
    }

    pub(crate) fn set_target(&self, target: Vector3<f64>) {
        *self.target.lock() = target;
    }
}

impl ObservationModel for SwitchableObservation {
    fn log_likelihoods(&self, states: &[JointState], _frame: &DepthFrame) -> Vec<f64> {
        if self.emit_nan.load(Ordering::SeqCst) {
            return vec![f64::NAN; states.len()];
        }
        let target = [*self.target.lock()];
        states
            .iter()
            .map(|s| gaussian_score(s, &target, self.sigma))
            .collect()
    }
}
