pub mod error;
pub mod filter;
pub mod geometry;
pub mod io;
pub mod models;
pub mod sensor;
pub mod state;
pub mod tracking;

pub use error::{Result, TrackerError};
pub use models::{DampedBodyProcess, ObjectParameters, ObservationModel, ProcessModel};
pub use sensor::{CameraIntrinsics, DepthFrame};
pub use state::{JointState, ObjectState};
pub use tracking::{FilterResult, MultiObjectTracker, TrackerConfig};
