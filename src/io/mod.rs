//! File loaders for candidate states. Configuration loading lives with
//! [`TrackerConfig`](crate::tracking::TrackerConfig).

pub mod hints;

pub use hints::{load_candidate_states, save_poses};
