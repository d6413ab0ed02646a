//! Tracker controller: bootstraps and updates the joint particle distribution.
//!
//! - Configuration and its YAML loading
//! - Per-object sequential initialization from candidate states
//! - Coordinate-wise predict/score/resample on every frame
//! - Adaptive (KLD) particle counts under a sample ceiling

pub mod config;
pub mod result;
mod session;
pub mod state;
pub mod tracker;

#[cfg(test)]
pub(crate) mod fixtures;

pub use config::{BootstrapSizing, TrackerConfig};
pub use result::{FilterResult, StepMetrics, TimingStats};
pub use state::TrackingState;
pub use tracker::MultiObjectTracker;
