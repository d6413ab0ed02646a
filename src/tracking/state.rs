//! Tracker lifecycle state.

/// Whether the tracker currently holds a particle distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingState {
    /// No session: never initialized, or the last initialization failed.
    #[default]
    NotInitialized,
    /// A session exists and `filter` can run.
    Tracking,
}
