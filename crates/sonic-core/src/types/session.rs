//! Playback session state published by the orchestrator.

use serde::{Deserialize, Serialize};

/// Transport status of the playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackStatus {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Read-only snapshot of the session, published by the orchestrator and
/// consumed by every other component.
///
/// Invariant: `status == Playing` implies `current_index` is `Some` and an
/// output stage is reachable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    /// Index into the ordered track list; `None` when nothing is current.
    pub current_index: Option<usize>,
    pub status: PlaybackStatus,
    /// Elapsed position in seconds.
    pub position: f64,
    /// Total duration in seconds.
    pub duration: f64,
    /// Discovery (randomized next-track) policy flag.
    pub discovery: bool,
    /// Repeat-one flag.
    pub repeat_one: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_stopped_with_no_track() {
        let snapshot = SessionSnapshot::default();
        assert_eq!(snapshot.status, PlaybackStatus::Stopped);
        assert!(snapshot.current_index.is_none());
    }
}
