//! Watcher lifecycle state and errors

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Supervisor state machine
///
/// `Idle → Connecting → Streaming → Disconnected → Connecting … → Stopping → Idle`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WatcherState {
    /// Not watching
    Idle,
    /// Opening the event stream
    Connecting,
    /// Reading records from an open stream
    Streaming,
    /// Stream lost; about to reconnect
    Disconnected,
    /// Stop requested, shutting down
    Stopping,
}

impl WatcherState {
    /// States the reader task may no longer leave once stop has begun
    pub(crate) fn is_terminal(&self) -> bool {
        matches!(self, WatcherState::Stopping | WatcherState::Idle)
    }
}

impl fmt::Display for WatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WatcherState::Idle => "idle",
            WatcherState::Connecting => "connecting",
            WatcherState::Streaming => "streaming",
            WatcherState::Disconnected => "disconnected",
            WatcherState::Stopping => "stopping",
        };
        f.write_str(s)
    }
}

/// Errors returned by [`EventWatcher::watch`](super::EventWatcher::watch)
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WatchError {
    #[error("watcher is already running")]
    AlreadyRunning,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(WatcherState::Idle.is_terminal());
        assert!(WatcherState::Stopping.is_terminal());
        assert!(!WatcherState::Streaming.is_terminal());
        assert!(!WatcherState::Disconnected.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(WatcherState::Streaming.to_string(), "streaming");
        assert_eq!(WatchError::AlreadyRunning.to_string(), "watcher is already running");
    }
}
