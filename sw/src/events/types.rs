//! Event record types

use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::kind::EventKind;

/// Sequence ID used when the record's ID could not be parsed, and for synthetic events
pub const NO_SEQUENCE_ID: i64 = -1;

/// A camera known to the server, as resolved from the camera registry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Camera {
    /// Numeric camera ID used in `CAMn` tokens
    pub number: u32,
    /// Display name configured on the server
    pub name: String,
}

impl Camera {
    pub fn new(number: u32, name: impl Into<String>) -> Self {
        Self {
            number,
            name: name.into(),
        }
    }
}

/// Per-field failure recorded while parsing a record
///
/// These never abort parsing; the record is still delivered with sentinel
/// values in the affected fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseError {
    #[error("timestamp could not be parsed")]
    TimestampParseFailed,

    #[error("sequence ID could not be parsed")]
    SequenceIdParseFailed,

    #[error("record has no camera token")]
    CameraMissing,

    #[error("camera number could not be parsed or is not registered")]
    CameraParseFailed,

    #[error("event kind is not recognised")]
    UnknownEvent,
}

/// One occurrence observed on the event stream or synthesised by the watcher
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    /// When the server recorded the event (local zone, see `parser`)
    pub timestamp: DateTime<Local>,
    /// Server-assigned sequence number, [`NO_SEQUENCE_ID`] if absent
    pub sequence_id: i64,
    /// Camera the record refers to, when it resolved in the registry
    pub camera: Option<Camera>,
    pub kind: EventKind,
    /// Record text after the fixed fields (or the synthetic event's detail)
    pub message: String,
    /// Distinct parse failures in the order they were detected
    pub parse_errors: Vec<ParseError>,
}

impl Event {
    /// Create a synthetic event stamped with the current time
    pub fn synthetic(kind: EventKind, camera: Option<Camera>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            sequence_id: NO_SEQUENCE_ID,
            camera,
            kind,
            message: message.into(),
            parse_errors: Vec::new(),
        }
    }

    /// Whether the watcher produced this event rather than the server
    pub fn is_synthetic(&self) -> bool {
        self.kind.is_synthetic()
    }

    /// Whether any field failed to parse
    pub fn has_errors(&self) -> bool {
        !self.parse_errors.is_empty()
    }

    /// Record a parse failure, keeping the list free of duplicates
    pub(crate) fn push_error(&mut self, err: ParseError) {
        if !self.parse_errors.contains(&err) {
            self.parse_errors.push(err);
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.timestamp.format("%Y-%m-%d %H:%M:%S"), self.sequence_id)?;
        if let Some(camera) = &self.camera {
            write!(f, " CAM{}", camera.number)?;
        }
        write!(f, " {}", self.kind)?;
        if !self.message.is_empty() {
            write!(f, " {}", self.message)?;
        }
        Ok(())
    }
}
