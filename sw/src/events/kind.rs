//! Event kinds reported by the server plus the library's own synthetic kinds

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The category of an [`Event`](super::Event)
///
/// Server kinds arrive as the first token of a record's message. Synthetic
/// kinds are produced by the watcher itself. `All` and `Unknown` are also
/// subscription keys: `All` receives every event, `Unknown` receives records
/// whose kind token is not recognised.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    // === Server kinds ===
    /// Continuous capture armed
    #[serde(rename = "ARM_C")]
    ArmContinuous,
    /// Continuous capture disarmed
    #[serde(rename = "DISARM_C")]
    DisarmContinuous,
    /// Motion capture armed
    #[serde(rename = "ARM_M")]
    ArmMotion,
    /// Motion capture disarmed
    #[serde(rename = "DISARM_M")]
    DisarmMotion,
    /// Actions armed
    #[serde(rename = "ARM_A")]
    ArmActions,
    /// Actions disarmed
    #[serde(rename = "DISARM_A")]
    DisarmActions,
    /// Motion capture triggered
    #[serde(rename = "TRIGGER_M")]
    TriggerMotion,
    /// Actions triggered
    #[serde(rename = "TRIGGER_A")]
    TriggerActions,
    /// Motion detected on a camera
    Motion,
    /// Camera came online
    Online,
    /// Camera went offline
    Offline,
    /// Server configuration changed
    #[serde(rename = "CONFIGCHANGE")]
    ConfigChange,
    /// A capture file was written
    File,
    /// Object classification result
    Classify,
    /// Server reported an error
    Error,

    // === Synthetic kinds ===
    /// Watcher connected to the event stream
    Connected,
    /// Watcher lost (or failed to open) the event stream
    Disconnected,
    /// Periodic state refresh succeeded
    Refreshed,
    /// Periodic state refresh failed
    RefreshFailed,
    /// Injected by the application
    Custom,
    /// Record kind not recognised
    Unknown,

    // === Subscription pseudo-kind ===
    /// Subscribe to every event
    All,
}

/// Server kinds recognised in the event stream, in wire form
const WIRE_KINDS: &[(&str, EventKind)] = &[
    ("ARM_C", EventKind::ArmContinuous),
    ("DISARM_C", EventKind::DisarmContinuous),
    ("ARM_M", EventKind::ArmMotion),
    ("DISARM_M", EventKind::DisarmMotion),
    ("ARM_A", EventKind::ArmActions),
    ("DISARM_A", EventKind::DisarmActions),
    ("TRIGGER_M", EventKind::TriggerMotion),
    ("TRIGGER_A", EventKind::TriggerActions),
    ("MOTION", EventKind::Motion),
    ("ONLINE", EventKind::Online),
    ("OFFLINE", EventKind::Offline),
    ("CONFIGCHANGE", EventKind::ConfigChange),
    ("FILE", EventKind::File),
    ("CLASSIFY", EventKind::Classify),
    ("ERROR", EventKind::Error),
];

impl EventKind {
    /// Look up a server kind by its wire token
    ///
    /// Only kinds the server can send are matched; synthetic and
    /// subscription names yield `None`.
    pub fn from_wire(token: &str) -> Option<Self> {
        WIRE_KINDS.iter().find(|(name, _)| *name == token).map(|(_, kind)| *kind)
    }

    /// Canonical upper-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ArmContinuous => "ARM_C",
            EventKind::DisarmContinuous => "DISARM_C",
            EventKind::ArmMotion => "ARM_M",
            EventKind::DisarmMotion => "DISARM_M",
            EventKind::ArmActions => "ARM_A",
            EventKind::DisarmActions => "DISARM_A",
            EventKind::TriggerMotion => "TRIGGER_M",
            EventKind::TriggerActions => "TRIGGER_A",
            EventKind::Motion => "MOTION",
            EventKind::Online => "ONLINE",
            EventKind::Offline => "OFFLINE",
            EventKind::ConfigChange => "CONFIGCHANGE",
            EventKind::File => "FILE",
            EventKind::Classify => "CLASSIFY",
            EventKind::Error => "ERROR",
            EventKind::Connected => "CONNECTED",
            EventKind::Disconnected => "DISCONNECTED",
            EventKind::Refreshed => "REFRESHED",
            EventKind::RefreshFailed => "REFRESH_FAILED",
            EventKind::Custom => "CUSTOM",
            EventKind::Unknown => "UNKNOWN",
            EventKind::All => "ALL",
        }
    }

    /// True for kinds the watcher manufactures itself
    pub fn is_synthetic(&self) -> bool {
        matches!(
            self,
            EventKind::Connected
                | EventKind::Disconnected
                | EventKind::Refreshed
                | EventKind::RefreshFailed
                | EventKind::Custom
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    /// Parse any kind name, case-insensitively (used for CLI filters)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_uppercase();
        if let Some(kind) = Self::from_wire(&upper) {
            return Ok(kind);
        }
        match upper.as_str() {
            "CONNECTED" => Ok(EventKind::Connected),
            "DISCONNECTED" => Ok(EventKind::Disconnected),
            "REFRESHED" => Ok(EventKind::Refreshed),
            "REFRESH_FAILED" => Ok(EventKind::RefreshFailed),
            "CUSTOM" => Ok(EventKind::Custom),
            "UNKNOWN" => Ok(EventKind::Unknown),
            "ALL" => Ok(EventKind::All),
            _ => Err(format!("unknown event kind: '{}'", s)),
        }
    }
}
