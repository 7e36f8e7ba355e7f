//! Uplink connectivity state

use serde::{Deserialize, Serialize};

/// Process-wide uplink quality, owned by the connectivity classifier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConnectivityState {
    Online,
    Intermittent,
    /// Starting state: assume the worst until proven otherwise
    #[default]
    Offline,
}

impl std::fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectivityState::Online => write!(f, "ONLINE"),
            ConnectivityState::Intermittent => write!(f, "INTERMITTENT"),
            ConnectivityState::Offline => write!(f, "OFFLINE"),
        }
    }
}

/// Per-tick view of the classifier, emitted whether or not the status moved.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ConnectivitySnapshot {
    pub status: ConnectivityState,
    pub confidence: f64,
    /// Set when this tick produced a status transition
    pub changed: bool,
}
