//! Uplink admission outcomes

use serde::{Deserialize, Serialize};

/// Outcome of one admission evaluation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum SyncDecision {
    /// Forwarded over the uplink
    Allowed,
    /// Rate-limited or forward failed; eligible for re-drive
    Deferred,
    /// Not worth the bandwidth on the current link
    Skipped,
    /// Link is down
    Blocked,
}

impl SyncDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncDecision::Allowed => "ALLOWED",
            SyncDecision::Deferred => "DEFERRED",
            SyncDecision::Skipped => "SKIPPED",
            SyncDecision::Blocked => "BLOCKED",
        }
    }
}

impl std::fmt::Display for SyncDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
