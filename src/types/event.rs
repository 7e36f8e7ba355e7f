//! Event types: confirmed events, risk assessments, and user-facing alerts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{BoundingBox, DetectionLabel, MotionVector};

// ============================================================================
// Risk
// ============================================================================

/// Risk classification attached to a confirmed event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    /// Routine, log locally
    Low,
    /// Potential interest, sync when possible
    Medium,
    /// Critical, immediate action and sync required
    High,
    /// Not yet assessed
    #[default]
    Unknown,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
            RiskLevel::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Lightweight risk summary published for the alert and strategy agents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskAssessment {
    pub event_id: String,
    pub risk_level: RiskLevel,
    /// Human-readable source of the risk
    pub reason: String,
    /// 0.0 (certain) to 1.0 (no idea)
    pub uncertainty: f64,
}

// ============================================================================
// Event
// ============================================================================

/// Evidence references captured for an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Evidence {
    #[serde(default)]
    pub image_paths: Vec<String>,
    #[serde(default)]
    pub clip_path: Option<String>,
    /// Number of consistent frames behind the confirmation
    #[serde(default)]
    pub evidence_frames: usize,
}

impl Evidence {
    pub fn is_empty(&self) -> bool {
        self.image_paths.is_empty() && self.clip_path.is_none()
    }
}

/// Latest geometry and motion of the track that produced an event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TrackGeometry {
    pub bounding_box: BoundingBox,
    pub motion_vector: MotionVector,
}

/// A finalized event.
///
/// Created by the track confirmer, risk-scored in place by the risk
/// classifier, flagged `synced` by the admission controller, then persisted.
/// `event_id` never changes once persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub category: DetectionLabel,
    #[serde(default)]
    pub risk_level: RiskLevel,
    /// Average confidence across the track history
    pub confidence: f64,
    #[serde(default)]
    pub evidence: Evidence,
    #[serde(default)]
    pub geometry: Option<TrackGeometry>,
    #[serde(default)]
    pub confirmed: bool,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub synced: bool,
}

impl Event {
    /// New unscored event with a fresh unique id.
    pub fn new(category: DetectionLabel, confidence: f64) -> Self {
        Self {
            event_id: format!("EVT_{}", uuid::Uuid::new_v4().simple()),
            timestamp: Utc::now(),
            category,
            risk_level: RiskLevel::Unknown,
            confidence,
            evidence: Evidence::default(),
            geometry: None,
            confirmed: false,
            metadata: BTreeMap::new(),
            synced: false,
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

// ============================================================================
// Alerts
// ============================================================================

/// Category of a user-facing alert.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    NavigationWarning,
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertType::NavigationWarning => write!(f, "NAVIGATION_WARNING"),
        }
    }
}

/// Deduplication key: no two alerts with the same key inside the cooldown.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlertKey {
    pub risk_level: RiskLevel,
    pub reason: String,
}

/// Alert published for crew-facing consumers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub alert_type: AlertType,
    pub level: RiskLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}
