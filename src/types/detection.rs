//! Detection types: what the perception model reports for one frame

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed label set produced by the onboard perception model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DetectionLabel {
    LargeMarineLife,
    SmallMarineLife,
    HumanOrLifeRaft,
    UnknownLivingObject,
    /// Debris, foam, wave crests. Never confirmed as a living entity.
    NonLivingObject,
}

impl DetectionLabel {
    /// Whether this is the designated "non-living" label.
    pub fn is_non_living(self) -> bool {
        matches!(self, DetectionLabel::NonLivingObject)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DetectionLabel::LargeMarineLife => "large_marine_life",
            DetectionLabel::SmallMarineLife => "small_marine_life",
            DetectionLabel::HumanOrLifeRaft => "human_or_life_raft",
            DetectionLabel::UnknownLivingObject => "unknown_living_object",
            DetectionLabel::NonLivingObject => "non_living_object",
        }
    }
}

impl std::fmt::Display for DetectionLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Axis-aligned bounding box in image pixels, `(x0, y0)` top-left.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct BoundingBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BoundingBox {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    /// Shift the box by a motion vector.
    pub fn translated(&self, motion: MotionVector) -> Self {
        Self {
            x0: self.x0 + motion.dx,
            y0: self.y0 + motion.dy,
            x1: self.x1 + motion.dx,
            y1: self.y1 + motion.dy,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x0.is_finite() && self.y0.is_finite() && self.x1.is_finite() && self.y1.is_finite()
    }
}

/// Per-frame motion estimate in pixels. Positive `dy` means closing on the node.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct MotionVector {
    pub dx: f64,
    pub dy: f64,
}

impl MotionVector {
    pub fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }

    pub fn is_finite(&self) -> bool {
        self.dx.is_finite() && self.dy.is_finite()
    }
}

/// Raw model output for a single object in a single frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Detection {
    pub category: DetectionLabel,
    pub confidence: f64,
    pub bbox: BoundingBox,
    pub motion: MotionVector,
    /// Saved frame this detection was read from, if the source keeps one
    #[serde(default)]
    pub image_path: Option<String>,
}

/// One detection promoted onto the bus, stamped with its frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    pub category: DetectionLabel,
    /// Model confidence in [0, 1]
    pub confidence: f64,
    pub bounding_box: BoundingBox,
    pub motion_vector: MotionVector,
    pub frame_id: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub image_path: Option<String>,
}

impl Observation {
    pub fn from_detection(detection: &Detection, frame_id: u64, timestamp: DateTime<Utc>) -> Self {
        Self {
            category: detection.category,
            confidence: detection.confidence.clamp(0.0, 1.0),
            bounding_box: detection.bbox,
            motion_vector: detection.motion,
            frame_id,
            timestamp,
            image_path: detection.image_path.clone(),
        }
    }
}
