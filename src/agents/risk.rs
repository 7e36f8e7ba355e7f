//! Risk Classifier - bounded risk level from a confirmed track's geometry
//!
//! First matching rule wins:
//!
//! | Condition                                   | Level  |
//! |---------------------------------------------|--------|
//! | no geometry, track confirmed                | MEDIUM (flagged) |
//! | no geometry, not confirmed                  | MEDIUM (flagged) |
//! | width > 150 and dy >= -1 (not retreating)   | HIGH   |
//! | width > 150 and dy < -1 (retreating)        | MEDIUM |
//! | width <= 150 and dy > 5 (closing fast)      | MEDIUM |
//! | otherwise                                   | LOW    |
//!
//! HIGH is never reported below 0.6 confidence. Missing information never
//! escalates, and internal failures fail safe to MEDIUM with full uncertainty.

use std::sync::{Arc, Weak};
use tracing::{error, info};

use crate::bus::{BusMessage, Dispatcher, Topic};
use crate::config::RiskConfig;
use crate::types::{Event, RiskAssessment, RiskLevel};
use crate::DECISION_LOG_TARGET;

pub const REASON_CONFIRMED_NO_MOTION: &str = "Confirmed living entity but motion data unavailable.";
pub const REASON_INSUFFICIENT_DATA: &str = "Insufficient data to determine trajectory.";
pub const REASON_COLLISION_PATH: &str = "Large organic target in close proximity/collision path.";
pub const REASON_LARGE_RETREATING: &str = "Large target moving away, but proximity warrants caution.";
pub const REASON_CLOSING_FAST: &str = "Distant target closing rapidly.";
pub const REASON_HOLDING_DISTANCE: &str = "Target moving away or keeping distance.";
pub const REASON_DOWNGRADED: &str = "Potential high risk but confidence low. Downgraded.";
pub const REASON_FAILSAFE: &str = "Internal error - failsafe.";

#[derive(Debug, thiserror::Error)]
pub enum RiskError {
    #[error("event {0} has non-finite confidence")]
    InvalidConfidence(String),
    #[error("event {0} carries non-finite geometry")]
    InvalidGeometry(String),
}

pub struct RiskClassifier {
    config: RiskConfig,
    bus: Arc<Dispatcher>,
}

impl RiskClassifier {
    pub fn new(config: RiskConfig, bus: Arc<Dispatcher>) -> Self {
        Self { config, bus }
    }

    pub fn attach(self: &Arc<Self>, bus: &Dispatcher) {
        let me: Weak<Self> = Arc::downgrade(self);
        bus.subscribe(Topic::ConfirmedEvent, "risk_classifier", move |msg| {
            if let (Some(me), BusMessage::ConfirmedEvent(event)) = (me.upgrade(), msg) {
                me.on_confirmed_event(event.clone());
            }
            Ok(())
        });
    }

    /// Apply the rule table. Pure.
    pub fn assess(&self, event: &Event) -> Result<RiskAssessment, RiskError> {
        if !event.confidence.is_finite() {
            return Err(RiskError::InvalidConfidence(event.event_id.clone()));
        }

        let (mut level, mut reason, mut flagged) = match event.geometry {
            None if event.confirmed => (RiskLevel::Medium, REASON_CONFIRMED_NO_MOTION, true),
            None => (RiskLevel::Medium, REASON_INSUFFICIENT_DATA, true),
            Some(geometry) => {
                if !geometry.bounding_box.is_finite() || !geometry.motion_vector.is_finite() {
                    return Err(RiskError::InvalidGeometry(event.event_id.clone()));
                }
                let width = geometry.bounding_box.width();
                let dy = geometry.motion_vector.dy;
                let r = &self.config;

                if width > r.proximity_width_px {
                    if dy >= r.retreat_dy {
                        (RiskLevel::High, REASON_COLLISION_PATH, false)
                    } else {
                        (RiskLevel::Medium, REASON_LARGE_RETREATING, false)
                    }
                } else if dy > r.closing_fast_dy {
                    (RiskLevel::Medium, REASON_CLOSING_FAST, false)
                } else {
                    (RiskLevel::Low, REASON_HOLDING_DISTANCE, false)
                }
            }
        };

        if level == RiskLevel::High && event.confidence < self.config.min_high_confidence {
            level = RiskLevel::Medium;
            reason = REASON_DOWNGRADED;
            flagged = true;
        }

        let mut uncertainty = round2(1.0 - event.confidence);
        if flagged {
            uncertainty = uncertainty.max(self.config.heuristic_uncertainty_floor);
        }

        Ok(RiskAssessment {
            event_id: event.event_id.clone(),
            risk_level: level,
            reason: reason.to_string(),
            uncertainty,
        })
    }

    /// Score the event, then publish the summary and the scored event.
    pub fn on_confirmed_event(&self, mut event: Event) -> RiskAssessment {
        let assessment = match self.assess(&event) {
            Ok(a) => a,
            Err(e) => {
                error!(event_id = %event.event_id, error = %e, "Risk assessment failed");
                RiskAssessment {
                    event_id: event.event_id.clone(),
                    risk_level: RiskLevel::Medium,
                    reason: REASON_FAILSAFE.to_string(),
                    uncertainty: 1.0,
                }
            }
        };

        info!(
            target: DECISION_LOG_TARGET,
            kind = "risk",
            risk_level = %assessment.risk_level,
            reason = %assessment.reason,
            uncertainty = assessment.uncertainty,
            "risk assessed"
        );

        event.risk_level = assessment.risk_level;
        self.bus.publish(BusMessage::RiskAssessment(assessment.clone()));
        self.bus.publish(BusMessage::RiskScoredEvent(event));
        assessment
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
