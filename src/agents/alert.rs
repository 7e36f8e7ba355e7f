//! Alert Notifier - deduplicated navigation warnings for the crew
//!
//! Only MEDIUM and HIGH assessments produce alerts. An alert with the same
//! (risk level, reason) key as one emitted inside the cooldown window is
//! suppressed.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::lock_state;
use crate::bus::{BusMessage, Dispatcher, Topic};
use crate::config::AlertConfig;
use crate::types::{Alert, AlertKey, AlertType, RiskAssessment, RiskLevel};
use crate::uplink::rate_limiter::gap_from_secs;

fn recommendation(level: RiskLevel) -> Option<&'static str> {
    match level {
        RiskLevel::High => Some("Recommend immediate evasion."),
        RiskLevel::Medium => Some("Recommend speed reduction."),
        RiskLevel::Low | RiskLevel::Unknown => None,
    }
}

pub struct AlertNotifier {
    cooldown: Duration,
    /// Last emission per key
    last_fired: Mutex<HashMap<AlertKey, Instant>>,
    bus: Arc<Dispatcher>,
}

impl AlertNotifier {
    pub fn new(config: &AlertConfig, bus: Arc<Dispatcher>) -> Self {
        Self {
            cooldown: gap_from_secs(config.cooldown_secs),
            last_fired: Mutex::new(HashMap::new()),
            bus,
        }
    }

    pub fn attach(self: &Arc<Self>, bus: &Dispatcher) {
        let me: Weak<Self> = Arc::downgrade(self);
        bus.subscribe(Topic::RiskAssessment, "alert_notifier", move |msg| {
            if let (Some(me), BusMessage::RiskAssessment(assessment)) = (me.upgrade(), msg) {
                me.on_risk_assessment(assessment);
            }
            Ok(())
        });
    }

    pub fn on_risk_assessment(&self, assessment: &RiskAssessment) -> Option<Alert> {
        self.process_at(assessment, Instant::now())
    }

    /// Dedup and publish at the given instant.
    pub fn process_at(&self, assessment: &RiskAssessment, now: Instant) -> Option<Alert> {
        let recommendation = recommendation(assessment.risk_level)?;
        let key = AlertKey {
            risk_level: assessment.risk_level,
            reason: assessment.reason.clone(),
        };

        {
            let mut last_fired = lock_state(&self.last_fired, "alert");
            if let Some(&at) = last_fired.get(&key) {
                if now.saturating_duration_since(at) < self.cooldown {
                    debug!(level = %key.risk_level, reason = %key.reason, "Duplicate alert suppressed");
                    return None;
                }
            }
            // entries older than the cooldown can never suppress anything
            last_fired.retain(|_, at| now.saturating_duration_since(*at) < self.cooldown);
            last_fired.insert(key, now);
        }

        let alert = Alert {
            alert_type: AlertType::NavigationWarning,
            level: assessment.risk_level,
            message: format!("{} {}", assessment.reason, recommendation),
            timestamp: Utc::now(),
        };
        warn!(level = %alert.level, alert_type = %alert.alert_type, "[{}] {}", alert.level, alert.message);
        self.bus.publish(BusMessage::Alert(alert.clone()));
        Some(alert)
    }
}
