//! Sync Admission Controller - which events earn uplink bandwidth
//!
//! Every risk-scored event is persisted first, unconditionally. Then:
//!
//! | Link          | Event       | Outcome                                  |
//! |---------------|-------------|------------------------------------------|
//! | OFFLINE       | any         | BLOCKED                                  |
//! | INTERMITTENT  | HIGH        | ALLOWED if the HIGH budget allows (2.0 s gap), else DEFERRED |
//! | INTERMITTENT  | not HIGH    | SKIPPED                                  |
//! | ONLINE        | any         | ALLOWED if the STANDARD budget allows (0.5 s gap), else DEFERRED |
//!
//! An allowed event is forwarded and marked synced. Deferred event ids (and
//! events whose forward failed) go to a bounded FIFO that the maintenance
//! loop re-drives through `retry_deferred`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Weak};
use std::time::Instant;
use tracing::{error, info, warn};

use super::rate_limiter::{SyncPriority, UplinkRateLimiter};
use super::transport::Uplink;
use crate::agents::lock_state;
use crate::bus::{BusMessage, Dispatcher, Topic};
use crate::config::SyncConfig;
use crate::storage::EventStore;
use crate::types::{ConnectivityState, Event, RiskLevel, SyncDecision};
use crate::DECISION_LOG_TARGET;

struct AdmissionState {
    connectivity: ConnectivityState,
    limiter: UplinkRateLimiter,
    deferred: VecDeque<String>,
}

pub struct SyncAdmissionController {
    config: SyncConfig,
    store: Arc<dyn EventStore>,
    uplink: Arc<dyn Uplink>,
    state: Mutex<AdmissionState>,
}

impl SyncAdmissionController {
    pub fn new(config: SyncConfig, store: Arc<dyn EventStore>, uplink: Arc<dyn Uplink>) -> Self {
        let limiter = UplinkRateLimiter::new(config.high_min_gap_secs, config.standard_min_gap_secs);
        info!(
            store = store.backend_name(),
            uplink = uplink.name(),
            redrive = config.redrive_deferred,
            "Sync admission controller ready"
        );
        Self {
            config,
            store,
            uplink,
            state: Mutex::new(AdmissionState {
                connectivity: ConnectivityState::Offline,
                limiter,
                deferred: VecDeque::new(),
            }),
        }
    }

    pub fn attach(self: &Arc<Self>, bus: &Dispatcher) {
        let me: Weak<Self> = Arc::downgrade(self);
        bus.subscribe(Topic::ConnectivityChanged, "sync_admission", move |msg| {
            if let (Some(me), BusMessage::ConnectivityChanged(status)) = (me.upgrade(), msg) {
                me.set_connectivity(*status);
            }
            Ok(())
        });

        let me: Weak<Self> = Arc::downgrade(self);
        bus.subscribe(Topic::RiskScoredEvent, "sync_admission", move |msg| {
            if let (Some(me), BusMessage::RiskScoredEvent(event)) = (me.upgrade(), msg) {
                me.on_risk_scored_event(event);
            }
            Ok(())
        });
    }

    pub fn connectivity(&self) -> ConnectivityState {
        lock_state(&self.state, "sync_admission").connectivity
    }

    pub fn set_connectivity(&self, status: ConnectivityState) {
        lock_state(&self.state, "sync_admission").connectivity = status;
        info!(status = %status, "Sync admission sees new network status");
    }

    pub fn deferred_ids(&self) -> Vec<String> {
        lock_state(&self.state, "sync_admission")
            .deferred
            .iter()
            .cloned()
            .collect()
    }

    /// Persist, decide, and forward one finalized event.
    pub fn on_risk_scored_event(&self, event: &Event) -> SyncDecision {
        if let Err(e) = self.store.save(event) {
            error!(event_id = %event.event_id, error = %e, "Failed to persist event");
        }

        let (decision, reason) = self.decide_at(event.risk_level, Instant::now());
        self.settle(event, decision, reason)
    }

    /// Re-evaluate deferred events, oldest first. Returns how many were synced.
    pub fn retry_deferred(&self) -> usize {
        if !self.config.redrive_deferred {
            return 0;
        }
        let pending: Vec<String> = {
            let mut state = lock_state(&self.state, "sync_admission");
            if state.connectivity == ConnectivityState::Offline || state.deferred.is_empty() {
                return 0;
            }
            state.deferred.drain(..).collect()
        };

        let mut synced = 0;
        let mut still_deferred = Vec::new();
        for event_id in pending {
            let event = match self.store.get(&event_id) {
                Ok(Some(event)) if !event.synced => event,
                Ok(_) => continue,
                Err(e) => {
                    warn!(event_id = %event_id, error = %e, "Cannot load deferred event");
                    still_deferred.push(event_id);
                    continue;
                }
            };

            let (decision, reason) = match self.decide_at(event.risk_level, Instant::now()) {
                (SyncDecision::Allowed, _) if !self.forward(&event) => {
                    (SyncDecision::Deferred, "UPLINK FORWARD FAILED")
                }
                other => other,
            };
            match decision {
                SyncDecision::Allowed => synced += 1,
                SyncDecision::Deferred | SyncDecision::Blocked => still_deferred.push(event_id),
                SyncDecision::Skipped => {}
            }
            log_decision(&event.event_id, decision, &format!("REDRIVE - {reason}"));
        }

        if !still_deferred.is_empty() {
            let mut state = lock_state(&self.state, "sync_admission");
            for id in still_deferred.into_iter().rev() {
                state.deferred.push_front(id);
            }
            self.trim_deferred(&mut state);
        }
        synced
    }

    /// Apply the admission table. Advances the rate limiter on success.
    fn decide_at(&self, risk: RiskLevel, now: Instant) -> (SyncDecision, &'static str) {
        let mut state = lock_state(&self.state, "sync_admission");
        match state.connectivity {
            ConnectivityState::Offline => (SyncDecision::Blocked, "Network OFFLINE"),
            ConnectivityState::Intermittent => {
                if risk != RiskLevel::High {
                    (SyncDecision::Skipped, "INTERMITTENT - LOW PRIORITY")
                } else if state.limiter.try_acquire_at(SyncPriority::High, now) {
                    (SyncDecision::Allowed, "INTERMITTENT - HIGH PRIORITY (Rate OK)")
                } else {
                    (SyncDecision::Deferred, "INTERMITTENT - RATE LIMIT EXCEEDED")
                }
            }
            ConnectivityState::Online => {
                if state.limiter.try_acquire_at(SyncPriority::Standard, now) {
                    (SyncDecision::Allowed, "ONLINE - STANDARD SYNC")
                } else {
                    (SyncDecision::Deferred, "ONLINE - RATE LIMIT EXCEEDED")
                }
            }
        }
    }

    fn settle(&self, event: &Event, decision: SyncDecision, reason: &str) -> SyncDecision {
        let (decision, reason) = match decision {
            SyncDecision::Allowed if !self.forward(event) => {
                (SyncDecision::Deferred, "UPLINK FORWARD FAILED")
            }
            other => (other, reason),
        };
        log_decision(&event.event_id, decision, reason);

        if decision == SyncDecision::Deferred && self.config.redrive_deferred {
            let mut state = lock_state(&self.state, "sync_admission");
            if !state.deferred.contains(&event.event_id) {
                state.deferred.push_back(event.event_id.clone());
            }
            self.trim_deferred(&mut state);
        }
        decision
    }

    /// Forward and mark synced. Returns false when the transport failed.
    fn forward(&self, event: &Event) -> bool {
        if let Err(e) = self.uplink.forward(event) {
            warn!(event_id = %event.event_id, error = %e, "Uplink forward failed");
            return false;
        }
        if let Err(e) = self.store.mark_synced(&event.event_id) {
            error!(event_id = %event.event_id, error = %e, "Forwarded but failed to mark synced");
        }
        true
    }

    fn trim_deferred(&self, state: &mut AdmissionState) {
        while state.deferred.len() > self.config.max_deferred {
            if let Some(dropped) = state.deferred.pop_front() {
                warn!(event_id = %dropped, "Deferred queue full, dropping oldest");
            }
        }
    }
}

fn log_decision(event_id: &str, decision: SyncDecision, reason: &str) {
    info!(
        target: DECISION_LOG_TARGET,
        kind = "sync",
        event_id,
        decision = %decision,
        reason,
        "sync decision"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryEventStore;
    use crate::types::DetectionLabel;
    use crate::uplink::{LogUplink, UplinkError};
    use std::time::Duration;

    struct FailingUplink;

    impl Uplink for FailingUplink {
        fn forward(&self, event: &Event) -> Result<(), UplinkError> {
            Err(UplinkError::Unavailable(format!("no carrier for {}", event.event_id)))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    fn controller(uplink: Arc<dyn Uplink>) -> (SyncAdmissionController, Arc<InMemoryEventStore>) {
        let store = Arc::new(InMemoryEventStore::new());
        let c = SyncAdmissionController::new(SyncConfig::default(), store.clone(), uplink);
        (c, store)
    }

    fn event(risk: RiskLevel) -> Event {
        let mut e = Event::new(DetectionLabel::LargeMarineLife, 0.9);
        e.risk_level = risk;
        e
    }

    #[test]
    fn offline_blocks_but_persists() {
        let (c, store) = controller(Arc::new(LogUplink));
        let e = event(RiskLevel::High);
        assert_eq!(c.on_risk_scored_event(&e), SyncDecision::Blocked);
        let stored = store.get(&e.event_id).unwrap().unwrap();
        assert!(!stored.synced);
    }

    #[test]
    fn intermittent_skips_non_high() {
        let (c, store) = controller(Arc::new(LogUplink));
        c.set_connectivity(ConnectivityState::Intermittent);
        for risk in [RiskLevel::Low, RiskLevel::Medium, RiskLevel::Unknown] {
            let e = event(risk);
            assert_eq!(c.on_risk_scored_event(&e), SyncDecision::Skipped);
            assert!(!store.get(&e.event_id).unwrap().unwrap().synced);
        }
        assert!(c.deferred_ids().is_empty());
    }

    #[test]
    fn online_rate_limits_standard() {
        let (c, _) = controller(Arc::new(LogUplink));
        c.set_connectivity(ConnectivityState::Online);
        let t0 = Instant::now();
        assert_eq!(c.decide_at(RiskLevel::Low, t0).0, SyncDecision::Allowed);
        assert_eq!(
            c.decide_at(RiskLevel::High, t0 + Duration::from_millis(300)).0,
            SyncDecision::Deferred
        );
        assert_eq!(
            c.decide_at(RiskLevel::Low, t0 + Duration::from_millis(600)).0,
            SyncDecision::Allowed
        );
    }

    #[test]
    fn deferred_high_event_is_redriven() {
        let (c, store) = controller(Arc::new(LogUplink));
        c.set_connectivity(ConnectivityState::Intermittent);
        let first = event(RiskLevel::High);
        let second = event(RiskLevel::High);
        assert_eq!(c.on_risk_scored_event(&first), SyncDecision::Allowed);
        assert_eq!(c.on_risk_scored_event(&second), SyncDecision::Deferred);
        assert_eq!(c.deferred_ids(), vec![second.event_id.clone()]);

        // budget not yet refilled
        assert_eq!(c.retry_deferred(), 0);
        assert_eq!(c.deferred_ids().len(), 1);

        lock_state(&c.state, "test").limiter = UplinkRateLimiter::new(2.0, 0.5);
        assert_eq!(c.retry_deferred(), 1);
        assert!(store.get(&second.event_id).unwrap().unwrap().synced);
        assert!(c.deferred_ids().is_empty());
    }

    #[test]
    fn forward_failure_defers() {
        let (c, store) = controller(Arc::new(FailingUplink));
        c.set_connectivity(ConnectivityState::Online);
        let e = event(RiskLevel::Medium);
        assert_eq!(c.on_risk_scored_event(&e), SyncDecision::Deferred);
        assert!(!store.get(&e.event_id).unwrap().unwrap().synced);
        assert_eq!(c.deferred_ids(), vec![e.event_id]);
    }

    #[test]
    fn deferred_queue_is_bounded() {
        let store = Arc::new(InMemoryEventStore::new());
        let config = SyncConfig {
            max_deferred: 2,
            ..SyncConfig::default()
        };
        let c = SyncAdmissionController::new(config, store, Arc::new(FailingUplink));
        c.set_connectivity(ConnectivityState::Online);
        let ids: Vec<String> = (0..3)
            .map(|_| {
                let e = event(RiskLevel::Low);
                c.on_risk_scored_event(&e);
                e.event_id
            })
            .collect();
        assert_eq!(c.deferred_ids(), ids[1..].to_vec());
    }

    #[test]
    fn redrive_disabled_drops_deferrals() {
        let store = Arc::new(InMemoryEventStore::new());
        let config = SyncConfig {
            redrive_deferred: false,
            ..SyncConfig::default()
        };
        let c = SyncAdmissionController::new(config, store, Arc::new(FailingUplink));
        c.set_connectivity(ConnectivityState::Online);
        c.on_risk_scored_event(&event(RiskLevel::Low));
        assert!(c.deferred_ids().is_empty());
        assert_eq!(c.retry_deferred(), 0);
    }
}
