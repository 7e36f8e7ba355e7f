//! Connectivity Classifier - hysteresis over probe outcomes
//!
//! Keeps a sliding window of the last probe results plus consecutive
//! success/failure counters, and moves between ONLINE / INTERMITTENT /
//! OFFLINE with asymmetric thresholds: leaving OFFLINE takes 8 successes in
//! a row, entering it takes 5 failures in a row. A snapshot is logged every
//! tick; a change notification is published only on an actual transition.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::info;

use super::lock_state;
use crate::bus::{BusMessage, Dispatcher};
use crate::config::ConnectivityConfig;
use crate::types::{ConnectivitySnapshot, ConnectivityState};
use crate::DECISION_LOG_TARGET;

/// Hysteresis state machine. Pure: no bus, no clock.
#[derive(Debug, Clone)]
pub struct LinkHysteresis {
    config: ConnectivityConfig,
    status: ConnectivityState,
    window: VecDeque<bool>,
    consecutive_successes: u32,
    consecutive_failures: u32,
}

impl LinkHysteresis {
    pub fn new(config: ConnectivityConfig) -> Self {
        let capacity = config.window_size.max(1);
        Self {
            config,
            status: ConnectivityState::Offline,
            window: VecDeque::with_capacity(capacity),
            consecutive_successes: 0,
            consecutive_failures: 0,
        }
    }

    pub fn status(&self) -> ConnectivityState {
        self.status
    }

    pub fn consecutive_successes(&self) -> u32 {
        self.consecutive_successes
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Fraction of successes in the window (0 when empty).
    pub fn success_ratio(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        let ok = self.window.iter().filter(|&&s| s).count();
        ok as f64 / self.window.len() as f64
    }

    /// Feed one probe outcome and apply the transition table.
    pub fn observe(&mut self, success: bool) -> ConnectivitySnapshot {
        if self.window.len() >= self.config.window_size.max(1) {
            self.window.pop_front();
        }
        self.window.push_back(success);

        if success {
            self.consecutive_successes = self.consecutive_successes.saturating_add(1);
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            self.consecutive_successes = 0;
        }

        let ratio = self.success_ratio();
        let online_ratio = self.config.online_ratio;
        let degraded = self.consecutive_failures >= self.config.offline_failures;

        let (next, confidence) = match self.status {
            ConnectivityState::Offline => {
                let next = if self.consecutive_successes >= self.config.recovery_successes {
                    if ratio > online_ratio {
                        ConnectivityState::Online
                    } else {
                        ConnectivityState::Intermittent
                    }
                } else {
                    ConnectivityState::Offline
                };
                (next, if success { 0.5 } else { 1.0 })
            }
            ConnectivityState::Online => {
                let next = if degraded {
                    ConnectivityState::Offline
                } else if ratio < online_ratio {
                    ConnectivityState::Intermittent
                } else {
                    ConnectivityState::Online
                };
                (next, ratio)
            }
            ConnectivityState::Intermittent => {
                let next = if degraded {
                    ConnectivityState::Offline
                } else if ratio > online_ratio {
                    ConnectivityState::Online
                } else {
                    ConnectivityState::Intermittent
                };
                (next, ratio)
            }
        };

        let changed = next != self.status;
        self.status = next;
        ConnectivitySnapshot {
            status: next,
            confidence,
            changed,
        }
    }
}

/// Bus-facing classifier: owns the hysteresis behind a lock and publishes
/// `ConnectivityChanged` on transitions.
pub struct ConnectivityClassifier {
    state: Mutex<LinkHysteresis>,
    bus: Arc<Dispatcher>,
}

impl ConnectivityClassifier {
    pub fn new(config: ConnectivityConfig, bus: Arc<Dispatcher>) -> Self {
        Self {
            state: Mutex::new(LinkHysteresis::new(config)),
            bus,
        }
    }

    pub fn status(&self) -> ConnectivityState {
        lock_state(&self.state, "connectivity").status()
    }

    /// Record one probe result. Called from the connectivity producer loop.
    pub fn record_probe(&self, success: bool) -> ConnectivitySnapshot {
        let snapshot = lock_state(&self.state, "connectivity").observe(success);

        info!(
            target: DECISION_LOG_TARGET,
            kind = "connectivity_snapshot",
            status = %snapshot.status,
            confidence = (snapshot.confidence * 100.0).round() / 100.0,
            "connectivity snapshot"
        );

        if snapshot.changed {
            info!(status = %snapshot.status, "Connectivity status changed");
            self.bus.publish(BusMessage::ConnectivityChanged(snapshot.status));
        }
        snapshot
    }
}
