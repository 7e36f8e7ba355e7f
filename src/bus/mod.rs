//! Dispatcher - synchronous publish/subscribe bus
//!
//! Topics form a closed set, and every topic carries exactly one payload
//! shape (`BusMessage` variant), so a handler never has to probe what it was
//! given. The topic of a publish is derived from the message itself.
//!
//! `publish` runs every handler registered for the topic, in registration
//! order, on the caller's thread, before returning. There is no queue. A
//! handler that returns `Err` or panics is logged and skipped; delivery to
//! the remaining handlers continues and nothing reaches the publisher.
//!
//! Handlers may re-enter the bus (publish or subscribe from inside a
//! handler): the subscriber list is snapshotted before delivery and no bus
//! lock is held while handlers run.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};
use tracing::{debug, error, warn};

use crate::types::{
    Alert, ConnectivityState, Event, Observation, ResourceWarning, RiskAssessment, StrategyRevision,
};

/// Bus topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Detection source → track confirmer
    Detection,
    /// Connectivity classifier → strategy, sync admission
    ConnectivityChanged,
    /// Track confirmer → risk classifier
    ConfirmedEvent,
    /// Risk classifier → alert notifier, strategy controller
    RiskAssessment,
    /// Risk classifier → sync admission
    RiskScoredEvent,
    /// Strategy controller → detection source, track confirmer
    StrategyUpdate,
    /// Alert notifier → crew-facing consumers
    Alert,
    /// Resource check → crew-facing consumers
    ResourceWarning,
}

impl Topic {
    pub fn name(self) -> &'static str {
        match self {
            Topic::Detection => "vision_detection",
            Topic::ConnectivityChanged => "network_status_change",
            Topic::ConfirmedEvent => "confirmed_event",
            Topic::RiskAssessment => "risk_assessment",
            Topic::RiskScoredEvent => "risk_assessed_event",
            Topic::StrategyUpdate => "system_strategy_update",
            Topic::Alert => "alert_event",
            Topic::ResourceWarning => "resource_warning",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One payload shape per topic.
#[derive(Debug, Clone)]
pub enum BusMessage {
    Detection(Observation),
    ConnectivityChanged(ConnectivityState),
    ConfirmedEvent(Event),
    RiskAssessment(RiskAssessment),
    RiskScoredEvent(Event),
    StrategyUpdate(StrategyRevision),
    Alert(Alert),
    ResourceWarning(ResourceWarning),
}

impl BusMessage {
    pub fn topic(&self) -> Topic {
        match self {
            BusMessage::Detection(_) => Topic::Detection,
            BusMessage::ConnectivityChanged(_) => Topic::ConnectivityChanged,
            BusMessage::ConfirmedEvent(_) => Topic::ConfirmedEvent,
            BusMessage::RiskAssessment(_) => Topic::RiskAssessment,
            BusMessage::RiskScoredEvent(_) => Topic::RiskScoredEvent,
            BusMessage::StrategyUpdate(_) => Topic::StrategyUpdate,
            BusMessage::Alert(_) => Topic::Alert,
            BusMessage::ResourceWarning(_) => Topic::ResourceWarning,
        }
    }
}

/// Handler signature. Errors are logged by the dispatcher.
pub type Handler = Arc<dyn Fn(&BusMessage) -> anyhow::Result<()> + Send + Sync>;

#[derive(Clone)]
struct Subscriber {
    name: String,
    handler: Handler,
}

/// Topic → ordered list of subscribers.
#[derive(Default)]
pub struct Dispatcher {
    subscribers: RwLock<HashMap<Topic, Vec<Subscriber>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `topic`. Handlers run in registration order.
    pub fn subscribe<F>(&self, topic: Topic, name: &str, handler: F)
    where
        F: Fn(&BusMessage) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut subs = self.subscribers.write().unwrap_or_else(|e| {
            warn!("Dispatcher subscriber lock poisoned, recovering");
            e.into_inner()
        });
        subs.entry(topic).or_default().push(Subscriber {
            name: name.to_string(),
            handler: Arc::new(handler),
        });
        debug!(topic = %topic, subscriber = name, "Subscribed");
    }

    /// Deliver `message` to every handler currently subscribed to its topic.
    ///
    /// Returns the number of handlers that completed without error.
    pub fn publish(&self, message: BusMessage) -> usize {
        let topic = message.topic();
        let snapshot: Vec<Subscriber> = {
            let subs = self.subscribers.read().unwrap_or_else(|e| {
                warn!("Dispatcher subscriber lock poisoned, recovering");
                e.into_inner()
            });
            match subs.get(&topic) {
                Some(list) => list.clone(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        for sub in &snapshot {
            match catch_unwind(AssertUnwindSafe(|| (sub.handler)(&message))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    error!(topic = %topic, subscriber = %sub.name, error = %e, "Error handling event");
                }
                Err(panic) => {
                    let msg = panic
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!(topic = %topic, subscriber = %sub.name, panic = %msg, "Handler panicked");
                }
            }
        }
        delivered
    }

    /// Number of handlers registered for `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.subscribers
            .read()
            .map(|subs| subs.get(&topic).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}
