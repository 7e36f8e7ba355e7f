//! EventStore trait - pluggable durable event storage
//!
//! Every finalized event is written here before any uplink decision is made.
//! Backends:
//! - `SledEventStore`: embedded sled database under the node's data dir
//! - `InMemoryEventStore`: for tests and diskless bench runs

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::types::{Evidence, Event, RiskLevel};

/// Durable store contract.
///
/// Implementations must be thread-safe: both producer loops reach the store
/// through the sync admission controller.
pub trait EventStore: Send + Sync {
    /// Idempotent upsert keyed by `event_id`. A stored `synced` flag is never
    /// cleared by a later save.
    fn save(&self, event: &Event) -> Result<(), StorageError>;

    /// Idempotent. Errors with `NotFound` for an unknown id.
    fn mark_synced(&self, event_id: &str) -> Result<(), StorageError>;

    fn get(&self, event_id: &str) -> Result<Option<Event>, StorageError>;

    /// Unsynced events, oldest first.
    fn pending_sync(&self, limit: usize) -> Result<Vec<Event>, StorageError>;

    fn count(&self) -> usize;

    /// Drop evidence references of non-HIGH events older than `cutoff`.
    /// Returns the number of events touched.
    fn prune_evidence_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] sled::Error),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("event {0} not found")]
    NotFound(String),
}

/// Whether retention may strip this event's evidence.
pub(crate) fn evidence_expired(event: &Event, cutoff: DateTime<Utc>) -> bool {
    event.risk_level != RiskLevel::High && event.timestamp < cutoff && !event.evidence.is_empty()
}

/// Keep the frame count, drop the file references.
pub(crate) fn strip_evidence(event: &mut Event) {
    event.evidence = Evidence {
        evidence_frames: event.evidence.evidence_frames,
        ..Evidence::default()
    };
}

/// In-memory store for tests and minimal deployments
///
/// Thread-safe via `RwLock`. Not durable: data lost on restart.
#[derive(Default)]
pub struct InMemoryEventStore {
    events: RwLock<HashMap<String, Event>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for InMemoryEventStore {
    fn save(&self, event: &Event) -> Result<(), StorageError> {
        let mut store = self
            .events
            .write()
            .map_err(|e| StorageError::Storage(e.to_string()))?;

        let mut record = event.clone();
        if let Some(existing) = store.get(&event.event_id) {
            record.synced |= existing.synced;
        }
        store.insert(record.event_id.clone(), record);
        Ok(())
    }

    fn mark_synced(&self, event_id: &str) -> Result<(), StorageError> {
        let mut store = self
            .events
            .write()
            .map_err(|e| StorageError::Storage(e.to_string()))?;

        match store.get_mut(event_id) {
            Some(event) => {
                event.synced = true;
                Ok(())
            }
            None => Err(StorageError::NotFound(event_id.to_string())),
        }
    }

    fn get(&self, event_id: &str) -> Result<Option<Event>, StorageError> {
        let store = self
            .events
            .read()
            .map_err(|e| StorageError::Storage(e.to_string()))?;

        Ok(store.get(event_id).cloned())
    }

    fn pending_sync(&self, limit: usize) -> Result<Vec<Event>, StorageError> {
        let store = self
            .events
            .read()
            .map_err(|e| StorageError::Storage(e.to_string()))?;

        let mut pending: Vec<Event> = store.values().filter(|e| !e.synced).cloned().collect();
        pending.sort_by_key(|e| e.timestamp);
        pending.truncate(limit);
        Ok(pending)
    }

    fn count(&self) -> usize {
        self.events.read().map(|s| s.len()).unwrap_or(0)
    }

    fn prune_evidence_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError> {
        let mut store = self
            .events
            .write()
            .map_err(|e| StorageError::Storage(e.to_string()))?;

        let mut pruned = 0;
        for event in store.values_mut().filter(|e| evidence_expired(e, cutoff)) {
            strip_evidence(event);
            pruned += 1;
        }
        Ok(pruned)
    }

    fn backend_name(&self) -> &'static str {
        "InMemory"
    }
}
