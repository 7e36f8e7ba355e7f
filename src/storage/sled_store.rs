//! sled-backed event store
//!
//! One tree, keyed by `event_id`, values are JSON-encoded `Event` records
//! (timestamp, category, risk, confidence, evidence, synced flag, metadata).
//! Read-modify-write paths go through compare-and-swap so concurrent saves
//! and `mark_synced` calls from both producer loops never lose the flag.

use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::persistence::{evidence_expired, strip_evidence, EventStore, StorageError};
use crate::types::Event;

/// Directory name of the event database inside the node's data dir.
pub const EVENT_DB_DIR: &str = "events.db";

#[derive(Clone)]
pub struct SledEventStore {
    db: Arc<sled::Db>,
}

impl SledEventStore {
    /// Open or create the event database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path_ref = path.as_ref();
        let db = sled::open(path_ref)?;
        info!(path = %path_ref.display(), events = db.len(), "Event store opened");
        Ok(Self { db: Arc::new(db) })
    }

    fn decode(bytes: &[u8]) -> Result<Event, StorageError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Compare-and-swap loop. `f` returns the new record, or `None` to leave
    /// the key untouched. Returns whether a write happened.
    fn update<F>(&self, event_id: &str, mut f: F) -> Result<bool, StorageError>
    where
        F: FnMut(Option<Event>) -> Option<Event>,
    {
        let key = event_id.as_bytes();
        loop {
            let current = self.db.get(key)?;
            let decoded = match current.as_ref() {
                Some(bytes) => Some(Self::decode(bytes)?),
                None => None,
            };
            let Some(next) = f(decoded) else {
                return Ok(false);
            };
            let encoded = serde_json::to_vec(&next)?;
            if self.db.compare_and_swap(key, current, Some(encoded))?.is_ok() {
                return Ok(true);
            }
            debug!(event_id, "Concurrent write on event record, retrying");
        }
    }
}

impl EventStore for SledEventStore {
    fn save(&self, event: &Event) -> Result<(), StorageError> {
        self.update(&event.event_id, |existing| {
            let mut record = event.clone();
            if let Some(existing) = existing {
                record.synced |= existing.synced;
            }
            Some(record)
        })?;
        self.db.flush()?;
        debug!(event_id = %event.event_id, risk = %event.risk_level, "Event saved locally");
        Ok(())
    }

    fn mark_synced(&self, event_id: &str) -> Result<(), StorageError> {
        let mut found = false;
        self.update(event_id, |existing| {
            found = existing.is_some();
            existing.filter(|e| !e.synced).map(|mut e| {
                e.synced = true;
                e
            })
        })?;
        if !found {
            return Err(StorageError::NotFound(event_id.to_string()));
        }
        self.db.flush()?;
        debug!(event_id, "Event marked as synced");
        Ok(())
    }

    fn get(&self, event_id: &str) -> Result<Option<Event>, StorageError> {
        match self.db.get(event_id.as_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn pending_sync(&self, limit: usize) -> Result<Vec<Event>, StorageError> {
        let mut pending = Vec::new();
        for item in self.db.iter() {
            let (_key, value) = item?;
            match Self::decode(&value) {
                Ok(event) if !event.synced => pending.push(event),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Skipping undecodable event record"),
            }
        }
        pending.sort_by_key(|e| e.timestamp);
        pending.truncate(limit);
        Ok(pending)
    }

    fn count(&self) -> usize {
        self.db.len()
    }

    fn prune_evidence_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError> {
        let mut expired = Vec::new();
        for item in self.db.iter() {
            let (_key, value) = item?;
            if let Ok(event) = Self::decode(&value) {
                if evidence_expired(&event, cutoff) {
                    expired.push(event.event_id);
                }
            }
        }

        let mut pruned = 0;
        for event_id in &expired {
            let wrote = self.update(event_id, |existing| {
                existing.filter(|e| evidence_expired(e, cutoff)).map(|mut e| {
                    strip_evidence(&mut e);
                    e
                })
            })?;
            if wrote {
                pruned += 1;
            }
        }

        if pruned > 0 {
            self.db.flush()?;
            info!(pruned, cutoff = %cutoff, "Pruned expired evidence references");
        }
        Ok(pruned)
    }

    fn backend_name(&self) -> &'static str {
        "sled"
    }
}
