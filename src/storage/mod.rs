//! Local-first event storage
//!
//! Every risk-scored event lands here before the uplink is even considered.
//! Persistence failures are logged and swallowed by the caller; the node
//! keeps running on whatever it managed to write.

pub mod lockfile;
pub mod persistence;
pub mod sled_store;

pub use lockfile::ProcessLock;
pub use persistence::{EventStore, InMemoryEventStore, StorageError};
pub use sled_store::{SledEventStore, EVENT_DB_DIR};
