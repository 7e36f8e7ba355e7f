//! OceanViewer: decision core of an offshore marine-life monitoring node
//!
//! A camera-equipped node on a vessel or platform turns raw perception output
//! into confirmed, risk-scored events, keeps them locally, and forwards them
//! over a constrained satellite uplink.
//!
//! ## Architecture
//!
//! - **Dispatcher**: synchronous typed publish/subscribe bus
//! - **Track Confirmer**: promotes temporally consistent tracks to events
//! - **Risk Classifier**: bounded, fail-safe risk heuristic
//! - **Strategy Controller**: power/uncertainty/risk/link cascade that sets
//!   frame rate, model tier and confirmation window
//! - **Sync Admission Controller**: store-first, rate-limited uplink
//! - **Alert Notifier**: crew warnings with per-key cooldown

pub mod acquisition;
pub mod agents;
pub mod bus;
pub mod config;
pub mod pipeline;
pub mod resources;
pub mod storage;
pub mod types;
pub mod uplink;

/// Tracing target of the structured decision log lines.
pub const DECISION_LOG_TARGET: &str = "oceanviewer::decision";

pub use agents::{
    AlertNotifier, ConnectivityClassifier, RiskClassifier, StrategyController, TrackConfirmer,
};
pub use bus::{BusMessage, Dispatcher, Topic};
pub use config::NodeConfig;
pub use pipeline::NodeCoordinator;
pub use storage::{EventStore, InMemoryEventStore, SledEventStore, StorageError};
pub use types::{
    Alert, ConnectivityState, Detection, DetectionLabel, Event, Observation, RiskAssessment,
    RiskLevel, Strategy, StrategyMode, SyncDecision,
};
pub use uplink::{LogUplink, SyncAdmissionController, Uplink};
