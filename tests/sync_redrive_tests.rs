//! Deferred re-drive through the sled-backed store

use std::sync::Arc;
use std::time::Duration;

use oceanviewer::config::SyncConfig;
use oceanviewer::storage::{EventStore, SledEventStore, EVENT_DB_DIR};
use oceanviewer::types::{ConnectivityState, DetectionLabel, Event, RiskLevel, SyncDecision};
use oceanviewer::uplink::{LogUplink, SyncAdmissionController};

fn high_event() -> Event {
    let mut event = Event::new(DetectionLabel::HumanOrLifeRaft, 0.95);
    event.confirmed = true;
    event.risk_level = RiskLevel::High;
    event
}

fn controller(store: Arc<dyn EventStore>, config: SyncConfig) -> SyncAdmissionController {
    SyncAdmissionController::new(config, store, Arc::new(LogUplink))
}

#[test]
fn deferred_event_is_forwarded_once_the_budget_refills() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn EventStore> =
        Arc::new(SledEventStore::open(dir.path().join(EVENT_DB_DIR)).unwrap());
    let sync = controller(
        Arc::clone(&store),
        SyncConfig {
            high_min_gap_secs: 0.05,
            ..SyncConfig::default()
        },
    );
    sync.set_connectivity(ConnectivityState::Intermittent);

    let first = high_event();
    let second = high_event();
    assert_eq!(sync.on_risk_scored_event(&first), SyncDecision::Allowed);
    assert_eq!(sync.on_risk_scored_event(&second), SyncDecision::Deferred);

    // budget still exhausted: stays queued
    assert_eq!(sync.retry_deferred(), 0);
    assert_eq!(sync.deferred_ids().len(), 1);

    std::thread::sleep(Duration::from_millis(80));
    assert_eq!(sync.retry_deferred(), 1);
    assert!(sync.deferred_ids().is_empty());
    assert!(store.get(&second.event_id).unwrap().unwrap().synced);
    assert!(store.pending_sync(10).unwrap().is_empty());
}

#[test]
fn offline_link_holds_the_queue() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn EventStore> =
        Arc::new(SledEventStore::open(dir.path().join(EVENT_DB_DIR)).unwrap());
    let sync = controller(Arc::clone(&store), SyncConfig::default());
    sync.set_connectivity(ConnectivityState::Intermittent);

    sync.on_risk_scored_event(&high_event());
    let deferred = high_event();
    assert_eq!(sync.on_risk_scored_event(&deferred), SyncDecision::Deferred);

    sync.set_connectivity(ConnectivityState::Offline);
    assert_eq!(sync.retry_deferred(), 0);
    assert_eq!(sync.deferred_ids(), vec![deferred.event_id]);
}

#[test]
fn redrive_disabled_drops_deferred_events() {
    let store: Arc<dyn EventStore> = Arc::new(oceanviewer::InMemoryEventStore::new());
    let sync = controller(
        store,
        SyncConfig {
            redrive_deferred: false,
            ..SyncConfig::default()
        },
    );
    sync.set_connectivity(ConnectivityState::Online);

    assert_eq!(sync.on_risk_scored_event(&high_event()), SyncDecision::Allowed);
    assert_eq!(sync.on_risk_scored_event(&high_event()), SyncDecision::Deferred);
    assert!(sync.deferred_ids().is_empty());
    assert_eq!(sync.retry_deferred(), 0);
}

#[test]
fn queue_is_bounded_oldest_first_out() {
    let store: Arc<dyn EventStore> = Arc::new(oceanviewer::InMemoryEventStore::new());
    let sync = controller(
        store,
        SyncConfig {
            max_deferred: 3,
            ..SyncConfig::default()
        },
    );
    sync.set_connectivity(ConnectivityState::Online);
    sync.on_risk_scored_event(&high_event());

    let ids: Vec<String> = (0..5)
        .map(|_| {
            let e = high_event();
            assert_eq!(sync.on_risk_scored_event(&e), SyncDecision::Deferred);
            e.event_id
        })
        .collect();
    assert_eq!(sync.deferred_ids(), ids[2..].to_vec());
}
