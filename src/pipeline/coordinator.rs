//! Node Coordinator - builds the bus and wires every agent onto it

use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};

use crate::agents::{
    AlertNotifier, ConnectivityClassifier, RiskClassifier, StrategyController, TrackConfirmer,
};
use crate::bus::{BusMessage, Dispatcher};
use crate::config::NodeConfig;
use crate::storage::EventStore;
use crate::types::{Detection, Observation};
use crate::uplink::{SyncAdmissionController, Uplink};
use crate::DECISION_LOG_TARGET;

/// Owns the dispatcher and the agents attached to it.
///
/// Producers hold an `Arc<NodeCoordinator>` and push their readings through
/// it; everything downstream happens inside that call.
pub struct NodeCoordinator {
    config: NodeConfig,
    bus: Arc<Dispatcher>,
    connectivity: ConnectivityClassifier,
    confirmer: Arc<TrackConfirmer>,
    risk: Arc<RiskClassifier>,
    alerts: Arc<AlertNotifier>,
    sync: Arc<SyncAdmissionController>,
    strategy: Arc<StrategyController>,
    store: Arc<dyn EventStore>,
}

impl NodeCoordinator {
    /// Build and attach all agents, then broadcast the initial strategy so
    /// the confirmer starts with the right confirmation window.
    pub fn new(config: NodeConfig, store: Arc<dyn EventStore>, uplink: Arc<dyn Uplink>) -> Self {
        info!(
            system_id = %config.node.system_id,
            store = store.backend_name(),
            uplink = uplink.name(),
            "Initializing node coordinator"
        );
        let bus = Arc::new(Dispatcher::new());

        let connectivity =
            ConnectivityClassifier::new(config.connectivity.clone(), Arc::clone(&bus));
        let confirmer = Arc::new(TrackConfirmer::new(config.tracking.clone(), Arc::clone(&bus)));
        let risk = Arc::new(RiskClassifier::new(config.risk.clone(), Arc::clone(&bus)));
        let alerts = Arc::new(AlertNotifier::new(&config.alerts, Arc::clone(&bus)));
        let sync = Arc::new(SyncAdmissionController::new(
            config.sync.clone(),
            Arc::clone(&store),
            uplink,
        ));
        let strategy = Arc::new(StrategyController::new(
            config.strategy.clone(),
            &config.resources,
            Arc::clone(&bus),
        ));

        confirmer.attach(&bus);
        risk.attach(&bus);
        alerts.attach(&bus);
        sync.attach(&bus);
        strategy.attach(&bus);
        strategy.reevaluate(true);

        Self {
            config,
            bus,
            connectivity,
            confirmer,
            risk,
            alerts,
            sync,
            strategy,
            store,
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn bus(&self) -> &Arc<Dispatcher> {
        &self.bus
    }

    pub fn connectivity(&self) -> &ConnectivityClassifier {
        &self.connectivity
    }

    pub fn confirmer(&self) -> &Arc<TrackConfirmer> {
        &self.confirmer
    }

    pub fn risk(&self) -> &Arc<RiskClassifier> {
        &self.risk
    }

    pub fn alerts(&self) -> &Arc<AlertNotifier> {
        &self.alerts
    }

    pub fn sync(&self) -> &Arc<SyncAdmissionController> {
        &self.sync
    }

    pub fn strategy(&self) -> &Arc<StrategyController> {
        &self.strategy
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    /// Feed one inference frame into the bus.
    ///
    /// Non-empty frames are logged as a detection batch; the first detection
    /// is promoted to an Observation and published. Returns what was
    /// published.
    pub fn ingest_frame(&self, frame_id: u64, detections: &[Detection]) -> Option<Observation> {
        let first = detections.first()?;

        match serde_json::to_string(detections) {
            Ok(batch) => info!(
                target: DECISION_LOG_TARGET,
                kind = "detection_batch",
                frame_id,
                detections = %batch,
                "detections"
            ),
            Err(e) => error!(frame_id, error = %e, "Failed to serialize detection batch"),
        }

        let observation = Observation::from_detection(first, frame_id, Utc::now());
        self.bus.publish(BusMessage::Detection(observation.clone()));
        Some(observation)
    }

    /// Feed one probe outcome into the connectivity classifier.
    pub fn ingest_probe(&self, success: bool) {
        self.connectivity.record_probe(success);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Topic;
    use crate::storage::InMemoryEventStore;
    use crate::types::{BoundingBox, DetectionLabel, MotionVector};
    use crate::uplink::LogUplink;

    fn coordinator() -> NodeCoordinator {
        NodeCoordinator::new(
            NodeConfig::default(),
            Arc::new(InMemoryEventStore::new()),
            Arc::new(LogUplink),
        )
    }

    #[test]
    fn every_agent_is_subscribed() {
        let node = coordinator();
        let bus = node.bus();
        assert_eq!(bus.subscriber_count(Topic::Detection), 1);
        assert_eq!(bus.subscriber_count(Topic::StrategyUpdate), 1);
        assert_eq!(bus.subscriber_count(Topic::ConfirmedEvent), 1);
        assert_eq!(bus.subscriber_count(Topic::RiskAssessment), 2);
        assert_eq!(bus.subscriber_count(Topic::RiskScoredEvent), 1);
        assert_eq!(bus.subscriber_count(Topic::ConnectivityChanged), 2);
    }

    #[test]
    fn initial_strategy_reaches_confirmer() {
        let node = coordinator();
        // offline at start: conservative cascade branch
        assert_eq!(
            node.confirmer().confirmation_frames(),
            node.strategy().current().confirmation_frames
        );
        assert_eq!(node.strategy().current().frame_rate, 5);
    }

    #[test]
    fn empty_frame_publishes_nothing() {
        let node = coordinator();
        assert!(node.ingest_frame(100_001, &[]).is_none());
        assert_eq!(node.confirmer().track_count(), 0);
    }

    #[test]
    fn first_detection_is_published() {
        let node = coordinator();
        let detections = [
            Detection {
                category: DetectionLabel::LargeMarineLife,
                confidence: 0.9,
                bbox: BoundingBox::new(100.0, 100.0, 260.0, 260.0),
                motion: MotionVector::new(2.0, 2.0),
                image_path: None,
            },
            Detection {
                category: DetectionLabel::NonLivingObject,
                confidence: 0.4,
                bbox: BoundingBox::new(400.0, 400.0, 420.0, 420.0),
                motion: MotionVector::default(),
                image_path: None,
            },
        ];
        let obs = node.ingest_frame(100_001, &detections).unwrap();
        assert_eq!(obs.category, DetectionLabel::LargeMarineLife);
        assert_eq!(obs.frame_id, 100_001);
        assert_eq!(node.confirmer().track_count(), 1);
    }
}
