//! Producer loops
//!
//! Each loop observes the cancellation token at the top of every iteration
//! and while sleeping, and returns its `TaskName` on a clean stop so the
//! supervisor can log who finished.

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::NodeCoordinator;
use crate::acquisition::{ConnectivityProbe, DetectionSource};
use crate::resources::ResourceProbe;
use crate::types::Strategy;

/// Identifies a producer task in the supervisor's `JoinSet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskName {
    Detection,
    Connectivity,
    Maintenance,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::Detection => write!(f, "Detection"),
            TaskName::Connectivity => write!(f, "Connectivity"),
            TaskName::Maintenance => write!(f, "Maintenance"),
        }
    }
}

/// Pull frames from `source`, paced by the current strategy's frame rate.
///
/// The frame counter increments before each inference. The strategy is read
/// lock-free from the controller's shared handle and pushed into the source
/// whenever it changes. The handle holds the controller's strategy from
/// construction on, so the source's own starting rate only lasts until the
/// first iteration.
pub async fn run_detection_loop<S: DetectionSource>(
    mut source: S,
    node: Arc<NodeCoordinator>,
    cancel_token: CancellationToken,
) -> Result<TaskName> {
    let shared = node.strategy().shared_strategy();
    let mut frame_id = node.config().detection.initial_frame_id;
    let mut applied: Option<Strategy> = None;

    info!(source = source.source_name(), frame_id, "[Detection] Loop starting");

    loop {
        if cancel_token.is_cancelled() {
            break;
        }

        let strategy = **shared.load();
        if applied != Some(strategy) {
            source.apply_strategy(&strategy);
            applied = Some(strategy);
        }

        frame_id += 1;
        let result = tokio::select! {
            _ = cancel_token.cancelled() => break,
            result = source.next_frame() => result,
        };
        let detections = result
            .with_context(|| format!("{} source failed at frame {frame_id}", source.source_name()))?;
        node.ingest_frame(frame_id, &detections);

        let interval = Duration::from_secs_f64(strategy.frame_interval_secs());
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    info!(last_frame_id = frame_id, "[Detection] Shutdown signal received");
    Ok(TaskName::Detection)
}

/// Probe the uplink once per `connectivity.probe_interval_ms`.
pub async fn run_connectivity_loop<P: ConnectivityProbe>(
    mut probe: P,
    node: Arc<NodeCoordinator>,
    cancel_token: CancellationToken,
) -> Result<TaskName> {
    let interval = Duration::from_millis(node.config().connectivity.probe_interval_ms.max(1));
    info!(probe = probe.probe_name(), interval_ms = interval.as_millis() as u64, "[Connectivity] Loop starting");

    loop {
        if cancel_token.is_cancelled() {
            break;
        }

        let success = tokio::select! {
            _ = cancel_token.cancelled() => break,
            success = probe.probe() => success,
        };
        node.ingest_probe(success);

        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    info!("[Connectivity] Shutdown signal received");
    Ok(TaskName::Connectivity)
}

/// Periodic housekeeping: resource check, deferred re-drive, and the
/// evidence retention sweep.
pub async fn run_maintenance_loop(
    resources: Arc<dyn ResourceProbe>,
    node: Arc<NodeCoordinator>,
    cancel_token: CancellationToken,
) -> Result<TaskName> {
    let check_every = Duration::from_secs(node.config().resources.check_interval_secs.max(1));
    let sweep_every = Duration::from_secs(node.config().storage.retention_sweep_interval_secs.max(1));
    let retention_days = node.config().storage.evidence_retention_days;
    let retention = chrono::Duration::try_days(retention_days)
        .with_context(|| format!("evidence retention of {retention_days} days is out of range"))?;
    let mut ticker = tokio::time::interval(check_every);
    let mut last_sweep: Option<Instant> = None;

    info!(interval_secs = check_every.as_secs(), "[Maintenance] Loop starting");

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if let Err(e) = node.strategy().check_resources(resources.as_ref()) {
            warn!(error = %e, "[Maintenance] Resource check failed");
        }

        let synced = node.sync().retry_deferred();
        if synced > 0 {
            info!(synced, "[Maintenance] Deferred events forwarded");
        }

        if last_sweep.map_or(true, |t| t.elapsed() >= sweep_every) {
            last_sweep = Some(Instant::now());
            match Utc::now().checked_sub_signed(retention) {
                Some(cutoff) => match node.store().prune_evidence_before(cutoff) {
                    Ok(0) => {}
                    Ok(pruned) => info!(pruned, "[Maintenance] Expired evidence released"),
                    Err(e) => warn!(error = %e, "[Maintenance] Retention sweep failed"),
                },
                None => warn!(retention_days, "[Maintenance] Retention cutoff out of range, sweep skipped"),
            }
        }
    }

    info!("[Maintenance] Shutdown signal received");
    Ok(TaskName::Maintenance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::{SimulatedDetector, SimulatedProbe};
    use crate::config::NodeConfig;
    use crate::resources::FixedResources;
    use crate::storage::InMemoryEventStore;
    use crate::types::{ConnectivityState, Detection};
    use crate::uplink::LogUplink;
    use std::sync::Mutex;

    /// Records applied strategies and stops the loop after one frame.
    struct OneShotSource {
        applied: Arc<Mutex<Vec<Strategy>>>,
        stop: CancellationToken,
    }

    #[async_trait::async_trait]
    impl DetectionSource for OneShotSource {
        async fn next_frame(&mut self) -> Result<Vec<Detection>> {
            self.stop.cancel();
            Ok(Vec::new())
        }

        fn apply_strategy(&mut self, strategy: &Strategy) {
            self.applied.lock().unwrap().push(*strategy);
        }

        fn source_name(&self) -> &str {
            "one_shot"
        }
    }

    fn node(config: NodeConfig) -> Arc<NodeCoordinator> {
        Arc::new(NodeCoordinator::new(
            config,
            Arc::new(InMemoryEventStore::new()),
            Arc::new(LogUplink),
        ))
    }

    #[tokio::test]
    async fn loops_stop_on_cancel() {
        let node = node(NodeConfig::default());
        let token = CancellationToken::new();
        token.cancel();

        let detector = SimulatedDetector::seeded(&node.config().detection, 1).unwrap();
        let probe = SimulatedProbe::seeded(0.3, 1).unwrap();
        let resources: Arc<dyn ResourceProbe> = Arc::new(FixedResources {
            storage_free_percent: 50.0,
            battery_percent: None,
        });

        assert_eq!(
            run_detection_loop(detector, Arc::clone(&node), token.clone()).await.unwrap(),
            TaskName::Detection
        );
        assert_eq!(
            run_connectivity_loop(probe, Arc::clone(&node), token.clone()).await.unwrap(),
            TaskName::Connectivity
        );
        assert_eq!(
            run_maintenance_loop(resources, node, token).await.unwrap(),
            TaskName::Maintenance
        );
    }

    #[tokio::test]
    async fn node_strategy_reaches_source_before_first_frame() {
        let node = node(NodeConfig::default());
        let token = CancellationToken::new();
        let applied = Arc::new(Mutex::new(Vec::new()));
        let source = OneShotSource {
            applied: Arc::clone(&applied),
            stop: token.clone(),
        };

        let finished = run_detection_loop(source, Arc::clone(&node), token).await.unwrap();
        assert_eq!(finished, TaskName::Detection);
        assert_eq!(*applied.lock().unwrap(), vec![node.strategy().current()]);
    }

    #[tokio::test]
    async fn unrepresentable_retention_stops_maintenance() {
        let mut config = NodeConfig::default();
        config.storage.evidence_retention_days = i64::MAX;
        let resources: Arc<dyn ResourceProbe> = Arc::new(FixedResources {
            storage_free_percent: 50.0,
            battery_percent: None,
        });
        let result = run_maintenance_loop(resources, node(config), CancellationToken::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn healthy_probe_brings_link_online() {
        let mut config = NodeConfig::default();
        config.connectivity.probe_interval_ms = 1;
        let node = node(config);
        let token = CancellationToken::new();
        let probe = SimulatedProbe::seeded(1.0, 1).unwrap();

        let task = tokio::spawn(run_connectivity_loop(probe, Arc::clone(&node), token.clone()));
        for _ in 0..200 {
            if node.connectivity().status() == ConnectivityState::Online {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        token.cancel();
        task.await.unwrap().unwrap();

        assert_eq!(node.connectivity().status(), ConnectivityState::Online);
        assert_eq!(node.sync().connectivity(), ConnectivityState::Online);
    }
}
