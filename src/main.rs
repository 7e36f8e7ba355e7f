//! OceanViewer - offshore monitoring node
//!
//! # Usage
//!
//! ```bash
//! # Simulated detector and simulated satellite link
//! cargo run --release
//!
//! # Probe a real uplink endpoint, JSON logs for the shore collector
//! ./oceanviewer --probe-target 10.0.0.1:443 --log-format json
//!
//! # Bench run with a fixed battery reading and a fresh event store
//! ./oceanviewer --battery 15 --reset-db --data-dir /tmp/ov
//! ```
//!
//! # Environment Variables
//!
//! - `OCEANVIEWER_CONFIG`: path to a node_config.toml
//! - `RUST_LOG`: logging filter (default: info)
//! - `RESET_DB`: set to "true" to wipe the event store on startup

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use oceanviewer::acquisition::{SimulatedDetector, SimulatedProbe, TcpProbe};
use oceanviewer::config::NodeConfig;
use oceanviewer::pipeline::{
    run_connectivity_loop, run_detection_loop, run_maintenance_loop, NodeCoordinator, TaskName,
};
use oceanviewer::resources::{ResourceProbe, SystemResources};
use oceanviewer::storage::{EventStore, ProcessLock, SledEventStore, EVENT_DB_DIR};
use oceanviewer::uplink::{LogUplink, Uplink};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "oceanviewer")]
#[command(about = "OceanViewer offshore monitoring node")]
#[command(version)]
struct CliArgs {
    /// Path to a node_config.toml (overrides the standard search order)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Data directory for the event store and lock file
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,

    /// Probe this uplink endpoint with TCP connects instead of simulating
    #[arg(long, value_name = "HOST:PORT")]
    probe_target: Option<String>,

    /// Fixed battery percentage (bench runs without a gauge)
    #[arg(long, value_name = "PERCENT")]
    battery: Option<f64>,

    /// Wipe the event store before starting.
    /// Can also be set via RESET_DB=true environment variable.
    #[arg(long)]
    reset_db: bool,

    /// Skip the single-instance lock on the data directory
    #[arg(long)]
    no_lock: bool,
}

// ============================================================================
// Setup helpers
// ============================================================================

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .flatten_event(true)
            .with_env_filter(filter)
            .init(),
    }
}

fn load_config(args: &CliArgs) -> Result<NodeConfig> {
    let mut config = match &args.config {
        Some(path) => NodeConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => NodeConfig::load(),
    };

    if let Some(dir) = &args.data_dir {
        config.node.data_dir = dir.clone();
    }
    if let Some(target) = &args.probe_target {
        config.connectivity.probe_target = Some(target.clone());
    }
    if let Some(battery) = args.battery {
        config.resources.battery_percent_override = Some(battery);
    }
    config.validate()?;
    Ok(config)
}

/// Check if an event store reset is requested via CLI flag or environment variable.
fn should_reset_db(cli_flag: bool) -> bool {
    if cli_flag {
        return true;
    }
    std::env::var("RESET_DB")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

fn reset_event_store(data_dir: &Path) -> Result<()> {
    let db = data_dir.join(EVENT_DB_DIR);
    if !db.exists() {
        info!(path = %db.display(), "Event store does not exist, nothing to reset");
        return Ok(());
    }
    warn!(path = %db.display(), "RESET_DB requested, wiping event store");
    std::fs::remove_dir_all(&db)
        .with_context(|| format!("Failed to remove {}", db.display()))
}

// ============================================================================
// Supervisor
// ============================================================================

/// Wait for every producer. The first failure cancels the rest.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    let mut failure = None;
    while let Some(result) = task_set.join_next().await {
        match result {
            Ok(Ok(task_name)) => info!("Supervisor: task {} stopped", task_name),
            Ok(Err(e)) => {
                error!("Supervisor: task failed: {:#}", e);
                cancel_token.cancel();
                failure.get_or_insert(e);
            }
            Err(e) => {
                error!("Supervisor: task panicked: {}", e);
                cancel_token.cancel();
                failure.get_or_insert_with(|| anyhow::anyhow!("Task panicked: {}", e));
            }
        }
    }
    failure.map_or(Ok(()), Err)
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.log_format);

    let config = load_config(&args)?;
    let data_dir = config.node.data_dir.clone();
    info!(
        system_id = %config.node.system_id,
        data_dir = %data_dir.display(),
        "OceanViewer node starting"
    );

    let _lock = if args.no_lock {
        warn!("Running without the data directory lock");
        None
    } else {
        Some(ProcessLock::acquire(&data_dir)?)
    };

    if should_reset_db(args.reset_db) {
        reset_event_store(&data_dir)?;
    }

    let store: Arc<dyn EventStore> = Arc::new(
        SledEventStore::open(data_dir.join(EVENT_DB_DIR)).context("Failed to open event store")?,
    );
    info!(events = store.count(), "Event store ready");
    let uplink: Arc<dyn Uplink> = Arc::new(LogUplink);
    let resources: Arc<dyn ResourceProbe> = Arc::new(SystemResources::new(
        &data_dir,
        config.resources.battery_percent_override,
    ));

    let detector = SimulatedDetector::new(&config.detection)?;
    let probe_target = config.connectivity.probe_target.clone();
    let probe_timeout = Duration::from_millis(config.connectivity.probe_timeout_ms);
    let simulated_success_rate = config.connectivity.simulated_success_rate;

    let node = Arc::new(NodeCoordinator::new(config, store, uplink));

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        shutdown_token.cancel();
    });

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();
    task_set.spawn(run_detection_loop(detector, Arc::clone(&node), cancel_token.clone()));
    match probe_target {
        Some(target) => {
            info!(target_addr = %target, "Connectivity: TCP probe");
            let probe = TcpProbe::new(target, probe_timeout);
            task_set.spawn(run_connectivity_loop(probe, Arc::clone(&node), cancel_token.clone()));
        }
        None => {
            info!(success_rate = simulated_success_rate, "Connectivity: simulated probe");
            let probe = SimulatedProbe::new(simulated_success_rate)?;
            task_set.spawn(run_connectivity_loop(probe, Arc::clone(&node), cancel_token.clone()));
        }
    }
    task_set.spawn(run_maintenance_loop(resources, Arc::clone(&node), cancel_token.clone()));

    run_supervisor(&mut task_set, cancel_token).await?;

    info!(events = node.store().count(), "OceanViewer shutdown complete");
    Ok(())
}
