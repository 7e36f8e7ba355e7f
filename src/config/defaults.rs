//! System-wide default constants.
//!
//! Centralises magic numbers used by the `Default` impls in `node_config.rs`.
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Node
// ============================================================================

/// Identifier stamped into logs and event metadata.
pub const SYSTEM_ID: &str = "OV_NODE_001";

/// Default data directory (event store, lock file).
pub const DATA_DIR: &str = "./data";

// ============================================================================
// Connectivity Classifier
// ============================================================================

/// Sliding window of probe outcomes.
pub const PROBE_WINDOW: usize = 10;

/// Consecutive successes required to leave OFFLINE.
pub const RECOVERY_CONSECUTIVE_SUCCESSES: u32 = 8;

/// Consecutive failures that force OFFLINE.
pub const OFFLINE_CONSECUTIVE_FAILURES: u32 = 5;

/// Success ratio over the window above which the link counts as ONLINE.
pub const ONLINE_SUCCESS_RATIO: f64 = 0.90;

/// Probe cadence (milliseconds).
pub const PROBE_INTERVAL_MS: u64 = 1_000;

/// TCP connect timeout for the real probe (milliseconds).
pub const PROBE_TIMEOUT_MS: u64 = 800;

/// Success probability of the simulated probe (poor satellite link).
pub const SIMULATED_PROBE_SUCCESS_RATE: f64 = 0.3;

// ============================================================================
// Track Confirmer
// ============================================================================

/// Maximum centre distance (pixels) for an observation to join a track.
pub const TRACK_MATCH_RADIUS_PX: f64 = 50.0;

/// A track unseen for longer than this is dropped (seconds).
pub const TRACK_DROPOUT_SECS: f64 = 2.0;

/// Motion-vector variance above which a track is considered noise.
pub const MOTION_CHAOS_VARIANCE: f64 = 5.0;

/// Observations retained per track.
pub const TRACK_HISTORY_CAPACITY: usize = 20;

/// Confirmation frames used until the first strategy arrives.
pub const DEFAULT_CONFIRMATION_FRAMES: usize = 4;

// ============================================================================
// Risk Classifier
// ============================================================================

/// Bounding-box width (pixels) treated as close proximity.
pub const PROXIMITY_WIDTH_PX: f64 = 150.0;

/// Vertical motion below this means the target is retreating.
pub const RETREAT_DY: f64 = -1.0;

/// Vertical motion above this means a distant target is closing fast.
pub const CLOSING_FAST_DY: f64 = 5.0;

/// HIGH risk needs at least this much event confidence.
pub const MIN_HIGH_RISK_CONFIDENCE: f64 = 0.6;

/// Uncertainty floor applied when the heuristic flags its own output.
pub const HEURISTIC_UNCERTAINTY_FLOOR: f64 = 0.5;

// ============================================================================
// Strategy Controller
// ============================================================================

/// Battery percentage below which the node enters CRITICAL_POWER.
pub const CRITICAL_BATTERY_PERCENT: f64 = 20.0;

/// Uncertainty above which the node stops chasing risk.
pub const UNCERTAINTY_CEILING: f64 = 0.7;

// ============================================================================
// Sync Admission
// ============================================================================

/// Minimum gap between HIGH-priority forwards on an intermittent link (seconds).
pub const HIGH_PRIORITY_MIN_GAP_SECS: f64 = 2.0;

/// Minimum gap between standard forwards on an online link (seconds).
pub const STANDARD_PRIORITY_MIN_GAP_SECS: f64 = 0.5;

/// Deferred event ids kept for re-drive.
pub const MAX_DEFERRED_EVENTS: usize = 100;

// ============================================================================
// Alerts
// ============================================================================

/// Identical alerts are suppressed inside this window (seconds).
pub const ALERT_COOLDOWN_SECS: f64 = 10.0;

// ============================================================================
// Resources
// ============================================================================

/// Periodic resource check cadence (seconds).
pub const RESOURCE_CHECK_INTERVAL_SECS: u64 = 1;

/// Free storage percentage below which a resource warning is published.
pub const LOW_STORAGE_PERCENT: f64 = 10.0;

/// Battery level assumed when no gauge is available.
pub const FALLBACK_BATTERY_PERCENT: f64 = 100.0;

// ============================================================================
// Detection Source
// ============================================================================

/// Frame rate before the first strategy update arrives.
pub const INITIAL_FRAME_RATE: u32 = 3;

/// First frame counter value.
pub const INITIAL_FRAME_ID: u64 = 100_000;

/// Probability per idle frame that the simulator spawns a target.
pub const SIMULATED_SPAWN_PROBABILITY: f64 = 0.2;

/// Frames a simulated target stays in view.
pub const SIMULATED_TARGET_LIFE: u32 = 15;

// ============================================================================
// Storage Retention
// ============================================================================

/// Evidence of non-critical events is kept this long (days).
pub const EVIDENCE_RETENTION_DAYS: i64 = 7;

/// Upper bound accepted for `storage.evidence_retention_days` (100 years).
pub const MAX_EVIDENCE_RETENTION_DAYS: i64 = 36_500;

/// How often the retention sweep runs (seconds).
pub const RETENTION_SWEEP_INTERVAL_SECS: u64 = 3_600;
