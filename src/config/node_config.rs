//! Node Configuration - every tunable of the decision core as TOML values
//!
//! Each struct implements `Default` with the values from `defaults.rs`, so
//! a node with no config file behaves exactly like a stock deployment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;

/// Environment variable pointing at a config file.
pub const CONFIG_ENV_VAR: &str = "OCEANVIEWER_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "node_config.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a monitoring node.
///
/// Load with `NodeConfig::load()` which searches:
/// 1. `$OCEANVIEWER_CONFIG` env var
/// 2. `./node_config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct NodeConfig {
    #[serde(default)]
    pub node: NodeInfo,
    #[serde(default)]
    pub connectivity: ConnectivityConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub resources: ResourceConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl NodeConfig {
    /// Load configuration using the standard search order:
    /// 1. `$OCEANVIEWER_CONFIG` environment variable
    /// 2. `./node_config.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), system_id = %config.node.system_id, "Loaded node config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(system_id = %config.node.system_id, "Loaded node config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document. Unknown keys only warn.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject impossible values. Suspicious-but-legal values only warn.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (errors, warnings) = super::validation::validate_ranges(self);
        for w in &warnings {
            warn!("{}", w);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Serialize back to TOML (used to write a starter config).
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Node identification and data location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeInfo {
    #[serde(default = "default_system_id")]
    pub system_id: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_system_id() -> String {
    defaults::SYSTEM_ID.to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(defaults::DATA_DIR)
}

impl Default for NodeInfo {
    fn default() -> Self {
        Self {
            system_id: default_system_id(),
            data_dir: default_data_dir(),
        }
    }
}

/// Hysteresis thresholds and probe settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConnectivityConfig {
    pub window_size: usize,
    pub recovery_successes: u32,
    pub offline_failures: u32,
    pub online_ratio: f64,
    pub probe_interval_ms: u64,
    pub probe_timeout_ms: u64,
    /// `host:port` for the TCP probe; the simulated probe is used when unset
    pub probe_target: Option<String>,
    pub simulated_success_rate: f64,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            window_size: defaults::PROBE_WINDOW,
            recovery_successes: defaults::RECOVERY_CONSECUTIVE_SUCCESSES,
            offline_failures: defaults::OFFLINE_CONSECUTIVE_FAILURES,
            online_ratio: defaults::ONLINE_SUCCESS_RATIO,
            probe_interval_ms: defaults::PROBE_INTERVAL_MS,
            probe_timeout_ms: defaults::PROBE_TIMEOUT_MS,
            probe_target: None,
            simulated_success_rate: defaults::SIMULATED_PROBE_SUCCESS_RATE,
        }
    }
}

/// Multi-frame track confirmation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrackingConfig {
    pub match_radius_px: f64,
    pub dropout_secs: f64,
    pub chaos_variance: f64,
    pub history_capacity: usize,
    pub default_confirmation_frames: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            match_radius_px: defaults::TRACK_MATCH_RADIUS_PX,
            dropout_secs: defaults::TRACK_DROPOUT_SECS,
            chaos_variance: defaults::MOTION_CHAOS_VARIANCE,
            history_capacity: defaults::TRACK_HISTORY_CAPACITY,
            default_confirmation_frames: defaults::DEFAULT_CONFIRMATION_FRAMES,
        }
    }
}

/// Risk heuristic thresholds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RiskConfig {
    pub proximity_width_px: f64,
    pub retreat_dy: f64,
    pub closing_fast_dy: f64,
    pub min_high_confidence: f64,
    pub heuristic_uncertainty_floor: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            proximity_width_px: defaults::PROXIMITY_WIDTH_PX,
            retreat_dy: defaults::RETREAT_DY,
            closing_fast_dy: defaults::CLOSING_FAST_DY,
            min_high_confidence: defaults::MIN_HIGH_RISK_CONFIDENCE,
            heuristic_uncertainty_floor: defaults::HEURISTIC_UNCERTAINTY_FLOOR,
        }
    }
}

/// Priority cascade thresholds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StrategyConfig {
    pub critical_battery_percent: f64,
    pub uncertainty_ceiling: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            critical_battery_percent: defaults::CRITICAL_BATTERY_PERCENT,
            uncertainty_ceiling: defaults::UNCERTAINTY_CEILING,
        }
    }
}

/// Uplink admission control
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    pub high_min_gap_secs: f64,
    pub standard_min_gap_secs: f64,
    /// Re-evaluate deferred events from the maintenance loop
    pub redrive_deferred: bool,
    pub max_deferred: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            high_min_gap_secs: defaults::HIGH_PRIORITY_MIN_GAP_SECS,
            standard_min_gap_secs: defaults::STANDARD_PRIORITY_MIN_GAP_SECS,
            redrive_deferred: true,
            max_deferred: defaults::MAX_DEFERRED_EVENTS,
        }
    }
}

/// Alert deduplication
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlertConfig {
    pub cooldown_secs: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: defaults::ALERT_COOLDOWN_SECS,
        }
    }
}

/// Periodic resource check
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResourceConfig {
    pub check_interval_secs: u64,
    pub low_storage_percent: f64,
    /// Fixed battery reading; when unset the system gauge is read
    pub battery_percent_override: Option<f64>,
    pub fallback_battery_percent: f64,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: defaults::RESOURCE_CHECK_INTERVAL_SECS,
            low_storage_percent: defaults::LOW_STORAGE_PERCENT,
            battery_percent_override: None,
            fallback_battery_percent: defaults::FALLBACK_BATTERY_PERCENT,
        }
    }
}

/// Detection source stand-in
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectionConfig {
    pub initial_frame_rate: u32,
    pub initial_frame_id: u64,
    pub simulated_spawn_probability: f64,
    pub simulated_target_life: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            initial_frame_rate: defaults::INITIAL_FRAME_RATE,
            initial_frame_id: defaults::INITIAL_FRAME_ID,
            simulated_spawn_probability: defaults::SIMULATED_SPAWN_PROBABILITY,
            simulated_target_life: defaults::SIMULATED_TARGET_LIFE,
        }
    }
}

/// Local retention
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub evidence_retention_days: i64,
    pub retention_sweep_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            evidence_retention_days: defaults::EVIDENCE_RETENTION_DAYS,
            retention_sweep_interval_secs: defaults::RETENTION_SWEEP_INTERVAL_SECS,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, std::io::Error),
    #[error("Config parse error ({}): {}", .0.display(), .1)]
    Parse(PathBuf, toml::de::Error),
    #[error("Config serialization error: {0}")]
    Serialize(toml::ser::Error),
    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        NodeConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = NodeConfig::from_toml_str(
            r#"
[sync]
high_min_gap_secs = 3.0
"#,
        )
        .unwrap();
        assert_eq!(config.sync.high_min_gap_secs, 3.0);
        assert_eq!(config.sync.standard_min_gap_secs, defaults::STANDARD_PRIORITY_MIN_GAP_SECS);
        assert_eq!(config.connectivity, ConnectivityConfig::default());
    }

    #[test]
    fn toml_roundtrip_of_defaults() {
        let config = NodeConfig::default();
        let text = config.to_toml_string().unwrap();
        let back = NodeConfig::from_toml_str(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn load_from_missing_file_is_io_error() {
        let err = NodeConfig::load_from_file(Path::new("/nonexistent/node_config.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io(..)));
    }
}
