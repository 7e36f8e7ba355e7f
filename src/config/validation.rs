//! Config validation: unknown-key detection with Levenshtein suggestions
//! and range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Unknown keys never break existing configs.

use std::collections::HashSet;

use super::{defaults, NodeConfig};

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for NodeConfig.
///
/// Maintained by hand to match the struct hierarchy in node_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        "node",
        "node.system_id",
        "node.data_dir",
        "connectivity",
        "connectivity.window_size",
        "connectivity.recovery_successes",
        "connectivity.offline_failures",
        "connectivity.online_ratio",
        "connectivity.probe_interval_ms",
        "connectivity.probe_timeout_ms",
        "connectivity.probe_target",
        "connectivity.simulated_success_rate",
        "tracking",
        "tracking.match_radius_px",
        "tracking.dropout_secs",
        "tracking.chaos_variance",
        "tracking.history_capacity",
        "tracking.default_confirmation_frames",
        "risk",
        "risk.proximity_width_px",
        "risk.retreat_dy",
        "risk.closing_fast_dy",
        "risk.min_high_confidence",
        "risk.heuristic_uncertainty_floor",
        "strategy",
        "strategy.critical_battery_percent",
        "strategy.uncertainty_ceiling",
        "sync",
        "sync.high_min_gap_secs",
        "sync.standard_min_gap_secs",
        "sync.redrive_deferred",
        "sync.max_deferred",
        "alerts",
        "alerts.cooldown_secs",
        "resources",
        "resources.check_interval_secs",
        "resources.low_storage_percent",
        "resources.battery_percent_override",
        "resources.fallback_battery_percent",
        "detection",
        "detection.initial_frame_rate",
        "detection.initial_frame_id",
        "detection.simulated_spawn_probability",
        "detection.simulated_target_life",
        "storage",
        "storage.evidence_retention_days",
        "storage.retention_sweep_interval_secs",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|k| (*k, levenshtein(unknown, k)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by(|(ka, da), (kb, db)| da.cmp(db).then_with(|| ka.cmp(kb)))
        .map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are reported by serde
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Range Validation
// ============================================================================

fn check_unit_interval(value: f64, field: &str, errors: &mut Vec<String>) {
    if !(0.0..=1.0).contains(&value) {
        errors.push(format!("{field} = {value} must be within [0, 1]"));
    }
}

fn check_positive(value: f64, field: &str, errors: &mut Vec<String>) {
    if !(value > 0.0) {
        errors.push(format!("{field} = {value} must be positive"));
    }
}

fn check_gap_secs(value: f64, field: &str, errors: &mut Vec<String>) {
    if !(value.is_finite() && value >= 0.0) {
        errors.push(format!("{field} = {value} must be finite and non-negative"));
    }
}

/// Validate value ranges on a parsed NodeConfig.
///
/// Returns (errors, warnings). Errors are impossible values that must
/// prevent startup; warnings are suspicious but not fatal.
pub fn validate_ranges(config: &NodeConfig) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let c = &config.connectivity;
    if c.window_size == 0 {
        errors.push("connectivity.window_size must be at least 1".to_string());
    }
    if c.recovery_successes == 0 || c.offline_failures == 0 {
        errors.push("connectivity.recovery_successes and offline_failures must be at least 1".to_string());
    }
    check_unit_interval(c.online_ratio, "connectivity.online_ratio", &mut errors);
    check_unit_interval(c.simulated_success_rate, "connectivity.simulated_success_rate", &mut errors);
    if c.probe_interval_ms == 0 {
        errors.push("connectivity.probe_interval_ms must be positive".to_string());
    }
    if c.recovery_successes <= c.offline_failures {
        warnings.push(ValidationWarning {
            field: "connectivity.recovery_successes".to_string(),
            message: format!(
                "connectivity.recovery_successes ({}) <= offline_failures ({}): the link will be judged optimistically",
                c.recovery_successes, c.offline_failures
            ),
            suggestion: None,
        });
    }

    let t = &config.tracking;
    check_positive(t.match_radius_px, "tracking.match_radius_px", &mut errors);
    check_positive(t.dropout_secs, "tracking.dropout_secs", &mut errors);
    check_positive(t.chaos_variance, "tracking.chaos_variance", &mut errors);
    if t.history_capacity == 0 {
        errors.push("tracking.history_capacity must be at least 1".to_string());
    }
    if t.default_confirmation_frames > t.history_capacity {
        errors.push(format!(
            "tracking.default_confirmation_frames ({}) exceeds history_capacity ({}); no track could ever confirm",
            t.default_confirmation_frames, t.history_capacity
        ));
    }

    let r = &config.risk;
    check_positive(r.proximity_width_px, "risk.proximity_width_px", &mut errors);
    check_unit_interval(r.min_high_confidence, "risk.min_high_confidence", &mut errors);
    check_unit_interval(r.heuristic_uncertainty_floor, "risk.heuristic_uncertainty_floor", &mut errors);

    let s = &config.strategy;
    if !(0.0..=100.0).contains(&s.critical_battery_percent) {
        errors.push(format!(
            "strategy.critical_battery_percent = {} must be within [0, 100]",
            s.critical_battery_percent
        ));
    }
    check_unit_interval(s.uncertainty_ceiling, "strategy.uncertainty_ceiling", &mut errors);

    let y = &config.sync;
    check_gap_secs(y.high_min_gap_secs, "sync.high_min_gap_secs", &mut errors);
    check_gap_secs(y.standard_min_gap_secs, "sync.standard_min_gap_secs", &mut errors);
    if y.redrive_deferred && y.max_deferred == 0 {
        warnings.push(ValidationWarning {
            field: "sync.max_deferred".to_string(),
            message: "sync.redrive_deferred is on but max_deferred = 0; nothing will be re-driven".to_string(),
            suggestion: None,
        });
    }

    check_gap_secs(config.alerts.cooldown_secs, "alerts.cooldown_secs", &mut errors);

    let res = &config.resources;
    if res.check_interval_secs == 0 {
        errors.push("resources.check_interval_secs must be positive".to_string());
    }
    if !(0.0..=100.0).contains(&res.low_storage_percent) {
        errors.push(format!(
            "resources.low_storage_percent = {} must be within [0, 100]",
            res.low_storage_percent
        ));
    }
    if let Some(b) = res.battery_percent_override {
        if !(0.0..=100.0).contains(&b) {
            errors.push(format!("resources.battery_percent_override = {b} must be within [0, 100]"));
        }
    }

    let d = &config.detection;
    if d.initial_frame_rate == 0 {
        errors.push("detection.initial_frame_rate must be at least 1".to_string());
    }
    check_unit_interval(d.simulated_spawn_probability, "detection.simulated_spawn_probability", &mut errors);

    let days = config.storage.evidence_retention_days;
    if !(0..=defaults::MAX_EVIDENCE_RETENTION_DAYS).contains(&days) {
        errors.push(format!(
            "storage.evidence_retention_days = {days} must be within [0, {}]",
            defaults::MAX_EVIDENCE_RETENTION_DAYS
        ));
    }

    (errors, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", "abc"), 0);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
    }

    #[test]
    fn walk_collects_nested_paths() {
        let value: toml::Value = "[sync]\nmax_deferred = 5\n".parse().unwrap();
        let keys = walk_toml_keys(&value, "");
        assert_eq!(keys, vec!["sync".to_string(), "sync.max_deferred".to_string()]);
    }

    #[test]
    fn every_default_field_is_a_known_key() {
        let text = toml::to_string(&NodeConfig::default()).unwrap();
        assert!(validate_unknown_keys(&text).is_empty());
    }
}
