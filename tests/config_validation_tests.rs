//! Config Validation Tests
//!
//! Typo detection and range validation, exercised independently from the
//! rest of the node.

use oceanviewer::config::validation::{
    known_config_keys, suggest_correction, validate_ranges, validate_unknown_keys,
};
use oceanviewer::config::{ConfigError, NodeConfig};

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_tracking_key_warns_with_suggestion() {
    let toml_str = r#"
[tracking]
match_radius_pix = 60.0
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("match_radius_pix"));
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("tracking.match_radius_px")
    );
}

#[test]
fn typo_in_node_section_warns() {
    let toml_str = r#"
[node]
sytem_id = "OV_NODE_007"
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].suggestion.as_deref(), Some("node.system_id"));
}

#[test]
fn valid_config_produces_zero_warnings() {
    let toml_str = r#"
[node]
system_id = "OV_NODE_007"
data_dir = "/var/lib/oceanviewer"

[connectivity]
probe_target = "10.0.0.1:443"
online_ratio = 0.85

[sync]
high_min_gap_secs = 3.0
redrive_deferred = false

[alerts]
cooldown_secs = 30.0
"#;
    assert!(validate_unknown_keys(toml_str).is_empty());
    let config = NodeConfig::from_toml_str(toml_str).unwrap();
    assert_eq!(config.node.system_id, "OV_NODE_007");
    assert_eq!(config.connectivity.probe_target.as_deref(), Some("10.0.0.1:443"));
    assert!(!config.sync.redrive_deferred);
}

#[test]
fn wildly_wrong_key_has_no_suggestion() {
    let known = known_config_keys();
    assert!(suggest_correction("completely.unrelated.thing", &known).is_none());
}

#[test]
fn unknown_section_does_not_break_loading() {
    let config = NodeConfig::from_toml_str(
        r#"
[dashboard]
port = 8080
"#,
    )
    .unwrap();
    assert_eq!(config, NodeConfig::default());
}

// ============================================================================
// Range Validation
// ============================================================================

#[test]
fn defaults_pass_range_validation() {
    let (errors, warnings) = validate_ranges(&NodeConfig::default());
    assert!(errors.is_empty(), "{errors:?}");
    assert!(warnings.is_empty());
}

#[test]
fn ratio_outside_unit_interval_is_rejected() {
    let err = NodeConfig::from_toml_str(
        r#"
[connectivity]
online_ratio = 1.4
"#,
    )
    .unwrap_err();
    match err {
        ConfigError::Validation(errors) => {
            assert_eq!(errors.len(), 1);
            assert!(errors[0].contains("connectivity.online_ratio"));
        }
        other => panic!("expected validation error, got {other}"),
    }
}

#[test]
fn zero_window_and_negative_gap_are_rejected() {
    let mut config = NodeConfig::default();
    config.connectivity.window_size = 0;
    config.sync.standard_min_gap_secs = -1.0;
    let (errors, _) = validate_ranges(&config);
    assert_eq!(errors.len(), 2, "{errors:?}");
}

#[test]
fn infinite_gaps_are_rejected() {
    let err = NodeConfig::from_toml_str(
        r#"
[sync]
high_min_gap_secs = inf

[alerts]
cooldown_secs = inf
"#,
    )
    .unwrap_err();
    match err {
        ConfigError::Validation(errors) => {
            assert_eq!(errors.len(), 2, "{errors:?}");
            assert!(errors[0].contains("sync.high_min_gap_secs"));
            assert!(errors[1].contains("alerts.cooldown_secs"));
        }
        other => panic!("expected validation error, got {other}"),
    }
}

#[test]
fn retention_days_are_bounded() {
    let mut config = NodeConfig::default();
    config.storage.evidence_retention_days = 36_500;
    assert!(validate_ranges(&config).0.is_empty());

    config.storage.evidence_retention_days = i64::MAX;
    let (errors, _) = validate_ranges(&config);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("storage.evidence_retention_days"));
}

#[test]
fn confirmation_window_larger_than_history_is_rejected() {
    let mut config = NodeConfig::default();
    config.tracking.history_capacity = 3;
    assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
}

#[test]
fn optimistic_hysteresis_only_warns() {
    let mut config = NodeConfig::default();
    config.connectivity.recovery_successes = 2;
    let (errors, warnings) = validate_ranges(&config);
    assert!(errors.is_empty());
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].field, "connectivity.recovery_successes");
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let err = NodeConfig::from_toml_str("[sync\nmax_deferred = ").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(..)));
}
