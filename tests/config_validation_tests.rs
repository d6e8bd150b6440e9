//! Config Validation Tests
//!
//! Typo detection (unknown keys with suggestions) and registry / range
//! validation, exercised independently from the engine.

use deckwatch::config::validation::{
    known_config_keys, suggest_correction, validate_physical_ranges, validate_unknown_keys,
};
use deckwatch::config::{ConfigError, DeviceSpec, VesselConfig};
use deckwatch::Side;
use std::io::Write;

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_device_key_warns_with_suggestion() {
    let toml_str = r#"
[[devices]]
name = "a_frame"
table = "Ajia_plc_1"
steady_treshold = 69.0
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("steady_treshold"));
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("devices.steady_threshold")
    );
}

#[test]
fn typo_in_data_section_warns() {
    let toml_str = r#"
[data]
dri = "tables"
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].suggestion.as_deref(), Some("data.dir"));
}

#[test]
fn unrelated_key_gets_no_suggestion() {
    let warnings = validate_unknown_keys("[completely_unrelated_section]\nx = 1\n");
    assert!(!warnings.is_empty());
    assert!(warnings.iter().all(|w| w.suggestion.is_none()));
}

#[test]
fn valid_config_produces_zero_warnings() {
    let toml_str = r#"
[vessel]
name = "Research Vessel"

[data]
dir = "database_in_use"
time_column = "csvTime"
timestamp_format = "%Y-%m-%d %H:%M:%S"
unreadable_token = "error"

[audit]
angle_mismatch_tolerance_deg = 5.0

[[devices]]
name = "a_frame"
aliases = ["A架"]
table = "Ajia_plc_1"
current_channels = ["Ajia-3_v", "Ajia-5_v"]
angle_port = "Ajia-1_v"
angle_starboard = "Ajia-0_v"
steady_threshold = 69.0
steady_window = 1

[[devices]]
name = "winch"
table = "device_1_15_meter_115"
power_channel = "1-15-6_v"
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
}

#[test]
fn every_known_key_suggests_itself() {
    let known = known_config_keys();
    for key in &known {
        assert_eq!(suggest_correction(key, &known).as_deref(), Some(*key));
    }
}

// ============================================================================
// Range and Registry Validation
// ============================================================================

#[test]
fn negative_steady_threshold_is_an_error() {
    let mut config = VesselConfig::default();
    config.devices[0].steady_threshold = -1.0;
    let (errors, _) = validate_physical_ranges(&config);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("steady_threshold"));
}

#[test]
fn zero_steady_window_is_an_error() {
    let mut config = VesselConfig::default();
    config.devices[1].steady_window = 0;
    let (errors, _) = validate_physical_ranges(&config);
    assert!(errors.iter().any(|e| e.contains("steady_window")));
}

#[test]
fn duplicate_alias_is_an_error() {
    let mut config = VesselConfig::default();
    config.devices.push(DeviceSpec {
        aliases: vec!["CRANE".to_string()],
        ..DeviceSpec::new("spare_crane", "device_99")
    });
    let (errors, _) = validate_physical_ranges(&config);
    assert!(errors.iter().any(|e| e.contains("CRANE")), "{errors:?}");
}

#[test]
fn three_current_channels_rejected() {
    let toml_str = r#"
[[devices]]
name = "odd"
table = "t"
current_channels = ["a", "b", "c"]
"#;
    match VesselConfig::from_toml_str(toml_str) {
        Err(ConfigError::Validation(errors)) => {
            assert!(errors.iter().any(|e| e.contains("at most 2")));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn device_without_channels_only_warns() {
    let mut config = VesselConfig::default();
    config.devices.push(DeviceSpec::new("placeholder", "t"));
    let (errors, warnings) = validate_physical_ranges(&config);
    assert!(errors.is_empty());
    assert!(warnings.iter().any(|w| w.message.contains("no channels")));
}

#[test]
fn wide_mismatch_tolerance_warns() {
    let mut config = VesselConfig::default();
    config.audit.angle_mismatch_tolerance_deg = 120.0;
    let (errors, warnings) = validate_physical_ranges(&config);
    assert!(errors.is_empty());
    assert_eq!(warnings.len(), 1);
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn partial_file_keeps_default_registry() {
    let config = VesselConfig::from_toml_str("[vessel]\nname = \"Test\"\n").unwrap();
    assert_eq!(config.vessel.name, "Test");
    assert_eq!(config.devices.len(), VesselConfig::default().devices.len());
    assert_eq!(config.data.unreadable_token, "error");
}

#[test]
fn toml_round_trip_preserves_registry() {
    let original = VesselConfig::default();
    let text = original.to_toml().unwrap();
    let parsed = VesselConfig::from_toml_str(&text).unwrap();
    assert_eq!(parsed.devices, original.devices);
    assert_eq!(
        parsed.device("右舷").map(|d| d.name.as_str()),
        None,
        "side labels are not device identifiers"
    );
    assert_eq!(
        parsed
            .device("A架")
            .and_then(|d| d.angle_channel(Side::Port)),
        Some("Ajia-1_v")
    );
}

#[test]
fn load_from_file_reports_path_on_parse_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[vessel\nname = ").unwrap();
    let err = VesselConfig::load_from_file(file.path()).unwrap_err();
    match err {
        ConfigError::Parse(path, _) => assert_eq!(path, file.path()),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn load_from_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = VesselConfig::load_from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(..)));
}
