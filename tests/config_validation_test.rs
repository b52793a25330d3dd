//! Configuration loading and validation through files and the environment.

use std::fs;
use std::time::Duration;

use srf05_daq::config::{BridgeMode, Settings};

#[test]
fn test_shipped_config_is_valid() {
    let settings = Settings::load_from(concat!(env!("CARGO_MANIFEST_DIR"), "/config/srf05.toml"))
        .unwrap();
    settings.validate().unwrap();

    assert_eq!(settings.sensor.line, 20);
    assert_eq!(settings.sensor.cm_divisor, 450);
    assert_eq!(settings.sensor.measurement_period(), Duration::from_millis(500));
    assert_eq!(settings.history.capacity, 48);
    assert_eq!(settings.history.interval, Duration::from_secs(3600));
    assert_eq!(settings.bridge.mode, BridgeMode::Internal);
    assert_eq!(settings.server.port, 80);
}

#[test]
fn test_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings::load_from(dir.path().join("absent.toml")).unwrap();
    assert!(settings.validate().is_ok());
    assert_eq!(settings.history.extension, "csv");
}

#[test]
fn test_malformed_duration_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[sensor]\nbase_period = \"soon\"\n").unwrap();
    assert!(Settings::load_from(&path).is_err());
}

#[test]
fn test_unknown_bridge_mode_rejected() {
    assert!(Settings::from_toml_str("[bridge]\nmode = \"carrier-pigeon\"\n").is_err());
}

#[test]
fn test_period_rounding_to_zero_rejected() {
    let settings = Settings::from_toml_str(
        r#"
        [sensor]
        base_period = "10ns"
        update_divisor = 20
        "#,
    )
    .unwrap();
    let err = settings.validate().unwrap_err();
    assert!(err.to_string().contains("base_period"));
}

#[test]
fn test_bad_extension_rejected() {
    for extension in ["", "  ", ".csv", "a/b"] {
        let mut settings = Settings::default();
        settings.history.extension = extension.to_string();
        assert!(settings.validate().is_err(), "{:?} accepted", extension);
    }
}

#[test]
fn test_zero_timeouts_rejected() {
    let mut settings = Settings::default();
    settings.sensor.start_timeout = 0;
    assert!(settings.validate().is_err());

    let mut settings = Settings::default();
    settings.sensor.xmit_timeout = 0;
    assert!(settings.validate().is_err());
}

#[test]
fn test_zero_history_interval_rejected() {
    let mut settings = Settings::default();
    settings.history.interval = Duration::ZERO;
    assert!(settings.validate().is_err());
}
