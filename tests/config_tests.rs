// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use exam_scanner::{CameraBackendType, Config, ScanConfig, ScanPreset};

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.backend, CameraBackendType::default());
    assert!(config.last_camera_id.is_none());
    assert_eq!(config.history_limit, 50);
    assert_eq!(config.scan, ScanConfig::default());
}

#[test]
fn test_config_missing_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_config_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let config = Config {
        last_camera_id: Some("/dev/video2".to_string()),
        scan: ScanConfig::preset(ScanPreset::Precise),
        history_limit: 10,
        ..Config::default()
    };
    config.save_to(&path).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_config_partial_file_keeps_other_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"history_limit": 5, "scan": {"fps": 3}}"#).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded.history_limit, 5);
    assert_eq!(loaded.scan.fps, 3);
    assert_eq!(loaded.scan.cooldown_ms, 2000);
    assert!(loaded.last_camera_id.is_none());
}

#[test]
fn test_config_invalid_json_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(Config::load_from(&path).is_err());
}
