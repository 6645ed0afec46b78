//! Integration tests for configuration management
//!
//! These tests verify that settings loaded from disk drive the player and
//! the node the way the binary wires them.

use play_soundfile::audio::PlaybackOptions;
use play_soundfile::config::{PlayerOverride, Settings};
use std::error::Error;
use tempfile::tempdir;

/// Test complete configuration workflow
#[test]
fn test_config_lifecycle() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let config_path = dir.path().join("config.json");

    let mut settings = Settings::default();
    settings.directory = "/srv/sounds".to_string();
    settings.file = Some("doorbell.wav".to_string());
    settings.options = PlaybackOptions::with_volume(0.8);
    settings.player = Some(PlayerOverride {
        executable: "paplay".to_string(),
        args: vec!["{file}".to_string()],
    });

    settings.validate()?;
    settings.save(&config_path)?;

    let loaded = Settings::load(&config_path)?;
    assert_eq!(loaded, settings);

    let node_config = loaded.node_config("doorbell");
    assert_eq!(node_config.name, "doorbell");
    assert_eq!(node_config.directory, "/srv/sounds");
    assert_eq!(node_config.file, "doorbell.wav");
    assert_eq!(node_config.options.volume, Some(0.8));
    assert!(!node_config.allow_multiple);

    let mut updated = loaded;
    updated.allow_multiple = true;
    updated.save(&config_path)?;
    assert!(Settings::load(&config_path)?.allow_multiple);

    Ok(())
}

/// Test invalid configuration handling
#[test]
fn test_invalid_config_validation() {
    let mut settings = Settings::default();
    settings.options.volume = Some(-0.1);

    let result = settings.validate();
    assert!(result.is_err());
    if let Err(e) = result {
        assert!(e.to_string().contains("Volume"));
    }
}
