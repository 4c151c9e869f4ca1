//! Unit tests for configuration module
//!
//! Tests configuration parsing, validation, serialization/deserialization,
//! and edge cases in configuration handling.

use super::*;
use anyhow::Result;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_default_configuration_is_valid() {
    let config = PaneConfig::default();

    assert!(config.validate().is_ok());
    assert_eq!(config.window.slot_count, 2);
    assert_eq!(config.window.pacing, PacingPolicy::FrameCallbackGated);
    assert_eq!(config.events.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    assert!(config.session.display.is_none());
    assert!(config.dispatch_timeout().is_none());
}

#[test]
fn test_configuration_serialization_roundtrip() -> Result<()> {
    let mut original_config = PaneConfig::default();
    original_config.dispatch.timeout_ms = Some(250);
    original_config.window.pacing = PacingPolicy::BlockingRoundTrip;

    let toml_string = toml::to_string(&original_config)?;
    let deserialized_config: PaneConfig = toml::from_str(&toml_string)?;

    assert_eq!(original_config, deserialized_config);

    Ok(())
}

#[test]
fn test_configuration_from_file() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("test_config.toml");

    let test_config = r#"
[session]
display = "wayland-1"

[window]
title = "gradient"
app_id = "org.example.gradient"
slot_count = 3
pacing = "unpaced"

[events]
queue_capacity = 64

[dispatch]
timeout_ms = 500
"#;

    fs::write(&file_path, test_config)?;

    let config = PaneConfig::load(&file_path)?;

    assert_eq!(config.session.display.as_deref(), Some("wayland-1"));
    assert_eq!(config.window.title, "gradient");
    assert_eq!(config.window.slot_count, 3);
    assert_eq!(config.window.pacing, PacingPolicy::Unpaced);
    assert_eq!(config.events.queue_capacity, 64);
    assert_eq!(config.dispatch_timeout(), Some(Duration::from_millis(500)));

    Ok(())
}

#[test]
fn test_partial_file_uses_defaults() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("partial.toml");
    fs::write(&file_path, "[window]\ntitle = \"only title\"\n")?;

    let config = PaneConfig::load(&file_path)?;

    assert_eq!(config.window.title, "only title");
    assert_eq!(config.window.slot_count, 2);
    assert_eq!(config.events, EventConfig::default());

    Ok(())
}

#[test]
fn test_invalid_slot_count_rejected() {
    let mut config = PaneConfig::default();
    config.window.slot_count = 0;
    assert!(config.validate().is_err());

    config.window.slot_count = (MAX_SLOTS + 1) as u8;
    assert!(config.validate().is_err());
}

#[test]
fn test_zero_timeout_rejected() {
    let mut config = PaneConfig::default();
    config.dispatch.timeout_ms = Some(0);
    assert!(config.validate().is_err());
}

#[test]
fn test_empty_display_rejected() {
    let mut config = PaneConfig::default();
    config.session.display = Some("  ".to_string());
    assert!(config.validate().is_err());
}

#[test]
fn test_unknown_pacing_fails_to_parse() {
    let result: std::result::Result<PaneConfig, _> =
        toml::from_str("[window]\npacing = \"warp-speed\"\n");
    assert!(result.is_err());
}

#[test]
fn test_missing_file_reports_path() {
    let err = PaneConfig::load("/nonexistent/wlpane.toml").unwrap_err();
    assert!(format!("{err:#}").contains("/nonexistent/wlpane.toml"));
}

#[test]
fn test_save_and_reload() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("saved.toml");

    let mut config = PaneConfig::default();
    config.window.title = "saved".to_string();
    config.save(&file_path)?;

    let reloaded = PaneConfig::load(&file_path)?;
    assert_eq!(reloaded.window.title, "saved");

    Ok(())
}

#[test]
fn test_merge_partial_overrides_changed_sections() {
    let base = PaneConfig::default();

    let mut partial = PaneConfig::default();
    partial.dispatch.timeout_ms = Some(100);

    let merged = base.merge_partial(partial);
    assert_eq!(merged.dispatch.timeout_ms, Some(100));
    assert_eq!(merged.window, WindowConfig::default());
}
