//! Tests for Config defaults, persistence and accessors

use tempfile::TempDir;
use tripcast_config::{Config, ConfigError, DEFAULT_ALLOWED_ORIGIN};

fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

#[test]
fn test_config_defaults() {
    let config = Config::default();

    assert_eq!(config.model.model, "gpt-4o-mini");
    assert_eq!(config.model.max_tokens, 2048);
    assert_eq!(config.model.temperature, 0.7);
    assert_eq!(config.model.max_dispatch_rounds, 4);
    assert!(config.model.api_key.is_empty());

    assert_eq!(config.image.size, "1024x1024");
    assert!(config.image.api_key.is_none());

    assert!(config.weather.geocoding_url.contains("geocoding-api.open-meteo.com"));
    assert!(config.weather.forecast_url.contains("api.open-meteo.com"));
    assert_eq!(config.weather.timeout_seconds, 15);

    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 8787);
    assert_eq!(config.origin_allow_list(), vec![DEFAULT_ALLOWED_ORIGIN]);
}

#[test]
fn test_default_config_is_valid() {
    assert!(Config::default().validate().is_ok());
}

#[test]
fn test_zero_dispatch_rounds_rejected() {
    let mut config = Config::default();
    config.model.max_dispatch_rounds = 0;

    match config.validate() {
        Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "model.max_dispatch_rounds"),
        other => panic!("Expected Invalid error, got {:?}", other),
    }
}

#[test]
fn test_out_of_range_temperature_rejected() {
    let mut config = Config::default();
    config.model.temperature = 3.5;
    assert!(config.validate().is_err());
}

#[test]
fn test_image_key_falls_back_to_model_key() {
    let mut config = Config::default();
    config.model.api_key = "sk-model".to_string();
    assert_eq!(config.image_api_key(), Some("sk-model".to_string()));

    config.image.api_key = Some("sk-image".to_string());
    assert_eq!(config.image_api_key(), Some("sk-image".to_string()));
}

#[test]
fn test_image_base_falls_back_to_model_base() {
    let mut config = Config::default();
    assert!(config.image_api_base().is_none());

    config.model.api_base = Some("https://llm.internal/v1".to_string());
    assert_eq!(
        config.image_api_base(),
        Some("https://llm.internal/v1".to_string())
    );
}

#[test]
fn test_has_api_key() {
    let mut config = Config::default();
    assert!(!config.has_api_key());
    config.model.api_key = "   ".to_string();
    assert!(!config.has_api_key());
    config.model.api_key = "sk-real".to_string();
    assert!(config.has_api_key());
}

#[test]
fn test_bind_address() {
    let mut config = Config::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 3000;
    assert_eq!(config.bind_address(), "127.0.0.1:3000");
}

#[tokio::test]
async fn test_save_and_load_round_trip() {
    let dir = temp_dir();
    let path = dir.path().join("nested").join("config.json");

    let mut config = Config::default();
    config.model.api_key = "sk-saved".to_string();
    config.server.allowed_origins = "https://a.example,https://b.example".to_string();

    config.save_to(&path).await.expect("Failed to save");
    let loaded = Config::load_from(&path).await.expect("Failed to load");

    assert_eq!(loaded.model.api_key, "sk-saved");
    assert_eq!(
        loaded.origin_allow_list(),
        vec!["https://a.example", "https://b.example"]
    );
}

#[tokio::test]
async fn test_load_missing_file_uses_defaults() {
    let dir = temp_dir();
    let config = Config::load_from(&dir.path().join("absent.json"))
        .await
        .expect("Missing file should yield defaults");
    assert_eq!(config.server.port, 8787);
}

#[tokio::test]
async fn test_load_partial_file_fills_defaults() {
    let dir = temp_dir();
    let path = dir.path().join("config.json");
    tokio::fs::write(&path, r#"{"server": {"port": 9999}}"#)
        .await
        .unwrap();

    let config = Config::load_from(&path).await.unwrap();
    assert_eq!(config.server.port, 9999);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.model.max_dispatch_rounds, 4);
}

#[tokio::test]
async fn test_load_invalid_json_errors() {
    let dir = temp_dir();
    let path = dir.path().join("config.json");
    tokio::fs::write(&path, "{not json").await.unwrap();

    match Config::load_from(&path).await {
        Err(ConfigError::Json(_)) => (),
        other => panic!("Expected Json error, got {:?}", other),
    }
}
