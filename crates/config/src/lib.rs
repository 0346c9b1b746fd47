//! Configuration management for Tripcast
//!
//! Loads the JSON config file, applies environment overrides and exposes
//! the settings each collaborator needs.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod paths;

pub use paths::{config_path, data_dir};

/// Errors in configuration handling
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config not found: {0}")]
    NotFound(PathBuf),

    #[error("invalid config value for {field}: {message}")]
    Invalid { field: String, message: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Origin allowed when no allow-list is configured
pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:5173";

/// Language model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_dispatch_rounds")]
    pub max_dispatch_rounds: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_dispatch_rounds: default_max_dispatch_rounds(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_dispatch_rounds() -> u32 {
    4
}

/// Image generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default = "default_image_model")]
    pub model: String,
    #[serde(default = "default_image_size")]
    pub size: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: None,
            model: default_image_model(),
            size: default_image_size(),
        }
    }
}

fn default_image_model() -> String {
    "dall-e-3".to_string()
}

fn default_image_size() -> String {
    "1024x1024".to_string()
}

/// Geocoding and current-weather data source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    #[serde(default = "default_geocoding_url")]
    pub geocoding_url: String,
    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,
    #[serde(default = "default_weather_timeout")]
    pub timeout_seconds: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            geocoding_url: default_geocoding_url(),
            forecast_url: default_forecast_url(),
            timeout_seconds: default_weather_timeout(),
        }
    }
}

fn default_geocoding_url() -> String {
    "https://geocoding-api.open-meteo.com/v1/search".to_string()
}

fn default_forecast_url() -> String {
    "https://api.open-meteo.com/v1/forecast".to_string()
}

fn default_weather_timeout() -> u64 {
    15
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Comma-separated list of allowed request origins
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8787
}

fn default_allowed_origins() -> String {
    DEFAULT_ALLOWED_ORIGIN.to_string()
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub image: ImageConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Load from the default location, then apply environment overrides
    pub async fn load() -> Result<Self> {
        let path = config_path();
        let mut config = Self::load_from(&path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from specific location
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        debug!("Reading config from {:?}", path);
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save to the default location
    pub async fn save(&self) -> Result<()> {
        let path = config_path();
        self.save_to(&path).await
    }

    /// Save to specific location
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        debug!("Writing config to {:?}", path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.model.api_key = key;
        }
        if let Some(base) = lookup("OPENAI_API_BASE") {
            self.model.api_base = Some(base);
        }
        if let Some(model) = lookup("TRIPCAST_MODEL") {
            self.model.model = model;
        }
        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            self.server.allowed_origins = origins;
        }
        if let Some(port) = lookup("TRIPCAST_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!("Ignoring invalid TRIPCAST_PORT {:?}", port),
            }
        }
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.model.max_dispatch_rounds == 0 {
            return Err(ConfigError::Invalid {
                field: "model.max_dispatch_rounds".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::Invalid {
                field: "model.temperature".to_string(),
                message: format!("{} is outside 0.0..=2.0", self.model.temperature),
            });
        }
        if self.weather.timeout_seconds == 0 || self.weather.timeout_seconds > 300 {
            return Err(ConfigError::Invalid {
                field: "weather.timeout_seconds".to_string(),
                message: "must be between 1 and 300".to_string(),
            });
        }
        Ok(())
    }

    /// Model API key, if configured
    pub fn api_key(&self) -> Option<String> {
        let key = self.model.api_key.trim();
        if key.is_empty() {
            None
        } else {
            Some(key.to_string())
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    /// Image API key, falling back to the model key
    pub fn image_api_key(&self) -> Option<String> {
        self.image
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.api_key())
    }

    /// Image API base, falling back to the model base
    pub fn image_api_base(&self) -> Option<String> {
        self.image
            .api_base
            .clone()
            .or_else(|| self.model.api_base.clone())
    }

    /// Parsed origin allow-list
    pub fn origin_allow_list(&self) -> Vec<String> {
        parse_origin_list(&self.server.allowed_origins)
    }

    /// Socket address string for the HTTP server
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Split a comma-separated origin list, trimming entries and trailing slashes
pub fn parse_origin_list(raw: &str) -> Vec<String> {
    let origins: Vec<String> = raw
        .split(',')
        .map(|o| o.trim().trim_end_matches('/'))
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect();

    if origins.is_empty() {
        vec![DEFAULT_ALLOWED_ORIGIN.to_string()]
    } else {
        origins
    }
}

/// Write a default config file if none exists and return the loaded config
pub async fn init() -> Result<Config> {
    let config_path = config_path();

    if config_path.exists() {
        warn!("Config already exists at {:?}", config_path);
    } else {
        let config = Config::default();
        config.save().await?;
        info!("Config written to {:?}", config_path);
    }

    Config::load().await
}
