//! Geocoding and current-conditions data source

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use tripcast_config::WeatherConfig;

/// Data source errors
#[derive(Error, Debug)]
pub enum WeatherSourceError {
    #[error("weather request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("malformed weather data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("weather service returned status {0}")]
    Status(u16),

    #[error("no current conditions in response")]
    MissingCurrent,
}

pub type Result<T> = std::result::Result<T, WeatherSourceError>;

/// A place the geocoder matched
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeoMatch {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub admin1: Option<String>,
}

/// Conditions at the current moment
///
/// `timezone` is reported by the service but is not a reliable indicator of
/// the place name; callers must not derive names from it.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentConditions {
    pub temperature_celsius: f64,
    pub condition: String,
    pub weather_code: u8,
    pub timezone: Option<String>,
}

#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn geocode(&self, name: &str) -> Result<Vec<GeoMatch>>;
    async fn current_conditions(&self, latitude: f64, longitude: f64) -> Result<CurrentConditions>;
}

#[derive(Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Option<Vec<GeoMatch>>,
}

#[derive(Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    timezone: Option<String>,
    #[serde(default)]
    current: Option<CurrentBlock>,
}

#[derive(Deserialize)]
struct CurrentBlock {
    temperature_2m: f64,
    weather_code: u8,
}

/// Open-Meteo client; no API key needed
pub struct OpenMeteoClient {
    client: Client,
    geocoding_url: String,
    forecast_url: String,
}

impl OpenMeteoClient {
    pub fn new(config: &WeatherConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("tripcast/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            geocoding_url: config.geocoding_url.clone(),
            forecast_url: config.forecast_url.clone(),
        })
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        let response = self.client.get(url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("Weather service {} answered {}", url, status);
            return Err(WeatherSourceError::Status(status.as_u16()));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    #[instrument(skip(self))]
    async fn geocode(&self, name: &str) -> Result<Vec<GeoMatch>> {
        let query = [
            ("name", name.to_string()),
            ("count", "5".to_string()),
            ("language", "en".to_string()),
            ("format", "json".to_string()),
        ];
        let json = self.get_json(&self.geocoding_url, &query).await?;
        let response: GeocodingResponse = serde_json::from_value(json)?;
        let matches = response.results.unwrap_or_default();

        debug!("Geocoded {:?} to {} match(es)", name, matches.len());
        Ok(matches)
    }

    #[instrument(skip(self))]
    async fn current_conditions(&self, latitude: f64, longitude: f64) -> Result<CurrentConditions> {
        let query = [
            ("latitude", latitude.to_string()),
            ("longitude", longitude.to_string()),
            ("current", "temperature_2m,weather_code".to_string()),
            ("timezone", "auto".to_string()),
        ];
        let mut json = self.get_json(&self.forecast_url, &query).await?;
        strip_forecast_arrays(&mut json);

        let response: ForecastResponse = serde_json::from_value(json)?;
        let current = response.current.ok_or(WeatherSourceError::MissingCurrent)?;

        Ok(CurrentConditions {
            temperature_celsius: current.temperature_2m,
            condition: weather_code_to_description(current.weather_code).to_string(),
            weather_code: current.weather_code,
            timezone: response.timezone,
        })
    }
}

/// Drop forecast series so only current-moment fields remain
pub fn strip_forecast_arrays(json: &mut Value) {
    if let Some(object) = json.as_object_mut() {
        for key in ["hourly", "minutely_15", "daily"] {
            object.remove(key);
            object.remove(&format!("{}_units", key));
        }
    }
}

/// WMO weather interpretation code to text
pub fn weather_code_to_description(code: u8) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Fog",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        56 => "Light freezing drizzle",
        57 => "Dense freezing drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        66 => "Light freezing rain",
        67 => "Heavy freezing rain",
        71 => "Slight snow fall",
        73 => "Moderate snow fall",
        75 => "Heavy snow fall",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with slight hail",
        99 => "Thunderstorm with heavy hail",
        _ => "Unknown",
    }
}
