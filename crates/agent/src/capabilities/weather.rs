//! Current weather: geocode, fetch, then describe and illustrate

use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use tripcast_provider::{ChatParams, ImageGenerator, Message, Provider, ResponseFormat, ToolChoice};

use super::ModelSettings;
use crate::plan::{WeatherReport, WeatherSummary};
use crate::schema::parse_json_output;
use crate::weather_source::{CurrentConditions, GeoMatch, WeatherSource};
use crate::{AgentError, Result};

pub struct WeatherReporter {
    source: Arc<dyn WeatherSource>,
    provider: Arc<dyn Provider>,
    images: Arc<dyn ImageGenerator>,
    settings: ModelSettings,
}

impl WeatherReporter {
    pub fn new(
        source: Arc<dyn WeatherSource>,
        provider: Arc<dyn Provider>,
        images: Arc<dyn ImageGenerator>,
        settings: ModelSettings,
    ) -> Self {
        Self {
            source,
            provider,
            images,
            settings,
        }
    }

    /// Geocode and fetch are required; summary and image may fail separately
    #[instrument(skip(self))]
    pub async fn report(&self, destination: &str) -> Result<WeatherReport> {
        let matches = self
            .source
            .geocode(destination)
            .await
            .map_err(|e| AgentError::CapabilityFailure(format!("geocoding failed: {}", e)))?;
        let place = matches.into_iter().next().ok_or_else(|| {
            AgentError::CapabilityFailure(format!("unresolvable destination {:?}", destination))
        })?;
        debug!(
            "Resolved {:?} to {} ({:.4}, {:.4})",
            destination, place.name, place.latitude, place.longitude
        );

        let conditions = self
            .source
            .current_conditions(place.latitude, place.longitude)
            .await
            .map_err(|e| {
                AgentError::CapabilityFailure(format!("weather fetch failed: {}", e))
            })?;

        let label = place_label(destination, &place);
        let (summary, image) = tokio::join!(
            self.summarize(&label, &conditions),
            self.images.generate(&conditions.condition)
        );

        match (summary, image) {
            (Err(summary_err), Err(image_err)) => Err(AgentError::CapabilityFailure(format!(
                "weather summary failed: {}; image generation failed: {}",
                summary_err, image_err
            ))),
            (summary, image) => {
                if let Err(e) = &image {
                    warn!("Image generation failed, keeping description: {}", e);
                }
                if let Err(e) = &summary {
                    warn!("Weather summary failed, keeping image: {}", e);
                }
                info!("Weather for {} is {}", label, conditions.condition);
                Ok(WeatherReport {
                    summary_error: summary.as_ref().err().map(|e| e.to_string()),
                    summary: summary.ok(),
                    image_url: image.ok(),
                })
            }
        }
    }

    async fn summarize(&self, label: &str, conditions: &CurrentConditions) -> Result<WeatherSummary> {
        let shape = WeatherSummary::shape();
        let params = ChatParams {
            model: self.settings.model.clone(),
            messages: vec![
                Message::system(system_prompt(label)),
                Message::user(observation(label, conditions)),
            ],
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            tool_choice: ToolChoice::None,
            response_format: Some(ResponseFormat::json_schema(
                "weather_summary",
                shape.to_json_schema(),
            )),
            ..Default::default()
        };

        let response = self.provider.chat(params).await?;
        let content = response
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                AgentError::CapabilityFailure("model returned no weather summary".to_string())
            })?;

        Ok(shape.decode(parse_json_output(&content)?)?)
    }
}

/// Name used for the place in any generated text
///
/// The caller's destination, with the geocoded country appended unless the
/// destination already names it.
pub fn place_label(destination: &str, place: &GeoMatch) -> String {
    let destination = destination.trim();
    match place.country.as_deref().map(str::trim) {
        Some(country)
            if !country.is_empty()
                && !destination
                    .to_lowercase()
                    .contains(&country.to_lowercase()) =>
        {
            format!("{}, {}", destination, country)
        }
        _ => destination.to_string(),
    }
}

fn system_prompt(label: &str) -> String {
    format!(
        "You describe the current weather for travelers in about 30 words. Use only the \
         observation you are given. Whenever you name the place, call it exactly \"{}\". The \
         timezone identifier is not a reliable indicator of location: never derive a city, \
         region or country name from it. Answer only with the requested JSON object.",
        label
    )
}

fn observation(label: &str, conditions: &CurrentConditions) -> String {
    json!({
        "place": label,
        "temperatureCelsius": conditions.temperature_celsius,
        "conditions": conditions.condition,
        "timezone": conditions.timezone,
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geo(country: Option<&str>) -> GeoMatch {
        GeoMatch {
            name: "Paris".to_string(),
            latitude: 48.85,
            longitude: 2.35,
            country: country.map(str::to_string),
            admin1: Some("Île-de-France".to_string()),
        }
    }

    #[test]
    fn test_place_label_appends_country() {
        assert_eq!(place_label("Paris", &geo(Some("France"))), "Paris, France");
    }

    #[test]
    fn test_place_label_keeps_named_country() {
        assert_eq!(
            place_label("Paris, France", &geo(Some("France"))),
            "Paris, France"
        );
        assert_eq!(place_label(" Paris ", &geo(None)), "Paris");
    }

    #[test]
    fn test_prompt_forbids_timezone_naming() {
        let prompt = system_prompt("Paris, France");
        assert!(prompt.contains("\"Paris, France\""));
        assert!(prompt.contains("timezone"));
    }

    #[test]
    fn test_observation_carries_raw_fields() {
        let conditions = CurrentConditions {
            temperature_celsius: 19.5,
            condition: "Partly cloudy".to_string(),
            weather_code: 2,
            timezone: Some("Europe/Paris".to_string()),
        };
        let value: serde_json::Value =
            serde_json::from_str(&observation("Paris, France", &conditions)).unwrap();
        assert_eq!(value["place"], "Paris, France");
        assert_eq!(value["temperatureCelsius"], 19.5);
        assert_eq!(value["conditions"], "Partly cloudy");
    }
}
