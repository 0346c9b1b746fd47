//! The fixed set of capabilities the model may invoke

use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

use tripcast_config::Config;
use tripcast_provider::{ImageGenerator, Provider, Tool, ToolCall};

use crate::plan::{LogisticsPlan, WeatherReport};
use crate::schema::{Constraint, FieldSpec, SchemaViolation, Shape};
use crate::trip::TripRequest;
use crate::weather_source::WeatherSource;

pub mod logistics;
pub mod weather;

pub use logistics::LogisticsPlanner;
pub use weather::WeatherReporter;

/// Slack when comparing a restated budget, under one cent
const BUDGET_TOLERANCE: f64 = 0.005;

/// Model settings shared by the capabilities that call the model
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 2048,
            temperature: 0.7,
        }
    }
}

impl From<&Config> for ModelSettings {
    fn from(config: &Config) -> Self {
        Self {
            model: config.model.model.clone(),
            max_tokens: config.model.max_tokens,
            temperature: config.model.temperature,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    PlanLogistics,
    GetWeather,
}

impl Capability {
    pub const ALL: [Capability; 2] = [Capability::PlanLogistics, Capability::GetWeather];

    pub fn name(self) -> &'static str {
        match self {
            Capability::PlanLogistics => "plan_logistics",
            Capability::GetWeather => "get_weather",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    fn description(self) -> &'static str {
        match self {
            Capability::PlanLogistics => {
                "Choose one flight and one 4 or 5 star hotel for the trip, with three activities, \
                 priced for the budget and number of travelers. Pass the trip exactly as the \
                 traveler gave it."
            }
            Capability::GetWeather => {
                "Describe the current weather at the destination and illustrate it with an image."
            }
        }
    }

    fn parameters(self) -> Shape {
        match self {
            Capability::PlanLogistics => TripRequest::shape(),
            Capability::GetWeather => Shape::new().field(FieldSpec::string(
                "destination",
                "Destination exactly as the traveler wrote it",
            )),
        }
    }

    /// Signature declared to the model
    pub fn definition(self) -> Tool {
        Tool::new(self.name(), self.description(), self.parameters().to_json_schema())
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Signatures of every capability
pub fn definitions() -> Vec<Tool> {
    Capability::ALL.into_iter().map(Capability::definition).collect()
}

/// A model request decoded into a typed invocation
#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityCall {
    PlanLogistics(TripRequest),
    GetWeather { destination: String },
}

/// Why a tool call could not become a [`CapabilityCall`]
#[derive(Debug, Clone, PartialEq)]
pub enum CallRejection {
    Unknown(String),
    InvalidArguments(Capability, SchemaViolation),
}

impl CapabilityCall {
    pub fn capability(&self) -> Capability {
        match self {
            CapabilityCall::PlanLogistics(_) => Capability::PlanLogistics,
            CapabilityCall::GetWeather { .. } => Capability::GetWeather,
        }
    }

    /// Validate the arguments and bind the call to the request being planned.
    ///
    /// Arguments only select and trigger a capability: the returned call
    /// always carries `trip`'s own values, and arguments restating them
    /// differently are rejected.
    pub fn from_tool_call(call: &ToolCall, trip: &TripRequest) -> Result<Self, CallRejection> {
        let capability = Capability::from_name(&call.name)
            .ok_or_else(|| CallRejection::Unknown(call.name.clone()))?;
        let shape = capability.parameters();
        let invalid = |v| CallRejection::InvalidArguments(capability, v);

        match capability {
            Capability::PlanLogistics => {
                let stated: TripRequest = shape.decode(call.arguments.clone()).map_err(invalid)?;
                agrees_with(trip, &stated).map_err(invalid)?;
                Ok(CapabilityCall::PlanLogistics(trip.clone()))
            }
            Capability::GetWeather => {
                shape.validate(&call.arguments).map_err(invalid)?;
                let stated = call.arguments["destination"].as_str().unwrap_or_default();
                same_text("destination", &trip.destination, stated).map_err(invalid)?;
                Ok(CapabilityCall::GetWeather {
                    destination: trip.destination.clone(),
                })
            }
        }
    }
}

fn mismatch(field: &str, expected: impl ToString, actual: impl ToString) -> SchemaViolation {
    SchemaViolation::new(
        field,
        Constraint::Mismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        },
    )
}

fn same_text(field: &str, expected: &str, actual: &str) -> Result<(), SchemaViolation> {
    if expected.trim().to_lowercase() == actual.trim().to_lowercase() {
        Ok(())
    } else {
        Err(mismatch(field, expected, actual.trim()))
    }
}

/// Every field the model restated must equal the validated request
fn agrees_with(trip: &TripRequest, stated: &TripRequest) -> Result<(), SchemaViolation> {
    same_text("destination", &trip.destination, &stated.destination)?;
    same_text("origin", &trip.origin, &stated.origin)?;
    if stated.depart_date != trip.depart_date {
        return Err(mismatch("departDate", trip.depart_date, stated.depart_date));
    }
    if stated.return_date != trip.return_date {
        return Err(mismatch("returnDate", trip.return_date, stated.return_date));
    }
    if (stated.budget - trip.budget).abs() > BUDGET_TOLERANCE {
        return Err(mismatch("budget", trip.budget, stated.budget));
    }
    if stated.traveler_count != trip.traveler_count {
        return Err(mismatch("travelerCount", trip.traveler_count, stated.traveler_count));
    }
    same_text("tripType", &trip.trip_type, &stated.trip_type)
}

#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityOutput {
    Logistics(LogisticsPlan),
    Weather(WeatherReport),
}

/// Outcome of one capability invocation
#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityResult {
    Success(CapabilityOutput),
    Failure(String),
}

impl CapabilityResult {
    pub fn is_success(&self) -> bool {
        matches!(self, CapabilityResult::Success(_))
    }

    /// Content fed back to the model as the tool turn
    pub fn to_tool_content(&self) -> String {
        let value = match self {
            CapabilityResult::Success(CapabilityOutput::Logistics(plan)) => {
                json!({"status": "success", "result": plan})
            }
            CapabilityResult::Success(CapabilityOutput::Weather(report)) => json!({
                "status": "success",
                "result": {
                    "summary": report.summary,
                    "imageUrl": report.image_url,
                    "summaryError": report.summary_error,
                }
            }),
            CapabilityResult::Failure(reason) => json!({"status": "failure", "reason": reason}),
        };
        value.to_string()
    }
}

/// Tool content for calls that were answered without running anything
pub fn rejection_content(reason: &str) -> String {
    let value: Value = json!({"status": "rejected", "reason": reason});
    value.to_string()
}

/// Executes decoded calls against the collaborators
pub struct Capabilities {
    logistics: LogisticsPlanner,
    weather: WeatherReporter,
}

impl Capabilities {
    pub fn new(
        provider: Arc<dyn Provider>,
        images: Arc<dyn ImageGenerator>,
        source: Arc<dyn WeatherSource>,
        settings: ModelSettings,
    ) -> Self {
        Self {
            logistics: LogisticsPlanner::new(provider.clone(), settings.clone()),
            weather: WeatherReporter::new(source, provider, images, settings),
        }
    }

    /// Run one call; errors become [`CapabilityResult::Failure`]
    pub async fn execute(&self, call: CapabilityCall) -> CapabilityResult {
        let outcome = match call {
            CapabilityCall::PlanLogistics(trip) => self
                .logistics
                .plan(&trip)
                .await
                .map(CapabilityOutput::Logistics),
            CapabilityCall::GetWeather { destination } => self
                .weather
                .report(&destination)
                .await
                .map(CapabilityOutput::Weather),
        };

        match outcome {
            Ok(output) => CapabilityResult::Success(output),
            Err(e) => CapabilityResult::Failure(e.to_string()),
        }
    }
}
