//! Trip planning agent
//!
//! A dispatch loop hands the trip to a language model, runs the logistics
//! and weather capabilities it requests, validates their structured output
//! and aggregates whatever succeeded into a single response.

use thiserror::Error;

pub mod capabilities;
pub mod context;
pub mod loop_agent;
pub mod plan;
pub mod response;
pub mod schema;
pub mod trip;
pub mod weather_source;

pub use capabilities::{Capability, CapabilityCall, CapabilityResult, ModelSettings};
pub use context::ContextBuilder;
pub use loop_agent::DispatchLoop;
pub use plan::{FlightPlan, HotelPlan, Layover, LogisticsPlan, WeatherReport, WeatherSummary};
pub use response::{aggregate, FinalResponse, ResponseEnvelope, TripResponse};
pub use schema::{Constraint, SchemaViolation, Shape};
pub use trip::{TripForm, TripRequest};
pub use weather_source::{OpenMeteoClient, WeatherSource, WeatherSourceError};

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("schema violation: {0}")]
    SchemaViolation(#[from] SchemaViolation),

    #[error("capability failure: {0}")]
    CapabilityFailure(String),

    #[error("model refusal: {0}")]
    ModelRefusal(String),

    #[error("model error: {0}")]
    Provider(#[from] tripcast_provider::ProviderError),
}

pub type Result<T> = std::result::Result<T, AgentError>;
