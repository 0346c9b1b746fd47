//! Accumulated loop result and the outward payload shaped from it

use serde::Serialize;

use crate::capabilities::{Capability, CapabilityOutput, CapabilityResult};
use crate::plan::{LogisticsPlan, WeatherReport, WeatherSummary};
use crate::AgentError;

/// Per-capability slot in the accumulator
#[derive(Debug, Clone, PartialEq)]
pub enum Slot<T> {
    Pending,
    Ready(T),
    Failed(String),
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Slot::Pending
    }
}

impl<T> Slot<T> {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Slot::Pending)
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Slot::Ready(value) => Some(value),
            _ => None,
        }
    }
}

/// Why the loop stopped
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalReason {
    AllResolved,
    /// The model answered without requesting a tool
    ModelStopped(Option<String>),
    DispatchFailed(String),
    RoundLimit(u32),
}

/// Loop accumulator, threaded by value through each step
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FinalResponse {
    pub logistics: Slot<LogisticsPlan>,
    pub weather: Slot<WeatherReport>,
    pub terminal: Option<TerminalReason>,
}

impl FinalResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_resolved(&self, capability: Capability) -> bool {
        match capability {
            Capability::PlanLogistics => self.logistics.is_resolved(),
            Capability::GetWeather => self.weather.is_resolved(),
        }
    }

    pub fn all_resolved(&self) -> bool {
        Capability::ALL.into_iter().all(|c| self.is_resolved(c))
    }

    /// Fold one capability result into its slot
    pub fn merge(mut self, capability: Capability, result: CapabilityResult) -> Self {
        match (capability, result) {
            (_, CapabilityResult::Success(CapabilityOutput::Logistics(plan))) => {
                self.logistics = Slot::Ready(plan)
            }
            (_, CapabilityResult::Success(CapabilityOutput::Weather(report))) => {
                self.weather = Slot::Ready(report)
            }
            (Capability::PlanLogistics, CapabilityResult::Failure(reason)) => {
                self.logistics = Slot::Failed(reason)
            }
            (Capability::GetWeather, CapabilityResult::Failure(reason)) => {
                self.weather = Slot::Failed(reason)
            }
        }
        self
    }

    pub fn terminate(mut self, reason: TerminalReason) -> Self {
        self.terminal = Some(reason);
        self
    }
}

/// Outward response body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripResponse {
    pub logistics_plan_recommendation: Option<LogisticsPlan>,
    pub current_weather: Option<WeatherSummary>,
    pub current_weather_image_url: Option<String>,
    pub failure_reason: Option<String>,
}

/// `{ "done": true, "response": ... }`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseEnvelope {
    pub done: bool,
    pub response: TripResponse,
}

impl From<TripResponse> for ResponseEnvelope {
    fn from(response: TripResponse) -> Self {
        Self {
            done: true,
            response,
        }
    }
}

/// Shape the accumulator into the outward payload
pub fn aggregate(acc: FinalResponse) -> TripResponse {
    let mut reasons = Vec::new();

    if let Slot::Failed(reason) = &acc.logistics {
        reasons.push(format!("logistics plan unavailable: {}", reason));
    }
    match &acc.weather {
        Slot::Failed(reason) => reasons.push(format!("weather unavailable: {}", reason)),
        Slot::Ready(WeatherReport {
            summary_error: Some(reason),
            ..
        }) => reasons.push(format!("weather description unavailable: {}", reason)),
        _ => {}
    }
    if !acc.all_resolved() {
        if let Some(reason) = unresolved_reason(acc.terminal.as_ref()) {
            reasons.push(reason);
        }
    }

    let (current_weather, current_weather_image_url) = match acc.weather {
        Slot::Ready(report) => (report.summary, report.image_url),
        _ => (None, None),
    };
    let logistics_plan_recommendation = match acc.logistics {
        Slot::Ready(plan) => Some(plan),
        _ => None,
    };

    let nothing = logistics_plan_recommendation.is_none()
        && current_weather.is_none()
        && current_weather_image_url.is_none();
    if nothing && reasons.is_empty() {
        reasons.push("no results were produced".to_string());
    }

    TripResponse {
        logistics_plan_recommendation,
        current_weather,
        current_weather_image_url,
        failure_reason: (!reasons.is_empty()).then(|| reasons.join("; ")),
    }
}

fn unresolved_reason(terminal: Option<&TerminalReason>) -> Option<String> {
    match terminal? {
        TerminalReason::AllResolved => None,
        TerminalReason::ModelStopped(message) => {
            let message = message
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .unwrap_or("the model stopped without requesting the remaining tools");
            Some(AgentError::ModelRefusal(message.to_string()).to_string())
        }
        TerminalReason::DispatchFailed(reason) => Some(format!("model request failed: {}", reason)),
        TerminalReason::RoundLimit(rounds) => Some(
            AgentError::ModelRefusal(format!(
                "stopped after {} dispatch rounds with tools still unresolved",
                rounds
            ))
            .to_string(),
        ),
    }
}
