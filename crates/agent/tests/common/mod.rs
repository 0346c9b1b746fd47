//! Deterministic collaborators for dispatch loop tests
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Barrier;

use tripcast_agent::weather_source::{self, CurrentConditions, GeoMatch, WeatherSourceError};
use tripcast_agent::{DispatchLoop, ModelSettings, TripForm, TripRequest, WeatherSource};
use tripcast_provider::{
    ChatParams, ChatResponse, ImageGenerator, Message, Provider, ProviderError, ResponseFormat,
    ToolCall,
};

pub fn paris_trip() -> TripRequest {
    let form: TripForm = serde_json::from_value(json!({
        "destination": "Paris",
        "flyingFrom": "NYC",
        "fromDate": "2025-06-01",
        "toDate": "2025-06-08",
        "budget": 3000,
        "travelers": 2,
        "tripType": "leisure"
    }))
    .unwrap();
    form.validate().unwrap()
}

pub fn valid_plan() -> Value {
    json!({
        "flight": {
            "airline": "Air France",
            "departureTime": "2025-06-01 18:30",
            "arrivalTime": "2025-06-02 07:45",
            "layover": "direct",
            "totalPrice": 1400.0
        },
        "hotel": {
            "name": "Hôtel Le Marais",
            "starRating": 4,
            "roomType": "Double",
            "totalPrice": 1300.0,
            "location": "Le Marais"
        },
        "flightRecommendation": "Non-stop evening departure with Air France.",
        "hotelRecommendation": "Central, quiet and walkable.",
        "totalEstimatedCost": 2700.0,
        "exceedsBudget": false,
        "conclusion": "At $2700 the trip stays within the $3000 budget.",
        "activities": ["Louvre visit", "Seine river cruise", "Montmartre walk"]
    })
}

pub fn tool_call(id: &str, name: &str, arguments: Value) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments,
    }
}

pub fn logistics_call(id: &str) -> ToolCall {
    tool_call(
        id,
        "plan_logistics",
        serde_json::to_value(paris_trip()).unwrap(),
    )
}

pub fn weather_call(id: &str) -> ToolCall {
    tool_call(id, "get_weather", json!({"destination": "Paris"}))
}

pub fn both_calls() -> ChatResponse {
    ChatResponse::with_tool_calls(vec![logistics_call("call_1"), weather_call("call_2")])
}

/// Model stub: dispatch rounds follow a script, capability prompts get canned output
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<ChatResponse, ProviderError>>>,
    plan: Option<Value>,
    summary_ok: bool,
    plan_gate: Option<Arc<Barrier>>,
    summary_gate: Option<Arc<Barrier>>,
    pub dispatches: AtomicUsize,
    pub plan_calls: AtomicUsize,
    pub capability_calls: AtomicUsize,
    pub last_dispatch: Mutex<Vec<Message>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<ChatResponse>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().map(Ok).collect()),
            plan: Some(valid_plan()),
            summary_ok: true,
            plan_gate: None,
            summary_gate: None,
            dispatches: AtomicUsize::new(0),
            plan_calls: AtomicUsize::new(0),
            capability_calls: AtomicUsize::new(0),
            last_dispatch: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_dispatch() -> Self {
        let provider = Self::new(Vec::new());
        provider
            .script
            .lock()
            .unwrap()
            .push_back(Err(ProviderError::RateLimited));
        provider
    }

    pub fn with_plan(mut self, plan: Value) -> Self {
        self.plan = Some(plan);
        self
    }

    pub fn failing_plan(mut self) -> Self {
        self.plan = None;
        self
    }

    pub fn failing_summary(mut self) -> Self {
        self.summary_ok = false;
        self
    }

    /// Planning blocks on `gate` before answering
    pub fn with_plan_gate(mut self, gate: Arc<Barrier>) -> Self {
        self.plan_gate = Some(gate);
        self
    }

    /// Summarizing blocks on `gate` before answering
    pub fn with_summary_gate(mut self, gate: Arc<Barrier>) -> Self {
        self.summary_gate = Some(gate);
        self
    }

    pub fn dispatch_count(&self) -> usize {
        self.dispatches.load(Ordering::SeqCst)
    }

    fn summarize(&self, params: &ChatParams) -> Result<ChatResponse, ProviderError> {
        if !self.summary_ok {
            return Err(ProviderError::Api("summary model unavailable".to_string()));
        }
        let observation: Value = params
            .messages
            .last()
            .and_then(|m| m.content.as_deref())
            .and_then(|c| serde_json::from_str(c).ok())
            .unwrap_or_default();
        let place = observation["place"].as_str().unwrap_or("somewhere");
        let conditions = observation["conditions"].as_str().unwrap_or("unknown");
        let temperature = observation["temperatureCelsius"].as_f64().unwrap_or_default();

        let summary = json!({
            "description": format!(
                "Right now in {} it is {:.0}°C with {} skies, pleasant for a walk along the river.",
                place, temperature, conditions.to_lowercase()
            ),
            "temperature": format!("{:.0}°C", temperature),
            "conditions": conditions,
        });
        Ok(ChatResponse::text(summary.to_string()))
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn chat(&self, params: ChatParams) -> tripcast_provider::Result<ChatResponse> {
        match &params.response_format {
            Some(ResponseFormat::JsonSchema { name, .. }) if name == "logistics_plan" => {
                self.capability_calls.fetch_add(1, Ordering::SeqCst);
                self.plan_calls.fetch_add(1, Ordering::SeqCst);
                if let Some(gate) = &self.plan_gate {
                    gate.wait().await;
                }
                match &self.plan {
                    Some(plan) => Ok(ChatResponse::text(plan.to_string())),
                    None => Err(ProviderError::Api("logistics model unavailable".to_string())),
                }
            }
            Some(ResponseFormat::JsonSchema { name, .. }) if name == "weather_summary" => {
                self.capability_calls.fetch_add(1, Ordering::SeqCst);
                if let Some(gate) = &self.summary_gate {
                    gate.wait().await;
                }
                self.summarize(&params)
            }
            _ => {
                self.dispatches.fetch_add(1, Ordering::SeqCst);
                *self.last_dispatch.lock().unwrap() = params.messages.clone();
                self.script
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| Ok(ChatResponse::text("Done.")))
            }
        }
    }
}

/// Image stub returning a fixed URL or failing
pub struct StubImages {
    fail: bool,
    gate: Option<Arc<Barrier>>,
    pub prompts: Mutex<Vec<String>>,
}

impl StubImages {
    pub fn working() -> Self {
        Self {
            fail: false,
            gate: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            gate: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_gate(mut self, gate: Arc<Barrier>) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[async_trait]
impl ImageGenerator for StubImages {
    async fn generate(&self, prompt: &str) -> tripcast_provider::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(gate) = &self.gate {
            gate.wait().await;
        }
        if self.fail {
            Err(ProviderError::Api("image service down".to_string()))
        } else {
            Ok("https://images.example/weather.png".to_string())
        }
    }
}

/// Weather stub with fixed matches and conditions
pub struct FixedWeather {
    matches: Vec<GeoMatch>,
    gate: Option<Arc<Barrier>>,
    pub geocodes: AtomicUsize,
    pub fetches: AtomicUsize,
}

impl FixedWeather {
    pub fn paris() -> Self {
        Self::with_matches(vec![GeoMatch {
            name: "Paris".to_string(),
            latitude: 48.8534,
            longitude: 2.3488,
            country: Some("France".to_string()),
            admin1: Some("Île-de-France".to_string()),
        }])
    }

    pub fn nowhere() -> Self {
        Self::with_matches(Vec::new())
    }

    fn with_matches(matches: Vec<GeoMatch>) -> Self {
        Self {
            matches,
            gate: None,
            geocodes: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Geocoding blocks on `gate` before answering
    pub fn with_gate(mut self, gate: Arc<Barrier>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn geocode_count(&self) -> usize {
        self.geocodes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherSource for FixedWeather {
    async fn geocode(&self, _name: &str) -> weather_source::Result<Vec<GeoMatch>> {
        self.geocodes.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.wait().await;
        }
        Ok(self.matches.clone())
    }

    async fn current_conditions(
        &self,
        _latitude: f64,
        _longitude: f64,
    ) -> Result<CurrentConditions, WeatherSourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(CurrentConditions {
            temperature_celsius: 18.4,
            condition: "Partly cloudy".to_string(),
            weather_code: 2,
            // Deliberately unrelated to the destination
            timezone: Some("America/New_York".to_string()),
        })
    }
}

pub fn build_loop(
    provider: &Arc<ScriptedProvider>,
    images: &Arc<StubImages>,
    weather: &Arc<FixedWeather>,
) -> DispatchLoop {
    DispatchLoop::new(
        provider.clone(),
        images.clone(),
        weather.clone(),
        ModelSettings::default(),
    )
}
