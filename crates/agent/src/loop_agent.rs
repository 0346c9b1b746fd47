//! Dispatch loop - core processing engine

use futures::future::{self, BoxFuture, FutureExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use tripcast_config::Config;
use tripcast_provider::{
    ChatParams, ChatResponse, ImageGenerator, Message, Provider, ToolCall, ToolCallDef, ToolChoice,
};

use crate::capabilities::{
    self, rejection_content, CallRejection, Capabilities, Capability, CapabilityCall,
    CapabilityResult, ModelSettings,
};
use crate::context::ContextBuilder;
use crate::response::{aggregate, FinalResponse, TerminalReason, TripResponse};
use crate::trip::TripRequest;
use crate::weather_source::WeatherSource;

/// Rounds allowed when no configuration says otherwise
pub const DEFAULT_MAX_ROUNDS: u32 = 4;

enum LoopState {
    Dispatching,
    AwaitingCapabilities(Vec<ToolCall>),
    Merging(Vec<Settled>),
    Terminal(TerminalReason),
}

/// A tool call after it has been answered
struct Settled {
    call: ToolCall,
    outcome: Outcome,
}

enum Outcome {
    Resolved(Capability, CapabilityResult),
    Rejected(String),
}

impl Settled {
    fn content(&self) -> String {
        match &self.outcome {
            Outcome::Resolved(_, result) => result.to_tool_content(),
            Outcome::Rejected(reason) => rejection_content(reason),
        }
    }
}

/// Sends the trip to the model and runs the capabilities it asks for
pub struct DispatchLoop {
    provider: Arc<dyn Provider>,
    capabilities: Capabilities,
    context: ContextBuilder,
    settings: ModelSettings,
    max_rounds: u32,
}

impl DispatchLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        images: Arc<dyn ImageGenerator>,
        weather: Arc<dyn WeatherSource>,
        settings: ModelSettings,
    ) -> Self {
        Self {
            capabilities: Capabilities::new(provider.clone(), images, weather, settings.clone()),
            provider,
            context: ContextBuilder::new(),
            settings,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    /// Create with model settings and round cap from configuration
    pub fn with_config(
        provider: Arc<dyn Provider>,
        images: Arc<dyn ImageGenerator>,
        weather: Arc<dyn WeatherSource>,
        config: &Config,
    ) -> Self {
        Self::new(provider, images, weather, ModelSettings::from(config))
            .with_max_rounds(config.model.max_dispatch_rounds)
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    /// Run one request to completion and shape the outward payload
    pub async fn answer(&self, trip: TripRequest) -> TripResponse {
        aggregate(self.run(trip).await)
    }

    /// Drive the state machine until it reaches Terminal
    pub async fn run(&self, trip: TripRequest) -> FinalResponse {
        info!(
            "Planning {} -> {} ({} traveler(s))",
            trip.origin, trip.destination, trip.traveler_count
        );

        let mut messages = self.context.build_messages(&trip);
        let mut acc = FinalResponse::new();
        let mut rounds = 0;
        let mut state = LoopState::Dispatching;

        loop {
            state = match state {
                LoopState::Dispatching => {
                    if rounds >= self.max_rounds {
                        warn!("Dispatch round limit {} reached", self.max_rounds);
                        LoopState::Terminal(TerminalReason::RoundLimit(self.max_rounds))
                    } else {
                        rounds += 1;
                        debug!("Dispatch round {}", rounds);
                        self.dispatch(&mut messages).await
                    }
                }
                LoopState::AwaitingCapabilities(calls) => {
                    LoopState::Merging(self.invoke_all(calls, &trip, &acc).await)
                }
                LoopState::Merging(settled) => {
                    for entry in settled {
                        ContextBuilder::add_tool_result(
                            &mut messages,
                            &entry.call.id,
                            &entry.call.name,
                            &entry.content(),
                        );
                        if let Outcome::Resolved(capability, result) = entry.outcome {
                            acc = acc.merge(capability, result);
                        }
                    }

                    if acc.all_resolved() {
                        LoopState::Terminal(TerminalReason::AllResolved)
                    } else {
                        LoopState::Dispatching
                    }
                }
                LoopState::Terminal(reason) => {
                    info!("Loop finished after {} round(s): {:?}", rounds, reason);
                    return acc.terminate(reason);
                }
            };
        }
    }

    async fn dispatch(&self, messages: &mut Vec<Message>) -> LoopState {
        let params = ChatParams {
            model: self.settings.model.clone(),
            messages: messages.clone(),
            tools: capabilities::definitions(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            tool_choice: ToolChoice::Auto,
            ..Default::default()
        };

        match self.provider.chat(params).await {
            Ok(response) if response.has_tool_calls() => {
                let ChatResponse {
                    content,
                    tool_calls,
                    ..
                } = response;
                let defs: Vec<ToolCallDef> = tool_calls.iter().map(ToolCallDef::from).collect();
                ContextBuilder::add_assistant_message(messages, content.as_deref(), Some(defs));
                LoopState::AwaitingCapabilities(tool_calls)
            }
            Ok(response) => {
                debug!("Model stopped: {:?}", response.finish_reason);
                LoopState::Terminal(TerminalReason::ModelStopped(response.content))
            }
            Err(e) => {
                warn!("Model dispatch failed: {}", e);
                LoopState::Terminal(TerminalReason::DispatchFailed(e.to_string()))
            }
        }
    }

    /// Answer every call against `trip`; runnable capabilities execute concurrently
    async fn invoke_all(
        &self,
        calls: Vec<ToolCall>,
        trip: &TripRequest,
        acc: &FinalResponse,
    ) -> Vec<Settled> {
        let mut claimed = HashSet::new();
        let mut pending: Vec<BoxFuture<'_, Settled>> = Vec::with_capacity(calls.len());

        for call in calls {
            let decoded = CapabilityCall::from_tool_call(&call, trip);
            let capability = match &decoded {
                Ok(c) => Some(c.capability()),
                Err(CallRejection::InvalidArguments(c, _)) => Some(*c),
                Err(CallRejection::Unknown(_)) => None,
            };

            if let Some(c) = capability {
                if acc.is_resolved(c) || !claimed.insert(c) {
                    debug!("Ignoring repeated request for {}", c);
                    let outcome = Outcome::Rejected(format!("{} was already resolved", c));
                    pending.push(future::ready(Settled { call, outcome }).boxed());
                    continue;
                }
            }

            let entry = match decoded {
                Ok(invocation) => {
                    debug!("Invoking {}", invocation.capability());
                    async move {
                        let capability = invocation.capability();
                        let result = self.capabilities.execute(invocation).await;
                        Settled {
                            call,
                            outcome: Outcome::Resolved(capability, result),
                        }
                    }
                    .boxed()
                }
                Err(CallRejection::InvalidArguments(c, violation)) => {
                    warn!("Invalid arguments for {}: {}", c, violation);
                    let result = CapabilityResult::Failure(format!("invalid arguments: {}", violation));
                    future::ready(Settled {
                        call,
                        outcome: Outcome::Resolved(c, result),
                    })
                    .boxed()
                }
                Err(CallRejection::Unknown(name)) => {
                    warn!("Model requested unknown tool {:?}", name);
                    let outcome = Outcome::Rejected(format!("unknown tool {}", name));
                    future::ready(Settled { call, outcome }).boxed()
                }
            };
            pending.push(entry);
        }

        future::join_all(pending).await
    }
}
