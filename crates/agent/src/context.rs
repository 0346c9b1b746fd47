//! Conversation assembly for the dispatch loop

use chrono::Local;

use tripcast_provider::{Message, ToolCallDef};

use crate::trip::TripRequest;

/// Builds the opening conversation and appends later turns
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder;

impl ContextBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build the system prompt
    pub fn build_system_prompt(&self) -> String {
        let today = Local::now().format("%Y-%m-%d (%A)");

        format!(
            r#"# tripcast

You are tripcast, a travel assistant. You have two tools:
- plan_logistics: picks one flight and one hotel for the trip and suggests activities
- get_weather: describes the current weather at the destination with an image

## Today
{}

Answer both of the traveler's questions by calling both tools in the same turn. Pass the trip
details exactly as given. Do not invent results yourself; once the tools have answered, reply
briefly without calling them again."#,
            today
        )
    }

    /// Both questions in one task so the model asks for both tools at once
    pub fn task_description(&self, trip: &TripRequest) -> String {
        format!(
            r#"I am planning a {trip_type} trip.

- Destination: {destination}
- Flying from: {origin}
- Dates: {depart} to {ret}
- Budget: ${budget} total
- Travelers: {travelers}

1. What flight and hotel should I book, and what should we do there?
2. What is the weather like in {destination} right now?"#,
            trip_type = trip.trip_type,
            destination = trip.destination,
            origin = trip.origin,
            depart = trip.depart_date,
            ret = trip.return_date,
            budget = trip.budget,
            travelers = trip.traveler_count,
        )
    }

    /// Build complete messages list for the first dispatch
    pub fn build_messages(&self, trip: &TripRequest) -> Vec<Message> {
        vec![
            Message::system(self.build_system_prompt()),
            Message::user(self.task_description(trip)),
        ]
    }

    /// Add a tool result to messages
    pub fn add_tool_result(messages: &mut Vec<Message>, tool_call_id: &str, name: &str, result: &str) {
        messages.push(Message::tool(tool_call_id, name, result));
    }

    /// Add an assistant message with tool calls
    pub fn add_assistant_message(
        messages: &mut Vec<Message>,
        content: Option<&str>,
        tool_calls: Option<Vec<ToolCallDef>>,
    ) {
        let mut msg = Message::assistant(content.unwrap_or(""));
        if let Some(calls) = tool_calls {
            msg.tool_calls = Some(calls);
        }
        messages.push(msg);
    }
}
