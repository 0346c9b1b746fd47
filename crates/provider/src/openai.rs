//! OpenAI-compatible chat completion client

use crate::*;
use reqwest::Client;
use serde_json::json;

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Chat completion provider for OpenAI-compatible endpoints
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    api_base: String,
    default_model: String,
}

impl OpenAiProvider {
    pub fn new(
        api_key: impl Into<String>,
        api_base: Option<String>,
        default_model: Option<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_base: api_base
                .map(|b| b.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            default_model: default_model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }

    fn build_request(&self, params: &ChatParams) -> serde_json::Value {
        let model = if params.model.is_empty() {
            self.default_model.clone()
        } else {
            params.model.clone()
        };

        let messages: Vec<serde_json::Value> = params
            .messages
            .iter()
            .map(|m| {
                let mut obj = json!({ "role": &m.role });
                if let Some(content) = &m.content {
                    obj["content"] = json!(content);
                }
                if let Some(tool_calls) = &m.tool_calls {
                    // The wire format carries arguments as an encoded JSON string
                    let calls: Vec<serde_json::Value> = tool_calls
                        .iter()
                        .map(|c| {
                            json!({
                                "id": &c.id,
                                "type": &c.call_type,
                                "function": {
                                    "name": &c.function.name,
                                    "arguments": c.function.arguments.to_string(),
                                }
                            })
                        })
                        .collect();
                    obj["tool_calls"] = json!(calls);
                }
                if let Some(tool_call_id) = &m.tool_call_id {
                    obj["tool_call_id"] = json!(tool_call_id);
                }
                if let Some(name) = &m.name {
                    obj["name"] = json!(name);
                }
                obj
            })
            .collect();

        let mut body = json!({
            "model": model,
            "messages": messages,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
        });

        if !params.tools.is_empty() {
            let tools: Vec<serde_json::Value> = params
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": &t.function.name,
                            "description": &t.function.description,
                            "parameters": &t.function.parameters
                        }
                    })
                })
                .collect();

            body["tools"] = json!(tools);
            body["tool_choice"] = match &params.tool_choice {
                ToolChoice::Auto => json!("auto"),
                ToolChoice::None => json!("none"),
            };
        }

        if let Some(format) = &params.response_format {
            body["response_format"] = format.to_json();
        }

        body
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<ChatResponse> {
        let choice = json["choices"]
            .get(0)
            .ok_or(ProviderError::InvalidResponse)?;
        let message = &choice["message"];
        let content = message["content"].as_str().map(|s| s.to_string());
        let finish_reason = choice["finish_reason"]
            .as_str()
            .unwrap_or("stop")
            .to_string();

        let mut tool_calls = Vec::new();
        if let Some(calls) = message["tool_calls"].as_array() {
            for call in calls {
                let function = &call["function"];
                let args = function["arguments"]
                    .as_str()
                    .and_then(|s| serde_json::from_str(s).ok())
                    .unwrap_or_else(|| function["arguments"].clone());

                tool_calls.push(ToolCall {
                    id: call["id"].as_str().unwrap_or("").to_string(),
                    name: function["name"].as_str().unwrap_or("").to_string(),
                    arguments: args,
                });
            }
        }

        let usage = if let Some(usage) = json["usage"].as_object() {
            let count = |key: &str| usage.get(key).and_then(|v| v.as_u64()).unwrap_or(0) as u32;
            Usage {
                prompt_tokens: count("prompt_tokens"),
                completion_tokens: count("completion_tokens"),
                total_tokens: count("total_tokens"),
            }
        } else {
            Usage::default()
        };

        Ok(ChatResponse {
            content,
            tool_calls,
            finish_reason,
            usage,
        })
    }
}

#[async_trait::async_trait]
impl Provider for OpenAiProvider {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NoApiKey);
        }
        trace!("Sending chat completion to {}", self.api_base);

        let url = format!("{}/chat/completions", self.api_base);
        let body = self.build_request(&params);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited);
        }
        let json: serde_json::Value = response.json().await?;

        if !status.is_success() {
            return Err(ProviderError::Api(api_error_message(&json)));
        }

        debug!(
            "Chat completion returned {} tool calls",
            json["choices"][0]["message"]["tool_calls"]
                .as_array()
                .map(|v| v.len())
                .unwrap_or(0)
        );

        self.parse_response(json)
    }
}
