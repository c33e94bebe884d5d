//! OpenAI-compatible reasoning engine.
//!
//! Drives the chat completions endpoint with function calling. Works with
//! OpenAI and any endpoint that mirrors its `/chat/completions` API.
//!
//! Each decision is one non-streaming request. Steps already taken are
//! replayed as an assistant tool call followed by the tool's output, so the
//! model sees its own trace. Only one tool call is requested per turn.

use agentloop_config::EngineConfig;
use agentloop_core::engine::{Decision, DecisionRequest, ReasoningEngine};
use agentloop_core::error::EngineError;
use agentloop_core::message::{Message, Role};
use agentloop_core::tool::{ToolCall, ToolSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Appended when the step budget is spent.
const FINISH_NOW_PROMPT: &str = "You have used every tool call available for this question. \
Do not call any more tools. Answer the user now using only what you already know.";

/// An OpenAI-compatible reasoning engine.
pub struct OpenAiCompatEngine {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    system_prompt: String,
    client: reqwest::Client,
}

impl OpenAiCompatEngine {
    /// Create a new engine against `base_url` (e.g. `https://api.openai.com/v1`).
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: "openai".into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.0,
            system_prompt: String::new(),
            client,
        })
    }

    /// Build the engine from the `[engine]` config section.
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            EngineError::NotConfigured(
                "no API key (set AGENTLOOP_API_KEY or OPENAI_API_KEY)".into(),
            )
        })?;

        Ok(Self::new(
            &config.base_url,
            api_key,
            &config.model,
            Duration::from_secs(config.request_timeout_secs),
        )?
        .with_temperature(config.temperature)
        .with_system_prompt(&config.system_prompt))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Lay out the prompt: system, history, input, then the step trace.
    fn to_api_messages(&self, request: &DecisionRequest<'_>) -> Vec<ApiMessage> {
        let mut messages = Vec::with_capacity(request.history.len() + request.steps.len() * 2 + 3);

        if !self.system_prompt.is_empty() {
            messages.push(ApiMessage::text("system", &self.system_prompt));
        }

        messages.extend(request.history.iter().map(history_message));
        messages.push(ApiMessage::text("user", request.input));

        for step in request.steps {
            messages.push(ApiMessage {
                role: "assistant".into(),
                content: None,
                tool_calls: Some(vec![ApiToolCall {
                    id: step.call.id.clone(),
                    r#type: "function".into(),
                    function: ApiFunction {
                        name: step.call.tool_name.clone(),
                        arguments: step.call.arguments.to_string(),
                    },
                }]),
                tool_call_id: None,
            });
            messages.push(ApiMessage {
                role: "tool".into(),
                content: Some(step.result.output.clone()),
                tool_calls: None,
                tool_call_id: Some(step.call.id.clone()),
            });
        }

        if request.finish_now {
            messages.push(ApiMessage::text("system", FINISH_NOW_PROMPT));
        }

        messages
    }

    /// Convert tool specs to OpenAI API format.
    fn to_api_tools(tools: &[ToolSpec]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.input_schema.clone(),
                },
            })
            .collect()
    }
}

/// History entries with a role the API has no slot for (e.g. recorded
/// "function" output) are replayed as system notes.
fn history_message(message: &Message) -> ApiMessage {
    match message.role() {
        Role::User | Role::Assistant | Role::System => {
            ApiMessage::text(message.role().as_str(), message.content())
        }
        Role::Other(name) => {
            ApiMessage::text("system", &format!("[{name}] {}", message.content()))
        }
    }
}

/// Tool arguments arrive as a JSON-encoded string. Anything that is not
/// valid JSON is passed through verbatim so the tool can reject it.
fn parse_arguments(raw: String) -> serde_json::Value {
    if raw.trim().is_empty() {
        return serde_json::json!({});
    }
    serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw))
}

#[async_trait]
impl ReasoningEngine for OpenAiCompatEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn decide(&self, request: DecisionRequest<'_>) -> Result<Decision, EngineError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": self.to_api_messages(&request),
            "temperature": self.temperature,
            "stream": false,
        });

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(request.tools));
            body["parallel_tool_calls"] = serde_json::json!(false);
            if request.finish_now {
                body["tool_choice"] = serde_json::json!("none");
            }
        }

        debug!(
            engine = %self.name,
            model = %self.model,
            steps = request.steps.len(),
            finish_now = request.finish_now,
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EngineError::Timeout(e.to_string())
                } else {
                    EngineError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(EngineError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(EngineError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Engine returned error");
            return Err(EngineError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| EngineError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::InvalidResponse("No choices in response".into()))?;

        let first_call = choice.message.tool_calls.and_then(|calls| {
            if calls.len() > 1 {
                warn!(count = calls.len(), "Engine asked for several tools, using the first");
            }
            calls.into_iter().next()
        });

        if let Some(tc) = first_call {
            return Ok(Decision::ToolCall(ToolCall {
                id: tc.id,
                tool_name: tc.function.name,
                arguments: parse_arguments(tc.function.arguments),
            }));
        }

        Ok(Decision::final_answer(
            choice.message.content.unwrap_or_default(),
        ))
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ApiMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.into(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}
