//! `search`: web search through SerpAPI.
//!
//! Only registered when an API key is configured. The answer is pulled from
//! the richest part of the result page that has one: answer box, sports
//! spotlight, knowledge graph, then the first organic snippet.

use agentloop_config::SearchConfig;
use agentloop_core::error::ToolError;
use agentloop_core::tool::Tool;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::required_str;

const TOOL_NAME: &str = "search";
pub const NO_RESULT: &str = "No good search result found";

pub struct WebSearchTool {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    location: String,
    hl: String,
    gl: String,
}

impl WebSearchTool {
    /// `None` when no API key is configured.
    pub fn from_config(client: reqwest::Client, config: &SearchConfig) -> Option<Self> {
        let api_key = config.api_key.clone()?;
        Some(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            location: config.location.clone(),
            hl: config.hl.clone(),
            gl: config.gl.clone(),
        })
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "a search engine. useful for when you need to answer questions about current events. \
         input should be a search query."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "input": { "type": "string", "description": "The search query" }
            },
            "required": ["input"]
        })
    }

    async fn invoke(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let query = required_str(&arguments, "input")?;
        debug!(query, location = %self.location, "Running web search");

        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("engine", "google"),
                ("q", query),
                ("location", self.location.as_str()),
                ("hl", self.hl.as_str()),
                ("gl", self.gl.as_str()),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ToolError::Network(e.to_string()))?;

        let status = response.status();
        let body: Value = response.json().await.map_err(|e| ToolError::ExecutionFailed {
            tool_name: TOOL_NAME.into(),
            reason: format!("unreadable search response ({status}): {e}"),
        })?;

        if let Some(error) = body["error"].as_str() {
            return Err(ToolError::ExecutionFailed {
                tool_name: TOOL_NAME.into(),
                reason: error.to_string(),
            });
        }

        Ok(pick_answer(&body).unwrap_or_else(|| NO_RESULT.to_string()))
    }
}

fn pick_answer(body: &Value) -> Option<String> {
    let answer_box = &body["answer_box"];
    let candidates = [
        &answer_box["answer"],
        &answer_box["snippet"],
        &answer_box["snippet_highlighted_words"][0],
        &body["sports_results"]["game_spotlight"],
        &body["knowledge_graph"]["description"],
        &body["organic_results"][0]["snippet"],
    ];

    candidates.into_iter().find_map(|v| match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(_) | Value::Object(_) => Some(v.to_string()),
        _ => None,
    })
}
