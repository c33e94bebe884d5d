//! `wikipedia-api`: search Wikipedia and return page summaries.
//!
//! Two MediaWiki calls: a full-text search for the top `top_k` titles, then
//! a plain-text extract for each title. Summaries are joined and cut to
//! `max_doc_chars` characters.

use agentloop_core::error::ToolError;
use agentloop_core::tool::Tool;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::required_str;

const TOOL_NAME: &str = "wikipedia-api";
pub const NO_RESULT: &str = "No good Wikipedia Search Result was found";

pub struct WikipediaTool {
    client: reqwest::Client,
    base_url: String,
    top_k: usize,
    max_doc_chars: usize,
}

impl WikipediaTool {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            top_k: 1,
            max_doc_chars: 300,
        }
    }

    pub fn with_limits(mut self, top_k: usize, max_doc_chars: usize) -> Self {
        self.top_k = top_k.max(1);
        self.max_doc_chars = max_doc_chars;
        self
    }

    async fn get<T: for<'de> Deserialize<'de>>(
        &self,
        params: &[(&str, &str)],
    ) -> Result<T, ToolError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("format", "json"), ("action", "query")])
            .query(params)
            .send()
            .await
            .map_err(|e| ToolError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::ExecutionFailed {
                tool_name: TOOL_NAME.into(),
                reason: format!("Wikipedia returned {status}"),
            });
        }

        response.json().await.map_err(|e| ToolError::ExecutionFailed {
            tool_name: TOOL_NAME.into(),
            reason: format!("unreadable Wikipedia response: {e}"),
        })
    }

    async fn search(&self, query: &str) -> Result<Vec<String>, ToolError> {
        let limit = self.top_k.to_string();
        let body: SearchResponse = self
            .get(&[("list", "search"), ("srsearch", query), ("srlimit", limit.as_str())])
            .await?;
        Ok(body
            .query
            .search
            .into_iter()
            .take(self.top_k)
            .map(|hit| hit.title)
            .collect())
    }

    async fn extract(&self, title: &str) -> Result<Option<String>, ToolError> {
        let body: ExtractResponse = self
            .get(&[
                ("prop", "extracts"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("titles", title),
            ])
            .await?;
        Ok(body
            .query
            .pages
            .into_values()
            .find_map(|page| page.extract.filter(|e| !e.is_empty())))
    }
}

#[async_trait]
impl Tool for WikipediaTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "A tool for interacting with and fetching data from the Wikipedia API."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "input": { "type": "string", "description": "What to look up" }
            },
            "required": ["input"]
        })
    }

    async fn invoke(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let query = required_str(&arguments, "input")?;
        debug!(query, "Searching Wikipedia");

        let mut summaries = Vec::new();
        for title in self.search(query).await? {
            match self.extract(&title).await? {
                Some(extract) => summaries.push(format!("Page: {title}\nSummary: {extract}")),
                None => warn!(title = %title, "Wikipedia page has no extract"),
            }
        }

        if summaries.is_empty() {
            return Ok(NO_RESULT.into());
        }
        Ok(summaries
            .join("\n\n")
            .chars()
            .take(self.max_doc_chars)
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: SearchQuery,
}

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    query: ExtractQuery,
}

#[derive(Debug, Default, Deserialize)]
struct ExtractQuery {
    #[serde(default)]
    pages: std::collections::HashMap<String, Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    extract: Option<String>,
}
