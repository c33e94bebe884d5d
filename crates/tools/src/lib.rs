//! Built-in tool implementations for agentloop.
//!
//! Tools give the agent access to the outside world: a demo answer, crypto
//! prices, Wikipedia, web search, arithmetic, and a local document folder.
//! Two of them are conditional: `search` needs a SerpAPI key and
//! `documentsQuery` needs a document index that loaded.

pub mod calculator;
pub mod crypto_price;
pub mod documents;
pub mod foo;
pub mod web_search;
pub mod wikipedia;

use agentloop_config::{DocumentsConfig, ToolsConfig};
use agentloop_core::error::ToolError;
use agentloop_core::tool::{Tool, ToolRegistry};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub use calculator::CalculatorTool;
pub use crypto_price::CryptoPriceTool;
pub use documents::{DocumentIndex, DocumentsQueryTool};
pub use foo::FooTool;
pub use web_search::WebSearchTool;
pub use wikipedia::WikipediaTool;

/// Fetch a required string argument.
pub(crate) fn required_str<'a>(
    arguments: &'a serde_json::Value,
    key: &str,
) -> Result<&'a str, ToolError> {
    arguments[key]
        .as_str()
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{key}' argument")))
}

/// Load the document index once at startup. `None` when no directory is
/// configured or it cannot be indexed.
pub fn load_documents(config: &DocumentsConfig) -> Option<Arc<DocumentIndex>> {
    let dir = config.dir.as_deref()?;
    match DocumentIndex::load(dir) {
        Ok(index) => Some(Arc::new(index)),
        Err(e) => {
            warn!(error = %e, "Document index unavailable");
            None
        }
    }
}

/// Build the frozen tool catalog, in the order the engine sees it:
/// `foo`, `fetchCryptoPrice`, `wikipedia-api`, `search`, `calculator`,
/// `documentsQuery`.
pub fn build_registry(
    config: &ToolsConfig,
    documents: Option<Arc<DocumentIndex>>,
) -> Result<ToolRegistry, ToolError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(20))
        .user_agent(concat!("agentloop/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ToolError::Unavailable(format!("HTTP client: {e}")))?;

    let mut registry = ToolRegistry::new();
    registry.register(Box::new(FooTool))?;
    registry.register(Box::new(CryptoPriceTool::new(
        client.clone(),
        &config.crypto.base_url,
    )))?;
    registry.register(Box::new(
        WikipediaTool::new(client.clone(), &config.wikipedia.base_url)
            .with_limits(config.wikipedia.top_k, config.wikipedia.max_doc_chars),
    ))?;
    registry.register_optional(
        "search",
        WebSearchTool::from_config(client, &config.search).map(|t| Box::new(t) as Box<dyn Tool>),
    )?;
    registry.register(Box::new(CalculatorTool))?;
    registry.register_optional(
        "documentsQuery",
        documents.map(|index| {
            Box::new(DocumentsQueryTool::new(index, config.documents.top_k)) as Box<dyn Tool>
        }),
    )?;

    info!(tools = ?registry.names(), "Tool catalog ready");
    Ok(registry)
}
