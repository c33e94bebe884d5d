//! Configuration loading, validation, and management for agentloop.
//!
//! Loads configuration from `~/.agentloop/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.agentloop/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Reasoning engine (OpenAI-compatible endpoint)
    #[serde(default)]
    pub engine: EngineConfig,

    /// Decision loop limits
    #[serde(default)]
    pub agent: AgentSection,

    /// Conversation memory budget
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Streaming emitter pacing
    #[serde(default)]
    pub stream: StreamConfig,

    /// HTTP gateway
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Built-in tool settings
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub temperature: f32,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-3.5-turbo".into()
}
fn default_system_prompt() -> String {
    "You are a helpful AI assistant.".into()
}
fn default_request_timeout() -> u64 {
    120
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            temperature: 0.0,
            system_prompt: default_system_prompt(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSection {
    /// Maximum tool calls per request
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,
}

fn default_max_steps() -> usize {
    5
}
fn default_tool_timeout() -> u64 {
    30
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            tool_timeout_secs: default_tool_timeout(),
        }
    }
}

impl AgentSection {
    pub fn to_agent_config(&self) -> agentloop_core::AgentConfig {
        agentloop_core::AgentConfig {
            max_steps: self.max_steps,
            tool_timeout: Duration::from_secs(self.tool_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Token budget for prior history handed to the engine
    #[serde(default = "default_memory_tokens")]
    pub max_tokens: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_messages: Option<usize>,
}

fn default_memory_tokens() -> usize {
    2000
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_memory_tokens(),
            max_messages: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_min_delay")]
    pub min_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

fn default_min_delay() -> u64 {
    10
}
fn default_max_delay() -> u64 {
    30
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_port() -> u16 {
    3000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub wikipedia: WikipediaConfig,

    #[serde(default)]
    pub crypto: CryptoConfig,

    #[serde(default)]
    pub documents: DocumentsConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// SerpAPI key; the `search` tool is left out without one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_search_url")]
    pub base_url: String,

    #[serde(default = "default_location")]
    pub location: String,

    #[serde(default = "default_hl")]
    pub hl: String,

    #[serde(default = "default_gl")]
    pub gl: String,
}

fn default_search_url() -> String {
    "https://serpapi.com".into()
}
fn default_location() -> String {
    "Hong Kong".into()
}
fn default_hl() -> String {
    "en".into()
}
fn default_gl() -> String {
    "us".into()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_search_url(),
            location: default_location(),
            hl: default_hl(),
            gl: default_gl(),
        }
    }
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("location", &self.location)
            .field("hl", &self.hl)
            .field("gl", &self.gl)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikipediaConfig {
    #[serde(default = "default_wikipedia_url")]
    pub base_url: String,

    #[serde(default = "default_one")]
    pub top_k: usize,

    #[serde(default = "default_max_doc_chars")]
    pub max_doc_chars: usize,
}

fn default_wikipedia_url() -> String {
    "https://en.wikipedia.org/w/api.php".into()
}
fn default_one() -> usize {
    1
}
fn default_max_doc_chars() -> usize {
    300
}

impl Default for WikipediaConfig {
    fn default() -> Self {
        Self {
            base_url: default_wikipedia_url(),
            top_k: 1,
            max_doc_chars: default_max_doc_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoConfig {
    #[serde(default = "default_coingecko_url")]
    pub base_url: String,
}

fn default_coingecko_url() -> String {
    "https://api.coingecko.com/api/v3".into()
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            base_url: default_coingecko_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentsConfig {
    /// Directory of `.txt`/`.md` files; `documentsQuery` is left out when
    /// unset or unreadable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    #[serde(default = "default_documents_top_k")]
    pub top_k: usize,
}

fn default_documents_top_k() -> usize {
    4
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            dir: None,
            top_k: default_documents_top_k(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.agentloop/config.toml).
    ///
    /// Environment variables override the file:
    /// - `AGENTLOOP_API_KEY`, then `OPENAI_API_KEY`
    /// - `AGENTLOOP_MODEL`, `AGENTLOOP_BASE_URL`
    /// - `SERPAPI_API_KEY`
    /// - `AGENTLOOP_DOCUMENTS_DIR`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// [`AppConfig::load`]).
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(key) = var("AGENTLOOP_API_KEY").or_else(|| var("OPENAI_API_KEY")) {
            self.engine.api_key = Some(key);
        }
        if let Some(model) = var("AGENTLOOP_MODEL") {
            self.engine.model = model;
        }
        if let Some(url) = var("AGENTLOOP_BASE_URL") {
            self.engine.base_url = url;
        }
        if let Some(key) = var("SERPAPI_API_KEY") {
            self.tools.search.api_key = Some(key);
        }
        if let Some(dir) = var("AGENTLOOP_DOCUMENTS_DIR") {
            self.tools.documents.dir = Some(PathBuf::from(dir));
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".agentloop")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.engine.temperature) {
            return Err(ConfigError::ValidationError(
                "engine.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_steps == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_steps must be at least 1".into(),
            ));
        }

        if self.stream.min_delay_ms > self.stream.max_delay_ms {
            return Err(ConfigError::ValidationError(
                "stream.min_delay_ms must not exceed stream.max_delay_ms".into(),
            ));
        }

        Ok(())
    }

    /// Check if an engine API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.engine.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine.temperature, 0.0);
        assert_eq!(config.agent.max_steps, 5);
        assert_eq!(config.memory.max_tokens, 2000);
        assert_eq!(config.stream.min_delay_ms, 10);
        assert_eq!(config.stream.max_delay_ms, 30);
        assert_eq!(config.tools.search.location, "Hong Kong");
        assert_eq!(config.tools.wikipedia.top_k, 1);
        assert_eq!(config.tools.wikipedia.max_doc_chars, 300);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.engine.model, config.engine.model);
        assert_eq!(parsed.gateway.port, config.gateway.port);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.engine.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_step_budget_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_steps = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_stream_delays_rejected() {
        let mut config = AppConfig::default();
        config.stream.min_delay_ms = 50;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.engine.model, "gpt-3.5-turbo");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[agent]\nmax_steps = 3\n\n[memory]\nmax_tokens = 500\nmax_messages = 10\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.agent.max_steps, 3);
        assert_eq!(config.agent.tool_timeout_secs, 30);
        assert_eq!(config.memory.max_tokens, 500);
        assert_eq!(config.memory.max_messages, Some(10));
        assert_eq!(config.stream.max_delay_ms, 30);
    }

    #[test]
    fn invalid_file_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[agent\nmax_steps = ").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-test"),
            ("AGENTLOOP_MODEL", "gpt-4o-mini"),
            ("SERPAPI_API_KEY", "serp"),
            ("AGENTLOOP_DOCUMENTS_DIR", "/srv/docs"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env(|k| vars.get(k).map(|v| v.to_string()));

        assert!(config.has_api_key());
        assert_eq!(config.engine.model, "gpt-4o-mini");
        assert_eq!(config.tools.search.api_key.as_deref(), Some("serp"));
        assert_eq!(
            config.tools.documents.dir.as_deref(),
            Some(Path::new("/srv/docs"))
        );
    }

    #[test]
    fn agentloop_key_wins_over_openai_key() {
        let mut config = AppConfig::default();
        config.apply_env(|k| match k {
            "AGENTLOOP_API_KEY" => Some("primary".into()),
            "OPENAI_API_KEY" => Some("fallback".into()),
            _ => None,
        });
        assert_eq!(config.engine.api_key.as_deref(), Some("primary"));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut config = AppConfig::default();
        config.engine.api_key = Some("sk-very-secret".into());
        config.tools.search.api_key = Some("serp-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-very-secret"));
        assert!(!debug.contains("serp-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn agent_section_converts_to_loop_config() {
        let agent = AgentSection {
            max_steps: 3,
            tool_timeout_secs: 7,
        };
        let config = agent.to_agent_config();
        assert_eq!(config.max_steps, 3);
        assert_eq!(config.tool_timeout, Duration::from_secs(7));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-3.5-turbo"));
        assert!(toml_str.contains("Hong Kong"));
    }
}
