//! Error types for the agentloop domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; only [`InputError`] and
//! [`EngineError`] are ever surfaced to a caller as a failed request.
//! [`ToolError`] never leaves the decision loop.

use std::time::Duration;

use thiserror::Error;

/// The top-level error type for all agentloop operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Reasoning engine errors (fatal for a request) ---
    #[error("Reasoning engine error: {0}")]
    Engine(#[from] EngineError),

    // --- Caller input errors ---
    #[error("Invalid input: {0}")]
    Input(#[from] InputError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of the reasoning engine itself. There is no fallback
/// reasoning path, so these end the request.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by engine, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Engine not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed engine response: {0}")]
    InvalidResponse(String),
}

/// Failures inside a capability. The decision loop converts every one
/// of these into a failed `ToolResult`.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool already registered: {0}")]
    Duplicate(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout:?}")]
    Timeout { tool_name: String, timeout: Duration },

    #[error("Tool panicked: {0}")]
    Panicked(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Backing resource unavailable: {0}")]
    Unavailable(String),
}

/// Malformed chat input, rejected before the decision loop starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("messages must not be empty")]
    EmptyConversation,

    #[error("message {index} is missing a role")]
    MissingRole { index: usize },

    #[error("message {index} is missing content")]
    MissingContent { index: usize },

    #[error("no user or assistant messages to answer")]
    NoConversationalTurns,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_error_displays_correctly() {
        let err = Error::Engine(EngineError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn tool_error_displays_correctly() {
        let err = ToolError::Timeout {
            tool_name: "fetchCryptoPrice".into(),
            timeout: Duration::from_secs(30),
        };
        assert!(err.to_string().contains("fetchCryptoPrice"));
        assert!(err.to_string().contains("30s"));
    }

    #[test]
    fn sub_second_timeout_keeps_its_unit() {
        let err = ToolError::Timeout {
            tool_name: "searchDocs".into(),
            timeout: Duration::from_millis(250),
        };
        assert_eq!(err.to_string(), "Tool timed out: searchDocs after 250ms");
    }

    #[test]
    fn input_error_converts_into_top_level() {
        let err: Error = InputError::EmptyConversation.into();
        assert!(matches!(err, Error::Input(InputError::EmptyConversation)));
        assert_eq!(err.to_string(), "Invalid input: messages must not be empty");
    }

    #[test]
    fn input_error_names_the_index() {
        let err = InputError::MissingContent { index: 3 };
        assert_eq!(err.to_string(), "message 3 is missing content");
    }
}
