//! ReasoningEngine trait: the abstraction over whatever decides the next move.
//!
//! Given the conversation so far, the steps already taken and a tool catalog,
//! an engine answers with exactly one [`Decision`]: call a tool, or finish.
//!
//! Implementations: OpenAI-compatible chat completions, scripted mocks in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::agent::IntermediateStep;
use crate::error::EngineError;
use crate::message::Message;
use crate::tool::{ToolCall, ToolSpec};

/// Everything an engine sees when asked for one decision.
#[derive(Debug, Clone, Copy)]
pub struct DecisionRequest<'a> {
    /// Trimmed prior conversation
    pub history: &'a [Message],

    /// The message being answered
    pub input: &'a str,

    /// Steps already taken for this input, oldest first
    pub steps: &'a [IntermediateStep],

    /// Tools on offer; none may be called when `finish_now` is set
    pub tools: &'a [ToolSpec],

    /// The step budget is spent; answer with what is known
    pub finish_now: bool,
}

/// What the engine decided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Decision {
    ToolCall(ToolCall),
    Final { output: String },
}

impl Decision {
    pub fn final_answer(output: impl Into<String>) -> Self {
        Decision::Final {
            output: output.into(),
        }
    }
}

/// The core ReasoningEngine trait.
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    /// Human-readable name (e.g. "openai")
    fn name(&self) -> &str;

    /// Ask for the next decision.
    async fn decide(&self, request: DecisionRequest<'_>) -> Result<Decision, EngineError>;
}
