//! Agent configuration, per-request state and the decision trace.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::message::Message;
use crate::tool::{ToolCall, ToolResult};

/// Returned when the step budget runs out and the engine gives no usable
/// final answer.
pub const ABORT_MARKER: &str = "Agent stopped due to max iterations.";

/// Configuration for the decision loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Maximum tool calls per request (safety limit)
    pub max_steps: usize,

    /// Upper bound on a single tool invocation
    pub tool_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 5,
            tool_timeout: Duration::from_secs(30),
        }
    }
}

/// One executed tool call and what came back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntermediateStep {
    pub call: ToolCall,
    pub result: ToolResult,
}

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Reasoning,
    ToolExecuting,
    Final,
    Aborted,
}

/// How a loop run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Final,
    Aborted,
}

/// Runtime state of one decision loop. Owned by a single invocation.
#[derive(Debug, Clone, Default)]
pub struct AgentState {
    pub history: Vec<Message>,
    pub steps: Vec<IntermediateStep>,
    pub step_count: usize,
    pub status: AgentStatus,
}

impl AgentState {
    pub fn new(history: Vec<Message>) -> Self {
        Self {
            history,
            ..Default::default()
        }
    }

    /// Append a finished step and go back to reasoning.
    pub fn push_step(&mut self, step: IntermediateStep) {
        self.steps.push(step);
        self.step_count += 1;
        self.status = AgentStatus::Reasoning;
    }

    pub fn budget_spent(&self, max_steps: usize) -> bool {
        self.step_count >= max_steps
    }
}

/// What a loop run hands back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub final_output: String,
    pub intermediate_steps: Vec<IntermediateStep>,
    pub outcome: Outcome,
}

impl ExecutionResult {
    pub fn is_aborted(&self) -> bool {
        self.outcome == Outcome::Aborted
    }
}
