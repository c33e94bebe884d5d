//! # agentloop core
//!
//! Domain types, traits and error definitions for the agentloop chat agent.
//! Nothing here talks to the network: the reasoning engine and the tools are
//! traits, implemented in the `providers` and `tools` crates.

pub mod agent;
pub mod engine;
pub mod error;
pub mod event;
pub mod message;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{
    ABORT_MARKER, AgentConfig, AgentState, AgentStatus, ExecutionResult, IntermediateStep, Outcome,
};
pub use engine::{Decision, DecisionRequest, ReasoningEngine};
pub use error::{EngineError, Error, InputError, Result, ToolError};
pub use event::{DomainEvent, EventBus};
pub use message::{Message, Role};
pub use tool::{FnTool, Tool, ToolCall, ToolRegistry, ToolResult, ToolSpec};
