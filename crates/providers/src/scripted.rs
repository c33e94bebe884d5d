//! A reasoning engine that replays a fixed script.
//!
//! Each call to `decide` returns the next scripted entry and records what it
//! was shown. Test-only: compiled under the `test-util` feature so other
//! crates can drive the decision loop without a model.

use agentloop_core::engine::{Decision, DecisionRequest, ReasoningEngine};
use agentloop_core::error::EngineError;
use agentloop_core::tool::ToolCall;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// What the engine was shown on one call.
#[derive(Debug, Clone, PartialEq)]
pub struct SeenRequest {
    pub input: String,
    pub history_len: usize,
    /// Tool names of the steps already taken, oldest first
    pub step_tools: Vec<String>,
    /// Names in the catalog offered on this call
    pub catalog: Vec<String>,
    pub finish_now: bool,
}

enum Script {
    Queue(VecDeque<Result<Decision, EngineError>>),
    Repeat(Decision),
}

pub struct ScriptedEngine {
    script: Mutex<Script>,
    seen: Mutex<Vec<SeenRequest>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedEngine {
    /// Replay `script` in order. Once it runs out every call fails with
    /// [`EngineError::InvalidResponse`].
    pub fn new(script: Vec<Result<Decision, EngineError>>) -> Self {
        Self {
            script: Mutex::new(Script::Queue(script.into())),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Answer every call with the same decision.
    pub fn repeating(decision: Decision) -> Self {
        Self {
            script: Mutex::new(Script::Repeat(decision)),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Call `tool_name` with `arguments`, then answer with `answer`.
    pub fn tool_then_answer(
        tool_name: &str,
        arguments: serde_json::Value,
        answer: &str,
    ) -> Self {
        Self::new(vec![
            Ok(Decision::ToolCall(ToolCall::new(tool_name, arguments))),
            Ok(Decision::final_answer(answer)),
        ])
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        lock(&self.seen).clone()
    }
}

#[async_trait]
impl ReasoningEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn decide(&self, request: DecisionRequest<'_>) -> Result<Decision, EngineError> {
        lock(&self.seen).push(SeenRequest {
            input: request.input.to_string(),
            history_len: request.history.len(),
            step_tools: request
                .steps
                .iter()
                .map(|s| s.call.tool_name.clone())
                .collect(),
            catalog: request.tools.iter().map(|t| t.name.clone()).collect(),
            finish_now: request.finish_now,
        });

        match &mut *lock(&self.script) {
            Script::Repeat(decision) => Ok(decision.clone()),
            Script::Queue(queue) => queue
                .pop_front()
                .unwrap_or_else(|| Err(EngineError::InvalidResponse("script exhausted".into()))),
        }
    }
}
