//! The agent decision loop implementation.

use agentloop_core::agent::{
    ABORT_MARKER, AgentConfig, AgentState, AgentStatus, ExecutionResult, IntermediateStep, Outcome,
};
use agentloop_core::engine::{Decision, DecisionRequest, ReasoningEngine};
use agentloop_core::event::{DomainEvent, EventBus};
use agentloop_core::message::Message;
use agentloop_core::tool::{ToolRegistry, ToolSpec};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::context::MemoryBuffer;

/// Orchestrates engine decisions and tool execution for one request at a
/// time. Holds no per-request state, so one instance serves every request.
pub struct AgentLoop {
    /// The reasoning engine to consult
    engine: Arc<dyn ReasoningEngine>,

    /// Step budget and tool timeout
    config: AgentConfig,

    /// Trims history before it reaches the engine
    memory: MemoryBuffer,

    /// Event bus for domain events
    event_bus: Arc<EventBus>,
}

impl AgentLoop {
    /// Create a new agent loop with default limits.
    pub fn new(engine: Arc<dyn ReasoningEngine>, event_bus: Arc<EventBus>) -> Self {
        Self {
            engine,
            config: AgentConfig::default(),
            memory: MemoryBuffer::default(),
            event_bus,
        }
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the maximum number of tool calls per request.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.config.max_steps = max_steps;
        self
    }

    pub fn with_memory(mut self, memory: MemoryBuffer) -> Self {
        self.memory = memory;
        self
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Answer `input` given the prior `history`, calling tools from `tools`.
    ///
    /// Only engine failures during normal reasoning are errors. Tool
    /// failures become failed steps, and running out of steps yields a
    /// forced answer or [`ABORT_MARKER`].
    pub async fn run(
        &self,
        history: &[Message],
        input: &str,
        tools: &ToolRegistry,
    ) -> agentloop_core::Result<ExecutionResult> {
        let started = Instant::now();
        let catalog = tools.list();
        let mut state = AgentState::new(self.memory.trim(history));

        info!(
            engine = self.engine.name(),
            history = state.history.len(),
            tools = catalog.len(),
            max_steps = self.config.max_steps,
            "Starting decision loop"
        );

        loop {
            if state.budget_spent(self.config.max_steps) {
                return Ok(self.abort(state, input, &catalog, started).await);
            }

            state.status = AgentStatus::Reasoning;
            debug!(step = state.step_count + 1, "Asking engine for next decision");

            let decision = self
                .engine
                .decide(DecisionRequest {
                    history: &state.history,
                    input,
                    steps: &state.steps,
                    tools: &catalog,
                    finish_now: false,
                })
                .await
                .inspect_err(|e| {
                    error!(error = %e, step = state.step_count + 1, "Reasoning engine failed");
                    self.event_bus.publish(DomainEvent::ErrorOccurred {
                        context: "decide".into(),
                        error_message: e.to_string(),
                        timestamp: Utc::now(),
                    });
                })?;

            self.event_bus.publish(DomainEvent::DecisionMade {
                step: state.step_count + 1,
                tool_name: match &decision {
                    Decision::ToolCall(call) => Some(call.tool_name.clone()),
                    Decision::Final { .. } => None,
                },
                timestamp: Utc::now(),
            });

            match decision {
                Decision::Final { output } => {
                    state.status = AgentStatus::Final;
                    return Ok(self.finish(state, output, Outcome::Final, started));
                }
                Decision::ToolCall(call) => {
                    state.status = AgentStatus::ToolExecuting;
                    let tool_started = Instant::now();
                    let result = tools.execute(&call, self.config.tool_timeout).await;
                    let duration_ms = tool_started.elapsed().as_millis() as u64;

                    debug!(
                        tool = %call.tool_name,
                        failed = result.failed,
                        duration_ms,
                        "Tool step finished"
                    );
                    self.event_bus.publish(DomainEvent::ToolExecuted {
                        tool_name: call.tool_name.clone(),
                        failed: result.failed,
                        duration_ms,
                        timestamp: Utc::now(),
                    });

                    state.push_step(IntermediateStep { call, result });
                }
            }
        }
    }

    /// Step budget spent: one last engine call that must not pick a tool.
    async fn abort(
        &self,
        mut state: AgentState,
        input: &str,
        catalog: &[ToolSpec],
        started: Instant,
    ) -> ExecutionResult {
        warn!(
            steps = state.step_count,
            max_steps = self.config.max_steps,
            "Step limit reached, asking for a final answer"
        );
        state.status = AgentStatus::Aborted;

        let forced = self
            .engine
            .decide(DecisionRequest {
                history: &state.history,
                input,
                steps: &state.steps,
                tools: catalog,
                finish_now: true,
            })
            .await;

        let output = match forced {
            Ok(Decision::Final { output }) if !output.trim().is_empty() => output,
            Ok(_) => {
                warn!("Engine gave no usable final answer after the step limit");
                ABORT_MARKER.to_string()
            }
            Err(e) => {
                warn!(error = %e, "Engine failed after the step limit");
                ABORT_MARKER.to_string()
            }
        };

        self.finish(state, output, Outcome::Aborted, started)
    }

    fn finish(
        &self,
        state: AgentState,
        final_output: String,
        outcome: Outcome,
        started: Instant,
    ) -> ExecutionResult {
        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            steps = state.step_count,
            outcome = ?outcome,
            duration_ms,
            "Decision loop finished"
        );
        self.event_bus.publish(DomainEvent::LoopFinished {
            steps: state.step_count,
            aborted: outcome == Outcome::Aborted,
            duration_ms,
            timestamp: Utc::now(),
        });

        ExecutionResult {
            final_output,
            intermediate_steps: state.steps,
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentloop_core::error::{EngineError, Error, ToolError};
    use agentloop_core::tool::{FnTool, ToolCall};
    use agentloop_providers::ScriptedEngine;
    use agentloop_tools::FooTool;
    use agentloop_tools::foo::FOO_ANSWER;
    use serde_json::json;

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(FooTool)).unwrap();
        registry
            .register(Box::new(FnTool::new(
                "fetchCryptoPrice",
                "Fetches the current price of a specified cryptocurrency",
                json!({"type": "object"}),
                |_| async { Err(ToolError::Network("connection refused".into())) },
            )))
            .unwrap();
        registry
    }

    fn agent(engine: Arc<ScriptedEngine>) -> AgentLoop {
        AgentLoop::new(engine, Arc::new(EventBus::default()))
    }

    fn call(tool: &str) -> Decision {
        Decision::ToolCall(ToolCall::new(tool, json!({})))
    }

    #[tokio::test]
    async fn direct_answer_takes_no_steps() {
        let engine = Arc::new(ScriptedEngine::new(vec![Ok(Decision::final_answer(
            "Hello! How can I help?",
        ))]));
        let result = agent(engine.clone())
            .run(&[], "Hello!", &registry())
            .await
            .unwrap();

        assert_eq!(result.final_output, "Hello! How can I help?");
        assert_eq!(result.outcome, Outcome::Final);
        assert!(result.intermediate_steps.is_empty());
        assert_eq!(engine.seen()[0].catalog, vec!["foo", "fetchCryptoPrice"]);
    }

    #[tokio::test]
    async fn tool_result_feeds_the_next_decision() {
        let engine = Arc::new(ScriptedEngine::tool_then_answer(
            "foo",
            json!({}),
            "foo is \"This is a demo\"",
        ));
        let result = agent(engine.clone())
            .run(&[], "What is foo?", &registry())
            .await
            .unwrap();

        assert_eq!(result.intermediate_steps.len(), 1);
        let step = &result.intermediate_steps[0];
        assert_eq!(step.call.tool_name, "foo");
        assert_eq!(step.result.output, FOO_ANSWER);
        assert!(!step.result.failed);

        let seen = engine.seen();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].step_tools.is_empty());
        assert_eq!(seen[1].step_tools, vec!["foo"]);
    }

    #[tokio::test]
    async fn failed_tool_does_not_end_the_loop() {
        let engine = Arc::new(ScriptedEngine::tool_then_answer(
            "fetchCryptoPrice",
            json!({"cryptoName": "bitcoin"}),
            "I could not fetch the price right now.",
        ));
        let result = agent(engine).run(&[], "BTC?", &registry()).await.unwrap();

        assert_eq!(result.outcome, Outcome::Final);
        let step = &result.intermediate_steps[0];
        assert!(step.result.failed);
        assert!(step.result.output.contains("connection refused"));
    }

    #[tokio::test]
    async fn unknown_tool_is_a_failed_step() {
        let engine = Arc::new(ScriptedEngine::new(vec![
            Ok(call("doesNotExist")),
            Ok(Decision::final_answer("ok")),
        ]));
        let result = agent(engine).run(&[], "q", &registry()).await.unwrap();
        assert!(result.intermediate_steps[0].result.failed);
    }

    #[tokio::test]
    async fn steps_keep_call_order() {
        let engine = Arc::new(ScriptedEngine::new(vec![
            Ok(call("foo")),
            Ok(call("fetchCryptoPrice")),
            Ok(call("foo")),
            Ok(Decision::final_answer("done")),
        ]));
        let result = agent(engine).run(&[], "q", &registry()).await.unwrap();
        let names: Vec<_> = result
            .intermediate_steps
            .iter()
            .map(|s| s.call.tool_name.as_str())
            .collect();
        assert_eq!(names, vec!["foo", "fetchCryptoPrice", "foo"]);
    }

    #[tokio::test]
    async fn step_limit_aborts_with_marker() {
        let engine = Arc::new(ScriptedEngine::repeating(call("foo")));
        let result = agent(engine.clone())
            .with_max_steps(3)
            .run(&[], "loop forever", &registry())
            .await
            .unwrap();

        assert_eq!(result.outcome, Outcome::Aborted);
        assert_eq!(result.final_output, ABORT_MARKER);
        assert_eq!(result.intermediate_steps.len(), 3);

        let seen = engine.seen();
        assert_eq!(seen.len(), 4);
        let last = seen.last().unwrap();
        assert!(last.finish_now);
        assert_eq!(last.catalog, vec!["foo", "fetchCryptoPrice"]);
    }

    #[tokio::test]
    async fn step_limit_uses_forced_answer_when_given() {
        let engine = Arc::new(ScriptedEngine::new(vec![
            Ok(call("foo")),
            Ok(Decision::final_answer("best effort answer")),
        ]));
        let result = agent(engine)
            .with_max_steps(1)
            .run(&[], "q", &registry())
            .await
            .unwrap();
        assert!(result.is_aborted());
        assert_eq!(result.final_output, "best effort answer");
    }

    #[tokio::test]
    async fn engine_failure_after_limit_is_not_an_error() {
        let engine = Arc::new(ScriptedEngine::new(vec![
            Ok(call("foo")),
            Err(EngineError::Network("down".into())),
        ]));
        let result = agent(engine)
            .with_max_steps(1)
            .run(&[], "q", &registry())
            .await
            .unwrap();
        assert_eq!(result.final_output, ABORT_MARKER);
    }

    #[tokio::test]
    async fn engine_failure_during_reasoning_is_fatal() {
        let engine = Arc::new(ScriptedEngine::new(vec![Err(
            EngineError::AuthenticationFailed("bad key".into()),
        )]));
        let err = agent(engine).run(&[], "q", &registry()).await.unwrap_err();
        assert!(matches!(err, Error::Engine(EngineError::AuthenticationFailed(_))));
    }

    #[tokio::test]
    async fn history_is_trimmed_before_reaching_the_engine() {
        let engine = Arc::new(ScriptedEngine::new(vec![Ok(Decision::final_answer("ok"))]));
        let history: Vec<_> = (0..10).map(|i| Message::user(format!("m{i:02}"))).collect();
        agent(engine.clone())
            .with_memory(MemoryBuffer::new(15))
            .run(&history, "q", &registry())
            .await
            .unwrap();
        assert_eq!(engine.seen()[0].history_len, 3);
    }

    #[tokio::test]
    async fn events_trace_the_run() {
        let engine = Arc::new(ScriptedEngine::tool_then_answer("foo", json!({}), "done"));
        let agent = agent(engine);
        let mut rx = agent.event_bus().subscribe();

        agent.run(&[], "q", &registry()).await.unwrap();

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(match event.as_ref() {
                DomainEvent::DecisionMade { .. } => "decision",
                DomainEvent::ToolExecuted { .. } => "tool",
                DomainEvent::LoopFinished { .. } => "finished",
                DomainEvent::ErrorOccurred { .. } => "error",
            });
        }
        assert_eq!(kinds, vec!["decision", "tool", "decision", "finished"]);
    }
}
