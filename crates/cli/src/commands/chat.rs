//! `agentloop chat`: Interactive or single-message chat mode.
//!
//! The answer is streamed to stdout through the same emitter the gateway
//! uses. In interactive mode the conversation is carried between turns and
//! trimmed by the memory buffer.

use std::io::Write;
use std::sync::Arc;

use agentloop_agent::{AgentLoop, MemoryBuffer, StreamEmitter};
use agentloop_config::AppConfig;
use agentloop_core::agent::{ExecutionResult, IntermediateStep};
use agentloop_core::event::{DomainEvent, EventBus};
use agentloop_core::message::Message;
use agentloop_core::tool::ToolRegistry;
use agentloop_providers::OpenAiCompatEngine;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::StreamExt;

struct Session {
    agent: AgentLoop,
    tools: ToolRegistry,
    emitter: StreamEmitter,
    show_steps: bool,
}

pub async fn run(
    message: Option<String>,
    show_steps: bool,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for API key early, give a clear error
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    AGENTLOOP_API_KEY=sk-...");
        eprintln!("    OPENAI_API_KEY=sk-...");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let engine = Arc::new(OpenAiCompatEngine::from_config(&config.engine)?);
    let documents = agentloop_tools::load_documents(&config.tools.documents);
    let tools = agentloop_tools::build_registry(&config.tools, documents)?;

    let event_bus = Arc::new(EventBus::default());
    if verbose {
        spawn_event_printer(&event_bus);
    }

    let memory = MemoryBuffer::from_config(&config.memory);
    let session = Session {
        agent: AgentLoop::new(engine, event_bus)
            .with_config(config.agent.to_agent_config())
            .with_memory(memory.clone()),
        tools,
        emitter: StreamEmitter::from_config(&config.stream),
        show_steps,
    };

    if let Some(msg) = message {
        // Single message mode
        session.turn(&[], &msg).await?;
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  agentloop, interactive mode");
    println!();
    println!("  Model:     {}", config.engine.model);
    println!("  Tools:     {}", session.tools.names().join(", "));
    println!("  Max steps: {}", config.agent.max_steps);
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut history: Vec<Message> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    prompt()?;
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.is_empty() {
            prompt()?;
            continue;
        }
        if matches!(input, "exit" | "quit") {
            break;
        }

        match session.turn(&history, input).await {
            Ok(result) => {
                history = memory.record(
                    &history,
                    input,
                    &result.intermediate_steps,
                    &result.final_output,
                );
            }
            Err(e) => eprintln!("  [Error] {e}"),
        }
        println!();
        prompt()?;
    }

    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}

impl Session {
    /// Run one question through the agent and stream the answer to stdout.
    async fn turn(
        &self,
        history: &[Message],
        input: &str,
    ) -> Result<ExecutionResult, Box<dyn std::error::Error>> {
        let result = self.agent.run(history, input, &self.tools).await?;

        if self.show_steps {
            for step in &result.intermediate_steps {
                print_step(step);
            }
        }

        let mut stdout = std::io::stdout();
        write!(stdout, "  Assistant > ")?;
        stdout.flush()?;

        let mut chunks = self.emitter.spawn(result.final_output.clone());
        while let Some(chunk) = chunks.next().await {
            write!(stdout, "{chunk}")?;
            stdout.flush()?;
        }
        writeln!(stdout)?;

        Ok(result)
    }
}

fn print_step(step: &IntermediateStep) {
    let status = if step.result.failed { "failed" } else { "ok" };
    println!(
        "  [tool] {}({}) {status}",
        step.call.tool_name, step.call.arguments
    );
    for line in step.result.output.lines() {
        println!("         {line}");
    }
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

/// Print the decision trace to stderr as the loop runs.
fn spawn_event_printer(event_bus: &EventBus) {
    let mut rx = event_bus.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match event.as_ref() {
                DomainEvent::DecisionMade {
                    step, tool_name, ..
                } => match tool_name {
                    Some(name) => eprintln!("  · step {step}: call {name}"),
                    None => eprintln!("  · step {step}: final answer"),
                },
                DomainEvent::ToolExecuted {
                    tool_name,
                    failed,
                    duration_ms,
                    ..
                } => eprintln!(
                    "  · {tool_name} {} in {duration_ms}ms",
                    if *failed { "failed" } else { "returned" }
                ),
                DomainEvent::LoopFinished {
                    steps, aborted, ..
                } => {
                    if *aborted {
                        eprintln!("  · stopped at the step limit after {steps} steps");
                    }
                }
                DomainEvent::ErrorOccurred {
                    context,
                    error_message,
                    ..
                } => eprintln!("  · {context} failed: {error_message}"),
            }
        }
    });
}
