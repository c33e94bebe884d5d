//! HTTP chat gateway for agentloop.
//!
//! Exposes `POST /api/chat`, which answers a conversation either as a paced
//! plain-text stream or, when intermediate steps are requested, as one JSON
//! document. `GET /api/tools` lists the tool catalog and `GET /health`
//! reports liveness.
//!
//! Built on Axum; the engine, tool registry and emitter are built once and
//! shared read-only across requests.

use axum::{
    Router,
    body::Body,
    extract::{DefaultBodyLimit, State, rejection::JsonRejection},
    http::{Method, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use agentloop_agent::{AgentLoop, MemoryBuffer, RawMessage, StreamEmitter, adapt};
use agentloop_config::AppConfig;
use agentloop_core::engine::ReasoningEngine;
use agentloop_core::error::{Error, ToolError};
use agentloop_core::event::EventBus;
use agentloop_core::tool::{ToolRegistry, ToolSpec};
use agentloop_core::{ExecutionResult, IntermediateStep, Outcome};
use agentloop_providers::OpenAiCompatEngine;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub agent: AgentLoop,
    pub tools: Arc<ToolRegistry>,
    pub emitter: StreamEmitter,
}

pub type SharedState = Arc<GatewayState>;

impl GatewayState {
    pub fn new(agent: AgentLoop, tools: Arc<ToolRegistry>, emitter: StreamEmitter) -> Self {
        Self {
            agent,
            tools,
            emitter,
        }
    }

    /// Wire an engine into the agent, tools and emitter described by `config`.
    pub fn from_config(
        config: &AppConfig,
        engine: Arc<dyn ReasoningEngine>,
        event_bus: Arc<EventBus>,
    ) -> Result<Self, ToolError> {
        let documents = agentloop_tools::load_documents(&config.tools.documents);
        let tools = Arc::new(agentloop_tools::build_registry(&config.tools, documents)?);

        let agent = AgentLoop::new(engine, event_bus)
            .with_config(config.agent.to_agent_config())
            .with_memory(MemoryBuffer::from_config(&config.memory));

        Ok(Self::new(
            agent,
            tools,
            StreamEmitter::from_config(&config.stream),
        ))
    }
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState, body_limit_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/tools", get(tools_handler))
        .route("/api/chat", post(chat_handler))
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let engine = Arc::new(OpenAiCompatEngine::from_config(&config.engine)?);
    let event_bus = Arc::new(EventBus::default());
    let state = Arc::new(GatewayState::from_config(&config, engine, event_bus)?);

    let app = build_router(state, config.gateway.body_limit_bytes);

    info!(addr = %addr, model = %config.engine.model, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize, Deserialize)]
pub struct ToolsResponse {
    pub tools: Vec<ToolSpec>,
}

async fn tools_handler(State(state): State<SharedState>) -> Json<ToolsResponse> {
    Json(ToolsResponse {
        tools: state.tools.list(),
    })
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<RawMessage>,
    #[serde(default)]
    pub show_intermediate_steps: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub output: String,
    pub intermediate_steps: Vec<IntermediateStep>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl ToString) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

/// `POST /api/chat`: answer the last user turn of a conversation.
async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload.map_err(|e| {
        warn!(error = %e, "Rejected malformed chat request");
        api_error(StatusCode::BAD_REQUEST, e.body_text())
    })?;

    info!(
        messages = payload.messages.len(),
        show_intermediate_steps = payload.show_intermediate_steps,
        "Chat request"
    );

    let result = answer(&state, &payload.messages).await.map_err(|e| {
        match &e {
            Error::Input(_) => warn!(error = %e, "Rejected invalid conversation"),
            Error::Engine(_) => error!(error = %e, "Chat request failed"),
        }
        api_error(status_for(&e), e)
    })?;

    if result.outcome == Outcome::Aborted {
        warn!(
            steps = result.intermediate_steps.len(),
            "Answered after hitting the step limit"
        );
    }

    if payload.show_intermediate_steps {
        return Ok(Json(ChatResponse {
            output: result.final_output,
            intermediate_steps: result.intermediate_steps,
        })
        .into_response());
    }

    let chunks = state
        .emitter
        .spawn(result.final_output)
        .map(Ok::<_, Infallible>);

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(chunks),
    )
        .into_response())
}

/// Adapt the raw conversation and run it through the decision loop.
async fn answer(
    state: &GatewayState,
    messages: &[RawMessage],
) -> agentloop_core::Result<ExecutionResult> {
    let turns = adapt(messages)?;
    state
        .agent
        .run(&turns.history, &turns.input, &state.tools)
        .await
}

fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::Input(_) => StatusCode::BAD_REQUEST,
        Error::Engine(_) => StatusCode::BAD_GATEWAY,
    }
}
