//! End-to-end tests for the agentloop chat pipeline.
//!
//! These drive the real gateway router, the OpenAI-compatible engine and the
//! built-in tools, with the model endpoint and the price API stood in for by
//! wiremock servers.

use std::sync::Arc;

use agentloop_config::AppConfig;
use agentloop_core::ABORT_MARKER;
use agentloop_core::event::EventBus;
use agentloop_gateway::{ChatResponse, ErrorResponse, GatewayState, ToolsResponse, build_router};
use agentloop_providers::OpenAiCompatEngine;
use agentloop_tools::foo::FOO_ANSWER;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Fixtures ─────────────────────────────────────────────────────────────

fn completion(message: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "chatcmpl-e2e",
        "object": "chat.completion",
        "model": "gpt-3.5-turbo",
        "choices": [{"index": 0, "message": message, "finish_reason": "stop"}]
    }))
}

fn tool_call(id: &str, name: &str, arguments: Value) -> Value {
    json!({
        "role": "assistant",
        "content": null,
        "tool_calls": [{
            "id": id,
            "type": "function",
            "function": {"name": name, "arguments": arguments.to_string()}
        }]
    })
}

fn answer(text: &str) -> Value {
    json!({"role": "assistant", "content": text})
}

/// Queue one completion per entry, served in order.
async fn script_model(server: &MockServer, replies: Vec<Value>) {
    for reply in replies {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(completion(reply))
            .up_to_n_times(1)
            .mount(server)
            .await;
    }
}

fn config(model: &MockServer, prices_url: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.engine.api_key = Some("sk-e2e".into());
    config.engine.base_url = model.uri();
    config.tools.crypto.base_url = prices_url.to_string();
    config.stream.min_delay_ms = 0;
    config.stream.max_delay_ms = 0;
    config
}

fn app(config: &AppConfig) -> Router {
    let engine = Arc::new(OpenAiCompatEngine::from_config(&config.engine).unwrap());
    let state =
        GatewayState::from_config(config, engine, Arc::new(EventBus::default())).unwrap();
    build_router(Arc::new(state), config.gateway.body_limit_bytes)
}

fn chat(messages: Value, show_intermediate_steps: bool) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "messages": messages,
                "show_intermediate_steps": show_intermediate_steps
            })
            .to_string(),
        ))
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

async fn model_requests(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.body_json().unwrap())
        .collect()
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_foo_question_streams_answer() {
    let model = MockServer::start().await;
    script_model(
        &model,
        vec![
            tool_call("call_1", "foo", json!({})),
            answer("The value of foo is \"This is a demo\""),
        ],
    )
    .await;

    let app = app(&config(&model, "http://127.0.0.1:9"));
    let response = app
        .oneshot(chat(
            json!([
                {"role": "user", "content": "Hi"},
                {"role": "assistant", "content": "Hello! How can I help?"},
                {"role": "user", "content": "What is foo?"}
            ]),
            false,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = String::from_utf8(body_bytes(response).await).unwrap();
    assert_eq!(body.strip_suffix(' '), Some("The value of foo is \"This is a demo\""));

    let requests = model_requests(&model).await;
    assert_eq!(requests.len(), 2);

    // First call: system prompt, prior turns, the question, and the catalog.
    let first = &requests[0];
    let roles: Vec<_> = first["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["role"].as_str().unwrap())
        .collect();
    assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
    assert_eq!(first["messages"][3]["content"], "What is foo?");
    assert_eq!(first["tools"][0]["function"]["name"], "foo");
    assert_eq!(first["parallel_tool_calls"], false);

    // Second call replays the tool observation.
    let replayed = first_tool_message(&requests[1]);
    assert_eq!(replayed["tool_call_id"], "call_1");
    assert_eq!(replayed["content"], FOO_ANSWER);
}

#[tokio::test]
async fn e2e_price_lookup_failure_is_reported_not_fatal() {
    let model = MockServer::start().await;
    script_model(
        &model,
        vec![
            tool_call(
                "call_1",
                "fetchCryptoPrice",
                json!({"cryptoName": "bitcoin", "vsCurrency": "USD"}),
            ),
            answer("I could not reach the price service."),
        ],
    )
    .await;

    // Nothing listens on the discard port, so the lookup fails to connect.
    let app = app(&config(&model, "http://127.0.0.1:9"));
    let response = app
        .oneshot(chat(
            json!([{"role": "user", "content": "What is the price of bitcoin?"}]),
            true,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let chat: ChatResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(chat.output, "I could not reach the price service.");
    assert_eq!(chat.intermediate_steps.len(), 1);
    assert!(chat.intermediate_steps[0].result.failed);
    assert!(chat.intermediate_steps[0].result.output.starts_with("Error:"));

    let requests = model_requests(&model).await;
    let replayed = first_tool_message(&requests[1]);
    assert!(replayed["content"].as_str().unwrap().starts_with("Error:"));
}

#[tokio::test]
async fn e2e_two_tools_in_call_order() {
    let prices = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/simple/price"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"bitcoin": {"usd": 64000}})))
        .mount(&prices)
        .await;

    let model = MockServer::start().await;
    script_model(
        &model,
        vec![
            tool_call(
                "call_1",
                "fetchCryptoPrice",
                json!({"cryptoName": "bitcoin", "vsCurrency": "USD"}),
            ),
            tool_call("call_2", "calculator", json!({"input": "64000 * 2"})),
            answer("Two bitcoin cost 128000 USD."),
        ],
    )
    .await;

    let app = app(&config(&model, &prices.uri()));
    let response = app
        .oneshot(chat(
            json!([{"role": "user", "content": "How much are two bitcoin?"}]),
            true,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let chat: ChatResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(chat.output, "Two bitcoin cost 128000 USD.");

    let steps: Vec<_> = chat
        .intermediate_steps
        .iter()
        .map(|s| (s.call.tool_name.as_str(), s.result.output.as_str()))
        .collect();
    assert_eq!(
        steps,
        vec![("fetchCryptoPrice", "64000"), ("calculator", "128000")]
    );
}

#[tokio::test]
async fn e2e_step_limit_returns_marker() {
    let model = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(completion(tool_call("call_x", "foo", json!({}))))
        .mount(&model)
        .await;

    let mut config = config(&model, "http://127.0.0.1:9");
    config.agent.max_steps = 3;

    let response = app(&config)
        .oneshot(chat(
            json!([{"role": "user", "content": "Keep calling foo"}]),
            true,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let chat: ChatResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(chat.output, ABORT_MARKER);
    assert_eq!(chat.intermediate_steps.len(), 3);

    // Three reasoning calls plus one forced-answer call that may not pick a tool.
    let requests = model_requests(&model).await;
    assert_eq!(requests.len(), 4);
    assert!(requests[0].get("tool_choice").is_none());
    assert_eq!(requests[3]["tool_choice"], "none");
    assert!(requests[3]["tools"].as_array().is_some_and(|t| !t.is_empty()));
    let replayed = requests[3]["messages"].as_array().unwrap();
    assert!(replayed.iter().any(|m| m["role"] == "tool"));
}

#[tokio::test]
async fn e2e_rejected_credentials_are_bad_gateway() {
    let model = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&model)
        .await;

    let response = app(&config(&model, "http://127.0.0.1:9"))
        .oneshot(chat(json!([{"role": "user", "content": "hello"}]), false))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let err: ErrorResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert!(err.error.contains("Authentication failed") || err.error.contains("API key"));
}

#[tokio::test]
async fn e2e_invalid_conversation_never_reaches_the_model() {
    let model = MockServer::start().await;
    let response = app(&config(&model, "http://127.0.0.1:9"))
        .oneshot(chat(json!([{"role": "system", "content": "rules only"}]), false))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(model_requests(&model).await.is_empty());
}

#[tokio::test]
async fn e2e_document_folder_enables_documents_query() {
    let docs = tempfile::tempdir().unwrap();
    std::fs::write(
        docs.path().join("guidelines.md"),
        "Platform operators must ensure the suitability of recommendations.\n\n\
         Complex products need extra warning statements.",
    )
    .unwrap();

    let model = MockServer::start().await;
    script_model(
        &model,
        vec![
            tool_call(
                "call_1",
                "documentsQuery",
                json!({"input": "complex products warning"}),
            ),
            answer("Complex products need extra warnings."),
        ],
    )
    .await;

    let mut config = config(&model, "http://127.0.0.1:9");
    config.tools.documents.dir = Some(docs.path().to_path_buf());
    let app = app(&config);

    let listing = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/tools")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let listed: ToolsResponse = serde_json::from_slice(&body_bytes(listing).await).unwrap();
    assert_eq!(
        listed.tools.last().map(|t| t.name.as_str()),
        Some("documentsQuery")
    );

    let response = app
        .oneshot(chat(
            json!([{"role": "user", "content": "What about complex products?"}]),
            true,
        ))
        .await
        .unwrap();
    let chat: ChatResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert!(!chat.intermediate_steps[0].result.failed);
    assert!(
        chat.intermediate_steps[0]
            .result
            .output
            .contains("extra warning statements")
    );
}

fn first_tool_message(request: &Value) -> &Value {
    request["messages"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["role"] == "tool")
        .expect("tool message replayed")
}
