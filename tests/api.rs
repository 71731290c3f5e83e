use axum::Json;
use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Request, StatusCode};
use axum::response::sse::Event;
use axum::response::{IntoResponse, Sse};
use axum::routing::post;
use futures_util::stream;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use thinkrelay::config::Settings;
use tower::ServiceExt;

struct TestContext {
    router: axum::Router,
    captured: Arc<Mutex<Vec<Value>>>,
}

async fn start_backend() -> (SocketAddr, Arc<Mutex<Vec<Value>>>) {
    let captured: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));

    async fn chat(
        axum::extract::State(captured): axum::extract::State<Arc<Mutex<Vec<Value>>>>,
        Json(body): Json<Value>,
    ) -> axum::response::Response {
        if let Ok(mut lock) = captured.lock() {
            lock.push(body.clone());
        }
        let forced_error = body["messages"][0]["content"]
            .as_str()
            .is_some_and(|c| c.contains("force_error"));
        if forced_error {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": { "code": "bad_prompt", "message": "prompt rejected" }
                })),
            )
                .into_response();
        }

        let model = body["model"].as_str().unwrap_or("mock").to_string();
        if body["stream"].as_bool() == Some(true) {
            let chunk = |delta: Value| {
                json!({
                    "id": "chatcmpl_mock",
                    "object": "chat.completion.chunk",
                    "created": 1_700_000_000,
                    "model": model,
                    "choices": [{ "index": 0, "delta": delta, "finish_reason": Value::Null }]
                })
                .to_string()
            };
            let events: Vec<Result<Event, Infallible>> = vec![
                Ok(Event::default().data(chunk(json!({ "role": "assistant" })))),
                Ok(Event::default().data(chunk(json!({ "reasoning_content": "A" })))),
                Ok(Event::default().data("{this is not json")),
                Ok(Event::default().data(chunk(json!({ "reasoning_content": "B" })))),
                Ok(Event::default().data(chunk(json!({ "content": "C" })))),
                Ok(Event::default().data(chunk(json!({ "content": "D" })))),
                Ok(Event::default().data(chunk(json!({})))),
                Ok(Event::default().data("[DONE]")),
            ];
            return Sse::new(stream::iter(events)).into_response();
        }

        Json(json!({
            "id": "chatcmpl_mock",
            "object": "chat.completion",
            "created": 1_700_000_000,
            "model": model,
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "Hello",
                    "reasoning_content": "thinking..."
                },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 5, "completion_tokens": 9, "total_tokens": 14 }
        }))
        .into_response()
    }

    let router = axum::Router::new()
        .route("/chat/completions", post(chat))
        .with_state(captured.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (addr, captured)
}

fn test_settings(backend_addr: SocketAddr, api_key: Option<&str>) -> Settings {
    let mut settings = Settings::from_env().unwrap();
    settings.backend_base_url = format!("http://{backend_addr}");
    settings.backend_api_key = api_key.map(|k| k.to_string());
    settings.model_map = HashMap::from([("gpt-4o".to_string(), "glm-4.6".to_string())]);
    settings.fallback_model = "glm-4.6".to_string();
    settings.reasoning_marker = "glm-4.6".to_string();
    settings.min_thinking_tokens = 16_384;
    settings.show_reasoning = true;
    settings.thinking_enabled = true;
    settings
}

async fn start_context(api_key: Option<&str>) -> TestContext {
    let (addr, captured) = start_backend().await;
    let state = thinkrelay::app::load_state_with_settings(test_settings(addr, api_key)).unwrap();
    TestContext {
        router: thinkrelay::app::build_app(state),
        captured,
    }
}

async fn post_chat(router: axum::Router, body: Value) -> (StatusCode, Vec<u8>) {
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/chat/completions")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

fn sse_data_lines(body: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(body)
        .lines()
        .filter_map(|line| line.strip_prefix("data: ").map(|s| s.to_string()))
        .collect()
}

#[tokio::test]
async fn non_streaming_completion_folds_reasoning() {
    let ctx = start_context(Some("test-key")).await;
    let (status, body) = post_chat(
        ctx.router,
        json!({
            "model": "gpt-4o",
            "messages": [{ "role": "user", "content": "hi" }]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["model"], "gpt-4o");
    assert_eq!(value["object"], "chat.completion");
    assert_eq!(
        value["choices"][0]["message"]["content"],
        "<think>\nthinking...\n</think>\n\nHello"
    );
    assert_eq!(value["usage"]["total_tokens"], 14);

    let captured = ctx.captured.lock().unwrap();
    assert_eq!(captured[0]["model"], "glm-4.6");
    assert_eq!(captured[0]["max_tokens"], 16_384);
    assert_eq!(captured[0]["thinking"], json!({ "type": "enabled" }));
}

#[tokio::test]
async fn streaming_reassembles_think_block() {
    let ctx = start_context(Some("test-key")).await;
    let (status, body) = post_chat(
        ctx.router,
        json!({
            "model": "gpt-4o",
            "messages": [{ "role": "user", "content": "hi" }],
            "stream": true
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let lines = sse_data_lines(&body);
    assert_eq!(lines.last().map(String::as_str), Some("[DONE]"));
    let contents: Vec<String> = lines[..lines.len() - 1]
        .iter()
        .map(|line| {
            let v: Value = serde_json::from_str(line).unwrap();
            assert_eq!(v["model"], "gpt-4o", "backend model name must not leak");
            let delta = v["choices"][0]["delta"].as_object().unwrap();
            assert!(!delta.contains_key("reasoning_content"));
            assert!(!delta.contains_key("reasoning"));
            delta["content"].as_str().unwrap().to_string()
        })
        .collect();
    // Role-only, empty, and undecodable fragments are dropped; the think
    // block opens and closes exactly once around the reasoning deltas.
    assert_eq!(contents, ["<think>\nA", "B", "\n</think>\n\nC", "D"]);
}

#[tokio::test]
async fn unknown_model_falls_back_and_echoes_original_name() {
    let ctx = start_context(Some("test-key")).await;
    let (status, body) = post_chat(
        ctx.router,
        json!({
            "model": "mystery-model",
            "messages": [{ "role": "user", "content": "hi" }]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["model"], "mystery-model");
    let captured = ctx.captured.lock().unwrap();
    assert_eq!(captured[0]["model"], "glm-4.6");
}

#[tokio::test]
async fn missing_backend_key_is_configuration_error() {
    let ctx = start_context(None).await;
    let (status, body) = post_chat(
        ctx.router,
        json!({
            "model": "gpt-4o",
            "messages": [{ "role": "user", "content": "hi" }]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["error"]["code"], "backend_key_missing");
    assert_eq!(value["error"]["type"], "configuration_error");
    assert!(ctx.captured.lock().unwrap().is_empty(), "no backend call");
}

#[tokio::test]
async fn upstream_failure_is_surfaced_with_detail() {
    let ctx = start_context(Some("test-key")).await;
    let (status, body) = post_chat(
        ctx.router,
        json!({
            "model": "gpt-4o",
            "messages": [{ "role": "user", "content": "force_error please" }]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["error"]["code"], "backend_error");
    assert!(
        value["error"]["message"]
            .as_str()
            .unwrap()
            .contains("bad_prompt")
    );
}

#[tokio::test]
async fn models_listing_exposes_logical_names_only() {
    let ctx = start_context(Some("test-key")).await;
    let response = ctx
        .router
        .oneshot(
            Request::builder()
                .uri("/v1/models")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value: Value = serde_json::from_slice(&bytes).unwrap();
    let ids: Vec<&str> = value["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["gpt-4o"]);
}
