use crate::adapt::adapt;
use crate::app::AppState;
use crate::error::{AppError, AppResult};
use crate::format::format_completion;
use crate::logs::{DiagnosticSink, LogLevel};
use crate::relay::{DONE_SENTINEL, ReasoningRelay, RelayOutput};
use crate::types::{ChatRequest, OutboundRequest};
use axum::Json;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive};
use axum::response::{IntoResponse, Response, Sse};
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use serde_json::{Value, json};
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::wrappers::{BroadcastStream, ReceiverStream};

pub async fn chat_completions(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> AppResult<Response> {
    let Some(api_key) = state.settings.backend_api_key.clone() else {
        state.logs.emit(
            LogLevel::Error,
            "config",
            "rejecting request: backend API key is not configured",
            json!({ "model": req.model }),
        );
        return Err(AppError::backend_key_missing());
    };

    let backend_model = state.resolver.resolve(&req.model, state.logs.as_ref());
    let outbound = adapt(&req, &backend_model, &state.settings, state.logs.as_ref());

    if outbound.stream {
        stream_completion(state, req.model, outbound, api_key).await
    } else {
        complete(state, req.model, outbound, api_key).await
    }
}

async fn complete(
    state: AppState,
    original_model: String,
    outbound: OutboundRequest,
    api_key: String,
) -> AppResult<Response> {
    let backend = crate::upstream::call_backend_json(
        &state.http,
        &state.settings.backend_base_url,
        &api_key,
        &outbound,
        state.settings.request_timeout_ms,
    )
    .await
    .map_err(|err| {
        state.logs.emit(
            LogLevel::Error,
            "backend",
            &err.message,
            json!({ "model": outbound.model }),
        );
        err.into_app()
    })?;

    let envelope = format_completion(&backend, &original_model, state.settings.show_reasoning)?;
    state.logs.emit(
        LogLevel::Success,
        "completion",
        &format!("completed {original_model}"),
        json!({ "model": original_model, "stream": false }),
    );
    Ok(Json(envelope).into_response())
}

async fn stream_completion(
    state: AppState,
    original_model: String,
    outbound: OutboundRequest,
    api_key: String,
) -> AppResult<Response> {
    let backend = crate::upstream::call_backend(
        &state.http,
        &state.settings.backend_base_url,
        &api_key,
        &outbound,
        state.settings.request_timeout_ms,
    )
    .await
    .map_err(|err| {
        state.logs.emit(
            LogLevel::Error,
            "backend",
            &err.message,
            json!({ "model": outbound.model }),
        );
        err.into_app()
    })?;

    // Bounded channel couples backend pull to caller drain; a failed send
    // means the caller went away and we abandon the backend stream.
    let (tx, rx) = mpsc::channel::<Event>(64);
    let mut relay = ReasoningRelay::new(original_model, state.settings.show_reasoning);
    let logs = state.logs.clone();
    tokio::spawn(async move {
        let mut events = backend.bytes_stream().eventsource();
        while let Some(event) = events.next().await {
            let event = match event {
                Ok(event) => event,
                Err(err) => {
                    logs.emit(
                        LogLevel::Error,
                        "stream_transport",
                        &format!("backend stream ended abnormally: {err}"),
                        json!({}),
                    );
                    break;
                }
            };
            match relay.process(&event.data, logs.as_ref()) {
                RelayOutput::Data(data) => {
                    if tx.send(Event::default().data(data)).await.is_err() {
                        break;
                    }
                }
                RelayOutput::Done => {
                    let _ = tx.send(Event::default().data(DONE_SENTINEL)).await;
                    break;
                }
                RelayOutput::Skip => {}
            }
        }
    });

    let stream = ReceiverStream::new(rx).map(Ok::<_, Infallible>);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()).into_response())
}

/// OpenAI-compatible listing of the caller-facing model names.
pub async fn list_models(State(state): State<AppState>) -> Json<Value> {
    let data: Vec<Value> = state
        .resolver
        .logical_models()
        .into_iter()
        .map(|id| json!({ "id": id, "object": "model", "owned_by": "thinkrelay" }))
        .collect();
    Json(json!({ "object": "list", "data": data }))
}

pub async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn logs_recent(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "events": state.logs.recent() }))
}

/// Live diagnostic feed for dashboard viewers. Lagging subscribers skip
/// ahead instead of back-pressuring emitters.
pub async fn logs_stream(State(state): State<AppState>) -> impl IntoResponse {
    let stream = BroadcastStream::new(state.logs.subscribe()).filter_map(|event| async move {
        let event = event.ok()?;
        let data = serde_json::to_string(&event).ok()?;
        Some(Ok::<_, Infallible>(Event::default().data(data)))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
