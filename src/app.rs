use crate::config::Settings;
use crate::error::{AppError, AppResult};
use crate::logs::LogHub;
use crate::resolve::ModelResolver;
use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub resolver: Arc<ModelResolver>,
    pub http: reqwest::Client,
    pub logs: Arc<LogHub>,
}

pub fn load_state() -> AppResult<AppState> {
    let settings = Settings::from_env().map_err(|err| {
        AppError::new(
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            "config_invalid",
            err.to_string(),
        )
        .with_type("configuration_error")
    })?;
    load_state_with_settings(settings)
}

pub fn load_state_with_settings(settings: Settings) -> AppResult<AppState> {
    let http = reqwest::Client::builder()
        .user_agent("thinkrelay/0.1")
        .build()
        .map_err(|err| {
            AppError::new(
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                "http_client_init_failed",
                err.to_string(),
            )
        })?;
    let resolver = Arc::new(ModelResolver::from_settings(&settings));
    let logs = Arc::new(LogHub::new(settings.log_ring_capacity));
    Ok(AppState {
        settings: Arc::new(settings),
        resolver,
        http,
        logs,
    })
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route(
            "/v1/chat/completions",
            post(crate::handlers::chat_completions),
        )
        .route("/v1/models", get(crate::handlers::list_models))
        .route("/healthz", get(crate::handlers::healthz))
        .route("/logs", get(crate::handlers::logs_recent))
        .route("/logs/stream", get(crate::handlers::logs_stream))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
