use crate::config::Settings;
use crate::logs::{DiagnosticSink, LogLevel};
use crate::types::{ChatRequest, OutboundRequest, ThinkingConfig};
use serde_json::json;

/// True when the backend identifier belongs to the high-reasoning family.
fn is_reasoning_family(backend_model: &str, settings: &Settings) -> bool {
    backend_model.contains(&settings.reasoning_marker)
}

/// Build the outbound backend request from the inbound one.
///
/// High-reasoning models are guaranteed a minimum generation budget so the
/// thinking channel is not truncated; everyone else gets the requested budget
/// or the fixed default. Cannot fail on well-formed input: bad values are the
/// backend's concern.
pub fn adapt(
    req: &ChatRequest,
    backend_model: &str,
    settings: &Settings,
    sink: &dyn DiagnosticSink,
) -> OutboundRequest {
    let reasoning_family = is_reasoning_family(backend_model, settings);
    let max_tokens = if reasoning_family {
        req.max_tokens
            .unwrap_or(0)
            .max(settings.min_thinking_tokens)
    } else {
        req.max_tokens.unwrap_or(settings.default_max_tokens)
    };
    let thinking = (settings.thinking_enabled && reasoning_family).then(ThinkingConfig::enabled);
    let out = OutboundRequest {
        model: backend_model.to_string(),
        messages: req.messages.clone(),
        temperature: req.temperature.unwrap_or(settings.default_temperature),
        max_tokens,
        stream: req.stream.unwrap_or(false),
        thinking,
    };
    sink.emit(
        LogLevel::Info,
        "request_adapt",
        &format!(
            "{}: max_tokens={} thinking={}",
            out.model,
            out.max_tokens,
            out.thinking.is_some()
        ),
        json!({
            "backend_model": out.model,
            "max_tokens": out.max_tokens,
            "thinking": out.thinking.is_some(),
            "stream": out.stream,
        }),
    );
    out
}
