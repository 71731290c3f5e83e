use crate::error::{AppError, AppResult};
use crate::relay::{THINK_CLOSE, THINK_OPEN};
use crate::types::{Choice, ResponseEnvelope, ResponseMessage};
use serde_json::{Map, Value};

/// First non-empty reasoning field on a backend message. GLM-style backends
/// populate `reasoning_content`; some OpenAI-compatible ones use `reasoning`.
pub fn reasoning_of(message: &Value) -> Option<&str> {
    message.as_object().and_then(reasoning_of_map)
}

pub fn reasoning_of_map(obj: &Map<String, Value>) -> Option<&str> {
    ["reasoning_content", "reasoning"]
        .iter()
        .filter_map(|key| obj.get(*key).and_then(|v| v.as_str()))
        .find(|s| !s.is_empty())
}

fn merge_reasoning(content: &str, reasoning: Option<&str>, show_reasoning: bool) -> String {
    match reasoning {
        Some(r) if show_reasoning => {
            format!("{THINK_OPEN}\n{r}\n{THINK_CLOSE}\n\n{content}")
        }
        _ => content.to_string(),
    }
}

/// Convert a complete backend response into the caller's envelope.
///
/// The envelope echoes the caller's original model name; the backend's
/// identifier never leaks out. A response without a `choices` array is a
/// backend contract violation and surfaces as an upstream failure.
pub fn format_completion(
    backend: &Value,
    original_model: &str,
    show_reasoning: bool,
) -> AppResult<ResponseEnvelope> {
    let choices = backend
        .get("choices")
        .and_then(|v| v.as_array())
        .ok_or_else(|| {
            AppError::backend_contract(format!(
                "backend response missing choices array: {}",
                truncate(&backend.to_string(), 200)
            ))
        })?;

    let out_choices = choices
        .iter()
        .enumerate()
        .map(|(idx, choice)| {
            let message = choice.get("message").cloned().unwrap_or(Value::Null);
            let content = message
                .get("content")
                .and_then(|v| v.as_str())
                .unwrap_or("");
            let reasoning = reasoning_of(&message);
            Choice {
                index: choice
                    .get("index")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(idx as u64),
                message: ResponseMessage {
                    role: "assistant".to_string(),
                    content: merge_reasoning(content, reasoning, show_reasoning),
                },
                finish_reason: choice
                    .get("finish_reason")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string()),
            }
        })
        .collect();

    Ok(ResponseEnvelope {
        id: backend
            .get("id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("chatcmpl_{}", uuid::Uuid::new_v4())),
        object: "chat.completion".to_string(),
        created: backend
            .get("created")
            .and_then(|v| v.as_i64())
            .unwrap_or_else(|| chrono::Utc::now().timestamp()),
        model: original_model.to_string(),
        choices: out_choices,
        usage: backend.get("usage").cloned(),
    })
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}
