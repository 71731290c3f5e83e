use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound OpenAI-style chat completion request. Unknown fields are ignored;
/// message content is kept opaque so multipart payloads pass through intact.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u64>,
    #[serde(default)]
    pub stream: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: Value,
}

/// The adapted request sent to the backend. Built once per inbound request
/// and never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f64,
    pub max_tokens: u64,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingConfig>,
}

/// Backend extension asking for the reasoning channel.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ThinkingConfig {
    #[serde(rename = "type")]
    pub kind: String,
}

impl ThinkingConfig {
    pub fn enabled() -> Self {
        Self {
            kind: "enabled".to_string(),
        }
    }
}

/// Caller-facing completion envelope. `model` always echoes the original
/// requested name, never the backend identifier.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseEnvelope {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Choice {
    pub index: u64,
    pub message: ResponseMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseMessage {
    pub role: String,
    pub content: String,
}
