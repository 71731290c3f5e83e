use crate::format::reasoning_of_map;
use crate::logs::{DiagnosticSink, LogLevel};
use serde_json::{Value, json};

pub const THINK_OPEN: &str = "<think>";
pub const THINK_CLOSE: &str = "</think>";

/// Terminal sentinel on OpenAI-style SSE streams.
pub const DONE_SENTINEL: &str = "[DONE]";

/// What to do with one incoming event's payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutput {
    /// Re-emit this JSON as a `data:` frame.
    Data(String),
    /// Pass the terminal sentinel through verbatim; the stream is finished.
    Done,
    /// Nothing to emit for this event.
    Skip,
}

/// Single-pass transducer over one streaming response.
///
/// The backend interleaves reasoning deltas and content deltas with no
/// markers between them; this tracks whether a `<think>` block is currently
/// open and synthesizes the delimiters exactly once per block. One instance
/// per in-flight stream, owned by that stream's task.
pub struct ReasoningRelay {
    original_model: String,
    show_reasoning: bool,
    reasoning_open: bool,
    fragments: u64,
    bytes: u64,
}

impl ReasoningRelay {
    pub fn new(original_model: impl Into<String>, show_reasoning: bool) -> Self {
        Self {
            original_model: original_model.into(),
            show_reasoning,
            reasoning_open: false,
            fragments: 0,
            bytes: 0,
        }
    }

    /// Process the payload of one data line.
    ///
    /// Malformed payloads are dropped with a warning and never abort the
    /// stream. Deltas carrying neither content nor reasoning (role-only,
    /// keep-alives) are dropped silently.
    pub fn process(&mut self, data: &str, sink: &dyn DiagnosticSink) -> RelayOutput {
        self.fragments += 1;
        self.bytes += data.len() as u64;

        if data.trim() == DONE_SENTINEL {
            sink.emit(
                LogLevel::Success,
                "stream_complete",
                &format!("stream finished after {} fragments", self.fragments),
                json!({ "fragments": self.fragments, "bytes": self.bytes }),
            );
            return RelayOutput::Done;
        }

        let mut payload: Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(err) => {
                sink.emit(
                    LogLevel::Warning,
                    "stream_decode",
                    &format!("dropping undecodable fragment: {err}"),
                    json!({ "fragment": self.fragments }),
                );
                return RelayOutput::Skip;
            }
        };

        let Some(delta) = payload
            .get_mut("choices")
            .and_then(|v| v.as_array_mut())
            .and_then(|arr| arr.first_mut())
            .and_then(|c| c.get_mut("delta"))
            .and_then(|d| d.as_object_mut())
        else {
            return RelayOutput::Skip;
        };

        let reasoning = reasoning_of_map(delta)
            .map(|s| s.to_string())
            .filter(|_| self.show_reasoning);
        let content = delta
            .get("content")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());

        if reasoning.is_none() && content.is_none() {
            return RelayOutput::Skip;
        }

        let mut out = String::new();
        if let Some(r) = &reasoning {
            if !self.reasoning_open {
                self.reasoning_open = true;
                out.push_str(THINK_OPEN);
                out.push('\n');
            }
            out.push_str(r);
        }
        if let Some(c) = &content {
            if self.reasoning_open {
                self.reasoning_open = false;
                out.push('\n');
                out.push_str(THINK_CLOSE);
                out.push_str("\n\n");
            }
            out.push_str(c);
        }

        // Callers only ever see the unified content field.
        delta.remove("reasoning_content");
        delta.remove("reasoning");
        delta.insert("content".to_string(), Value::String(out));
        if let Some(obj) = payload.as_object_mut() {
            obj.insert(
                "model".to_string(),
                Value::String(self.original_model.clone()),
            );
        }
        RelayOutput::Data(payload.to_string())
    }
}
