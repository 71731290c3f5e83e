use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::broadcast;

/// Fire-and-forget diagnostic capability. Implementations must never block
/// or fail the calling operation.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, level: LogLevel, category: &str, message: &str, metadata: Value);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
    Debug,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    pub ts: DateTime<Utc>,
    pub level: LogLevel,
    pub category: String,
    pub message: String,
    pub metadata: Value,
}

/// In-memory log hub: a bounded ring of recent events plus a broadcast
/// channel for live viewers. Lagging viewers lose events rather than
/// slowing down emitters.
pub struct LogHub {
    ring: Mutex<VecDeque<LogEvent>>,
    capacity: usize,
    tx: broadcast::Sender<LogEvent>,
}

impl LogHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(256);
        Self {
            ring: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            tx,
        }
    }

    pub fn recent(&self) -> Vec<LogEvent> {
        match self.ring.lock() {
            Ok(ring) => ring.iter().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.tx.subscribe()
    }
}

impl DiagnosticSink for LogHub {
    fn emit(&self, level: LogLevel, category: &str, message: &str, metadata: Value) {
        let event = LogEvent {
            ts: Utc::now(),
            level,
            category: category.to_string(),
            message: message.to_string(),
            metadata,
        };
        match level {
            LogLevel::Error => tracing::error!(category, "{}", event.message),
            LogLevel::Warning => tracing::warn!(category, "{}", event.message),
            LogLevel::Debug => tracing::debug!(category, "{}", event.message),
            LogLevel::Info | LogLevel::Success => tracing::info!(category, "{}", event.message),
        }
        if let Ok(mut ring) = self.ring.lock() {
            if ring.len() == self.capacity {
                ring.pop_front();
            }
            ring.push_back(event.clone());
        }
        // No receivers is fine.
        let _ = self.tx.send(event);
    }
}
