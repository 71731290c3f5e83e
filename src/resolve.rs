use crate::config::Settings;
use crate::logs::{DiagnosticSink, LogLevel};
use serde_json::json;
use std::collections::HashMap;

/// Immutable caller-name to backend-identifier table. Lookups never fail:
/// unknown names resolve to the configured fallback (the large model).
#[derive(Debug, Clone)]
pub struct ModelResolver {
    map: HashMap<String, String>,
    fallback: String,
}

impl ModelResolver {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            map: settings.model_map.clone(),
            fallback: settings.fallback_model.clone(),
        }
    }

    pub fn resolve(&self, requested: &str, sink: &dyn DiagnosticSink) -> String {
        let (resolved, fallback_used) = match self.map.get(requested) {
            Some(backend) => (backend.clone(), false),
            None => (self.fallback.clone(), true),
        };
        sink.emit(
            LogLevel::Info,
            "model_resolve",
            &format!("{} -> {}", requested, resolved),
            json!({
                "requested": requested,
                "resolved": resolved,
                "fallback": fallback_used,
            }),
        );
        resolved
    }

    /// Caller-facing model names, for the models listing endpoint.
    pub fn logical_models(&self) -> Vec<String> {
        let mut names: Vec<String> = self.map.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::LogHub;

    fn resolver() -> ModelResolver {
        ModelResolver {
            map: [("gpt-4o".to_string(), "glm-4.6".to_string())]
                .into_iter()
                .collect(),
            fallback: "glm-4.6".to_string(),
        }
    }

    #[test]
    fn exact_match_wins() {
        let sink = LogHub::new(8);
        assert_eq!(resolver().resolve("gpt-4o", &sink), "glm-4.6");
    }

    #[test]
    fn miss_falls_back_to_large_model() {
        let sink = LogHub::new(8);
        assert_eq!(resolver().resolve("no-such-model", &sink), "glm-4.6");
        let recent = sink.recent();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].metadata["fallback"], true);
    }
}
