use std::collections::HashMap;

/// Process-wide configuration, resolved once at startup and shared read-only.
///
/// Every knob has an environment override (`THINKRELAY_*`); the compiled
/// defaults describe a GLM backend behind an OpenAI-compatible front.
#[derive(Debug, Clone)]
pub struct Settings {
    pub listen: String,
    pub backend_base_url: String,
    /// Missing key is not fatal at startup; requests fail with a
    /// configuration error until it is provided.
    pub backend_api_key: Option<String>,
    pub model_map: HashMap<String, String>,
    /// Resolver fallback for names absent from the table.
    pub fallback_model: String,
    /// Backend identifiers containing this marker form the high-reasoning
    /// family (minimum budget, thinking flag).
    pub reasoning_marker: String,
    pub min_thinking_tokens: u64,
    pub default_max_tokens: u64,
    pub default_temperature: f64,
    /// Fold the backend's reasoning channel into visible content.
    pub show_reasoning: bool,
    /// Ask the backend to emit its reasoning channel at all.
    pub thinking_enabled: bool,
    pub request_timeout_ms: u64,
    pub log_ring_capacity: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("THINKRELAY_MODEL_MAP is not a JSON string-to-string object: {0}")]
    InvalidModelMap(String),
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let model_map = match env_nonempty("THINKRELAY_MODEL_MAP") {
            Some(raw) => serde_json::from_str::<HashMap<String, String>>(&raw)
                .map_err(|err| ConfigError::InvalidModelMap(err.to_string()))?,
            None => default_model_map(),
        };
        Ok(Self {
            listen: env_nonempty("THINKRELAY_LISTEN").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            backend_base_url: env_nonempty("THINKRELAY_BACKEND_BASE_URL")
                .unwrap_or_else(|| "https://open.bigmodel.cn/api/paas/v4".to_string()),
            backend_api_key: env_nonempty("THINKRELAY_BACKEND_API_KEY"),
            model_map,
            fallback_model: env_nonempty("THINKRELAY_FALLBACK_MODEL")
                .unwrap_or_else(|| "glm-4.6".to_string()),
            reasoning_marker: env_nonempty("THINKRELAY_REASONING_MARKER")
                .unwrap_or_else(|| "glm-4.6".to_string()),
            min_thinking_tokens: env_u64("THINKRELAY_MIN_THINKING_TOKENS").unwrap_or(16_384),
            default_max_tokens: env_u64("THINKRELAY_DEFAULT_MAX_TOKENS").unwrap_or(4_096),
            default_temperature: 0.6,
            show_reasoning: env_bool("THINKRELAY_SHOW_REASONING").unwrap_or(true),
            thinking_enabled: env_bool("THINKRELAY_THINKING").unwrap_or(true),
            request_timeout_ms: env_u64("THINKRELAY_REQUEST_TIMEOUT_MS").unwrap_or(300_000),
            log_ring_capacity: env_u64("THINKRELAY_LOG_RING_CAPACITY").unwrap_or(1_000) as usize,
        })
    }
}

fn default_model_map() -> HashMap<String, String> {
    [
        ("gpt-4", "glm-4.6"),
        ("gpt-4o", "glm-4.6"),
        ("gpt-4-turbo", "glm-4.6"),
        ("gpt-4o-mini", "glm-4.5-air"),
        ("gpt-3.5-turbo", "glm-4.5-flash"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_u64(key: &str) -> Option<u64> {
    env_nonempty(key).and_then(|v| v.parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    env_nonempty(key).map(|v| matches!(v.as_str(), "1" | "true" | "yes" | "on"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_map_targets_glm() {
        let map = default_model_map();
        assert_eq!(map.get("gpt-4o").map(String::as_str), Some("glm-4.6"));
        assert_eq!(
            map.get("gpt-4o-mini").map(String::as_str),
            Some("glm-4.5-air")
        );
    }
}
