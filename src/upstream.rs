use crate::error::AppError;
use axum::http::StatusCode;
use serde_json::Value;

#[derive(Debug, Clone)]
pub enum UpstreamErrorKind {
    Network,
    Http,
}

/// Failure talking to the backend, before any stream processing starts.
#[derive(Debug, Clone)]
pub struct UpstreamCallError {
    pub kind: UpstreamErrorKind,
    pub status: Option<StatusCode>,
    pub message: String,
}

impl UpstreamCallError {
    pub fn new(kind: UpstreamErrorKind, status: Option<StatusCode>, message: String) -> Self {
        Self {
            kind,
            status,
            message,
        }
    }

    /// Surface to the caller with as much backend detail as we have.
    pub fn into_app(self) -> AppError {
        let code = match self.kind {
            UpstreamErrorKind::Network => "backend_unreachable",
            UpstreamErrorKind::Http => "backend_error",
        };
        AppError::new(StatusCode::BAD_GATEWAY, code, self.message).with_type("upstream_error")
    }
}

/// POST the adapted request to the backend's chat completions endpoint and
/// return the raw response. Bearer auth; one generous request-level timeout,
/// no per-chunk deadline.
pub async fn call_backend(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    body: &impl serde::Serialize,
    timeout_ms: u64,
) -> Result<reqwest::Response, UpstreamCallError> {
    let url = join_url(base_url, "chat/completions");
    let resp = client
        .post(url)
        .timeout(std::time::Duration::from_millis(timeout_ms))
        .bearer_auth(api_key)
        .json(body)
        .send()
        .await
        .map_err(|err| UpstreamCallError::new(UpstreamErrorKind::Network, None, err.to_string()))?;
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(UpstreamCallError::new(
            UpstreamErrorKind::Http,
            Some(status),
            format!("backend status {}: {}", status, text),
        ));
    }
    Ok(resp)
}

/// Non-streaming variant: decode the backend body as JSON.
pub async fn call_backend_json(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    body: &impl serde::Serialize,
    timeout_ms: u64,
) -> Result<Value, UpstreamCallError> {
    let resp = call_backend(client, base_url, api_key, body, timeout_ms).await?;
    let status = resp.status();
    let text = resp.text().await.map_err(|err| {
        UpstreamCallError::new(UpstreamErrorKind::Network, Some(status), err.to_string())
    })?;
    serde_json::from_str(&text).map_err(|err| {
        UpstreamCallError::new(
            UpstreamErrorKind::Http,
            Some(status),
            format!("backend sent non-JSON body: {err}"),
        )
    })
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(
            join_url("https://host/api/v4/", "/chat/completions"),
            "https://host/api/v4/chat/completions"
        );
        assert_eq!(
            join_url("https://host/api/v4", "chat/completions"),
            "https://host/api/v4/chat/completions"
        );
    }
}
