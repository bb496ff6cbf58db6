//! Shared HTTP plumbing for the provider adapters

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tutor_core::{ProviderKind, TutorError};

/// Build a client with the per-request timeout, or `None` if TLS setup fails
pub(crate) fn build_client(kind: ProviderKind, timeout_secs: u64) -> Option<Client> {
    match Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
    {
        Ok(client) => Some(client),
        Err(e) => {
            tracing::error!(provider = %kind, error = %e, "Failed to initialize HTTP client");
            None
        }
    }
}

pub(crate) fn transport_error(e: &reqwest::Error) -> TutorError {
    if e.is_timeout() {
        TutorError::Transport("request timed out".into())
    } else if e.is_connect() {
        TutorError::Transport(format!("connection failed: {e}"))
    } else {
        TutorError::Transport(e.to_string())
    }
}

/// Read and decode a response body, mapping non-2xx statuses to typed errors
pub(crate) async fn decode<T: DeserializeOwned>(
    kind: ProviderKind,
    response: Response,
) -> tutor_core::Result<T> {
    let status = response.status();
    let body = response.text().await.map_err(|e| transport_error(&e))?;

    if !status.is_success() {
        return Err(status_error(kind, status, &body));
    }

    serde_json::from_str(&body).map_err(|e| TutorError::Parse(format!("unexpected response: {e}")))
}

fn status_error(kind: ProviderKind, status: StatusCode, body: &str) -> TutorError {
    match status.as_u16() {
        401 | 403 => TutorError::Authentication(format!(
            "Please check your {} environment variable.",
            kind.api_key_env()
        )),
        429 | 529 => TutorError::RateLimited(status.to_string()),
        _ => TutorError::Provider(format!("{status}: {}", error_detail(body))),
    }
}

/// `error.message` from a vendor error body, else the body itself
fn error_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect())
}
