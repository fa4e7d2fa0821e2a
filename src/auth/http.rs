//! HTTP helpers shared by the REST-backed adapters.

use crate::shared::error::{AuthError, Result};
use reqwest::cookie::Jar;
use reqwest::{Client, Response, Url};
use std::sync::Arc;
use std::time::Duration;

/// Join an API path onto a base URL, keeping any path prefix of the base
pub(crate) fn endpoint(base: &Url, path: &str) -> String {
    format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Build the reqwest client used by an adapter, optionally backed by a shared cookie jar
pub(crate) fn build_client(timeout: Duration, jar: Option<Arc<Jar>>) -> Result<Client> {
    let mut builder = Client::builder().timeout(timeout);
    if let Some(jar) = jar {
        builder = builder.cookie_provider(jar);
    }
    builder
        .build()
        .map_err(|e| AuthError::network(format!("Failed to build HTTP client: {}", e)))
}

/// Turn a non-success response into the matching `AuthError`
pub(crate) async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| status.to_string());
    Err(AuthError::from_status(status.as_u16(), message))
}

/// Extract a human-readable message from a backend error body.
///
/// GoTrue answers with `error_description` or `msg`; Appwrite with `message`.
pub(crate) fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(str::to_string)
}
