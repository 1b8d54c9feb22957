use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use wayfarer_core::EvidenceError;

/// Shared client for the read-only data providers: one user agent, one
/// timeout for every call.
pub fn build_client(user_agent: &str, timeout_secs: u64) -> Result<Client, EvidenceError> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|error| EvidenceError::Unavailable(format!("http client: {error}")))
}

/// Sends the request and decodes a JSON body. Transport failures, timeouts,
/// non-2xx statuses and undecodable bodies map onto `EvidenceError`.
pub async fn fetch_json<T: DeserializeOwned>(
    request: RequestBuilder,
    timeout_secs: u64,
) -> Result<T, EvidenceError> {
    let response = request.send().await.map_err(|error| classify(&error, timeout_secs))?;
    let status = response.status();
    if !status.is_success() {
        debug!(event_name = "http.status", status = status.as_u16(), url = %response.url());
        return Err(EvidenceError::Status(status.as_u16()));
    }
    response.json::<T>().await.map_err(|error| classify(&error, timeout_secs))
}

fn classify(error: &reqwest::Error, timeout_secs: u64) -> EvidenceError {
    if error.is_timeout() {
        EvidenceError::Timeout(timeout_secs)
    } else if error.is_decode() {
        EvidenceError::Malformed(error.to_string())
    } else if let Some(status) = error.status() {
        EvidenceError::Status(status.as_u16())
    } else {
        EvidenceError::Unavailable(error.to_string())
    }
}

/// Parses the string-or-number coordinates some providers return.
pub fn parse_degrees(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(number) => number.as_f64(),
        serde_json::Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
