use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};

use wayfarer_agent::SessionStore;
use wayfarer_core::config::{LlmConfig, LlmProvider};

#[derive(Clone)]
pub struct HealthState {
    sessions: Arc<SessionStore>,
    llm_provider: LlmProvider,
    llm_configured: bool,
}

impl HealthState {
    pub fn new(sessions: Arc<SessionStore>, llm: &LlmConfig) -> Self {
        // Ollama runs keyless; hosted providers need a key.
        let llm_configured = match llm.provider {
            LlmProvider::Ollama => true,
            LlmProvider::OpenAi => llm.api_key.is_some(),
        };
        Self { sessions, llm_provider: llm.provider, llm_configured }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub sessions: usize,
    pub llm_provider: String,
    pub llm_configured: bool,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn spawn(bind_address: &str, port: u16, state: HealthState) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(state)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let ready = state.llm_configured;
    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        sessions: state.sessions.len(),
        llm_provider: format!("{:?}", state.llm_provider).to_lowercase(),
        llm_configured: state.llm_configured,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use secrecy::SecretString;
    use tower::ServiceExt;

    use wayfarer_agent::SessionStore;
    use wayfarer_core::config::{AppConfig, LlmProvider};

    use crate::health::{router, HealthState};

    #[tokio::test]
    async fn health_reports_sessions_and_backend() {
        let sessions = Arc::new(SessionStore::new(12));
        sessions.handle("42");
        let state = HealthState::new(sessions, &AppConfig::default().llm);

        let response = router(state)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 64 * 1024).await.expect("body");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(json["status"], "ready");
        assert_eq!(json["sessions"], 1);
        assert_eq!(json["llm_provider"], "ollama");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn hosted_backend_without_key_is_degraded() {
        let mut llm = AppConfig::default().llm;
        llm.provider = LlmProvider::OpenAi;
        llm.api_key = None;
        let state = HealthState::new(Arc::new(SessionStore::new(12)), &llm);

        let response = router(state.clone())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        llm.api_key = Some(SecretString::from("sk-test".to_owned()));
        let configured = HealthState::new(Arc::new(SessionStore::new(12)), &llm);
        assert!(configured.llm_configured);
    }
}
