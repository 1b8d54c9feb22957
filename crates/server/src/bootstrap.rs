use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use wayfarer_agent::guardrails::GuardrailPolicy;
use wayfarer_agent::{Orchestrator, OrchestratorSettings, SessionStore};
use wayfarer_bot::runner::TransportError;
use wayfarer_bot::{conversation_dispatcher, PollingRunner, ReconnectPolicy, TelegramTransport, TurnService};
use wayfarer_core::config::{AppConfig, ConfigError, LoadOptions};

pub struct Application {
    pub config: AppConfig,
    pub sessions: Arc<SessionStore>,
    pub runner: PollingRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("provider wiring failed: {0}")]
    Providers(#[source] anyhow::Error),
    #[error("chat transport setup failed: {0}")]
    Transport(#[from] TransportError),
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", correlation_id = "bootstrap", "starting application bootstrap");
    let token = config.transport.require_token()?.clone();

    let collaborators =
        wayfarer_providers::build_collaborators(&config).map_err(BootstrapError::Providers)?;
    let settings = OrchestratorSettings {
        max_retries: config.llm.max_retries,
        summary_window: config.session.summary_window,
        guardrails: GuardrailPolicy::default(),
    };
    let orchestrator = Arc::new(Orchestrator::new(collaborators, settings));
    let sessions = Arc::new(SessionStore::new(config.session.history_limit));
    let service = Arc::new(TurnService::new(orchestrator, sessions.clone()));

    let transport = TelegramTransport::new(token, config.transport.poll_timeout_secs)?;
    let runner = PollingRunner::new(
        Arc::new(transport),
        conversation_dispatcher(service),
        ReconnectPolicy::default(),
    );
    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        history_limit = config.session.history_limit,
        max_retries = config.llm.max_retries,
        "application wired"
    );

    Ok(Application { config, sessions, runner })
}

#[cfg(test)]
mod tests {
    use wayfarer_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    fn options(token: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                bot_token: Some(token.to_owned()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[test]
    fn bootstrap_fails_fast_without_bot_token() {
        let result = bootstrap(options(""));

        assert!(result.is_err());
        let message = result.err().expect("error").to_string();
        assert!(message.contains("transport.bot_token"));
    }

    #[test]
    fn bootstrap_wires_the_telegram_runner() {
        let app = bootstrap(options("123456:test-token")).expect("bootstrap should succeed");

        assert!(!app.runner.is_noop_transport());
        assert!(app.sessions.is_empty());
    }
}
