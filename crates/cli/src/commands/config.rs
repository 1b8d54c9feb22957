use std::env;
use std::fs;
use std::path::Path;

use secrecy::ExposeSecret;
use toml::Value;
use wayfarer_core::config::{resolve_config_path, AppConfig, LoadOptions};

use super::CommandResult;

const UNSET: &str = "<unset>";

/// One reported key: dotted path, the env var that overrides it, its value.
struct Field {
    key: &'static str,
    env_key: &'static str,
    value: String,
}

impl Field {
    fn new(key: &'static str, env_key: &'static str, value: impl Into<String>) -> Self {
        Self { key, env_key, value: value.into() }
    }
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            )
        }
    };

    let file_path = resolve_config_path(None);
    let file_doc = load_config_file_doc(file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(&field, file_doc.as_ref(), file_path.as_deref());
        lines.push(format!("- {} = {} (source: {source})", field.key, field.value));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let optional = |value: Option<String>| value.unwrap_or_else(|| UNSET.to_string());
    let providers = &config.providers;

    vec![
        Field::new(
            "transport.bot_token",
            "WAYFARER_TRANSPORT_BOT_TOKEN",
            redact_token(config.transport.bot_token.expose_secret()),
        ),
        Field::new(
            "transport.poll_timeout_secs",
            "WAYFARER_TRANSPORT_POLL_TIMEOUT_SECS",
            config.transport.poll_timeout_secs.to_string(),
        ),
        Field::new("llm.provider", "WAYFARER_LLM_PROVIDER", format!("{:?}", config.llm.provider)),
        Field::new("llm.model", "WAYFARER_LLM_MODEL", config.llm.model.clone()),
        Field::new("llm.base_url", "WAYFARER_LLM_BASE_URL", config.llm.effective_base_url()),
        Field::new(
            "llm.api_key",
            "WAYFARER_LLM_API_KEY",
            if config.llm.api_key.is_some() { "<redacted>" } else { UNSET },
        ),
        Field::new("llm.max_retries", "WAYFARER_LLM_MAX_RETRIES", config.llm.max_retries.to_string()),
        Field::new(
            "providers.nominatim_url",
            "WAYFARER_PROVIDERS_NOMINATIM_URL",
            providers.nominatim_url.clone(),
        ),
        Field::new(
            "providers.open_meteo_url",
            "WAYFARER_PROVIDERS_OPEN_METEO_URL",
            providers.open_meteo_url.clone(),
        ),
        Field::new("providers.osrm_url", "WAYFARER_PROVIDERS_OSRM_URL", providers.osrm_url.clone()),
        Field::new(
            "providers.wikipedia_lang",
            "WAYFARER_PROVIDERS_WIKIPEDIA_LANG",
            providers.wikipedia_lang.clone(),
        ),
        Field::new(
            "providers.knowledge_base_path",
            "WAYFARER_PROVIDERS_KNOWLEDGE_BASE_PATH",
            optional(providers.knowledge_base_path.as_ref().map(|path| path.display().to_string())),
        ),
        Field::new(
            "providers.legal_kb_dir",
            "WAYFARER_PROVIDERS_LEGAL_KB_DIR",
            optional(providers.legal_kb_dir.as_ref().map(|path| path.display().to_string())),
        ),
        Field::new(
            "session.history_limit",
            "WAYFARER_SESSION_HISTORY_LIMIT",
            config.session.history_limit.to_string(),
        ),
        Field::new(
            "server.health_check_port",
            "WAYFARER_SERVER_HEALTH_CHECK_PORT",
            config.server.health_check_port.to_string(),
        ),
        Field::new("logging.level", "WAYFARER_LOGGING_LEVEL", config.logging.level.clone()),
        Field::new(
            "logging.format",
            "WAYFARER_LOGGING_FORMAT",
            format!("{:?}", config.logging.format),
        ),
    ]
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(field: &Field, file_doc: Option<&Value>, file_path: Option<&Path>) -> String {
    if env::var_os(field.env_key).is_some() {
        return format!("env ({})", field.env_key);
    }

    match (file_doc, file_path) {
        (Some(doc), Some(path)) if contains_path(doc, field.key) => {
            format!("file ({})", path.display())
        }
        _ => "default".to_string(),
    }
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

/// Bot tokens look like `<bot id>:<secret>`; only the id is shown.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.split_once(':') {
        Some((bot_id, _)) => format!("{bot_id}:***"),
        None => "<redacted>".to_string(),
    }
}
