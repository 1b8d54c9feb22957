use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "wayfarer.toml";
pub const NESTED_CONFIG_FILE: &str = "config/wayfarer.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub transport: TransportConfig,
    pub llm: LlmConfig,
    pub providers: ProvidersConfig,
    pub cache: CacheConfig,
    pub session: SessionConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct TransportConfig {
    pub bot_token: SecretString,
    pub poll_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    /// Retry budget for the structured-output protocol.
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct ProvidersConfig {
    pub nominatim_url: String,
    pub open_meteo_url: String,
    pub open_meteo_geocoding_url: String,
    pub osrm_url: String,
    pub wikipedia_lang: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub knowledge_base_path: Option<PathBuf>,
    pub legal_kb_dir: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub default_ttl_secs: u64,
    pub max_entries: usize,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub history_limit: usize,
    pub summary_window: usize,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub bot_token: Option<String>,
    pub legal_kb_dir: Option<PathBuf>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig { bot_token: String::new().into(), poll_timeout_secs: 30 },
            llm: LlmConfig {
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: Some("http://localhost:11434".to_string()),
                model: "llama3.1".to_string(),
                timeout_secs: 60,
                max_retries: 2,
            },
            providers: ProvidersConfig {
                nominatim_url: "https://nominatim.openstreetmap.org".to_string(),
                open_meteo_url: "https://api.open-meteo.com/v1".to_string(),
                open_meteo_geocoding_url: "https://geocoding-api.open-meteo.com/v1".to_string(),
                osrm_url: "https://router.project-osrm.org".to_string(),
                wikipedia_lang: "en".to_string(),
                user_agent: "wayfarer-travel-bot/0.1".to_string(),
                timeout_secs: 20,
                knowledge_base_path: None,
                legal_kb_dir: None,
            },
            cache: CacheConfig { default_ttl_secs: 900, max_entries: 5000 },
            session: SessionConfig { history_limit: 12, summary_window: 6 },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl LlmConfig {
    /// Base URL of the chat-completions endpoint after provider defaults.
    pub fn effective_base_url(&self) -> String {
        match (&self.base_url, self.provider) {
            (Some(url), _) if !url.trim().is_empty() => url.trim_end_matches('/').to_string(),
            (_, LlmProvider::OpenAi) => "https://api.openai.com".to_string(),
            (_, LlmProvider::Ollama) => "http://localhost:11434".to_string(),
        }
    }
}

impl TransportConfig {
    /// The bot process refuses to start without a token; other tools only report it.
    pub fn require_token(&self) -> Result<&SecretString, ConfigError> {
        if self.bot_token.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "transport.bot_token is required to run the bot (set WAYFARER_TRANSPORT_BOT_TOKEN)"
                    .to_string(),
            ));
        }
        Ok(&self.bot_token)
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(transport) = patch.transport {
            if let Some(bot_token_value) = transport.bot_token {
                self.transport.bot_token = secret_value(bot_token_value);
            }
            if let Some(poll_timeout_secs) = transport.poll_timeout_secs {
                self.transport.poll_timeout_secs = poll_timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(providers) = patch.providers {
            let target = &mut self.providers;
            if let Some(value) = providers.nominatim_url {
                target.nominatim_url = value;
            }
            if let Some(value) = providers.open_meteo_url {
                target.open_meteo_url = value;
            }
            if let Some(value) = providers.open_meteo_geocoding_url {
                target.open_meteo_geocoding_url = value;
            }
            if let Some(value) = providers.osrm_url {
                target.osrm_url = value;
            }
            if let Some(value) = providers.wikipedia_lang {
                target.wikipedia_lang = value;
            }
            if let Some(value) = providers.user_agent {
                target.user_agent = value;
            }
            if let Some(value) = providers.timeout_secs {
                target.timeout_secs = value;
            }
            if let Some(value) = providers.knowledge_base_path {
                target.knowledge_base_path = Some(value);
            }
            if let Some(value) = providers.legal_kb_dir {
                target.legal_kb_dir = Some(value);
            }
        }

        if let Some(cache) = patch.cache {
            if let Some(default_ttl_secs) = cache.default_ttl_secs {
                self.cache.default_ttl_secs = default_ttl_secs;
            }
            if let Some(max_entries) = cache.max_entries {
                self.cache.max_entries = max_entries;
            }
        }

        if let Some(session) = patch.session {
            if let Some(history_limit) = session.history_limit {
                self.session.history_limit = history_limit;
            }
            if let Some(summary_window) = session.summary_window {
                self.session.summary_window = summary_window;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("WAYFARER_TRANSPORT_BOT_TOKEN") {
            self.transport.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("WAYFARER_TRANSPORT_POLL_TIMEOUT_SECS") {
            self.transport.poll_timeout_secs =
                parse_u64("WAYFARER_TRANSPORT_POLL_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("WAYFARER_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("WAYFARER_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("WAYFARER_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("WAYFARER_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("WAYFARER_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("WAYFARER_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("WAYFARER_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("WAYFARER_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("WAYFARER_PROVIDERS_NOMINATIM_URL") {
            self.providers.nominatim_url = value;
        }
        let open_meteo =
            read_env("WAYFARER_PROVIDERS_OPEN_METEO_URL").or_else(|| read_env("OPEN_METEO_BASE_URL"));
        if let Some(value) = open_meteo {
            self.providers.open_meteo_url = value;
        }
        let open_meteo_geocoding = read_env("WAYFARER_PROVIDERS_OPEN_METEO_GEOCODING_URL")
            .or_else(|| read_env("OPEN_METEO_GEOCODING_URL"));
        if let Some(value) = open_meteo_geocoding {
            self.providers.open_meteo_geocoding_url = value;
        }
        let osrm = read_env("WAYFARER_PROVIDERS_OSRM_URL").or_else(|| read_env("OSRM_BASE_URL"));
        if let Some(value) = osrm {
            self.providers.osrm_url = value;
        }
        if let Some(value) = read_env("WAYFARER_PROVIDERS_WIKIPEDIA_LANG") {
            self.providers.wikipedia_lang = value;
        }
        if let Some(value) = read_env("WAYFARER_PROVIDERS_USER_AGENT") {
            self.providers.user_agent = value;
        }
        if let Some(value) = read_env("WAYFARER_PROVIDERS_TIMEOUT_SECS") {
            self.providers.timeout_secs = parse_u64("WAYFARER_PROVIDERS_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("WAYFARER_PROVIDERS_KNOWLEDGE_BASE_PATH") {
            self.providers.knowledge_base_path = Some(PathBuf::from(value));
        }
        let legal_dir =
            read_env("WAYFARER_PROVIDERS_LEGAL_KB_DIR").or_else(|| read_env("LEGAL_KB_DIR"));
        if let Some(value) = legal_dir {
            self.providers.legal_kb_dir = Some(PathBuf::from(value));
        }

        if let Some(value) = read_env("WAYFARER_CACHE_DEFAULT_TTL_SECS") {
            self.cache.default_ttl_secs = parse_u64("WAYFARER_CACHE_DEFAULT_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("WAYFARER_CACHE_MAX_ENTRIES") {
            self.cache.max_entries = parse_usize("WAYFARER_CACHE_MAX_ENTRIES", &value)?;
        }

        if let Some(value) = read_env("WAYFARER_SESSION_HISTORY_LIMIT") {
            self.session.history_limit = parse_usize("WAYFARER_SESSION_HISTORY_LIMIT", &value)?;
        }
        if let Some(value) = read_env("WAYFARER_SESSION_SUMMARY_WINDOW") {
            self.session.summary_window = parse_usize("WAYFARER_SESSION_SUMMARY_WINDOW", &value)?;
        }

        if let Some(value) = read_env("WAYFARER_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("WAYFARER_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_u16("WAYFARER_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("WAYFARER_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("WAYFARER_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("WAYFARER_LOGGING_LEVEL").or_else(|| read_env("WAYFARER_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("WAYFARER_LOGGING_FORMAT").or_else(|| read_env("WAYFARER_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(bot_token) = overrides.bot_token {
            self.transport.bot_token = secret_value(bot_token);
        }
        if let Some(legal_kb_dir) = overrides.legal_kb_dir {
            self.providers.legal_kb_dir = Some(legal_kb_dir);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_transport(&self.transport)?;
        validate_llm(&self.llm)?;
        validate_providers(&self.providers)?;
        validate_cache(&self.cache)?;
        validate_session(&self.session)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from(NESTED_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_transport(transport: &TransportConfig) -> Result<(), ConfigError> {
    let token = transport.bot_token.expose_secret().trim().to_string();
    if !token.is_empty() && !token.contains(':') {
        return Err(ConfigError::Validation(
            "transport.bot_token must look like `<bot id>:<secret>`".to_string(),
        ));
    }

    if transport.poll_timeout_secs == 0 || transport.poll_timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "transport.poll_timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.max_retries > 10 {
        return Err(ConfigError::Validation("llm.max_retries must be at most 10".to_string()));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    match llm.provider {
        LlmProvider::OpenAi => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for the openai provider".to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {
            let missing =
                llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.base_url is required for ollama provider".to_string(),
                ));
            }
        }
    }

    if let Some(base_url) = &llm.base_url {
        ensure_http_url("llm.base_url", base_url)?;
    }

    Ok(())
}

fn validate_providers(providers: &ProvidersConfig) -> Result<(), ConfigError> {
    ensure_http_url("providers.nominatim_url", &providers.nominatim_url)?;
    ensure_http_url("providers.open_meteo_url", &providers.open_meteo_url)?;
    ensure_http_url("providers.open_meteo_geocoding_url", &providers.open_meteo_geocoding_url)?;
    ensure_http_url("providers.osrm_url", &providers.osrm_url)?;

    let lang = providers.wikipedia_lang.trim();
    if lang.is_empty() || !lang.chars().all(|ch| ch.is_ascii_lowercase() || ch == '-') {
        return Err(ConfigError::Validation(
            "providers.wikipedia_lang must be a lowercase language code such as `en` or `ru`"
                .to_string(),
        ));
    }

    if providers.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "providers.user_agent must not be empty (public geocoders reject anonymous clients)"
                .to_string(),
        ));
    }

    if providers.timeout_secs == 0 || providers.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "providers.timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    Ok(())
}

fn validate_cache(cache: &CacheConfig) -> Result<(), ConfigError> {
    if cache.default_ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "cache.default_ttl_secs must be greater than zero".to_string(),
        ));
    }
    if cache.max_entries == 0 {
        return Err(ConfigError::Validation(
            "cache.max_entries must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_session(session: &SessionConfig) -> Result<(), ConfigError> {
    if session.history_limit == 0 {
        return Err(ConfigError::Validation(
            "session.history_limit must be greater than zero".to_string(),
        ));
    }
    if session.summary_window == 0 || session.summary_window > session.history_limit {
        return Err(ConfigError::Validation(
            "session.summary_window must be in range 1..=session.history_limit".to_string(),
        ));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn ensure_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    let value = value.trim();
    if value.starts_with("http://") || value.starts_with("https://") {
        return Ok(());
    }
    Err(ConfigError::Validation(format!("{key} must start with http:// or https://")))
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    transport: Option<TransportPatch>,
    llm: Option<LlmPatch>,
    providers: Option<ProvidersPatch>,
    cache: Option<CachePatch>,
    session: Option<SessionPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct TransportPatch {
    bot_token: Option<String>,
    poll_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ProvidersPatch {
    nominatim_url: Option<String>,
    open_meteo_url: Option<String>,
    open_meteo_geocoding_url: Option<String>,
    osrm_url: Option<String>,
    wikipedia_lang: Option<String>,
    user_agent: Option<String>,
    timeout_secs: Option<u64>,
    knowledge_base_path: Option<PathBuf>,
    legal_kb_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct CachePatch {
    default_ttl_secs: Option<u64>,
    max_entries: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionPatch {
    history_limit: Option<usize>,
    summary_window: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
