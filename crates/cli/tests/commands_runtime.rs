use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use wayfarer_cli::commands::{config, doctor};

#[test]
fn config_redacts_the_bot_token_and_names_sources() {
    with_env(
        &[("WAYFARER_TRANSPORT_BOT_TOKEN", "123456:AAH-very-secret"), ("WAYFARER_LLM_MODEL", "qwen2.5")],
        || {
            let result = config::run();
            assert_eq!(result.exit_code, 0);
            assert!(result
                .output
                .contains("- transport.bot_token = 123456:*** (source: env (WAYFARER_TRANSPORT_BOT_TOKEN))"));
            assert!(result.output.contains("- llm.model = qwen2.5 (source: env (WAYFARER_LLM_MODEL))"));
            assert!(result.output.contains("- llm.provider = Ollama (source: default)"));
            assert!(!result.output.contains("very-secret"));
        },
    );
}

#[test]
fn config_reports_validation_failure_as_json() {
    with_env(&[("WAYFARER_LLM_PROVIDER", "openai")], || {
        let result = config::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "config");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
        assert!(payload["message"].as_str().unwrap_or_default().contains("llm.api_key"));
    });
}

#[test]
fn doctor_fails_without_bot_token() {
    with_env(&[], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 1);

        let report = parse_payload(&result.output);
        assert_eq!(report["overall_status"], "fail");
        assert_eq!(check(&report, "config_validation")["status"], "pass");
        assert_eq!(check(&report, "bot_token_readiness")["status"], "fail");
        assert_eq!(check(&report, "knowledge_base")["status"], "skipped");
        assert_eq!(check(&report, "legal_index")["status"], "skipped");
    });
}

#[test]
fn doctor_passes_with_token_and_knowledge_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let kb_path = dir.path().join("kb.json");
    fs::write(
        &kb_path,
        r#"{"Japan": {"aliases": ["Япония"], "cities": {"Kyoto": {"aliases": ["Киото"]}}, "visa": "eVisa"}}"#,
    )
    .expect("write kb");
    let legal_dir = dir.path().join("legal");
    fs::create_dir(&legal_dir).expect("legal dir");
    fs::write(legal_dir.join("JP__japan__ru.md"), "country: Japan\n\nВиза требуется для туристов.")
        .expect("write legal");

    let kb = kb_path.display().to_string();
    let legal = legal_dir.display().to_string();
    with_env(
        &[
            ("WAYFARER_TRANSPORT_BOT_TOKEN", "123456:token"),
            ("WAYFARER_PROVIDERS_KNOWLEDGE_BASE_PATH", kb.as_str()),
            ("WAYFARER_PROVIDERS_LEGAL_KB_DIR", legal.as_str()),
        ],
        || {
            let result = doctor::run(true);
            let report = parse_payload(&result.output);
            assert_eq!(report["overall_status"], "pass", "{}", result.output);
            assert_eq!(result.exit_code, 0);
            assert!(check(&report, "knowledge_base")["details"]
                .as_str()
                .unwrap_or_default()
                .starts_with("1 countries"));
            assert_eq!(check(&report, "legal_index")["status"], "pass");
        },
    );
}

#[test]
fn doctor_human_output_marks_each_check() {
    with_env(&[("WAYFARER_TRANSPORT_BOT_TOKEN", "123456:token")], || {
        let result = doctor::run(false);
        assert!(result.output.starts_with("doctor: all readiness checks passed"));
        assert!(result.output.contains("- [ok] bot_token_readiness: token present for bot id `123456`"));
        assert!(result.output.contains("- [skip] knowledge_base"));
    });
}

fn check<'a>(report: &'a Value, name: &str) -> &'a Value {
    report["checks"]
        .as_array()
        .and_then(|checks| checks.iter().find(|check| check["name"] == name))
        .unwrap_or_else(|| panic!("missing check {name}"))
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "WAYFARER_TRANSPORT_BOT_TOKEN",
        "WAYFARER_TRANSPORT_POLL_TIMEOUT_SECS",
        "WAYFARER_LLM_PROVIDER",
        "WAYFARER_LLM_API_KEY",
        "WAYFARER_LLM_BASE_URL",
        "WAYFARER_LLM_MODEL",
        "WAYFARER_LLM_TIMEOUT_SECS",
        "WAYFARER_LLM_MAX_RETRIES",
        "WAYFARER_PROVIDERS_KNOWLEDGE_BASE_PATH",
        "WAYFARER_PROVIDERS_LEGAL_KB_DIR",
        "LEGAL_KB_DIR",
        "WAYFARER_SESSION_HISTORY_LIMIT",
        "WAYFARER_SERVER_HEALTH_CHECK_PORT",
        "WAYFARER_LOGGING_LEVEL",
        "WAYFARER_LOGGING_FORMAT",
        "WAYFARER_LOG_LEVEL",
        "WAYFARER_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
