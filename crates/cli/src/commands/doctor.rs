use std::path::Path;

use secrecy::ExposeSecret;
use serde::Serialize;
use wayfarer_core::config::{AppConfig, LlmProvider, LoadOptions};
use wayfarer_providers::{JsonKnowledgeBase, LegalDirectoryRetriever};

use super::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Skipped, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const DEPENDENT_CHECKS: [&str; 4] =
    ["bot_token_readiness", "llm_backend", "knowledge_base", "legal_index"];

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Fail { 1 } else { 0 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck::pass("config_validation", "configuration loaded and validated"));
            checks.push(check_bot_token(&config));
            checks.push(check_llm_backend(&config));
            checks.push(check_knowledge_base(config.providers.knowledge_base_path.as_deref()));
            checks.push(check_legal_index(config.providers.legal_kb_dir.as_deref()));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            checks.extend(DEPENDENT_CHECKS.iter().map(|&name| {
                DoctorCheck::skipped(name, "skipped because configuration did not load")
            }));
        }
    }

    // Optional files that are not configured are skipped, not failed.
    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let (overall_status, summary) = if failed {
        (CheckStatus::Fail, "doctor: one or more readiness checks failed")
    } else {
        (CheckStatus::Pass, "doctor: all readiness checks passed")
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

fn check_bot_token(config: &AppConfig) -> DoctorCheck {
    match config.transport.require_token() {
        Ok(token) => {
            let bot_id = token.expose_secret().split(':').next().unwrap_or_default().to_string();
            DoctorCheck::pass("bot_token_readiness", format!("token present for bot id `{bot_id}`"))
        }
        Err(error) => DoctorCheck::fail("bot_token_readiness", error.to_string()),
    }
}

fn check_llm_backend(config: &AppConfig) -> DoctorCheck {
    let llm = &config.llm;
    let endpoint = llm.effective_base_url();
    match (llm.provider, llm.api_key.is_some()) {
        (LlmProvider::OpenAi, false) => {
            DoctorCheck::fail("llm_backend", "openai provider configured without llm.api_key")
        }
        (provider, _) => DoctorCheck::pass(
            "llm_backend",
            format!("{provider:?} model `{}` at {endpoint}", llm.model),
        ),
    }
}

fn check_knowledge_base(path: Option<&Path>) -> DoctorCheck {
    let Some(path) = path else {
        return DoctorCheck::skipped("knowledge_base", "providers.knowledge_base_path not set");
    };
    match JsonKnowledgeBase::load(path) {
        Ok(base) => DoctorCheck::pass(
            "knowledge_base",
            format!("{} countries loaded from {}", base.len(), path.display()),
        ),
        Err(error) => DoctorCheck::fail("knowledge_base", format!("{error:#}")),
    }
}

fn check_legal_index(dir: Option<&Path>) -> DoctorCheck {
    let Some(dir) = dir else {
        return DoctorCheck::skipped("legal_index", "providers.legal_kb_dir not set");
    };
    if !dir.is_dir() {
        return DoctorCheck::fail("legal_index", format!("{} is not a directory", dir.display()));
    }
    match LegalDirectoryRetriever::load(dir) {
        Ok(index) if index.is_empty() => {
            DoctorCheck::fail("legal_index", format!("no markdown documents under {}", dir.display()))
        }
        Ok(index) => DoctorCheck::pass(
            "legal_index",
            format!("{} chunks indexed from {}", index.len(), dir.display()),
        ),
        Err(error) => DoctorCheck::fail("legal_index", format!("{error:#}")),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
