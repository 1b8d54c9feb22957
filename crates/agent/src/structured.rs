//! Retry/repair protocol that coaxes a schema instance out of a
//! text-generation backend.
//!
//! Each attempt renders the prompt with format instructions and calls the
//! backend once. A reply that echoes a schema definition triggers a hard
//! repair call before parsing; a reply that fails to parse triggers one more
//! repair call quoting the invalid text. After `max_retries + 1` attempts the
//! caller gets `T::default()`, which means "no information", never an error.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::llm::{ChatMessage, CompletionRequest, GenerationSettings, LlmClient};

const SCHEMA_MARKERS: [&str; 4] = ["\"$defs\"", "\"properties\"", "\"required\"", "\"type\""];
const DEFAULT_HUMAN_HINT: &str = "Верни только JSON-объект с данными.";

/// A type the backend is asked to produce as a JSON object.
pub trait OutputSchema: DeserializeOwned + Default + Send {
    const NAME: &'static str;

    /// Plain-language description of each field, one per line.
    fn field_guide() -> &'static str;

    fn format_instructions() -> String {
        format!(
            "Формат ответа: ровно один JSON-объект {name} с данными, без пояснений и без markdown. \
             Не описывай схему, заполни значения.\nПоля {name}:\n{guide}",
            name = Self::NAME,
            guide = Self::field_guide()
        )
    }
}

pub type PromptVars = BTreeMap<&'static str, String>;

/// System and human message templates with `{slot}` placeholders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptTemplate {
    system: String,
    human: String,
}

impl PromptTemplate {
    pub fn new(system: impl Into<String>, human: impl Into<String>) -> Self {
        Self { system: system.into(), human: human.into() }
    }

    pub fn render(&self, vars: &PromptVars) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(render_slots(&self.system, vars)),
            ChatMessage::user(render_slots(&self.human, vars)),
        ]
    }
}

/// Everything one structured call needs besides the backend.
#[derive(Clone, Debug)]
pub struct StructuredRequest<'a> {
    pub template: &'a PromptTemplate,
    pub vars: PromptVars,
    pub repair_system: &'a str,
    pub human_hint: Option<String>,
    pub max_retries: u32,
    pub settings: GenerationSettings,
}

pub fn looks_like_schema(text: &str) -> bool {
    SCHEMA_MARKERS.iter().any(|marker| text.contains(marker))
}

/// Runs the protocol. Never fails; see the module docs.
pub async fn call_structured<T: OutputSchema>(
    llm: &dyn LlmClient,
    request: &StructuredRequest<'_>,
) -> T {
    let format_instructions = T::format_instructions();
    let mut vars = request.vars.clone();
    vars.insert("format_instructions", format_instructions.clone());
    let repair_system = format!("{}\n{}", request.repair_system, format_instructions);

    for attempt in 0..=request.max_retries {
        let messages = request.template.render(&vars);
        let mut text = match invoke(llm, messages, request.settings).await {
            Some(text) => text,
            None => continue,
        };

        if looks_like_schema(&text) {
            warn!(
                event_name = "structured.schema_echo",
                schema = T::NAME,
                attempt,
                "backend echoed a schema; issuing hard repair"
            );
            let hint = request.human_hint.as_deref().unwrap_or(DEFAULT_HUMAN_HINT);
            let repair = vec![ChatMessage::system(repair_system.clone()), ChatMessage::user(hint)];
            text = match invoke(llm, repair, request.settings).await {
                Some(text) => text,
                None => continue,
            };
        }

        if let Some(value) = parse_instance::<T>(&text) {
            debug!(event_name = "structured.parsed", schema = T::NAME, attempt);
            return value;
        }

        warn!(
            event_name = "structured.repair",
            schema = T::NAME,
            attempt,
            "unparsable reply; asking backend to fix it"
        );
        let repair = vec![
            ChatMessage::system(repair_system.clone()),
            ChatMessage::user(format!(
                "Вот твой неверный ответ:\n{text}\n\nИсправь и верни только корректный JSON-объект данных."
            )),
        ];
        if let Some(repaired) = invoke(llm, repair, request.settings).await {
            if let Some(value) = parse_instance::<T>(&repaired) {
                debug!(event_name = "structured.repaired", schema = T::NAME, attempt);
                return value;
            }
        }
    }

    warn!(
        event_name = "structured.defaulted",
        schema = T::NAME,
        attempts = request.max_retries + 1,
        "structured output exhausted retries; using defaults"
    );
    T::default()
}

async fn invoke(
    llm: &dyn LlmClient,
    messages: Vec<ChatMessage>,
    settings: GenerationSettings,
) -> Option<String> {
    match llm.complete(&CompletionRequest::new(messages, settings)).await {
        Ok(text) => Some(text),
        Err(error) => {
            warn!(event_name = "structured.backend_failed", error = %error);
            None
        }
    }
}

/// Parses the first JSON object found in `text`, tolerating code fences and
/// chatter around it.
pub fn parse_instance<T: DeserializeOwned>(text: &str) -> Option<T> {
    let candidate = extract_json_object(text)?;
    serde_json::from_str(candidate).ok()
}

fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn render_slots(template: &str, vars: &PromptVars) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        output.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let key = &after[..close];
            vars.get(key).map(|value| (value, close))
        });
        match replaced {
            Some((value, close)) => {
                output.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                output.push('{');
                rest = after;
            }
        }
    }

    output.push_str(rest);
    output
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use serde::Deserialize;

    use super::{
        call_structured, looks_like_schema, parse_instance, render_slots, OutputSchema,
        PromptTemplate, PromptVars, StructuredRequest,
    };
    use crate::llm::{CompletionRequest, GenerationSettings, LlmClient};

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(default)]
    struct Probe {
        city: String,
        days: u32,
    }

    impl OutputSchema for Probe {
        const NAME: &'static str = "Probe";

        fn field_guide() -> &'static str {
            "- city: string\n- days: integer"
        }
    }

    /// Replays scripted replies and records every request it saw.
    struct ScriptedLlm {
        replies: Mutex<VecDeque<Result<String>>>,
        fallback: String,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<Result<String>>, fallback: &str) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                fallback: fallback.to_owned(),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<CompletionRequest> {
            self.seen.lock().expect("seen lock").clone()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, request: &CompletionRequest) -> Result<String> {
            self.seen.lock().expect("seen lock").push(request.clone());
            self.replies
                .lock()
                .expect("replies lock")
                .pop_front()
                .unwrap_or_else(|| Ok(self.fallback.clone()))
        }
    }

    fn template() -> PromptTemplate {
        PromptTemplate::new("Extract trip facts.\n{format_instructions}", "Message: {text}")
    }

    fn request(template: &PromptTemplate, max_retries: u32) -> StructuredRequest<'_> {
        let mut vars = PromptVars::new();
        vars.insert("text", "three days in Kyoto".to_owned());
        StructuredRequest {
            template,
            vars,
            repair_system: "Fix the format.",
            human_hint: Some("Return Probe JSON.".to_owned()),
            max_retries,
            settings: GenerationSettings::new(0.0, 200),
        }
    }

    fn is_primary(call: &CompletionRequest) -> bool {
        call.messages[1].content.starts_with("Message:")
    }

    #[tokio::test]
    async fn clean_reply_parses_on_first_call() {
        let llm = ScriptedLlm::new(vec![Ok(r#"{"city":"Kyoto","days":3}"#.into())], "");
        let template = template();
        let probe: Probe = call_structured(&llm, &request(&template, 2)).await;

        assert_eq!(probe, Probe { city: "Kyoto".into(), days: 3 });
        assert_eq!(llm.calls().len(), 1);
        assert!(llm.calls()[0].messages[0].content.contains("Поля Probe"));
    }

    #[tokio::test]
    async fn garbage_forever_defaults_after_budgeted_attempts() {
        let llm = ScriptedLlm::new(Vec::new(), "sorry, I cannot do JSON");
        let template = template();
        let probe: Probe = call_structured(&llm, &request(&template, 2)).await;

        assert_eq!(probe, Probe::default());
        let calls = llm.calls();
        assert_eq!(calls.iter().filter(|call| is_primary(call)).count(), 3);
        assert_eq!(calls.len(), 6, "each attempt is one call plus one repair");
    }

    #[tokio::test]
    async fn schema_echo_is_repaired_before_any_parse() {
        let schema = r#"{"title":"Probe","type":"object","properties":{"city":{"type":"string"}}}"#;
        let llm = ScriptedLlm::new(
            vec![Ok(schema.into()), Ok(r#"{"city":"Osaka","days":1}"#.into())],
            "",
        );
        let template = template();
        let probe: Probe = call_structured(&llm, &request(&template, 2)).await;

        assert_eq!(probe.city, "Osaka");
        let calls = llm.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].messages[1].content, "Return Probe JSON.");
        assert!(calls[1].messages[0].content.starts_with("Fix the format."));
    }

    #[tokio::test]
    async fn parse_failure_repair_quotes_the_invalid_text() {
        let llm = ScriptedLlm::new(
            vec![Ok("city is Lisbon".into()), Ok(r#"{"city":"Lisbon"}"#.into())],
            "",
        );
        let template = template();
        let probe: Probe = call_structured(&llm, &request(&template, 0)).await;

        assert_eq!(probe.city, "Lisbon");
        assert!(llm.calls()[1].messages[1].content.contains("city is Lisbon"));
    }

    #[tokio::test]
    async fn backend_errors_count_as_failed_attempts() {
        let llm = ScriptedLlm::new(
            vec![Err(anyhow!("connection reset")), Ok(r#"{"city":"Porto","days":2}"#.into())],
            "",
        );
        let template = template();
        let probe: Probe = call_structured(&llm, &request(&template, 1)).await;
        assert_eq!(probe.city, "Porto");
    }

    #[test]
    fn parser_tolerates_fences_and_chatter() {
        let parsed: Option<Probe> =
            parse_instance("Sure!\n```json\n{\"city\": \"Nara\", \"days\": 1}\n```");
        assert_eq!(parsed, Some(Probe { city: "Nara".into(), days: 1 }));
        assert_eq!(parse_instance::<Probe>("no braces here"), None);
    }

    #[test]
    fn schema_markers_are_detected() {
        assert!(looks_like_schema(r#"{"properties": {}}"#));
        assert!(looks_like_schema(r#"{"required": ["city"]}"#));
        assert!(!looks_like_schema(r#"{"city": "Rome", "destination_title": "Rome"}"#));
    }

    #[test]
    fn unknown_slots_and_literal_braces_survive_rendering() {
        let mut vars = PromptVars::new();
        vars.insert("city", "Rome".to_owned());
        let rendered = render_slots("to {city} {unknown} {\"a\": 1}", &vars);
        assert_eq!(rendered, "to Rome {unknown} {\"a\": 1}");
        let messages = PromptTemplate::new("{city}", "{city}!").render(&vars);
        assert_eq!(messages[1].content, "Rome!");
    }
}
