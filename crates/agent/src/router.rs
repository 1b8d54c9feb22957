use std::sync::Arc;

use serde::{Deserialize, Deserializer};
use tracing::info;

use wayfarer_core::{CapabilitySet, RoutingDecision};

use crate::llm::{GenerationSettings, LlmClient};
use crate::structured::{call_structured, OutputSchema, PromptTemplate, PromptVars, StructuredRequest};

const ROUTER_SETTINGS: GenerationSettings = GenerationSettings::new(0.0, 650);

const ROUTER_SYSTEM: &str = "Ты диспетчер туристического бота. \
Извлеки из сообщения страну, город, даты и точки маршрута, затем выбери needs. \
Допустимые needs: tourism, legal, weather, route. \
Визы, законы, правила въезда, штрафы -> legal. \
Погода, прогноз, температура -> weather. \
Маршрут, как добраться, дорога, прогулка по достопримечательностям, план на день с маршрутом -> route. \
Достопримечательности, культура, еда, советы -> tourism. \
Если сообщение общее или затрагивает несколько тем, выбери несколько needs. \
Верни только данные RouteDecision, а не JSON Schema; не используй ключи $defs, properties, required.\n\
{format_instructions}";

const ROUTER_HUMAN: &str = "ПАМЯТЬ: {memory_hint}\n\
СООБЩЕНИЕ: {text}\n\
Верни JSON RouteDecision и обязательно заполни user_question (можно повторить сообщение).";

const ROUTER_REPAIR: &str = "Ты исправляешь формат вывода. Верни только JSON-объект RouteDecision с данными. \
Не возвращай JSON Schema и не используй $defs, properties, required.";

/// Wire shape the backend fills in; lenient about nulls and scalar lists.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RouterOutput {
    pub country: Option<String>,
    pub city: Option<String>,
    pub dates: Option<String>,
    pub start_location: Option<String>,
    pub end_location: Option<String>,
    #[serde(deserialize_with = "string_or_list")]
    pub needs: Vec<String>,
    pub user_question: Option<String>,
}

impl OutputSchema for RouterOutput {
    const NAME: &'static str = "RouteDecision";

    fn field_guide() -> &'static str {
        "- country: страна или null\n\
         - city: город или null\n\
         - dates: даты поездки как в сообщении или null\n\
         - start_location: откуда (для маршрута) или null\n\
         - end_location: куда (для маршрута) или null\n\
         - needs: список из tourism, legal, weather, route\n\
         - user_question: вопрос пользователя своими словами"
    }
}

impl From<RouterOutput> for RoutingDecision {
    fn from(output: RouterOutput) -> Self {
        RoutingDecision {
            country: output.country,
            city: output.city,
            dates: output.dates,
            start_location: output.start_location,
            end_location: output.end_location,
            capabilities: CapabilitySet::from_labels(&output.needs),
            user_question: output.user_question.unwrap_or_default(),
        }
        .normalized()
    }
}

/// Turns raw text plus a memory hint into a routing decision. Never fails:
/// a defaulted structured result simply selects nothing.
pub struct IntentRouter {
    llm: Arc<dyn LlmClient>,
    max_retries: u32,
}

impl IntentRouter {
    pub fn new(llm: Arc<dyn LlmClient>, max_retries: u32) -> Self {
        Self { llm, max_retries }
    }

    pub async fn decide(&self, text: &str, memory_hint: &str) -> RoutingDecision {
        let template = PromptTemplate::new(ROUTER_SYSTEM, ROUTER_HUMAN);
        let mut vars = PromptVars::new();
        vars.insert("text", text.to_owned());
        vars.insert("memory_hint", memory_hint.to_owned());

        let request = StructuredRequest {
            template: &template,
            vars,
            repair_system: ROUTER_REPAIR,
            human_hint: Some(format!(
                "Память: {memory_hint}\nСообщение: {text}\nВерни только JSON RouteDecision."
            )),
            max_retries: self.max_retries,
            settings: ROUTER_SETTINGS,
        };

        let output: RouterOutput = call_structured(self.llm.as_ref(), &request).await;
        let mut decision = RoutingDecision::from(output);
        if decision.user_question.is_empty() {
            decision.user_question = text.trim().to_owned();
        }

        info!(
            event_name = "router.decision",
            capabilities = %decision.capabilities,
            has_country = decision.country.is_some(),
            has_city = decision.city.is_some(),
            has_endpoints = decision.has_endpoints(),
            "intent routed"
        );
        decision
    }
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(value)) => value.split(',').map(str::to_owned).collect(),
        Some(OneOrMany::Many(values)) => values,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::Result;
    use async_trait::async_trait;

    use wayfarer_core::Capability;

    use super::{IntentRouter, RouterOutput};
    use crate::llm::{CompletionRequest, LlmClient};
    use crate::structured::parse_instance;

    struct FixedLlm {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmClient for FixedLlm {
        async fn complete(&self, request: &CompletionRequest) -> Result<String> {
            let human = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            self.prompts.lock().expect("prompts").push(human);
            Ok(self.reply.clone())
        }
    }

    fn router(reply: &str) -> (IntentRouter, Arc<FixedLlm>) {
        let llm = Arc::new(FixedLlm { reply: reply.to_owned(), prompts: Mutex::new(Vec::new()) });
        (IntentRouter::new(llm.clone(), 2), llm)
    }

    #[tokio::test]
    async fn visa_question_routes_to_legal() {
        let (router, llm) = router(
            r#"{"country":"Япония","city":null,"needs":["legal"],"user_question":"Нужна ли виза?"}"#,
        );
        let decision = router.decide("Нужна ли виза в Японию?", "summary=; country=None").await;

        assert_eq!(decision.country.as_deref(), Some("Япония"));
        assert_eq!(decision.capabilities.iter().collect::<Vec<_>>(), vec![Capability::Legal]);
        assert!(llm.prompts.lock().expect("prompts")[0].contains("summary=; country=None"));
    }

    #[tokio::test]
    async fn empty_user_question_is_filled_with_input() {
        let (router, _) = router(r#"{"needs":"tourism, weather","user_question":""}"#);
        let decision = router.decide("  Что посмотреть в Риме?  ", "").await;

        assert_eq!(decision.user_question, "Что посмотреть в Риме?");
        assert!(decision.wants(Capability::Tourism));
        assert!(decision.wants(Capability::Weather));
    }

    #[tokio::test]
    async fn hopeless_backend_yields_empty_decision_with_question() {
        let (router, _) = router("I am not sure what you mean");
        let decision = router.decide("hmm", "").await;

        assert!(decision.capabilities.is_empty());
        assert_eq!(decision.user_question, "hmm");
    }

    #[test]
    fn null_needs_and_unknown_labels_are_tolerated() {
        let output: RouterOutput =
            parse_instance(r#"{"needs":null,"city":"Oslo"}"#).expect("null needs parse");
        assert!(output.needs.is_empty());

        let output: RouterOutput =
            parse_instance(r#"{"needs":["route","museums"]}"#).expect("list parse");
        let decision = wayfarer_core::RoutingDecision::from(output);
        assert_eq!(decision.capabilities.iter().collect::<Vec<_>>(), vec![Capability::Route]);
    }
}
