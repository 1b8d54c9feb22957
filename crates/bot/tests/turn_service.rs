use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use wayfarer_agent::guardrails::ROUTE_POINTS_QUESTION;
use wayfarer_agent::ports::{
    EmptyKnowledgeBase, Geocoder, LegalProvider, LegalQuery, NoopEncyclopedia, NoopRetriever,
    RouteProvider, TourismProvider, TourismQuery, WeatherProvider,
};
use wayfarer_agent::{
    Collaborators, CompletionRequest, LlmClient, Orchestrator, OrchestratorSettings, SessionStore,
};
use wayfarer_bot::blocks::MessageTemplate;
use wayfarer_bot::commands::{CommandPayload, RESET_TEXT};
use wayfarer_bot::events::{
    ActionEvent, EventContext, HandlerResult, TextMessageEvent, UpdateEnvelope, UpdateEvent,
    CAPABILITY_ACTION_ID,
};
use wayfarer_bot::{conversation_dispatcher, TurnService};
use wayfarer_core::{
    Coordinates, EvidenceError, LegalResult, RouteResult, TourismResult, WeatherResult,
};

struct ScriptedLlm;

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let system = &request.messages[0].content;
        if system.contains("модуль памяти") {
            return Ok("Пользователь спрашивает про визу в Японию.".to_owned());
        }
        if system.contains("диспетчер") {
            let user = request.messages.last().map(|m| m.content.as_str()).unwrap_or_default();
            if user.contains("виза") {
                return Ok(r#"{"country":"Япония","needs":["legal"],"user_question":"Нужна ли виза в Японию?"}"#.to_owned());
            }
            return Ok("{}".to_owned());
        }
        Err(anyhow!("unexpected prompt"))
    }
}

struct NoTourism;

#[async_trait]
impl TourismProvider for NoTourism {
    async fn tourism(&self, _query: &TourismQuery) -> Result<TourismResult, EvidenceError> {
        Err(EvidenceError::Unavailable("not scripted".into()))
    }
}

struct JapanLegal;

#[async_trait]
impl LegalProvider for JapanLegal {
    async fn legal(&self, _query: &LegalQuery) -> Result<LegalResult, EvidenceError> {
        Ok(LegalResult {
            visa_required: Some(true),
            visa: vec!["Оформляется через консульство".into()],
            sources: vec!["JP__japan__ru.md".into()],
            ..LegalResult::default()
        })
    }
}

struct Unreachable;

#[async_trait]
impl WeatherProvider for Unreachable {
    async fn forecast(
        &self,
        _country: Option<&str>,
        _city: Option<&str>,
    ) -> Result<WeatherResult, EvidenceError> {
        Err(EvidenceError::Unavailable("offline".into()))
    }
}

#[async_trait]
impl RouteProvider for Unreachable {
    async fn route(&self, _start: &str, _end: &str) -> Result<RouteResult, EvidenceError> {
        Err(EvidenceError::Unavailable("offline".into()))
    }
}

#[async_trait]
impl Geocoder for Unreachable {
    async fn geocode(&self, query: &str) -> Result<Coordinates, EvidenceError> {
        Err(EvidenceError::NotFound(query.to_owned()))
    }
}

fn service() -> Arc<TurnService> {
    let collaborators = Collaborators {
        llm: Arc::new(ScriptedLlm),
        weather: Arc::new(Unreachable),
        route: Arc::new(Unreachable),
        geocoder: Arc::new(Unreachable),
        encyclopedia: Arc::new(NoopEncyclopedia),
        knowledge: Arc::new(EmptyKnowledgeBase),
        retriever: Arc::new(NoopRetriever),
    };
    let orchestrator = Orchestrator::new(collaborators, OrchestratorSettings::default())
        .with_evidence_agents(Arc::new(NoTourism), Arc::new(JapanLegal));
    Arc::new(TurnService::new(Arc::new(orchestrator), Arc::new(SessionStore::new(12))))
}

fn text(user_id: &str, text: &str) -> UpdateEnvelope {
    UpdateEnvelope {
        update_id: "100".to_owned(),
        event: UpdateEvent::TextMessage(TextMessageEvent {
            chat_id: format!("chat-{user_id}"),
            user_id: user_id.to_owned(),
            text: text.to_owned(),
        }),
    }
}

fn responded(result: HandlerResult) -> Vec<MessageTemplate> {
    match result {
        HandlerResult::Responded(messages) => messages,
        other => panic!("expected a reply, got {other:?}"),
    }
}

#[tokio::test]
async fn visa_question_is_answered_with_legal_section_and_buttons() {
    let service = service();
    let dispatcher = conversation_dispatcher(service.clone());
    let ctx = EventContext::default();

    let messages = responded(
        dispatcher.dispatch(&text("u-1", "Нужна ли виза в Японию?"), &ctx).await.expect("dispatch"),
    );

    assert_eq!(messages.len(), 1);
    let body = messages[0].html_body();
    assert!(body.contains("⚖️ Визы и законы"));
    assert!(body.contains("Виза: <b>требуется</b>"));
    let rows = messages[0].button_rows();
    assert_eq!(rows.len(), 2, "two rows of capability buttons, no route link");
    assert!(rows.iter().flat_map(|row| row.iter()).all(|b| b.action_id == CAPABILITY_ACTION_ID));
    assert_eq!(service.sessions().len(), 1);
}

#[tokio::test]
async fn route_button_without_points_asks_for_them() {
    let service = service();
    let dispatcher = conversation_dispatcher(service);
    let press = UpdateEnvelope {
        update_id: "101".to_owned(),
        event: UpdateEvent::Action(ActionEvent {
            chat_id: "chat-u-2".to_owned(),
            user_id: "u-2".to_owned(),
            action_id: CAPABILITY_ACTION_ID.to_owned(),
            value: Some("route".to_owned()),
        }),
    };

    let messages =
        responded(dispatcher.dispatch(&press, &EventContext::default()).await.expect("dispatch"));
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].fallback_text, ROUTE_POINTS_QUESTION);
    assert!(messages[0].button_rows().is_empty());
}

#[tokio::test]
async fn reset_command_drops_the_session() {
    let service = service();
    let dispatcher = conversation_dispatcher(service.clone());
    let ctx = EventContext::default();
    dispatcher.dispatch(&text("u-3", "Нужна ли виза в Японию?"), &ctx).await.expect("dispatch");
    assert_eq!(service.sessions().len(), 1);

    let reset = UpdateEnvelope {
        update_id: "102".to_owned(),
        event: UpdateEvent::Command(CommandPayload {
            chat_id: "chat-u-3".to_owned(),
            user_id: "u-3".to_owned(),
            command: "/reset".to_owned(),
            args: String::new(),
        }),
    };
    let messages = responded(dispatcher.dispatch(&reset, &ctx).await.expect("reset"));
    assert_eq!(messages[0].fallback_text, RESET_TEXT);
    assert!(service.sessions().is_empty());
}

#[tokio::test]
async fn unknown_button_gets_help() {
    let dispatcher = conversation_dispatcher(service());
    let press = UpdateEnvelope {
        update_id: "103".to_owned(),
        event: UpdateEvent::Action(ActionEvent {
            chat_id: "c".to_owned(),
            user_id: "u-4".to_owned(),
            action_id: "something.v9".to_owned(),
            value: None,
        }),
    };
    let messages =
        responded(dispatcher.dispatch(&press, &EventContext::default()).await.expect("dispatch"));
    assert!(messages[0].html_body().contains("/reset"));
}
