//! The per-turn orchestrator: pending answers, intent routing, slot merge,
//! gated evidence dispatch, point-of-interest routing and summary refresh.

use std::sync::Arc;

use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use wayfarer_core::flows::{TurnAction, TurnContext, TurnEvent};
use wayfarer_core::{
    ApplicationError, Capability, CapabilitySet, DomainError, Evidence, EvidenceBundle,
    EvidenceError, PendingInputKind, RouteResult, RoutingDecision, Role, SessionState, TurnFlow,
    TurnPhase,
};

use crate::conversation::{memory_hint, PendingAnswer, PendingAnswerInterpreter};
use crate::enrichment::TourismEnricher;
use crate::guardrails::{
    GuardrailDecision, GuardrailPolicy, RequestOrigin, DESTINATION_QUESTION, ROUTE_POINTS_QUESTION,
};
use crate::legal::LegalAgent;
use crate::llm::LlmClient;
use crate::poi::PoiRouteBuilder;
use crate::ports::{
    Encyclopedia, Geocoder, KnowledgeBase, LegalProvider, LegalQuery, Retriever, RouteProvider,
    TourismProvider, TourismQuery, WeatherProvider,
};
use crate::router::IntentRouter;
use crate::summary::Summarizer;
use crate::tourism::{TouristAgent, FALLBACK_TITLE};

const DEFAULT_ROUTE_END: &str = "центр города";

/// One inbound message: free text, optionally tagged with the capability
/// button the user pressed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TurnRequest {
    pub text: String,
    pub action: Option<Capability>,
}

impl TurnRequest {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), action: None }
    }

    pub fn action(capability: Capability, text: impl Into<String>) -> Self {
        Self { text: text.into(), action: Some(capability) }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TurnOutcome {
    Bundle(EvidenceBundle),
    /// A single follow-up question; the session now awaits its answer.
    Question(String),
}

/// Externally constructed collaborators the orchestrator owns.
#[derive(Clone)]
pub struct Collaborators {
    pub llm: Arc<dyn LlmClient>,
    pub weather: Arc<dyn WeatherProvider>,
    pub route: Arc<dyn RouteProvider>,
    pub geocoder: Arc<dyn Geocoder>,
    pub encyclopedia: Arc<dyn Encyclopedia>,
    pub knowledge: Arc<dyn KnowledgeBase>,
    pub retriever: Arc<dyn Retriever>,
}

#[derive(Clone, Debug)]
pub struct OrchestratorSettings {
    pub max_retries: u32,
    pub summary_window: usize,
    pub guardrails: GuardrailPolicy,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self { max_retries: 2, summary_window: 6, guardrails: GuardrailPolicy::default() }
    }
}

pub struct Orchestrator {
    router: IntentRouter,
    summarizer: Summarizer,
    tourism: Arc<dyn TourismProvider>,
    legal: Arc<dyn LegalProvider>,
    weather: Arc<dyn WeatherProvider>,
    route: Arc<dyn RouteProvider>,
    poi: PoiRouteBuilder,
    enricher: TourismEnricher,
    interpreter: PendingAnswerInterpreter,
    guardrails: GuardrailPolicy,
    flow: TurnFlow,
    summary_window: usize,
}

/// What the pending-answer step pinned down before routing.
#[derive(Default)]
struct Overrides {
    capabilities: Option<CapabilitySet>,
    explicit: Option<Capability>,
    country: Option<String>,
    city: Option<String>,
    start: Option<String>,
    end: Option<String>,
}

struct FollowUp {
    pending: PendingInputKind,
    capability: Capability,
    question: String,
}

impl Orchestrator {
    pub fn new(collaborators: Collaborators, settings: OrchestratorSettings) -> Self {
        let llm = collaborators.llm;
        Self {
            router: IntentRouter::new(llm.clone(), settings.max_retries),
            summarizer: Summarizer::new(llm.clone()),
            tourism: Arc::new(TouristAgent::new(llm.clone(), settings.max_retries)),
            legal: Arc::new(LegalAgent::new(
                llm,
                collaborators.retriever,
                settings.max_retries,
            )),
            weather: collaborators.weather,
            route: collaborators.route,
            poi: PoiRouteBuilder::new(collaborators.geocoder),
            enricher: TourismEnricher::new(collaborators.encyclopedia),
            interpreter: PendingAnswerInterpreter::new(collaborators.knowledge),
            guardrails: settings.guardrails,
            flow: TurnFlow,
            summary_window: settings.summary_window,
        }
    }

    /// Swaps the text-generation evidence agents, e.g. for scripted ones.
    pub fn with_evidence_agents(
        mut self,
        tourism: Arc<dyn TourismProvider>,
        legal: Arc<dyn LegalProvider>,
    ) -> Self {
        self.tourism = tourism;
        self.legal = legal;
        self
    }

    /// Runs one turn against the caller's session. Never fails: every
    /// collaborator error degrades to missing evidence for that capability.
    pub async fn handle_turn(&self, session: &mut SessionState, request: TurnRequest) -> TurnOutcome {
        let turn_id = Uuid::new_v4();
        let span = info_span!("turn", %turn_id, action = ?request.action);
        self.run_turn(session, request).instrument(span).await
    }

    async fn run_turn(&self, session: &mut SessionState, request: TurnRequest) -> TurnOutcome {
        let text = request.text.trim().to_owned();
        info!(
            event_name = "turn.started",
            pending = ?session.pending_input,
            chars = text.chars().count(),
            "turn started"
        );

        session.begin_turn();
        session.phase = self.flow.entry_phase(session.pending_input);
        session.push_history(Role::User, text.clone());

        let (overrides, actions) = self.resolve_pending(session, &request, &text);

        let mut decision = if actions.contains(&TurnAction::RouteIntent) {
            let hint = memory_hint(session);
            self.router.decide(&text, &hint).await
        } else {
            debug!(event_name = "turn.router_skipped", "answer to the pending question");
            RoutingDecision { user_question: text.clone(), ..RoutingDecision::default() }
        };
        apply_overrides(&mut decision, &overrides);
        session.absorb(&mut decision);

        if decision.capabilities.is_empty() {
            decision.capabilities.insert(Capability::Tourism);
        }

        if let Some(follow_up) = self.follow_up(&decision, overrides.explicit) {
            return self.ask(session, follow_up);
        }

        let bundle = self.dispatch(session, &decision, overrides.explicit).await;
        let actions = self.advance(session, TurnEvent::EvidenceCollected);

        session.push_history(
            Role::Assistant,
            format!("{} [{}]", bundle.destination_title, bundle.capabilities()),
        );
        if actions.contains(&TurnAction::RefreshSummary) {
            self.refresh_summary(session).await;
        }
        self.advance(session, TurnEvent::SummaryRefreshed);

        info!(
            event_name = "turn.completed",
            capabilities = %bundle.capabilities(),
            advisory = bundle.advisory.is_some(),
            pending = ?session.pending_input,
            "turn completed"
        );
        TurnOutcome::Bundle(bundle)
    }

    /// Reads the message as an answer to the outstanding question, if any.
    /// A recognized answer is not routed again; one in an unexpected shape
    /// clears the question and the message is treated as a fresh request.
    fn resolve_pending(
        &self,
        session: &mut SessionState,
        request: &TurnRequest,
        text: &str,
    ) -> (Overrides, Vec<TurnAction>) {
        let mut overrides = Overrides {
            capabilities: request.action.map(CapabilitySet::only),
            explicit: request.action,
            ..Overrides::default()
        };

        if session.phase != TurnPhase::AwaitingInput {
            let actions = self.advance(session, TurnEvent::MessageReceived);
            return (overrides, actions);
        }

        let answer = match request.action {
            Some(_) => PendingAnswer::Unrecognized,
            None => self.interpreter.interpret(session.pending_input, text),
        };
        let asked_for = session.pending_capability;

        let event = match answer {
            PendingAnswer::RoutePoints(points) => {
                let capability = asked_for.unwrap_or(Capability::Route);
                overrides.capabilities = Some(CapabilitySet::only(capability));
                overrides.explicit = Some(capability);
                overrides.start = Some(points.start);
                overrides.end = Some(points.end);
                TurnEvent::PendingAnswered
            }
            PendingAnswer::Destination(destination) => {
                if let Some(capability) = asked_for {
                    overrides.capabilities = Some(CapabilitySet::only(capability));
                    overrides.explicit = Some(capability);
                }
                overrides.country = destination.country;
                overrides.city = destination.city;
                TurnEvent::PendingAnswered
            }
            PendingAnswer::Unrecognized => {
                info!(event_name = "turn.pending_abandoned", pending = ?session.pending_input);
                TurnEvent::PendingAbandoned
            }
        };

        let actions = self.advance(session, event);
        if actions.contains(&TurnAction::ClearPending) {
            session.clear_pending();
        }
        (overrides, actions)
    }

    /// A missing prerequisite for this turn, phrased as one question.
    fn follow_up(
        &self,
        decision: &RoutingDecision,
        explicit: Option<Capability>,
    ) -> Option<FollowUp> {
        if let Some(capability) = explicit {
            if let GuardrailDecision::AskFollowUp { reason_code, pending, question } =
                self.guardrails.evaluate_action(capability, decision)
            {
                info!(event_name = "turn.follow_up", reason_code, capability = %capability);
                return Some(FollowUp { pending, capability, question });
            }
            return None;
        }

        let only_tourism = decision.capabilities == CapabilitySet::only(Capability::Tourism);
        if only_tourism && !decision.has_destination() && self.guardrails.follow_up_questions_enabled
        {
            info!(event_name = "turn.follow_up", reason_code = "destination_missing");
            return Some(FollowUp {
                pending: PendingInputKind::AwaitingDestination,
                capability: Capability::Tourism,
                question: DESTINATION_QUESTION.to_owned(),
            });
        }
        None
    }

    fn ask(&self, session: &mut SessionState, follow_up: FollowUp) -> TurnOutcome {
        session.set_pending(follow_up.pending, Some(follow_up.capability));
        self.advance(session, TurnEvent::FollowUpRequested);
        session.push_history(Role::Assistant, follow_up.question.clone());
        TurnOutcome::Question(follow_up.question)
    }

    async fn dispatch(
        &self,
        session: &mut SessionState,
        decision: &RoutingDecision,
        explicit: Option<Capability>,
    ) -> EvidenceBundle {
        let destination = decision.destination();
        let title = destination.as_deref().unwrap_or(FALLBACK_TITLE);
        let mut bundle = EvidenceBundle::new(format!("✈️ {title}"));
        let country = decision.country.as_deref();
        let city = decision.city.as_deref();
        let question = if decision.user_question.is_empty() {
            session.history().last().map(|entry| entry.text.clone()).unwrap_or_default()
        } else {
            decision.user_question.clone()
        };

        if decision.wants(Capability::Tourism) {
            let query = TourismQuery {
                country: decision.country.clone(),
                city: decision.city.clone(),
                dates: decision.dates.clone(),
                question: question.clone(),
                summary: session.summary.clone(),
            };
            if let Some(mut tourism) = settle(Capability::Tourism, self.tourism.tourism(&query).await) {
                self.enricher.enrich(&mut tourism, city, country, &mut session.artifacts).await;
                bundle.insert(Evidence::Tourism(tourism));
            }
        }

        if decision.wants(Capability::Legal) {
            let query = LegalQuery {
                country: decision.country.clone(),
                city: decision.city.clone(),
                question: question.clone(),
            };
            if let Some(legal) = settle(Capability::Legal, self.legal.legal(&query).await) {
                bundle.insert(Evidence::Legal(legal));
            }
        }

        let weather_allowed = decision.wants(Capability::Weather) && {
            let origin = if explicit == Some(Capability::Weather) {
                RequestOrigin::UiAction
            } else {
                RequestOrigin::Conversation
            };
            match self.guardrails.evaluate_weather(origin) {
                GuardrailDecision::Allow => true,
                GuardrailDecision::Degrade { reason_code, user_message, .. } => {
                    debug!(event_name = "dispatch.weather_withheld", reason_code);
                    bundle.advisory = Some(user_message);
                    false
                }
                GuardrailDecision::AskFollowUp { .. } => false,
            }
        };

        let wants_route = decision.wants(Capability::Route);
        let poi_mode = wants_route && !decision.has_endpoints();
        let start = decision.start_location.clone().unwrap_or_else(|| {
            [city, country].into_iter().flatten().collect::<Vec<_>>().join(" ")
        });
        let end = decision.end_location.clone().unwrap_or_else(|| DEFAULT_ROUTE_END.to_owned());

        let weather_task = async {
            if weather_allowed {
                settle(Capability::Weather, self.weather.forecast(country, city).await)
            } else {
                None
            }
        };
        let route_task = async {
            if wants_route && !poi_mode {
                settle(Capability::Route, self.route.route(&start, &end).await)
            } else {
                None
            }
        };
        let (weather, route) = tokio::join!(weather_task, route_task);

        if let Some(weather) = weather {
            bundle.insert(Evidence::Weather(weather));
        }
        if let Some(route) = route {
            bundle.insert(Evidence::Route(route));
        }

        if poi_mode {
            self.walk_highlights(session, decision, &mut bundle).await;
        }

        session.artifacts.last_route_url =
            bundle.route.as_ref().and_then(|route| route.maps_url.clone());
        bundle
    }

    async fn walk_highlights(
        &self,
        session: &mut SessionState,
        decision: &RoutingDecision,
        bundle: &mut EvidenceBundle,
    ) {
        let tourism = bundle.tourism.as_ref().filter(|tourism| !tourism.highlights.is_empty());
        let Some(tourism) = tourism else {
            info!(event_name = "dispatch.route_points_missing", "no endpoints and no highlights");
            bundle.insert(Evidence::Route(RouteResult::note("", "", ROUTE_POINTS_QUESTION)));
            session.set_pending(PendingInputKind::AwaitingRoutePoints, Some(Capability::Route));
            return;
        };

        let poi = self.poi.build(tourism, decision.city.as_deref(), decision.country.as_deref()).await;
        session.artifacts.last_origin = poi.origin;
        session.artifacts.last_dest = poi.destination;
        bundle.insert(Evidence::Route(poi.result));
    }

    async fn refresh_summary(&self, session: &mut SessionState) {
        let recent = session.recent_transcript(self.summary_window);
        match self.summarizer.refresh(&session.summary, &recent).await {
            Ok(candidate) => {
                if !session.update_summary(&candidate) {
                    debug!(event_name = "summary.unchanged", "blank summary ignored");
                }
            }
            Err(error) => {
                warn!(event_name = "summary.refresh_failed", error = %error, "keeping old summary");
            }
        }
    }

    /// Moves the session's phase and returns the work the transition owes.
    /// A rejected transition resets the phase; the turn then routes afresh
    /// and drops any pending question.
    fn advance(&self, session: &mut SessionState, event: TurnEvent) -> Vec<TurnAction> {
        let context = TurnContext::with_pending(session.pending_input);
        match self.flow.apply(session.phase, event, &context) {
            Ok(outcome) => {
                debug!(
                    event_name = "turn.transition",
                    from = ?outcome.from,
                    to = ?outcome.to,
                    actions = ?outcome.actions
                );
                session.phase = outcome.to;
                outcome.actions
            }
            Err(error) => {
                let error = ApplicationError::from(DomainError::from(error));
                warn!(event_name = "turn.flow_violation", error = %error, "resetting turn phase");
                session.phase = TurnPhase::Idle;
                vec![TurnAction::ClearPending, TurnAction::RouteIntent, TurnAction::RefreshSummary]
            }
        }
    }
}

fn apply_overrides(decision: &mut RoutingDecision, overrides: &Overrides) {
    if let Some(capabilities) = &overrides.capabilities {
        decision.capabilities = capabilities.clone();
    }
    for (slot, value) in [
        (&mut decision.country, &overrides.country),
        (&mut decision.city, &overrides.city),
        (&mut decision.start_location, &overrides.start),
        (&mut decision.end_location, &overrides.end),
    ] {
        if value.is_some() {
            slot.clone_from(value);
        }
    }
}

/// Turns a collaborator result into optional evidence, logging the failure.
fn settle<T>(capability: Capability, result: Result<T, EvidenceError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(
                event_name = "dispatch.provider_failed",
                capability = %capability,
                kind = error.kind(),
                error = %error,
                "evidence unavailable"
            );
            None
        }
    }
}
