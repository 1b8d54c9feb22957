use wayfarer_core::{Capability, PendingInputKind, RoutingDecision};

pub const WEATHER_ADVISORY: &str = "🌦️ Прогноз погоды покажу по кнопке «Погода».";
pub const ROUTE_POINTS_QUESTION: &str =
    "Откуда и куда строим маршрут? Напиши в формате «Откуда -> Куда», например: «Шибуя -> Асакуса».";
pub const DESTINATION_QUESTION: &str =
    "Куда планируешь поездку? Напиши страну и/или город, например: «Япония, Киото».";

/// Where a capability request came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestOrigin {
    /// Free text routed by the intent router.
    Conversation,
    /// An explicit button press.
    UiAction,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    Degrade { reason_code: &'static str, user_message: String, fallback_path: &'static str },
    AskFollowUp { reason_code: &'static str, pending: PendingInputKind, question: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailPolicy {
    pub weather_requires_ui_action: bool,
    pub follow_up_questions_enabled: bool,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self { weather_requires_ui_action: true, follow_up_questions_enabled: true }
    }
}

impl GuardrailPolicy {
    /// Whether the weather provider may run for this turn.
    pub fn evaluate_weather(&self, origin: RequestOrigin) -> GuardrailDecision {
        match origin {
            RequestOrigin::UiAction => GuardrailDecision::Allow,
            RequestOrigin::Conversation if !self.weather_requires_ui_action => {
                GuardrailDecision::Allow
            }
            RequestOrigin::Conversation => GuardrailDecision::Degrade {
                reason_code: "weather_not_requested",
                user_message: WEATHER_ADVISORY.to_owned(),
                fallback_path: "weather_button",
            },
        }
    }

    /// Checks a button press against what the session already knows. A
    /// missing prerequisite becomes a single follow-up question.
    pub fn evaluate_action(
        &self,
        capability: Capability,
        decision: &RoutingDecision,
    ) -> GuardrailDecision {
        if !self.follow_up_questions_enabled {
            return GuardrailDecision::Allow;
        }
        match capability {
            Capability::Route if !decision.has_endpoints() => {
                GuardrailDecision::AskFollowUp {
                    reason_code: "route_points_missing",
                    pending: PendingInputKind::AwaitingRoutePoints,
                    question: ROUTE_POINTS_QUESTION.to_owned(),
                }
            }
            capability if capability.needs_destination() && !decision.has_destination() => {
                GuardrailDecision::AskFollowUp {
                    reason_code: "destination_missing",
                    pending: PendingInputKind::AwaitingDestination,
                    question: DESTINATION_QUESTION.to_owned(),
                }
            }
            _ => GuardrailDecision::Allow,
        }
    }
}
