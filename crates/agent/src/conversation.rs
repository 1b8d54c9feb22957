use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use wayfarer_core::{PendingInputKind, SessionState};

use crate::ports::KnowledgeBase;

static ROUTE_POINTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*([^\n]+?)\s*(?:->|—>|–>|=>|→)\s*([^\n]+?)\s*$").expect("valid regex")
});

const MAX_DESTINATION_ANSWER_CHARS: usize = 80;

/// Short serialization of known slots for the intent router.
pub fn memory_hint(session: &SessionState) -> String {
    format!(
        "summary={}; country={}; city={}; dates={}",
        session.summary,
        session.country.as_deref().unwrap_or(""),
        session.city.as_deref().unwrap_or(""),
        session.dates.as_deref().unwrap_or("")
    )
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutePoints {
    pub start: String,
    pub end: String,
}

/// Finds the first "A -> B" line in `text`.
pub fn parse_route_points(text: &str) -> Option<RoutePoints> {
    let captures = ROUTE_POINTS.captures(text)?;
    let start = captures.get(1)?.as_str().trim();
    let end = captures.get(2)?.as_str().trim();
    if start.is_empty() || end.is_empty() {
        return None;
    }
    Some(RoutePoints { start: start.to_owned(), end: end.to_owned() })
}

/// Slots an "awaiting destination" answer pinned down. The knowledge base
/// spots the country; any other part is taken as the city, known or not.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DestinationAnswer {
    pub country: Option<String>,
    pub city: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PendingAnswer {
    RoutePoints(RoutePoints),
    Destination(DestinationAnswer),
    Unrecognized,
}

/// Reads the next message as the answer to an outstanding question.
pub struct PendingAnswerInterpreter {
    knowledge: Arc<dyn KnowledgeBase>,
}

impl PendingAnswerInterpreter {
    pub fn new(knowledge: Arc<dyn KnowledgeBase>) -> Self {
        Self { knowledge }
    }

    pub fn interpret(&self, pending: PendingInputKind, text: &str) -> PendingAnswer {
        match pending {
            PendingInputKind::None => PendingAnswer::Unrecognized,
            PendingInputKind::AwaitingRoutePoints => {
                parse_route_points(text).map_or(PendingAnswer::Unrecognized, PendingAnswer::RoutePoints)
            }
            PendingInputKind::AwaitingDestination => self
                .destination(text)
                .map_or(PendingAnswer::Unrecognized, PendingAnswer::Destination),
        }
    }

    fn destination(&self, text: &str) -> Option<DestinationAnswer> {
        let text = text.trim();
        if text.is_empty()
            || text.chars().count() > MAX_DESTINATION_ANSWER_CHARS
            || text.contains('?')
            || parse_route_points(text).is_some()
        {
            return None;
        }

        let parts: Vec<&str> =
            text.split(',').map(str::trim).filter(|part| !part.is_empty()).collect();
        if parts.is_empty() || parts.len() > 2 {
            return None;
        }

        let mut answer = DestinationAnswer::default();
        let mut country_key = None;
        for part in &parts {
            if let Some(key) = self.knowledge.resolve_country(part) {
                answer.country = Some((*part).to_owned());
                country_key = Some(key);
            }
        }

        let other = parts.iter().copied().find(|part| answer.country.as_deref() != Some(*part));
        match (country_key, other) {
            (Some(key), Some(city)) => {
                if self.knowledge.resolve_city(&key, city).is_none() {
                    debug!(event_name = "pending.city_unknown", country = %key, city);
                }
                answer.city = Some(city.to_owned());
            }
            (None, Some(_)) if parts.len() == 2 => {
                answer.city = Some(parts[0].to_owned());
                answer.country = Some(parts[1].to_owned());
            }
            (None, Some(city)) => answer.city = Some(city.to_owned()),
            (_, None) => {}
        }
        Some(answer)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use wayfarer_core::{PendingInputKind, SessionState};

    use super::{
        memory_hint, parse_route_points, DestinationAnswer, PendingAnswer,
        PendingAnswerInterpreter, RoutePoints,
    };
    use crate::ports::{EmptyKnowledgeBase, KnowledgeBase};

    struct JapanOnly;

    impl KnowledgeBase for JapanOnly {
        fn resolve_country(&self, text: &str) -> Option<String> {
            matches!(text.to_lowercase().as_str(), "япония" | "japan").then(|| "japan".to_owned())
        }

        fn resolve_city(&self, country_key: &str, text: &str) -> Option<String> {
            (country_key == "japan" && text.to_lowercase() == "киото").then(|| "kyoto".to_owned())
        }

        fn sections(&self, _country_key: &str, _names: &[&str]) -> BTreeMap<String, String> {
            BTreeMap::new()
        }
    }

    #[test]
    fn arrow_variants_are_recognized() {
        let expected =
            Some(RoutePoints { start: "Милан".to_owned(), end: "Венеция".to_owned() });
        assert_eq!(parse_route_points("Милан -> Венеция"), expected);
        assert_eq!(parse_route_points("  Милан → Венеция "), expected);
        assert_eq!(parse_route_points("маршрут:\nМилан=>Венеция"), expected);
        assert_eq!(parse_route_points("Милан и Венеция"), None);
        assert_eq!(parse_route_points(" -> Венеция"), None);
    }

    #[test]
    fn route_points_answer_without_arrow_is_unrecognized() {
        let interpreter = PendingAnswerInterpreter::new(Arc::new(EmptyKnowledgeBase));
        assert_eq!(
            interpreter.interpret(PendingInputKind::AwaitingRoutePoints, "просто расскажи про Рим"),
            PendingAnswer::Unrecognized
        );
        assert!(matches!(
            interpreter.interpret(PendingInputKind::AwaitingRoutePoints, "Шибуя -> Асакуса"),
            PendingAnswer::RoutePoints(_)
        ));
    }

    #[test]
    fn destination_answer_uses_knowledge_base_when_it_knows_the_place() {
        let interpreter = PendingAnswerInterpreter::new(Arc::new(JapanOnly));
        assert_eq!(
            interpreter.interpret(PendingInputKind::AwaitingDestination, "Киото, Япония"),
            PendingAnswer::Destination(DestinationAnswer {
                country: Some("Япония".into()),
                city: Some("Киото".into()),
            })
        );
    }

    #[test]
    fn unknown_destination_falls_back_to_city_country_order() {
        let interpreter = PendingAnswerInterpreter::new(Arc::new(EmptyKnowledgeBase));
        assert_eq!(
            interpreter.interpret(PendingInputKind::AwaitingDestination, "Porto, Portugal"),
            PendingAnswer::Destination(DestinationAnswer {
                country: Some("Portugal".into()),
                city: Some("Porto".into()),
            })
        );
        assert_eq!(
            interpreter.interpret(PendingInputKind::AwaitingDestination, "Lisbon"),
            PendingAnswer::Destination(DestinationAnswer { country: None, city: Some("Lisbon".into()) })
        );
        assert_eq!(
            interpreter.interpret(PendingInputKind::AwaitingDestination, "а какая там погода?"),
            PendingAnswer::Unrecognized
        );
    }

    #[test]
    fn memory_hint_lists_known_slots() {
        let mut session = SessionState::default();
        session.country = Some("Japan".into());
        session.summary = "Trip in May.".into();
        assert_eq!(memory_hint(&session), "summary=Trip in May.; country=Japan; city=; dates=");
    }
}
