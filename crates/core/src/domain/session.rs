use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::domain::capability::Capability;
use crate::domain::decision::{non_empty, RoutingDecision};
use crate::domain::evidence::{FoodPlace, TourismPlace};
use crate::flows::TurnPhase;
use crate::geo::GeoPoint;

pub const DEFAULT_HISTORY_LIMIT: usize = 12;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingInputKind {
    #[default]
    None,
    AwaitingRoutePoints,
    AwaitingDestination,
}

impl PendingInputKind {
    pub fn is_pending(self) -> bool {
        !matches!(self, Self::None)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub text: String,
}

/// Photo card queued for the transport alongside the text reply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaCard {
    pub image_url: String,
    pub caption: String,
    pub link_label: Option<String>,
    pub link_url: Option<String>,
}

/// Outputs that only live for one turn and are cleared at its start.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnArtifacts {
    pub poi_items: Vec<TourismPlace>,
    pub food_items: Vec<FoodPlace>,
    pub media_queue: Vec<MediaCard>,
    pub last_route_url: Option<String>,
    pub last_origin: Option<GeoPoint>,
    pub last_dest: Option<GeoPoint>,
}

impl TurnArtifacts {
    pub fn is_empty(&self) -> bool {
        self.poi_items.is_empty()
            && self.food_items.is_empty()
            && self.media_queue.is_empty()
            && self.last_route_url.is_none()
            && self.last_origin.is_none()
            && self.last_dest.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub country: Option<String>,
    pub city: Option<String>,
    pub dates: Option<String>,
    pub start_location: Option<String>,
    pub end_location: Option<String>,
    pub pending_capability: Option<Capability>,
    pub pending_input: PendingInputKind,
    pub phase: TurnPhase,
    pub summary: String,
    pub artifacts: TurnArtifacts,
    history: VecDeque<HistoryEntry>,
    history_limit: usize,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl SessionState {
    pub fn new(history_limit: usize) -> Self {
        Self {
            country: None,
            city: None,
            dates: None,
            start_location: None,
            end_location: None,
            pending_capability: None,
            pending_input: PendingInputKind::None,
            phase: TurnPhase::Idle,
            summary: String::new(),
            artifacts: TurnArtifacts::default(),
            history: VecDeque::new(),
            history_limit: history_limit.max(1),
        }
    }

    pub fn begin_turn(&mut self) {
        self.artifacts = TurnArtifacts::default();
    }

    pub fn has_destination(&self) -> bool {
        self.country.is_some() || self.city.is_some()
    }

    /// Fills the decision's missing slots from the session, then stores the
    /// merged values back. A slot only overwrites the session when non-empty.
    pub fn absorb(&mut self, decision: &mut RoutingDecision) {
        merge_slot(&mut decision.country, &mut self.country);
        merge_slot(&mut decision.city, &mut self.city);
        merge_slot(&mut decision.dates, &mut self.dates);
        merge_slot(&mut decision.start_location, &mut self.start_location);
        merge_slot(&mut decision.end_location, &mut self.end_location);
    }

    pub fn set_pending(&mut self, kind: PendingInputKind, capability: Option<Capability>) {
        self.pending_input = kind;
        self.pending_capability = if kind.is_pending() { capability } else { None };
    }

    pub fn clear_pending(&mut self) {
        self.set_pending(PendingInputKind::None, None);
    }

    pub fn push_history(&mut self, role: Role, text: impl Into<String>) {
        let text = text.into();
        if text.trim().is_empty() {
            return;
        }
        self.history.push_back(HistoryEntry { role, text });
        while self.history.len() > self.history_limit {
            self.history.pop_front();
        }
    }

    pub fn history(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Last `window` entries as "role: text" lines, oldest first.
    pub fn recent_transcript(&self, window: usize) -> String {
        let skip = self.history.len().saturating_sub(window);
        self.history
            .iter()
            .skip(skip)
            .map(|entry| format!("{}: {}", entry.role.as_str(), entry.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Replaces the rolling summary. Blank candidates are ignored so a
    /// populated summary never regresses to empty.
    pub fn update_summary(&mut self, candidate: &str) -> bool {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return false;
        }
        self.summary = candidate.to_owned();
        true
    }
}

fn merge_slot(decision_slot: &mut Option<String>, session_slot: &mut Option<String>) {
    match non_empty(decision_slot.take()) {
        Some(value) => {
            *session_slot = Some(value.clone());
            *decision_slot = Some(value);
        }
        None => *decision_slot = session_slot.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::{PendingInputKind, Role, SessionState};
    use crate::domain::capability::Capability;
    use crate::domain::decision::RoutingDecision;

    #[test]
    fn omitted_country_keeps_the_stored_value() {
        let mut session = SessionState { country: Some("Japan".into()), ..SessionState::default() };
        let mut decision =
            RoutingDecision { city: Some("Osaka".into()), ..RoutingDecision::default() };

        session.absorb(&mut decision);

        assert_eq!(decision.country.as_deref(), Some("Japan"));
        assert_eq!(session.city.as_deref(), Some("Osaka"));
    }

    #[test]
    fn blank_router_slot_does_not_erase_session() {
        let mut session = SessionState { dates: Some("May".into()), ..SessionState::default() };
        let mut decision = RoutingDecision { dates: Some("   ".into()), ..RoutingDecision::default() };

        session.absorb(&mut decision);

        assert_eq!(session.dates.as_deref(), Some("May"));
        assert_eq!(decision.dates.as_deref(), Some("May"));
    }

    #[test]
    fn history_is_bounded_and_transcript_uses_window() {
        let mut session = SessionState::new(3);
        for text in ["one", "two", "three", "four"] {
            session.push_history(Role::User, text);
        }
        session.push_history(Role::Assistant, "  ");

        assert_eq!(session.history_len(), 3);
        assert_eq!(session.recent_transcript(2), "user: three\nuser: four");
    }

    #[test]
    fn summary_never_regresses_to_empty() {
        let mut session = SessionState::default();
        assert!(session.update_summary("Trip to Japan in May."));
        assert!(!session.update_summary("   "));
        assert_eq!(session.summary, "Trip to Japan in May.");
    }

    #[test]
    fn clearing_pending_drops_the_capability() {
        let mut session = SessionState::default();
        session.set_pending(PendingInputKind::AwaitingRoutePoints, Some(Capability::Route));
        assert_eq!(session.pending_capability, Some(Capability::Route));

        session.clear_pending();
        assert_eq!(session.pending_input, PendingInputKind::None);
        assert_eq!(session.pending_capability, None);
    }

    #[test]
    fn begin_turn_resets_transient_outputs() {
        let mut session = SessionState::default();
        session.artifacts.last_route_url = Some("https://maps.example".into());
        session.begin_turn();
        assert!(session.artifacts.is_empty());
    }
}
