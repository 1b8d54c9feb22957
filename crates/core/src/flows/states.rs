use serde::{Deserialize, Serialize};

use crate::domain::session::PendingInputKind;

/// Where a session stands between and within turns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    #[default]
    Idle,
    AwaitingInput,
    Dispatching,
    Summarizing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnEvent {
    MessageReceived,
    PendingAnswered,
    PendingAbandoned,
    FollowUpRequested,
    EvidenceCollected,
    SummaryRefreshed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnContext {
    pub pending: PendingInputKind,
}

impl TurnContext {
    pub fn with_pending(pending: PendingInputKind) -> Self {
        Self { pending }
    }
}

/// Work the orchestrator owes after a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnAction {
    RouteIntent,
    ClearPending,
    RefreshSummary,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: TurnPhase,
    pub to: TurnPhase,
    pub event: TurnEvent,
    pub actions: Vec<TurnAction>,
}
