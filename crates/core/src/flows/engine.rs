use thiserror::Error;

use crate::domain::session::PendingInputKind;
use crate::flows::states::{TransitionOutcome, TurnAction, TurnContext, TurnEvent, TurnPhase};

/// Per-turn state machine driven by the orchestrator.
#[derive(Clone, Copy, Debug, Default)]
pub struct TurnFlow;

impl TurnFlow {
    /// Phase a session enters a turn from, derived from its pending question.
    pub fn entry_phase(&self, pending: PendingInputKind) -> TurnPhase {
        if pending.is_pending() {
            TurnPhase::AwaitingInput
        } else {
            TurnPhase::Idle
        }
    }

    pub fn apply(
        &self,
        current: TurnPhase,
        event: TurnEvent,
        context: &TurnContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition(current, event, context)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("follow-up requested from {phase:?} without a pending question")]
    MissingPendingQuestion { phase: TurnPhase },
    #[error("invalid transition from {phase:?} using event {event:?}")]
    InvalidTransition { phase: TurnPhase, event: TurnEvent },
}

fn transition(
    current: TurnPhase,
    event: TurnEvent,
    context: &TurnContext,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use TurnAction::{ClearPending, RefreshSummary, RouteIntent};
    use TurnEvent::{
        EvidenceCollected, FollowUpRequested, MessageReceived, PendingAbandoned, PendingAnswered,
        SummaryRefreshed,
    };
    use TurnPhase::{AwaitingInput, Dispatching, Idle, Summarizing};

    // A recognized answer pins the request, so only an abandoned one is routed.
    let (to, actions) = match (current, event) {
        (Idle, MessageReceived) => (Dispatching, vec![RouteIntent]),
        (AwaitingInput, PendingAnswered) => (Dispatching, vec![ClearPending]),
        (AwaitingInput, PendingAbandoned) => (Dispatching, vec![ClearPending, RouteIntent]),
        (Idle | AwaitingInput | Dispatching, FollowUpRequested) => {
            if !context.pending.is_pending() {
                return Err(FlowTransitionError::MissingPendingQuestion { phase: current });
            }
            (AwaitingInput, Vec::new())
        }
        (Dispatching, EvidenceCollected) => (Summarizing, vec![RefreshSummary]),
        (Summarizing, SummaryRefreshed) if context.pending.is_pending() => {
            (AwaitingInput, Vec::new())
        }
        (Summarizing, SummaryRefreshed) => (Idle, Vec::new()),
        _ => return Err(FlowTransitionError::InvalidTransition { phase: current, event }),
    };

    Ok(TransitionOutcome { from: current, to, event, actions })
}

#[cfg(test)]
mod tests {
    use crate::domain::session::PendingInputKind;
    use crate::flows::engine::{FlowTransitionError, TurnFlow};
    use crate::flows::states::{TurnAction, TurnContext, TurnEvent, TurnPhase};

    #[test]
    fn plain_message_walks_through_routing_dispatch_and_summary() {
        let flow = TurnFlow;
        let context = TurnContext::default();

        let dispatching =
            flow.apply(TurnPhase::default(), TurnEvent::MessageReceived, &context).expect("idle");
        assert_eq!(dispatching.to, TurnPhase::Dispatching);
        assert_eq!(dispatching.actions, vec![TurnAction::RouteIntent]);

        let summarizing = flow
            .apply(dispatching.to, TurnEvent::EvidenceCollected, &context)
            .expect("dispatching");
        assert_eq!(summarizing.actions, vec![TurnAction::RefreshSummary]);

        let done = flow
            .apply(summarizing.to, TurnEvent::SummaryRefreshed, &context)
            .expect("summarizing");
        assert_eq!(done.to, TurnPhase::Idle);
        assert!(done.actions.is_empty());
    }

    #[test]
    fn answered_question_skips_routing_and_abandoned_one_routes() {
        let flow = TurnFlow;
        let context = TurnContext::with_pending(PendingInputKind::AwaitingRoutePoints);
        let phase = flow.entry_phase(PendingInputKind::AwaitingRoutePoints);
        assert_eq!(phase, TurnPhase::AwaitingInput);

        let answered = flow.apply(phase, TurnEvent::PendingAnswered, &context).expect("answer");
        assert_eq!(answered.to, TurnPhase::Dispatching);
        assert_eq!(answered.actions, vec![TurnAction::ClearPending]);

        let abandoned =
            flow.apply(phase, TurnEvent::PendingAbandoned, &context).expect("abandon");
        assert_eq!(abandoned.actions, vec![TurnAction::ClearPending, TurnAction::RouteIntent]);
    }

    #[test]
    fn summary_with_open_question_parks_in_awaiting_input() {
        let flow = TurnFlow;
        let context = TurnContext::with_pending(PendingInputKind::AwaitingRoutePoints);
        let outcome = flow
            .apply(TurnPhase::Summarizing, TurnEvent::SummaryRefreshed, &context)
            .expect("summarizing");
        assert_eq!(outcome.to, TurnPhase::AwaitingInput);
    }

    #[test]
    fn dispatch_can_stop_to_ask_a_question() {
        let flow = TurnFlow;
        let context = TurnContext::with_pending(PendingInputKind::AwaitingDestination);
        let outcome = flow
            .apply(TurnPhase::Dispatching, TurnEvent::FollowUpRequested, &context)
            .expect("dispatching");
        assert_eq!(outcome.to, TurnPhase::AwaitingInput);
    }

    #[test]
    fn follow_up_requires_a_pending_question() {
        let flow = TurnFlow;
        let error = flow
            .apply(TurnPhase::Idle, TurnEvent::FollowUpRequested, &TurnContext::default())
            .expect_err("no pending question");
        assert_eq!(error, FlowTransitionError::MissingPendingQuestion { phase: TurnPhase::Idle });
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let flow = TurnFlow;
        let error = flow
            .apply(TurnPhase::Idle, TurnEvent::EvidenceCollected, &TurnContext::default())
            .expect_err("idle cannot collect evidence");
        assert!(matches!(
            error,
            FlowTransitionError::InvalidTransition {
                phase: TurnPhase::Idle,
                event: TurnEvent::EvidenceCollected
            }
        ));
    }
}
