use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use wayfarer_agent::{Orchestrator, SessionStore, TurnRequest};

use crate::blocks::{help_message, MessageTemplate};
use crate::commands::{CommandRouteError, SessionCommandService};
use crate::events::{ActionEvent, ConversationService, EventContext, EventHandlerError, TextMessageEvent};
use crate::render::{capability_label, render_turn};

/// Bridges chat events to orchestrator turns. Each turn holds the user's
/// session lock from routing until the reply is rendered.
pub struct TurnService {
    orchestrator: Arc<Orchestrator>,
    sessions: Arc<SessionStore>,
}

impl TurnService {
    pub fn new(orchestrator: Arc<Orchestrator>, sessions: Arc<SessionStore>) -> Self {
        Self { orchestrator, sessions }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    async fn run(&self, user_id: &str, request: TurnRequest) -> Vec<MessageTemplate> {
        let handle = self.sessions.handle(user_id);
        let mut session = handle.lock().await;
        let outcome = self.orchestrator.handle_turn(&mut session, request).await;
        render_turn(&outcome, &session.artifacts)
    }
}

#[async_trait]
impl ConversationService for TurnService {
    async fn handle_text(
        &self,
        event: &TextMessageEvent,
        ctx: &EventContext,
    ) -> Result<Vec<MessageTemplate>, EventHandlerError> {
        info!(
            event_name = "conversation.text",
            correlation_id = %ctx.correlation_id,
            user_id = %event.user_id,
        );
        Ok(self.run(&event.user_id, TurnRequest::text(event.text.clone())).await)
    }

    async fn handle_action(
        &self,
        event: &ActionEvent,
        ctx: &EventContext,
    ) -> Result<Vec<MessageTemplate>, EventHandlerError> {
        let Some(capability) = event.capability() else {
            info!(
                event_name = "conversation.unknown_action",
                correlation_id = %ctx.correlation_id,
                action_id = %event.action_id,
            );
            return Ok(vec![help_message()]);
        };
        info!(
            event_name = "conversation.action",
            correlation_id = %ctx.correlation_id,
            user_id = %event.user_id,
            capability = %capability,
        );
        let request = TurnRequest::action(capability, capability_label(capability));
        Ok(self.run(&event.user_id, request).await)
    }
}

#[async_trait]
impl SessionCommandService for TurnService {
    async fn reset_session(&self, user_id: &str) -> Result<bool, CommandRouteError> {
        Ok(self.sessions.reset(user_id))
    }
}
