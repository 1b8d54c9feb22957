use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use wayfarer_core::{ApplicationError, Capability};

use crate::{
    blocks::MessageTemplate,
    commands::{
        CommandParseError, CommandPayload, CommandRouteError, CommandRouter,
        NoopSessionCommandService, SessionCommandService,
    },
};

/// Action id of the capability buttons; the value names the capability.
pub const CAPABILITY_ACTION_ID: &str = "capability.v1";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateEnvelope {
    pub update_id: String,
    pub event: UpdateEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateEvent {
    Command(CommandPayload),
    TextMessage(TextMessageEvent),
    Action(ActionEvent),
    Unsupported { event_type: String },
}

impl UpdateEvent {
    pub fn event_type(&self) -> UpdateEventType {
        match self {
            Self::Command(_) => UpdateEventType::Command,
            Self::TextMessage(_) => UpdateEventType::TextMessage,
            Self::Action(_) => UpdateEventType::Action,
            Self::Unsupported { .. } => UpdateEventType::Unsupported,
        }
    }

    /// Where replies go; `None` for updates that cannot be answered.
    pub fn chat_id(&self) -> Option<&str> {
        match self {
            Self::Command(payload) => Some(&payload.chat_id),
            Self::TextMessage(event) => Some(&event.chat_id),
            Self::Action(event) => Some(&event.chat_id),
            Self::Unsupported { .. } => None,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::Command(payload) => Some(&payload.user_id),
            Self::TextMessage(event) => Some(&event.user_id),
            Self::Action(event) => Some(&event.user_id),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum UpdateEventType {
    Command,
    TextMessage,
    Action,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextMessageEvent {
    pub chat_id: String,
    pub user_id: String,
    pub text: String,
}

/// A button press.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionEvent {
    pub chat_id: String,
    pub user_id: String,
    pub action_id: String,
    pub value: Option<String>,
}

impl ActionEvent {
    pub fn capability(&self) -> Option<Capability> {
        if self.action_id != CAPABILITY_ACTION_ID {
            return None;
        }
        self.value.as_deref()?.parse().ok()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(Vec<MessageTemplate>),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Parse(#[from] CommandParseError),
    #[error(transparent)]
    Route(#[from] CommandRouteError),
    #[error("conversation handler failure: {0}")]
    Conversation(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

impl From<DispatchError> for ApplicationError {
    fn from(error: DispatchError) -> Self {
        let DispatchError::Handler(error) = error;
        match error {
            EventHandlerError::Parse(error) => Self::InvalidInput(error.to_string()),
            EventHandlerError::Route(error) => Self::Integration(error.to_string()),
            EventHandlerError::Conversation(message) => Self::Integration(message),
        }
    }
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> UpdateEventType;
    async fn handle(
        &self,
        envelope: &UpdateEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<UpdateEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &UpdateEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Turns free text and button presses into replies.
#[async_trait]
pub trait ConversationService: Send + Sync {
    async fn handle_text(
        &self,
        event: &TextMessageEvent,
        ctx: &EventContext,
    ) -> Result<Vec<MessageTemplate>, EventHandlerError>;

    async fn handle_action(
        &self,
        event: &ActionEvent,
        ctx: &EventContext,
    ) -> Result<Vec<MessageTemplate>, EventHandlerError>;
}

/// Registers the command, text and action handlers over one service.
pub fn conversation_dispatcher<S>(service: Arc<S>) -> EventDispatcher
where
    S: ConversationService + SessionCommandService + 'static,
{
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(CommandHandler::new(SharedService(service.clone())));
    dispatcher.register(TextMessageHandler::new(service.clone()));
    dispatcher.register(ActionHandler::new(service));
    dispatcher
}

/// Commands only; text and actions are ignored.
pub fn default_dispatcher() -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(CommandHandler::new(NoopSessionCommandService));
    dispatcher
}

struct SharedService<S>(Arc<S>);

#[async_trait]
impl<S> SessionCommandService for SharedService<S>
where
    S: SessionCommandService,
{
    async fn reset_session(&self, user_id: &str) -> Result<bool, CommandRouteError> {
        self.0.reset_session(user_id).await
    }
}

pub struct CommandHandler<S> {
    router: CommandRouter<S>,
}

impl<S> CommandHandler<S>
where
    S: SessionCommandService,
{
    pub fn new(service: S) -> Self {
        Self { router: CommandRouter::new(service) }
    }
}

#[async_trait]
impl<S> EventHandler for CommandHandler<S>
where
    S: SessionCommandService + 'static,
{
    fn event_type(&self) -> UpdateEventType {
        UpdateEventType::Command
    }

    async fn handle(
        &self,
        envelope: &UpdateEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let UpdateEvent::Command(payload) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let message = self.router.route(payload).await?;
        Ok(HandlerResult::Responded(vec![message]))
    }
}

pub struct TextMessageHandler<S: ?Sized> {
    service: Arc<S>,
}

impl<S> TextMessageHandler<S>
where
    S: ConversationService + ?Sized,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for TextMessageHandler<S>
where
    S: ConversationService + ?Sized + 'static,
{
    fn event_type(&self) -> UpdateEventType {
        UpdateEventType::TextMessage
    }

    async fn handle(
        &self,
        envelope: &UpdateEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let UpdateEvent::TextMessage(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if event.text.trim().is_empty() {
            return Ok(HandlerResult::Ignored);
        }

        let messages = self.service.handle_text(event, ctx).await?;
        Ok(if messages.is_empty() {
            HandlerResult::Processed
        } else {
            HandlerResult::Responded(messages)
        })
    }
}

pub struct ActionHandler<S: ?Sized> {
    service: Arc<S>,
}

impl<S> ActionHandler<S>
where
    S: ConversationService + ?Sized,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for ActionHandler<S>
where
    S: ConversationService + ?Sized + 'static,
{
    fn event_type(&self) -> UpdateEventType {
        UpdateEventType::Action
    }

    async fn handle(
        &self,
        envelope: &UpdateEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let UpdateEvent::Action(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let messages = self.service.handle_action(event, ctx).await?;
        Ok(if messages.is_empty() {
            HandlerResult::Processed
        } else {
            HandlerResult::Responded(messages)
        })
    }
}
