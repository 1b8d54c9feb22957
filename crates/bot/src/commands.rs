use async_trait::async_trait;
use thiserror::Error;

use crate::blocks::{self, MessageTemplate};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandPayload {
    pub chat_id: String,
    pub user_id: String,
    /// Raw command token, e.g. `/start` or `/start@wayfarer_bot`.
    pub command: String,
    pub args: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
    Reset,
    Unknown { name: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("not a command: {0}")]
    NotACommand(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error("command service failed: {0}")]
    Service(String),
}

pub const RESET_TEXT: &str = "Контекст сброшен. О каком месте поговорим?";
pub const NOTHING_TO_RESET_TEXT: &str = "Контекст и так пуст. О каком месте поговорим?";

pub fn parse_command(raw: &str) -> Result<BotCommand, CommandParseError> {
    let token = raw.split_whitespace().next().unwrap_or_default();
    let Some(name) = token.strip_prefix('/') else {
        return Err(CommandParseError::NotACommand(raw.to_owned()));
    };
    let name = name.split('@').next().unwrap_or_default().to_ascii_lowercase();
    Ok(match name.as_str() {
        "start" => BotCommand::Start,
        "help" => BotCommand::Help,
        "reset" => BotCommand::Reset,
        _ => BotCommand::Unknown { name },
    })
}

/// Splits `"/cmd rest"` into the command token and its arguments.
pub fn split_command_text(text: &str) -> Option<(String, String)> {
    let trimmed = text.trim();
    if !trimmed.starts_with('/') {
        return None;
    }
    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or_default().to_owned();
    let args = parts.next().unwrap_or_default().trim().to_owned();
    Some((command, args))
}

/// Session operations commands may trigger.
#[async_trait]
pub trait SessionCommandService: Send + Sync {
    /// Drops the user's session; `true` when one existed.
    async fn reset_session(&self, user_id: &str) -> Result<bool, CommandRouteError>;
}

pub struct CommandRouter<S> {
    service: S,
}

impl<S> CommandRouter<S>
where
    S: SessionCommandService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub async fn route(
        &self,
        payload: &CommandPayload,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let command = match parse_command(&payload.command) {
            Ok(command) => command,
            Err(_) => return Ok(blocks::help_message()),
        };
        match command {
            BotCommand::Start => Ok(blocks::welcome_message()),
            BotCommand::Help => Ok(blocks::help_message()),
            BotCommand::Reset => {
                let existed = self.service.reset_session(&payload.user_id).await?;
                Ok(blocks::plain_message(if existed { RESET_TEXT } else { NOTHING_TO_RESET_TEXT }))
            }
            BotCommand::Unknown { name } => Ok(blocks::plain_message(&format!(
                "Неизвестная команда /{name}. Попробуй /help."
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSessionCommandService;

#[async_trait]
impl SessionCommandService for NoopSessionCommandService {
    async fn reset_session(&self, _user_id: &str) -> Result<bool, CommandRouteError> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::{
        parse_command, split_command_text, BotCommand, CommandPayload, CommandRouteError,
        CommandRouter, SessionCommandService, RESET_TEXT,
    };
    use crate::blocks::WELCOME_TEXT;

    #[derive(Default)]
    struct CountingResets {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SessionCommandService for CountingResets {
        async fn reset_session(&self, user_id: &str) -> Result<bool, CommandRouteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(user_id == "u-1")
        }
    }

    fn payload(command: &str) -> CommandPayload {
        CommandPayload {
            chat_id: "c-1".to_owned(),
            user_id: "u-1".to_owned(),
            command: command.to_owned(),
            args: String::new(),
        }
    }

    #[test]
    fn parses_commands_with_bot_suffix() {
        assert_eq!(parse_command("/start"), Ok(BotCommand::Start));
        assert_eq!(parse_command("/HELP@wayfarer_bot"), Ok(BotCommand::Help));
        assert_eq!(parse_command("/reset now"), Ok(BotCommand::Reset));
        assert_eq!(
            parse_command("/weather"),
            Ok(BotCommand::Unknown { name: "weather".to_owned() })
        );
        assert!(parse_command("start").is_err());
    }

    #[test]
    fn splits_command_and_arguments() {
        assert_eq!(
            split_command_text("  /start  hello there "),
            Some(("/start".to_owned(), "hello there".to_owned()))
        );
        assert_eq!(split_command_text("/reset"), Some(("/reset".to_owned(), String::new())));
        assert_eq!(split_command_text("Kyoto"), None);
    }

    #[tokio::test]
    async fn reset_goes_through_the_session_service() {
        let service = CountingResets::default();
        let calls = service.calls.clone();
        let router = CommandRouter::new(service);

        let reply = router.route(&payload("/reset")).await.expect("reset");
        assert_eq!(reply.fallback_text, RESET_TEXT);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let welcome = router.route(&payload("/start")).await.expect("start");
        assert_eq!(welcome.fallback_text, WELCOME_TEXT);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_command_points_to_help() {
        let router = CommandRouter::new(CountingResets::default());
        let reply = router.route(&payload("/weather")).await.expect("reply");
        assert!(reply.fallback_text.contains("/help"));
    }
}
