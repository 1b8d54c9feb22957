//! Telegram Bot API transport over long polling.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::blocks::{ButtonElement, MessageTemplate};
use crate::commands::{split_command_text, CommandPayload};
use crate::events::{ActionEvent, TextMessageEvent, UpdateEnvelope, UpdateEvent};
use crate::runner::{ChatTransport, TransportError};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";
const CAPTION_LIMIT: usize = 1024;
const CALLBACK_DATA_LIMIT: usize = 64;

pub struct TelegramTransport {
    client: Client,
    api_base: String,
    token: SecretString,
    poll_timeout_secs: u64,
    state: Mutex<PollState>,
}

#[derive(Default)]
struct PollState {
    offset: i64,
    buffered: VecDeque<UpdateEnvelope>,
    /// Callback queries awaiting an answer, keyed by update id.
    callbacks: HashMap<String, String>,
}

impl TelegramTransport {
    pub fn new(token: SecretString, poll_timeout_secs: u64) -> Result<Self, TransportError> {
        Self::with_api_base(token, poll_timeout_secs, DEFAULT_API_BASE)
    }

    pub fn with_api_base(
        token: SecretString,
        poll_timeout_secs: u64,
        api_base: &str,
    ) -> Result<Self, TransportError> {
        // The HTTP timeout has to outlive the long poll.
        let client = Client::builder()
            .timeout(Duration::from_secs(poll_timeout_secs + 10))
            .build()
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_owned(),
            token,
            poll_timeout_secs,
            state: Mutex::new(PollState::default()),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.token.expose_secret())
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T, String> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            // reqwest errors carry the URL, which carries the token.
            .map_err(|error| format!("{method}: {}", error.without_url()))?;
        let envelope: ApiResponse<T> =
            response.json().await.map_err(|error| format!("{method}: {}", error.without_url()))?;
        envelope.into_result(method)
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let me: BotUser = self.call("getMe", &json!({})).await.map_err(TransportError::Connect)?;
        info!(
            event_name = "telegram.connected",
            bot_username = me.username.as_deref().unwrap_or("unknown"),
            "telegram bot identity confirmed"
        );
        Ok(())
    }

    async fn next_update(&self) -> Result<Option<UpdateEnvelope>, TransportError> {
        loop {
            let offset = {
                let mut state = self.state.lock().await;
                if let Some(envelope) = state.buffered.pop_front() {
                    return Ok(Some(envelope));
                }
                state.offset
            };

            let body = json!({
                "offset": offset,
                "timeout": self.poll_timeout_secs,
                "allowed_updates": ["message", "callback_query"],
            });
            let updates: Vec<RawUpdate> =
                self.call("getUpdates", &body).await.map_err(TransportError::Receive)?;
            debug!(event_name = "telegram.polled", offset, count = updates.len());

            let mut state = self.state.lock().await;
            for raw in updates {
                let update_id = raw.update_id;
                let callback_id = raw.callback_query.as_ref().map(|query| query.id.clone());
                match map_update(raw) {
                    Some(envelope) => {
                        if let Some(callback_id) = callback_id {
                            state.callbacks.insert(envelope.update_id.clone(), callback_id);
                        }
                        state.buffered.push_back(envelope);
                    }
                    // Nothing to answer; skip past it right away.
                    None => state.offset = state.offset.max(update_id + 1),
                }
            }
        }
    }

    async fn acknowledge(&self, update_id: &str) -> Result<(), TransportError> {
        let callback_id = {
            let mut state = self.state.lock().await;
            if let Ok(id) = update_id.parse::<i64>() {
                state.offset = state.offset.max(id + 1);
            }
            state.callbacks.remove(update_id)
        };

        if let Some(callback_id) = callback_id {
            let _: bool = self
                .call("answerCallbackQuery", &json!({ "callback_query_id": callback_id }))
                .await
                .map_err(TransportError::Acknowledge)?;
        }
        Ok(())
    }

    async fn send(&self, chat_id: &str, message: &MessageTemplate) -> Result<(), TransportError> {
        let (method, body) = outgoing_request(chat_id, message);
        let _: Value = self.call(method, &body).await.map_err(TransportError::Send)?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        state.buffered.clear();
        state.callbacks.clear();
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self, method: &str) -> Result<T, String> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(format!(
                "{method}: {}",
                self.description.unwrap_or_else(|| "request rejected".to_owned())
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BotUser {
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawUpdate {
    pub update_id: i64,
    pub message: Option<RawMessage>,
    pub callback_query: Option<RawCallbackQuery>,
}

#[derive(Debug, Deserialize)]
pub struct RawMessage {
    pub chat: RawChat,
    pub from: Option<RawUser>,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawChat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct RawUser {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct RawCallbackQuery {
    pub id: String,
    pub from: RawUser,
    pub message: Option<RawMessage>,
    pub data: Option<String>,
}

/// Maps a raw update onto the dispatcher's event model. Messages starting
/// with `/` are commands; button data is `action_id:value`.
pub fn map_update(raw: RawUpdate) -> Option<UpdateEnvelope> {
    let update_id = raw.update_id.to_string();

    if let Some(query) = raw.callback_query {
        let chat_id = query.message.as_ref().map(|message| message.chat.id).unwrap_or(query.from.id);
        let data = query.data.unwrap_or_default();
        let (action_id, value) = match data.split_once(':') {
            Some((action_id, value)) => (action_id.to_owned(), Some(value.to_owned())),
            None => (data, None),
        };
        return Some(UpdateEnvelope {
            update_id,
            event: UpdateEvent::Action(ActionEvent {
                chat_id: chat_id.to_string(),
                user_id: query.from.id.to_string(),
                action_id,
                value,
            }),
        });
    }

    let message = raw.message?;
    let chat_id = message.chat.id.to_string();
    let user_id = message.from.map(|user| user.id).unwrap_or(message.chat.id).to_string();
    let Some(text) = message.text else {
        return Some(UpdateEnvelope {
            update_id,
            event: UpdateEvent::Unsupported { event_type: "non_text_message".to_owned() },
        });
    };

    let event = match split_command_text(&text) {
        Some((command, args)) => {
            UpdateEvent::Command(CommandPayload { chat_id, user_id, command, args })
        }
        None => UpdateEvent::TextMessage(TextMessageEvent { chat_id, user_id, text }),
    };
    Some(UpdateEnvelope { update_id, event })
}

/// Picks `sendPhoto` for image cards and `sendMessage` otherwise.
pub fn outgoing_request(chat_id: &str, message: &MessageTemplate) -> (&'static str, Value) {
    let markup = reply_markup(message);
    let (method, mut body) = match message.image() {
        Some((image_url, caption)) => (
            "sendPhoto",
            json!({
                "chat_id": chat_id,
                "photo": image_url,
                "caption": truncate_chars(&caption.to_html(), CAPTION_LIMIT),
                "parse_mode": "HTML",
            }),
        ),
        None => (
            "sendMessage",
            json!({
                "chat_id": chat_id,
                "text": message.html_body(),
                "parse_mode": "HTML",
                "disable_web_page_preview": true,
            }),
        ),
    };
    if let (Some(markup), Some(object)) = (markup, body.as_object_mut()) {
        object.insert("reply_markup".to_owned(), markup);
    }
    (method, body)
}

fn reply_markup(message: &MessageTemplate) -> Option<Value> {
    let rows: Vec<Vec<Value>> = message
        .button_rows()
        .into_iter()
        .map(|row| row.iter().map(inline_button).collect())
        .collect();
    if rows.is_empty() {
        None
    } else {
        Some(json!({ "inline_keyboard": rows }))
    }
}

fn inline_button(button: &ButtonElement) -> Value {
    match &button.url {
        Some(url) => json!({ "text": button.label(), "url": url }),
        None => {
            let data = match &button.value {
                Some(value) => format!("{}:{value}", button.action_id),
                None => button.action_id.clone(),
            };
            json!({ "text": button.label(), "callback_data": truncate_chars(&data, CALLBACK_DATA_LIMIT) })
        }
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
