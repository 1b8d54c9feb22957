use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};
use wayfarer_core::ApplicationError;

use crate::blocks::{error_message, MessageTemplate};
use crate::events::{
    default_dispatcher, EventContext, EventDispatcher, HandlerResult, UpdateEnvelope,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport send failed: {0}")]
    Send(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// A chat platform connection: a stream of updates in, rendered messages out.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// `None` once the stream is closed.
    async fn next_update(&self) -> Result<Option<UpdateEnvelope>, TransportError>;
    async fn acknowledge(&self, update_id: &str) -> Result<(), TransportError>;
    async fn send(&self, chat_id: &str, message: &MessageTemplate) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;

    fn is_noop(&self) -> bool {
        false
    }
}

#[derive(Default)]
pub struct NoopChatTransport;

#[async_trait]
impl ChatTransport for NoopChatTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_update(&self) -> Result<Option<UpdateEnvelope>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(&self, _update_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send(&self, _chat_id: &str, _message: &MessageTemplate) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    fn is_noop(&self) -> bool {
        true
    }
}

/// Pulls updates, dispatches them one at a time and sends the replies.
/// Transport failures reconnect with exponential backoff; once retries run
/// out the runner returns instead of crashing the process.
pub struct PollingRunner {
    transport: Arc<dyn ChatTransport>,
    dispatcher: EventDispatcher,
    reconnect_policy: ReconnectPolicy,
}

impl Default for PollingRunner {
    fn default() -> Self {
        Self {
            transport: Arc::new(NoopChatTransport),
            dispatcher: default_dispatcher(),
            reconnect_policy: ReconnectPolicy::default(),
        }
    }
}

impl PollingRunner {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy }
    }

    pub fn is_noop_transport(&self) -> bool {
        self.transport.is_noop()
    }

    pub async fn start(&self) -> Result<()> {
        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    warn!(
                        event_name = "runner.transport_failed",
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "chat transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            event_name = "runner.retries_exhausted",
                            max_retries = self.reconnect_policy.max_retries,
                            "chat transport retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    info!(event_name = "runner.reconnect", attempt, delay_ms = delay.as_millis() as u64);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Ok(())
    }

    /// Closes the transport; used on shutdown.
    pub async fn stop(&self) {
        if let Err(error) = self.transport.disconnect().await {
            warn!(event_name = "runner.disconnect_failed", error = %error);
        }
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), TransportError> {
        info!(event_name = "runner.connecting", attempt, "opening chat transport connection");
        self.transport.connect().await?;
        info!(event_name = "runner.connected", attempt, "chat transport connected");

        loop {
            let Some(envelope) = self.transport.next_update().await? else {
                info!(event_name = "runner.stream_closed", attempt, "chat transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };
            let (user_id, chat_id) = correlation_fields(&envelope);

            info!(
                event_name = "ingress.update_received",
                update_id = %envelope.update_id,
                event_type = ?envelope.event.event_type(),
                user_id = user_id.unwrap_or("unknown"),
                chat_id = chat_id.unwrap_or("unknown"),
                "received chat update"
            );

            if let Err(error) = self.transport.acknowledge(&envelope.update_id).await {
                warn!(
                    event_name = "ingress.ack_failed",
                    update_id = %envelope.update_id,
                    error = %error,
                    "failed to acknowledge chat update"
                );
            } else {
                debug!(event_name = "ingress.ack_sent", update_id = %envelope.update_id);
            }

            let context = EventContext { correlation_id: envelope.update_id.clone() };
            let replies = match self.dispatcher.dispatch(&envelope, &context).await {
                Ok(HandlerResult::Responded(messages)) => messages,
                Ok(HandlerResult::Processed | HandlerResult::Ignored) => Vec::new(),
                Err(error) => {
                    warn!(
                        event_name = "ingress.dispatch_failed",
                        update_id = %envelope.update_id,
                        user_id = user_id.unwrap_or("unknown"),
                        error = %error,
                        "event dispatch failed; continuing update loop"
                    );
                    let failure =
                        ApplicationError::from(error).into_interface(envelope.update_id.as_str());
                    vec![error_message(failure.user_message(), &envelope.update_id)]
                }
            };

            let Some(chat_id) = chat_id else {
                continue;
            };
            for message in &replies {
                if let Err(error) = self.transport.send(chat_id, message).await {
                    warn!(
                        event_name = "egress.send_failed",
                        update_id = %envelope.update_id,
                        chat_id,
                        error = %error,
                        "failed to deliver reply"
                    );
                    break;
                }
            }
        }
    }
}

fn correlation_fields(envelope: &UpdateEnvelope) -> (Option<&str>, Option<&str>) {
    (envelope.event.user_id(), envelope.event.chat_id())
}
