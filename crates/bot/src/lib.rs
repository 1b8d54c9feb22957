//! Chat Integration - Telegram bot interface
//!
//! This crate connects wayfarer to a chat platform:
//! - **Runner** (`runner`) - polling event loop with reconnection logic
//! - **Telegram** (`telegram`) - Bot API long-polling transport
//! - **Commands** (`commands`) - `/start`, `/help`, `/reset`
//! - **Events** (`events`) - text messages, button presses, dispatching
//! - **Blocks** (`blocks`) - message builders (sections, buttons, photo cards)
//! - **Render** (`render`) - evidence bundle to HTML messages
//!
//! # Getting Started
//!
//! 1. Create a bot with @BotFather
//! 2. Set `WAYFARER_TRANSPORT_BOT_TOKEN`
//! 3. Point `llm.base_url` at an OpenAI-compatible endpoint
//!
//! # Architecture
//!
//! ```text
//! Telegram updates → EventDispatcher → Handlers → TurnService → Orchestrator
//!                         ↓
//!              HTML messages + buttons ← render_turn
//! ```
//!
//! # Key Types
//!
//! - `PollingRunner` - update loop with reconnection logic
//! - `EventDispatcher` - routes updates to handlers
//! - `MessageBuilder` - constructs chat messages
//! - `TurnService` - runs one orchestrator turn per message under the user's session lock

pub mod blocks;
pub mod commands;
pub mod events;
pub mod render;
pub mod runner;
pub mod service;
pub mod telegram;

pub use events::conversation_dispatcher;
pub use runner::{ChatTransport, NoopChatTransport, PollingRunner, ReconnectPolicy};
pub use service::TurnService;
pub use telegram::TelegramTransport;
