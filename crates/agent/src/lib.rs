//! Conversational core of the wayfarer travel assistant.
//!
//! A turn flows through:
//! 1. **Pending answers** (`conversation`) - read the message as the answer to
//!    an outstanding follow-up question, if one is open
//! 2. **Intent routing** (`router`) - text plus memory hint to a typed
//!    `RoutingDecision`, via the retry/repair protocol in `structured`
//! 3. **Guardrails** (`guardrails`) - weather gating and follow-up questions
//! 4. **Evidence dispatch** (`runtime`) - tourism and legal first, then weather
//!    and an explicit route concurrently, then a walking route through the
//!    tourism highlights (`poi`)
//! 5. **Summary refresh** (`summary`)
//!
//! Every collaborator sits behind a trait in `ports` and is injected into the
//! `Orchestrator`, so tests swap in scripted fakes.
//!
//! The text-generation backend is a translator. It never decides which
//! providers may run; `guardrails` and the turn flow do.

pub mod conversation;
pub mod enrichment;
pub mod guardrails;
pub mod legal;
pub mod llm;
pub mod poi;
pub mod ports;
pub mod router;
pub mod runtime;
pub mod session_store;
pub mod structured;
pub mod summary;
pub mod tourism;

pub use llm::{ChatMessage, CompletionRequest, GenerationSettings, LlmClient, MessageRole};
pub use runtime::{Collaborators, Orchestrator, OrchestratorSettings, TurnOutcome, TurnRequest};
pub use session_store::{SessionHandle, SessionStore};
