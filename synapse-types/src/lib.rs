#![deny(missing_docs)]
//! Shared types and traits for the synapse signal-dispatch engine.
//!
//! This crate defines the lingua franca — signals, the agent contract, chat
//! messages, processing contexts, errors — that all other synapse crates
//! depend on. Leaf logic only; the dispatch machinery lives in
//! `synapse-engine`.

pub mod chat;
pub mod context;
pub mod error;
pub mod signal;
pub mod traits;

pub use chat::{ChatMessage, Role};
pub use context::ProcessContext;
pub use error::{AgentError, EngineError, ProviderError};
pub use signal::{Signal, SignalType};
pub use traits::{Agent, AgentResult, ChatProvider, FnAgent};
