//! # synapse-provider-ollama — Ollama chat client
//!
//! HTTP client for a local [Ollama](https://ollama.com) server implementing
//! the [`ChatProvider`] trait, so it plugs in anywhere synapse consumes a
//! text-synthesis collaborator.
//!
//! [`ChatProvider`]: synapse_types::ChatProvider

mod client;
mod error;
mod types;

pub use client::Ollama;
pub use types::ModelInfo;
