//! Ollama API request and response bodies.
//!
//! [`ChatMessage`] already serializes to Ollama's `{"role": ..., "content":
//! ...}` wire shape, so requests borrow the caller's messages directly.
//!
//! [`ChatMessage`]: synapse_types::ChatMessage

use serde::{Deserialize, Serialize};
use synapse_types::ChatMessage;

/// Request body for `POST /api/chat`.
#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub stream: bool,
}

/// Response body for a non-streaming `/api/chat` call.
#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseMessage {
    #[serde(default)]
    pub content: String,
}

/// Response body for `GET /api/tags`.
#[derive(Debug, Deserialize)]
pub(crate) struct TagsResponse {
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

/// One locally available model, as reported by `/api/tags`.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    /// Model name, e.g. `llama3.2:latest`.
    pub name: String,
    /// Size on disk in bytes.
    #[serde(default)]
    pub size: u64,
    /// Content digest.
    #[serde(default)]
    pub digest: String,
}
