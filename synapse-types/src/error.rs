//! Error types shared across the synapse crates.

use std::time::Duration;

/// Errors returned by an agent's `process` implementation.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The signal payload did not match the shape this agent expects.
    #[error("invalid payload: expected {0}")]
    InvalidPayload(&'static str),
    /// An output payload could not be encoded.
    #[error("payload encode failed: {0}")]
    PayloadEncode(#[from] serde_json::Error),
    /// A chat provider call failed.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
    /// Processing observed the context as cancelled and stopped early.
    #[error("cancelled before completion")]
    Cancelled,
    /// Processing failed for a domain-specific reason.
    #[error("processing failed: {0}")]
    Failed(String),
    /// Any other agent error.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Errors raised by the engine: submission failures returned to callers and
/// dispatch failures surfaced through the error hook.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Submission attempted on an engine that was never started or has
    /// already stopped.
    #[error("engine not running")]
    NotRunning,
    /// Submission raced with shutdown.
    #[error("engine stopped")]
    Stopped,
    /// A blocking submission did not complete within its deadline.
    #[error("submission timed out after {0:?}")]
    SubmitTimeout(Duration),
    /// Routing produced no candidates for the signal.
    #[error("no destination for signal type '{signal_type}' (id={id})")]
    NoDestination {
        /// The undeliverable signal's type.
        signal_type: String,
        /// The undeliverable signal's (shortened) id.
        id: String,
    },
    /// The destination agent disappeared between routing and dispatch.
    #[error("agent '{0}' not found")]
    UnknownAgent(String),
    /// The agent returned an error from `process`.
    #[error("agent error: {0}")]
    Agent(#[from] AgentError),
}

/// Errors from chat provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Network-level error (connection reset, DNS failure, etc.).
    #[error("network error: {0}")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// Request timed out.
    #[error("request timed out")]
    Timeout,
    /// Rate limited by the provider.
    #[error("rate limited")]
    RateLimit,
    /// Provider service is temporarily unavailable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Requested model does not exist.
    #[error("model not found: {0}")]
    ModelNotFound(String),
    /// Malformed or rejected request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// The provider returned a response that could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    /// The call was cancelled through the processing context.
    #[error("cancelled")]
    Cancelled,
    /// Any other provider error.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl ProviderError {
    /// Whether this error is likely transient and the request can be retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout | Self::RateLimit | Self::ServiceUnavailable(_)
        )
    }
}
