//! Ollama client struct and builder.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use synapse_types::{ChatMessage, ChatProvider, ProcessContext, ProviderError};

use crate::error::{map_http_status, map_reqwest_error};
use crate::types::{ChatRequest, ChatResponse, ModelInfo, TagsResponse};

/// Default model used until [`Ollama::model`] or `set_model` changes it.
const DEFAULT_MODEL: &str = "llama3.2";

/// Default Ollama API base URL.
const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Default per-request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Client for the Ollama Chat API.
///
/// Implements [`ChatProvider`] for use anywhere a text-synthesis
/// collaborator is accepted. Thread-safe: one client may be shared across
/// agents, and `set_model` is visible to subsequent requests from any of
/// them.
///
/// # Example
///
/// ```no_run
/// use synapse_provider_ollama::Ollama;
///
/// let client = Ollama::new()
///     .model("llama3.2")
///     .base_url("http://localhost:11434");
/// ```
pub struct Ollama {
    /// Model for subsequent requests; swapped at runtime via `set_model`.
    model: RwLock<String>,
    /// API base URL (override for testing or remote instances).
    base_url: String,
    /// Per-request timeout.
    timeout: Duration,
    /// Shared HTTP client.
    client: reqwest::Client,
}

impl Ollama {
    /// Create a new client with sensible defaults.
    ///
    /// Default model: `llama3.2`. Default base URL:
    /// `http://localhost:11434`. No authentication (Ollama is local).
    #[must_use]
    pub fn new() -> Self {
        Self {
            model: RwLock::new(DEFAULT_MODEL.to_owned()),
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout: DEFAULT_TIMEOUT,
            client: reqwest::Client::new(),
        }
    }

    /// Override the initial model.
    #[must_use]
    pub fn model(self, model: impl Into<String>) -> Self {
        *self.model.write() = model.into();
        self
    }

    /// Override the API base URL.
    ///
    /// Useful for testing with a mock server or a remote Ollama instance.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Override the per-request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The model used for the next request.
    pub fn current_model(&self) -> String {
        self.model.read().clone()
    }

    /// Whether the Ollama server answers on `/api/tags`.
    pub async fn is_available(&self) -> bool {
        self.client
            .get(self.tags_url())
            .timeout(self.timeout)
            .send()
            .await
            .is_ok_and(|r| r.status().is_success())
    }

    /// List the models the server has available.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        let response = self
            .client
            .get(self.tags_url())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;
        if !status.is_success() {
            return Err(map_http_status(status, &body));
        }

        let tags: TagsResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        Ok(tags.models)
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.base_url)
    }

    async fn send_chat(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let model = self.current_model();
        let request = ChatRequest {
            model: &model,
            messages,
            stream: false,
        };

        tracing::debug!(
            url = %self.chat_url(),
            model = %model,
            messages = messages.len(),
            "synapse.ollama.chat"
        );

        let response = self
            .client
            .post(self.chat_url())
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;
        if !status.is_success() {
            return Err(map_http_status(status, &body));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        Ok(parsed.message.content)
    }
}

impl Default for Ollama {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatProvider for Ollama {
    /// Send a conversation with `stream: false` and return the reply text.
    ///
    /// The request is raced against the context, so a cancelled or expired
    /// context turns into [`ProviderError::Cancelled`] without waiting for
    /// the HTTP timeout.
    async fn chat(
        &self,
        ctx: &ProcessContext,
        messages: &[ChatMessage],
    ) -> Result<String, ProviderError> {
        tokio::select! {
            result = self.send_chat(messages) => result,
            _ = ctx.cancelled() => Err(ProviderError::Cancelled),
        }
    }

    fn set_model(&self, model: &str) {
        *self.model.write() = model.to_owned();
    }
}
