//! Core traits: `Agent` (the processing unit) and `ChatProvider` (the
//! text-synthesis collaborator).

use std::future::Future;

use async_trait::async_trait;

use crate::chat::ChatMessage;
use crate::context::ProcessContext;
use crate::error::{AgentError, ProviderError};
use crate::signal::Signal;

/// The outcome of one `process` call: zero or more output signals, or an
/// error. The two are mutually exclusive by construction.
pub type AgentResult = Result<Vec<Signal>, AgentError>;

/// A named processor consuming one signal and producing zero or more outputs.
///
/// The interface is deliberately minimal. Agents must tolerate concurrent
/// `process` calls for different signals — the engine makes no per-agent
/// serialization guarantee — and should observe the context's deadline
/// rather than block indefinitely.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Stable identifier, unique within a router.
    fn id(&self) -> &str;

    /// Handle one incoming signal.
    async fn process(&self, ctx: &ProcessContext, signal: &Signal) -> AgentResult;
}

/// Functional adapter: use an async closure as an [`Agent`] without defining
/// a struct. Handy for small stateless agents and tests.
///
/// # Example
///
/// ```
/// use synapse_types::{AgentResult, FnAgent, ProcessContext, Signal};
///
/// let echo = FnAgent::new("echo", |_ctx: ProcessContext, signal: Signal| async move {
///     AgentResult::Ok(vec![signal.derive("echoed", signal.payload.clone())])
/// });
/// ```
pub struct FnAgent<F> {
    id: String,
    f: F,
}

impl<F> FnAgent<F> {
    /// Wrap a function as an agent with the given id.
    pub fn new(id: impl Into<String>, f: F) -> Self {
        Self { id: id.into(), f }
    }
}

#[async_trait]
impl<F, Fut> Agent for FnAgent<F>
where
    F: Fn(ProcessContext, Signal) -> Fut + Send + Sync,
    Fut: Future<Output = AgentResult> + Send,
{
    fn id(&self) -> &str {
        &self.id
    }

    async fn process(&self, ctx: &ProcessContext, signal: &Signal) -> AgentResult {
        (self.f)(ctx.clone(), signal.clone()).await
    }
}

/// A text-synthesis collaborator: send a conversation, get a reply.
///
/// Treated as fallible everywhere it is consumed — callers that can degrade
/// (e.g. the collector's synthesis merge) fall back rather than propagate.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send a conversation and return the full response text.
    async fn chat(
        &self,
        ctx: &ProcessContext,
        messages: &[ChatMessage],
    ) -> Result<String, ProviderError>;

    /// Change the model used for subsequent requests.
    fn set_model(&self, model: &str);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn fn_agent_adapts_a_closure() {
        let agent = FnAgent::new("doubler", |_ctx: ProcessContext, signal: Signal| async move {
            Ok(vec![signal.derive("out", json!("data"))])
        });

        assert_eq!(agent.id(), "doubler");

        let ctx = ProcessContext::new();
        let input = Signal::new("in", json!(null));
        let outputs = agent.process(&ctx, &input).await.expect("process ok");
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].parent_id.as_deref(), Some(input.id.as_str()));
    }

    #[tokio::test]
    async fn fn_agent_propagates_errors() {
        let agent = FnAgent::new("failing", |_ctx: ProcessContext, _signal: Signal| async move {
            Err(AgentError::Failed("boom".into()))
        });

        let ctx = ProcessContext::new();
        let input = Signal::new("in", json!(null));
        let err = agent.process(&ctx, &input).await.unwrap_err();
        assert!(matches!(err, AgentError::Failed(_)));
    }
}
