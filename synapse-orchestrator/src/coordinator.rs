//! The coordinator agent: turns a user request into task assignments.

use std::sync::Arc;

use async_trait::async_trait;
use synapse_types::{
    Agent, AgentResult, ChatMessage, ChatProvider, ProcessContext, Signal,
};

use crate::config::CoordinatorConfig;
use crate::error::OrchestratorError;
use crate::signals::{RoutingDecision, TaskAssignment, UserRequest, TASK_ASSIGNMENT};

/// Routes user requests to workers, asking the model which workers fit.
///
/// The model is advisory: on provider failure the coordinator fans out to
/// every available worker, and on an unparseable reply it falls back to the
/// first one. A request never dies on a routing hiccup.
pub struct CoordinatorAgent {
    id: String,
    config: CoordinatorConfig,
    client: Arc<dyn ChatProvider>,
}

impl CoordinatorAgent {
    /// Create a coordinator from its config and a shared chat client.
    pub fn new(config: CoordinatorConfig, client: Arc<dyn ChatProvider>) -> Self {
        Self {
            id: config.id.clone(),
            config,
            client,
        }
    }

    fn task_assignments(
        &self,
        signal: &Signal,
        request: &UserRequest,
        workers: &[String],
        context: &str,
    ) -> AgentResult {
        let task_id = new_task_id();
        let assignment = TaskAssignment {
            task_id: task_id.clone(),
            original_request: request.clone(),
            selected_workers: workers.to_vec(),
            context: context.to_owned(),
        };
        let payload = serde_json::to_value(&assignment)?;

        let signals = workers
            .iter()
            .enumerate()
            .map(|(index, worker_id)| {
                signal
                    .derive(TASK_ASSIGNMENT, payload.clone())
                    .with_destination(worker_id.as_str())
                    .with_metadata("task_id", task_id.as_str())
                    .with_metadata("worker_index", index.to_string())
            })
            .collect();

        Ok(signals)
    }

    /// Keep only proposed workers that are actually available, preserving
    /// the proposal order.
    fn validate_workers(&self, proposed: &[String]) -> Vec<String> {
        proposed
            .iter()
            .filter(|w| self.config.available_workers.contains(*w))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Agent for CoordinatorAgent {
    fn id(&self) -> &str {
        &self.id
    }

    async fn process(&self, ctx: &ProcessContext, signal: &Signal) -> AgentResult {
        let request: UserRequest = signal.payload_as()?;

        if self.config.available_workers.is_empty() {
            return Err(OrchestratorError::NoWorkers.into());
        }

        let messages = [
            ChatMessage::system(self.config.system_prompt.as_str()),
            ChatMessage::user(format!(
                "User request: {}\nLanguage: {}",
                request.message, request.language
            )),
        ];

        self.client.set_model(&self.config.model);
        let response = match self.client.chat(ctx, &messages).await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(%error, "synapse.coordinator.chat_failed");
                return self.task_assignments(
                    signal,
                    &request,
                    &self.config.available_workers,
                    "fallback due to provider error",
                );
            }
        };

        let decision: RoutingDecision = match serde_json::from_str(extract_json(&response)) {
            Ok(decision) => decision,
            Err(error) => {
                tracing::warn!(%error, "synapse.coordinator.bad_decision");
                return self.task_assignments(
                    signal,
                    &request,
                    &self.config.available_workers[..1],
                    "fallback due to parse error",
                );
            }
        };

        let mut selected = self.validate_workers(&decision.workers);
        if selected.is_empty() {
            selected = self.config.available_workers[..1].to_vec();
        }
        selected.truncate(self.config.max_workers.max(1));

        self.task_assignments(signal, &request, &selected, &decision.reason)
    }
}

fn new_task_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_owned()
}

/// Slice out the outermost JSON object from a model reply that may wrap it
/// in prose. Returns `{}` when no object is present.
fn extract_json(s: &str) -> &str {
    match (s.find('{'), s.rfind('}')) {
        (Some(start), Some(end)) if end > start => &s[start..=end],
        _ => "{}",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_finds_the_outer_object() {
        assert_eq!(
            extract_json(r#"prefix {"key": "value"} suffix"#),
            r#"{"key": "value"}"#
        );
        assert_eq!(
            extract_json(r#"{"nested": {"inner": "data"}}"#),
            r#"{"nested": {"inner": "data"}}"#
        );
        assert_eq!(extract_json("multiple {first} and {second}"), "{first} and {second}");
    }

    #[test]
    fn extract_json_defaults_to_empty_object() {
        assert_eq!(extract_json("no json here"), "{}");
        assert_eq!(extract_json("{incomplete"), "{}");
        assert_eq!(extract_json("only closing}"), "{}");
        assert_eq!(extract_json(""), "{}");
    }

    #[test]
    fn task_ids_are_short_and_unique() {
        let a = new_task_id();
        let b = new_task_id();
        assert_eq!(a.len(), 8);
        assert_ne!(a, b);
    }
}
