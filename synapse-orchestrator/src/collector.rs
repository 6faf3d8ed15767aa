//! The collector agent: exactly-once consolidation of partial results.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use synapse_types::{
    Agent, AgentError, AgentResult, ChatMessage, ChatProvider, ProcessContext, Signal,
};

use crate::config::CollectorConfig;
use crate::signals::{FinalResponse, WorkerResult, FINAL_RESPONSE};

/// How multiple partial results are combined into one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Deterministic concatenation of labelled sections.
    Template,
    /// Delegate to the chat provider; falls back to [`Self::Template`] on
    /// provider failure.
    #[default]
    Synthesis,
}

/// Accumulates partial results for one task.
struct TaskCollector {
    task_id: String,
    expected: usize,
    results: Vec<WorkerResult>,
    #[allow(dead_code)]
    created_at: DateTime<Utc>,
    /// The signal carrying the most recent partial; final responses derive
    /// from it so lineage stays connected.
    origin: Option<Signal>,
}

impl TaskCollector {
    fn new(task_id: &str, expected: usize) -> Self {
        Self {
            task_id: task_id.to_owned(),
            expected,
            results: Vec::new(),
            created_at: Utc::now(),
            origin: None,
        }
    }
}

/// Gathers N partial results per task and emits exactly one consolidated
/// [`FinalResponse`] signal, tolerant of arbitrary arrival order and of
/// results that land before the task is registered.
///
/// The pending-task lock spans the whole look-up / append / count-check /
/// remove-if-complete sequence, so two "last" results can never both trigger
/// consolidation. Consolidation itself runs on the removed entry, which at
/// that point is uniquely owned.
pub struct CollectorAgent {
    inner: Arc<CollectorInner>,
}

struct CollectorInner {
    id: String,
    config: CollectorConfig,
    client: Arc<dyn ChatProvider>,
    pending: Mutex<HashMap<String, TaskCollector>>,
    sink: Option<mpsc::Sender<Signal>>,
}

impl CollectorAgent {
    /// Create a collector. Final responses are additionally published into
    /// `sink` when one is given; a full sink drops the send rather than
    /// block a worker.
    pub fn new(
        config: CollectorConfig,
        client: Arc<dyn ChatProvider>,
        sink: Option<mpsc::Sender<Signal>>,
    ) -> Self {
        Self {
            inner: Arc::new(CollectorInner {
                id: config.id.clone(),
                config,
                client,
                pending: Mutex::new(HashMap::new()),
                sink,
            }),
        }
    }

    /// Announce a task and how many partial results to expect.
    ///
    /// When the task is unknown (or known but still empty) this simply
    /// (re)creates its entry. When results have already raced ahead, the
    /// expected count is updated in place and completion is re-checked — a
    /// task that is now complete consolidates immediately on a spawned task,
    /// publishing its final response to the sink.
    pub fn register_task(&self, task_id: &str, expected_count: usize) {
        let expected = expected_count.max(1);

        let ready = {
            let mut pending = self.inner.pending.lock();
            match pending.entry(task_id.to_owned()) {
                Entry::Vacant(slot) => {
                    slot.insert(TaskCollector::new(task_id, expected));
                    None
                }
                Entry::Occupied(mut slot) => {
                    if slot.get().results.is_empty() {
                        *slot.get_mut() = TaskCollector::new(task_id, expected);
                        None
                    } else {
                        slot.get_mut().expected = expected;
                        if slot.get().results.len() >= expected {
                            Some(slot.remove())
                        } else {
                            None
                        }
                    }
                }
            }
        };

        if let Some(collector) = ready {
            let inner = self.inner.clone();
            tokio::spawn(async move {
                let ctx = ProcessContext::new();
                match inner.consolidate(&ctx, collector).await {
                    Ok(final_signal) => inner.publish(&final_signal),
                    Err(error) => {
                        tracing::error!(%error, "synapse.collector.late_consolidation_failed");
                    }
                }
            });
        }
    }

    /// Number of tasks still waiting for results.
    pub fn pending_tasks(&self) -> usize {
        self.inner.pending.lock().len()
    }
}

impl CollectorInner {
    async fn consolidate(
        &self,
        ctx: &ProcessContext,
        collector: TaskCollector,
    ) -> Result<Signal, AgentError> {
        let contributors: Vec<String> = collector
            .results
            .iter()
            .map(|r| r.worker_id.clone())
            .collect();

        let content = if collector.results.len() == 1 {
            collector.results[0].content.clone()
        } else {
            self.merge(ctx, &collector.results).await
        };

        let response = FinalResponse {
            task_id: collector.task_id.clone(),
            content,
            contributors: contributors.clone(),
        };
        let payload = serde_json::to_value(&response)?;

        let final_signal = match &collector.origin {
            Some(origin) => origin.derive(FINAL_RESPONSE, payload),
            None => Signal::new(FINAL_RESPONSE, payload),
        };

        tracing::debug!(
            task_id = %collector.task_id,
            contributors = contributors.len(),
            "synapse.collector.consolidated"
        );

        Ok(final_signal
            .with_metadata("task_id", collector.task_id.as_str())
            .with_metadata("contributors", contributors.join(",")))
    }

    async fn merge(&self, ctx: &ProcessContext, results: &[WorkerResult]) -> String {
        match self.config.merge_strategy {
            MergeStrategy::Template => template_merge(results),
            MergeStrategy::Synthesis => {
                let mut sections = String::new();
                for result in results {
                    sections.push_str(&format!(
                        "\n--- from {} ---\n{}\n",
                        result.worker_id, result.content
                    ));
                }
                let messages = [
                    ChatMessage::system(self.config.system_prompt.as_str()),
                    ChatMessage::user(format!(
                        "Consolidate these responses into one coherent answer:\n{sections}"
                    )),
                ];

                self.client.set_model(&self.config.model);
                match self.client.chat(ctx, &messages).await {
                    Ok(merged) => merged,
                    Err(error) => {
                        tracing::warn!(%error, "synapse.collector.synthesis_failed");
                        template_merge(results)
                    }
                }
            }
        }
    }

    fn publish(&self, signal: &Signal) {
        let Some(sink) = &self.sink else {
            return;
        };
        if let Err(error) = sink.try_send(signal.clone()) {
            tracing::warn!(%error, "synapse.collector.sink_full_dropping");
        }
    }
}

#[async_trait]
impl Agent for CollectorAgent {
    fn id(&self) -> &str {
        &self.inner.id
    }

    async fn process(&self, ctx: &ProcessContext, signal: &Signal) -> AgentResult {
        let result: WorkerResult = signal.payload_as()?;
        let task_id = result.task_id.clone();

        let ready = {
            let mut pending = self.inner.pending.lock();
            let collector = pending
                .entry(task_id.clone())
                .or_insert_with(|| TaskCollector::new(&task_id, 1));

            collector.results.push(result);
            collector.origin = Some(signal.clone());

            if collector.results.len() >= collector.expected {
                // Remove before releasing the lock so no further result can
                // join this task; late arrivals start a fresh ad-hoc entry.
                pending.remove(&task_id)
            } else {
                None
            }
        };

        match ready {
            Some(collector) => {
                let final_signal = self.inner.consolidate(ctx, collector).await?;
                self.inner.publish(&final_signal);
                Ok(vec![final_signal])
            }
            None => Ok(vec![]),
        }
    }
}

fn template_merge(results: &[WorkerResult]) -> String {
    let mut merged = String::new();
    for result in results {
        merged.push_str(&format!("\n[{}]\n{}\n", result.worker_id, result.content));
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(task: &str, worker: &str, content: &str) -> WorkerResult {
        WorkerResult {
            task_id: task.to_owned(),
            worker_id: worker.to_owned(),
            content: content.to_owned(),
            confidence: 0.8,
        }
    }

    #[test]
    fn template_merge_labels_sections() {
        let merged = template_merge(&[
            result("t", "writing", "draft"),
            result("t", "summary", "tl;dr"),
        ]);
        assert_eq!(merged, "\n[writing]\ndraft\n\n[summary]\ntl;dr\n");
    }

    #[test]
    fn merge_strategy_parses_from_config_strings() {
        assert_eq!(
            serde_json::from_str::<MergeStrategy>("\"template\"").expect("parse"),
            MergeStrategy::Template
        );
        assert_eq!(
            serde_json::from_str::<MergeStrategy>("\"synthesis\"").expect("parse"),
            MergeStrategy::Synthesis
        );
    }
}
