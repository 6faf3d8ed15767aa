//! Worker agents: specialized processors with per-agent memory.

use std::sync::Arc;

use async_trait::async_trait;
use synapse_memory::{MemoryEntry, MemoryStats, MemoryStore};
use synapse_types::{
    Agent, AgentResult, ChatMessage, ChatProvider, ProcessContext, Signal,
};

use crate::config::WorkerConfig;
use crate::signals::{TaskAssignment, WorkerResult, WORKER_RESULT};

/// How many recent conversation entries are woven into the prompt.
const MEMORY_CONTEXT_ENTRIES: usize = 5;
/// Per-entry snippet cap inside the prompt.
const MEMORY_SNIPPET_LEN: usize = 200;
/// Confidence reported until workers estimate their own.
const DEFAULT_CONFIDENCE: f64 = 0.8;

/// A specialized processor: answers task assignments with its configured
/// model, optionally carrying conversation memory between tasks.
pub struct WorkerAgent {
    id: String,
    config: WorkerConfig,
    memory: Option<Arc<MemoryStore>>,
    client: Arc<dyn ChatProvider>,
}

impl WorkerAgent {
    /// Create a worker. `memory = None` disables conversation context.
    pub fn new(
        config: WorkerConfig,
        memory: Option<Arc<MemoryStore>>,
        client: Arc<dyn ChatProvider>,
    ) -> Self {
        Self {
            id: config.id.clone(),
            config,
            memory,
            client,
        }
    }

    /// Memory statistics, zeroed when the worker has no memory.
    pub fn memory_stats(&self) -> MemoryStats {
        self.memory
            .as_ref()
            .map(|m| m.stats())
            .unwrap_or(MemoryStats {
                entries: 0,
                bytes: 0,
            })
    }

    /// Drop all remembered conversation entries.
    pub fn clear_memory(&self) {
        if let Some(memory) = &self.memory {
            memory.clear();
        }
    }

    fn messages_with_memory(&self, message: &str) -> Vec<ChatMessage> {
        let mut system_prompt = self.config.system_prompt.clone();

        if let Some(memory) = &self.memory {
            let recent = memory.recent(MEMORY_CONTEXT_ENTRIES);
            if !recent.is_empty() {
                system_prompt.push_str("\n\n--- recent conversation ---\n");
                for entry in recent {
                    system_prompt.push_str(&format!(
                        "[{}]: {}\n",
                        entry.role,
                        truncate(&entry.content, MEMORY_SNIPPET_LEN)
                    ));
                }
            }
        }

        vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user(message),
        ]
    }
}

#[async_trait]
impl Agent for WorkerAgent {
    fn id(&self) -> &str {
        &self.id
    }

    async fn process(&self, ctx: &ProcessContext, signal: &Signal) -> AgentResult {
        let assignment: TaskAssignment = signal.payload_as()?;

        let messages = self.messages_with_memory(&assignment.original_request.message);

        self.client.set_model(&self.config.model);
        let response = self.client.chat(ctx, &messages).await?;

        if let Some(memory) = &self.memory {
            memory.add(MemoryEntry::new(
                "user",
                assignment.original_request.message.clone(),
            ));
            memory.add(MemoryEntry::new("assistant", response.clone()));
        }

        let result = WorkerResult {
            task_id: assignment.task_id.clone(),
            worker_id: self.id.clone(),
            content: response,
            confidence: DEFAULT_CONFIDENCE,
        };

        let out = signal
            .derive(WORKER_RESULT, serde_json::to_value(&result)?)
            .with_metadata("task_id", assignment.task_id.as_str())
            .with_metadata("worker_id", self.id.as_str());

        Ok(vec![out])
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_owned();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
