//! Orchestrator configuration: TOML file with environment overrides.
//!
//! Environment variables take precedence over file values:
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `SYNAPSE_OLLAMA_HOST` | `ollama.host` |
//! | `SYNAPSE_OLLAMA_TIMEOUT_SECS` | `ollama.timeout_secs` |
//! | `SYNAPSE_MEMORY_DIR` | `memory.storage_dir` |

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use synapse_memory::MemoryConfig;

use crate::collector::MergeStrategy;
use crate::error::ConfigError;

const ENV_OLLAMA_HOST: &str = "SYNAPSE_OLLAMA_HOST";
const ENV_OLLAMA_TIMEOUT_SECS: &str = "SYNAPSE_OLLAMA_TIMEOUT_SECS";
const ENV_MEMORY_DIR: &str = "SYNAPSE_MEMORY_DIR";

fn default_ollama_host() -> String {
    "http://localhost:11434".to_owned()
}

fn default_ollama_timeout_secs() -> u64 {
    120
}

fn default_model() -> String {
    "llama3.2".to_owned()
}

fn default_coordinator_id() -> String {
    "coordinator".to_owned()
}

fn default_max_workers() -> usize {
    3
}

fn default_coordinator_prompt() -> String {
    "You are a router. Given the user request, answer with a JSON object \
     {\"workers\": [...], \"reason\": \"...\"} selecting which workers should \
     handle it."
        .to_owned()
}

fn default_collector_id() -> String {
    "collector".to_owned()
}

fn default_collector_prompt() -> String {
    "You consolidate multiple assistant answers into one coherent response."
        .to_owned()
}

/// Ollama connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaConfig {
    /// Base URL of the Ollama server.
    #[serde(default = "default_ollama_host")]
    pub host: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_ollama_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_ollama_host(),
            timeout_secs: default_ollama_timeout_secs(),
        }
    }
}

/// Coordinator agent settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CoordinatorConfig {
    /// Agent id the coordinator registers under.
    #[serde(default = "default_coordinator_id")]
    pub id: String,
    /// Model used for routing decisions.
    #[serde(default = "default_model")]
    pub model: String,
    /// Upper bound on workers per task.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Worker ids the coordinator may route to.
    #[serde(default)]
    pub available_workers: Vec<String>,
    /// System prompt describing the routing task.
    #[serde(default = "default_coordinator_prompt")]
    pub system_prompt: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            id: default_coordinator_id(),
            model: default_model(),
            max_workers: default_max_workers(),
            available_workers: Vec::new(),
            system_prompt: default_coordinator_prompt(),
        }
    }
}

/// Per-worker settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkerConfig {
    /// Agent id. Filled from the map key when omitted.
    #[serde(default)]
    pub id: String,
    /// Human-readable description of the worker's speciality.
    #[serde(default)]
    pub description: String,
    /// Model this worker answers with.
    #[serde(default = "default_model")]
    pub model: String,
    /// The worker's system prompt.
    #[serde(default)]
    pub system_prompt: String,
    /// Which memory kinds the worker uses.
    #[serde(default)]
    pub memory: WorkerMemoryConfig,
}

/// Memory wiring for one worker.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkerMemoryConfig {
    /// Memory kinds in priority order; empty disables memory. The worker
    /// uses the first kind.
    #[serde(default)]
    pub kinds: Vec<String>,
}

/// Collector agent settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    /// Agent id the collector registers under.
    #[serde(default = "default_collector_id")]
    pub id: String,
    /// Model used for synthesis merges.
    #[serde(default = "default_model")]
    pub model: String,
    /// How multiple partial results are combined.
    #[serde(default)]
    pub merge_strategy: MergeStrategy,
    /// System prompt for the synthesis merge.
    #[serde(default = "default_collector_prompt")]
    pub system_prompt: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            id: default_collector_id(),
            model: default_model(),
            merge_strategy: MergeStrategy::default(),
            system_prompt: default_collector_prompt(),
        }
    }
}

/// The full orchestrator configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrchestratorConfig {
    /// Ollama connection settings.
    #[serde(default)]
    pub ollama: OllamaConfig,
    /// Memory defaults and per-kind overrides.
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Coordinator settings.
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    /// Worker settings keyed by worker id.
    #[serde(default)]
    pub workers: BTreeMap<String, WorkerConfig>,
    /// Collector settings.
    #[serde(default)]
    pub collector: CollectorConfig,
}

impl OrchestratorConfig {
    /// Load a TOML config file and apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&text)?;
        config.apply_env_overrides()?;
        config.resolve();
        Ok(config)
    }

    /// Apply `SYNAPSE_*` environment variables on top of the loaded values.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(host) = std::env::var(ENV_OLLAMA_HOST) {
            if !host.is_empty() {
                self.ollama.host = host;
            }
        }
        if let Ok(timeout) = std::env::var(ENV_OLLAMA_TIMEOUT_SECS) {
            if !timeout.is_empty() {
                self.ollama.timeout_secs =
                    timeout.parse().map_err(|_| ConfigError::InvalidEnv {
                        var: ENV_OLLAMA_TIMEOUT_SECS,
                        reason: format!("expected seconds, got {timeout:?}"),
                    })?;
            }
        }
        if let Ok(dir) = std::env::var(ENV_MEMORY_DIR) {
            if !dir.is_empty() {
                self.memory.storage_dir = Some(dir.into());
            }
        }
        Ok(())
    }

    /// All configured worker ids, sorted.
    pub fn worker_ids(&self) -> Vec<String> {
        self.workers.keys().cloned().collect()
    }

    /// Fill derived values: worker ids from map keys, available workers from
    /// the worker map when the coordinator lists none.
    fn resolve(&mut self) {
        for (key, worker) in &mut self.workers {
            if worker.id.is_empty() {
                worker.id = key.clone();
            }
        }
        if self.coordinator.available_workers.is_empty() {
            self.coordinator.available_workers = self.workers.keys().cloned().collect();
        }
    }
}
