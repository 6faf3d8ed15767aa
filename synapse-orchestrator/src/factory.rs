//! Builds the orchestration agents from configuration.

use std::sync::Arc;

use synapse_engine::Router;
use synapse_memory::MemoryManager;
use tokio::sync::mpsc;

use synapse_types::{ChatProvider, Signal};

use crate::collector::CollectorAgent;
use crate::config::OrchestratorConfig;
use crate::coordinator::CoordinatorAgent;
use crate::error::ConfigError;
use crate::orchestrator::Orchestration;
use crate::worker::WorkerAgent;

/// Creates coordinator, workers, and collector from an
/// [`OrchestratorConfig`], sharing one chat client and one memory manager
/// across all of them.
pub struct AgentFactory {
    config: OrchestratorConfig,
    memory: Arc<MemoryManager>,
    client: Arc<dyn ChatProvider>,
    sink: Option<mpsc::Sender<Signal>>,
}

impl AgentFactory {
    /// Create a factory over a shared chat client and optional result sink.
    pub fn new(
        config: OrchestratorConfig,
        client: Arc<dyn ChatProvider>,
        sink: Option<mpsc::Sender<Signal>>,
    ) -> Self {
        let memory = Arc::new(MemoryManager::new(config.memory.clone()));
        Self {
            config,
            memory,
            client,
            sink,
        }
    }

    /// The shared memory manager, for persistence at shutdown.
    pub fn memory(&self) -> &Arc<MemoryManager> {
        &self.memory
    }

    /// Build the coordinator.
    pub fn create_coordinator(&self) -> CoordinatorAgent {
        CoordinatorAgent::new(self.config.coordinator.clone(), self.client.clone())
    }

    /// Build one worker by id.
    pub async fn create_worker(&self, worker_id: &str) -> Result<WorkerAgent, ConfigError> {
        let worker_config = self
            .config
            .workers
            .get(worker_id)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownWorker(worker_id.to_owned()))?;

        let memory = match worker_config.memory.kinds.first() {
            Some(kind) => Some(self.memory.store_for_kind(worker_id, kind).await),
            None => None,
        };

        Ok(WorkerAgent::new(worker_config, memory, self.client.clone()))
    }

    /// Build every configured worker.
    pub async fn create_all_workers(&self) -> Result<Vec<WorkerAgent>, ConfigError> {
        let mut workers = Vec::with_capacity(self.config.workers.len());
        for worker_id in self.config.worker_ids() {
            workers.push(self.create_worker(&worker_id).await?);
        }
        Ok(workers)
    }

    /// Build the collector.
    pub fn create_collector(&self) -> Arc<CollectorAgent> {
        Arc::new(CollectorAgent::new(
            self.config.collector.clone(),
            self.client.clone(),
            self.sink.clone(),
        ))
    }

    /// Build and register all agents, returning the [`Orchestration`] that
    /// wires them together.
    pub async fn register_all(&self, router: &Router) -> Result<Orchestration, ConfigError> {
        let coordinator = self.create_coordinator();
        let coordinator_id = self.config.coordinator.id.clone();
        router.register(Arc::new(coordinator));

        for worker in self.create_all_workers().await? {
            router.register(Arc::new(worker));
        }

        let collector = self.create_collector();
        router.register(collector.clone());

        Ok(Orchestration::new(
            coordinator_id,
            self.config.worker_ids(),
            collector,
        ))
    }
}
