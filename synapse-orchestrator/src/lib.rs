//! # synapse-orchestrator — coordinator / workers / collector
//!
//! The reference orchestration pattern on top of `synapse-engine`: a
//! [`CoordinatorAgent`] splits a user request across a set of workers, each
//! [`WorkerAgent`] answers with its own model and memory, and the
//! [`CollectorAgent`] gathers the partial results — exactly once per task,
//! in any arrival order — into a single consolidated response.
//!
//! [`Orchestration`] installs the routing rules and the task-registration
//! hook that wire the three stages together; [`AgentFactory`] builds the
//! agents from an [`OrchestratorConfig`].

mod collector;
mod config;
mod coordinator;
mod error;
mod factory;
mod orchestrator;
mod signals;
mod worker;

pub use collector::{CollectorAgent, MergeStrategy};
pub use config::{
    CollectorConfig, CoordinatorConfig, OllamaConfig, OrchestratorConfig, WorkerConfig,
    WorkerMemoryConfig,
};
pub use coordinator::CoordinatorAgent;
pub use error::{ConfigError, OrchestratorError};
pub use factory::AgentFactory;
pub use orchestrator::Orchestration;
pub use signals::{
    FinalResponse, RoutingDecision, TaskAssignment, UserRequest, WorkerResult, FINAL_RESPONSE,
    TASK_ASSIGNMENT, USER_REQUEST, WORKER_RESULT,
};
pub use worker::WorkerAgent;
