//! Orchestrator-specific errors.

use synapse_types::AgentError;

/// Failures specific to the orchestration agents.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// The coordinator has no workers configured to route to.
    #[error("no workers available")]
    NoWorkers,
}

impl From<OrchestratorError> for AgentError {
    fn from(error: OrchestratorError) -> Self {
        AgentError::Other(Box::new(error))
    }
}

/// Failures while loading or resolving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("read config: {0}")]
    Io(#[from] std::io::Error),
    /// The config file is not valid TOML for the expected schema.
    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// An environment override held an unusable value.
    #[error("invalid value in {var}: {reason}")]
    InvalidEnv {
        /// The offending variable name.
        var: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
    /// A worker id was requested that the config does not define.
    #[error("worker config not found: {0}")]
    UnknownWorker(String),
}
