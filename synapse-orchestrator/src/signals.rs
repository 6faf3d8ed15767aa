//! Signal vocabulary and payload types for the orchestration flow.

use serde::{Deserialize, Serialize};

/// Initial user input, routed to the coordinator.
pub const USER_REQUEST: &str = "user_request";
/// The coordinator's routing decision, one signal per selected worker.
pub const TASK_ASSIGNMENT: &str = "task_assignment";
/// A worker's partial result, routed to the collector.
pub const WORKER_RESULT: &str = "worker_result";
/// The consolidated response. Terminal — no rule routes it further.
pub const FINAL_RESPONSE: &str = "final_response";

/// The initial user input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRequest {
    /// Conversation session this request belongs to.
    #[serde(default)]
    pub session_id: String,
    /// The request text.
    pub message: String,
    /// Requested response language tag (e.g. "en").
    #[serde(default)]
    pub language: String,
}

/// The coordinator's routing decision, fanned out to the selected workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAssignment {
    /// Identifies the task across the worker fanout.
    pub task_id: String,
    /// The request being worked on.
    pub original_request: UserRequest,
    /// Workers chosen to handle this task.
    pub selected_workers: Vec<String>,
    /// Why these workers were chosen (or which fallback applied).
    #[serde(default)]
    pub context: String,
}

/// One worker's contribution to a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResult {
    /// The task this result belongs to.
    pub task_id: String,
    /// The contributing worker.
    pub worker_id: String,
    /// The result text.
    pub content: String,
    /// Self-reported confidence in `[0, 1]`.
    #[serde(default)]
    pub confidence: f64,
}

/// The consolidated output for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalResponse {
    /// The completed task.
    pub task_id: String,
    /// Merged result text.
    pub content: String,
    /// Worker ids in arrival order of their partial results.
    pub contributors: Vec<String>,
}

/// The shape the coordinator asks the model to answer with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Proposed worker ids.
    #[serde(default)]
    pub workers: Vec<String>,
    /// The model's reasoning.
    #[serde(default)]
    pub reason: String,
}
