//! Wiring: routing rules and the task-registration hook.

use std::sync::Arc;

use synapse_engine::{Engine, Router};
use synapse_types::Agent;

use crate::collector::CollectorAgent;
use crate::signals::{TaskAssignment, TASK_ASSIGNMENT, USER_REQUEST, WORKER_RESULT};

/// Installs the coordinator → workers → collector flow on an engine.
///
/// Three rules: user requests go to the coordinator; task assignments honour
/// their explicit destination and otherwise fan out to every worker; worker
/// results go to the collector. Final responses match no rule and are
/// terminal.
///
/// One hook: when a processed user request produced task assignments, the
/// collector is told the task id and how many results to expect — before the
/// assignments are submitted, so registration cannot lose the race against
/// the first worker result.
pub struct Orchestration {
    coordinator_id: String,
    worker_ids: Vec<String>,
    collector_id: String,
    collector: Arc<CollectorAgent>,
}

impl Orchestration {
    /// Describe a flow over the given agents.
    pub fn new(
        coordinator_id: impl Into<String>,
        worker_ids: Vec<String>,
        collector: Arc<CollectorAgent>,
    ) -> Self {
        Self {
            coordinator_id: coordinator_id.into(),
            worker_ids,
            collector_id: collector.id().to_owned(),
            collector,
        }
    }

    /// Install both the routing rules and the registration hook.
    pub fn install(&self, engine: &Engine) {
        self.install_rules(engine.router());
        self.install_hooks(engine);
    }

    /// Append this flow's routing rules to the router.
    pub fn install_rules(&self, router: &Router) {
        let coordinator_id = self.coordinator_id.clone();
        router.add_rule(move |signal| {
            if signal.signal_type == USER_REQUEST {
                vec![coordinator_id.clone()]
            } else {
                vec![]
            }
        });

        // The coordinator sets explicit destinations, so the fanout arm is a
        // backstop for assignments submitted by hand.
        let worker_ids = self.worker_ids.clone();
        router.add_rule(move |signal| {
            if signal.signal_type == TASK_ASSIGNMENT {
                match &signal.destination {
                    Some(dest) => vec![dest.clone()],
                    None => worker_ids.clone(),
                }
            } else {
                vec![]
            }
        });

        let collector_id = self.collector_id.clone();
        router.add_rule(move |signal| {
            if signal.signal_type == WORKER_RESULT {
                vec![collector_id.clone()]
            } else {
                vec![]
            }
        });
    }

    /// Install the processed hook that registers tasks with the collector.
    ///
    /// This claims the engine's processed hook; compose manually if the
    /// embedder needs its own.
    pub fn install_hooks(&self, engine: &Engine) {
        let collector = self.collector.clone();
        engine.on_signal_processed(move |signal, result| {
            if signal.signal_type != USER_REQUEST {
                return;
            }
            let Ok(outputs) = result else {
                return;
            };
            for output in outputs {
                if output.signal_type != TASK_ASSIGNMENT {
                    continue;
                }
                let Ok(assignment) = output.payload_as::<TaskAssignment>() else {
                    continue;
                };
                collector.register_task(&assignment.task_id, assignment.selected_workers.len());
            }
        });
    }

    /// The collector this flow delivers to.
    pub fn collector(&self) -> &Arc<CollectorAgent> {
        &self.collector
    }
}
