//! Optional observation hooks invoked synchronously on worker tasks.
//!
//! Hooks run on the worker processing the signal, holding no engine locks.
//! They must not call `Engine::stop` and should not block: a blocking hook
//! blocks its worker.

use std::sync::Arc;

use parking_lot::RwLock;
use synapse_types::{AgentResult, EngineError, Signal};

/// Called when a signal is popped from the inbox, before routing.
pub type ReceivedHook = dyn Fn(&Signal) + Send + Sync;

/// Called after an agent processed a signal — on success and on error.
pub type ProcessedHook = dyn Fn(&Signal, &AgentResult) + Send + Sync;

/// Called on any dispatch error: no destination, unknown agent, agent error,
/// failed resubmission of an output.
pub type ErrorHook = dyn Fn(&Signal, &EngineError) + Send + Sync;

/// Hook storage. Reads clone the `Arc` out and release the lock before the
/// callback runs, so a hook may freely call back into the engine's submit
/// path.
#[derive(Default)]
pub(crate) struct Hooks {
    received: RwLock<Option<Arc<ReceivedHook>>>,
    processed: RwLock<Option<Arc<ProcessedHook>>>,
    error: RwLock<Option<Arc<ErrorHook>>>,
}

impl Hooks {
    pub(crate) fn set_received(&self, hook: Arc<ReceivedHook>) {
        *self.received.write() = Some(hook);
    }

    pub(crate) fn set_processed(&self, hook: Arc<ProcessedHook>) {
        *self.processed.write() = Some(hook);
    }

    pub(crate) fn set_error(&self, hook: Arc<ErrorHook>) {
        *self.error.write() = Some(hook);
    }

    pub(crate) fn received(&self, signal: &Signal) {
        let hook = self.received.read().clone();
        if let Some(hook) = hook {
            hook(signal);
        }
    }

    pub(crate) fn processed(&self, signal: &Signal, result: &AgentResult) {
        let hook = self.processed.read().clone();
        if let Some(hook) = hook {
            hook(signal, result);
        }
    }

    pub(crate) fn error(&self, signal: &Signal, error: &EngineError) {
        let hook = self.error.read().clone();
        if let Some(hook) = hook {
            hook(signal, error);
        }
    }
}
