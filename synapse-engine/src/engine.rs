//! The dispatch engine: bounded inbox, worker pool, lifecycle.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use synapse_types::{AgentResult, EngineError, ProcessContext, Signal};

use crate::config::EngineConfig;
use crate::hooks::Hooks;
use crate::router::Router;

/// Runtime statistics snapshot, see [`Engine::stats`].
#[derive(Debug, Clone)]
pub struct EngineStats {
    /// Whether the engine is currently running.
    pub running: bool,
    /// Number of worker tasks.
    pub worker_count: usize,
    /// Configured inbox capacity (after coercion).
    pub buffer_size: usize,
    /// Signals currently queued in the inbox.
    pub buffer_used: usize,
    /// Per-agent processing timeout.
    pub process_timeout: Duration,
}

/// Drives signals from a bounded inbox through the router to agents.
///
/// A fixed pool of worker tasks pops signals, routes each to zero or more
/// destinations, and invokes every destination's `process` under a deadline
/// context. Output signals are stamped with their producing agent as source
/// and resubmitted through the public submit path.
///
/// # Lifecycle
///
/// [`Engine::start`] and [`Engine::stop`] are idempotent. `stop` rejects new
/// submissions, drains signals already queued, and waits for the workers to
/// exit. The engine is single-shot: once stopped it cannot be restarted.
///
/// # Failure semantics
///
/// No retries, no sibling cancellation: one destination's failure never
/// affects the rest of a fanout. Timeouts are cooperative — an agent that
/// ignores its context deadline occupies one worker until it returns.
pub struct Engine {
    inner: Arc<EngineInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

struct EngineInner {
    config: EngineConfig,
    router: Arc<Router>,
    tx: mpsc::Sender<Signal>,
    rx: tokio::sync::Mutex<mpsc::Receiver<Signal>>,
    done: CancellationToken,
    running: Mutex<bool>,
    hooks: Hooks,
}

impl Engine {
    /// Create an engine over the given router. Degenerate config values are
    /// coerced, see [`EngineConfig`].
    pub fn new(config: EngineConfig, router: Arc<Router>) -> Self {
        let config = config.normalized();
        let (tx, rx) = mpsc::channel(config.buffer_size);
        Self {
            inner: Arc::new(EngineInner {
                config,
                router,
                tx,
                rx: tokio::sync::Mutex::new(rx),
                done: CancellationToken::new(),
                running: Mutex::new(false),
                hooks: Hooks::default(),
            }),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// The router backing this engine, for agent and rule management.
    pub fn router(&self) -> &Arc<Router> {
        &self.inner.router
    }

    /// Install the received hook, called when a signal is popped from the
    /// inbox.
    pub fn on_signal_received(&self, hook: impl Fn(&Signal) + Send + Sync + 'static) {
        self.inner.hooks.set_received(Arc::new(hook));
    }

    /// Install the processed hook, called after each `process` call — on
    /// success and on error.
    pub fn on_signal_processed(
        &self,
        hook: impl Fn(&Signal, &AgentResult) + Send + Sync + 'static,
    ) {
        self.inner.hooks.set_processed(Arc::new(hook));
    }

    /// Install the error hook, called for every dispatch error.
    pub fn on_error(&self, hook: impl Fn(&Signal, &EngineError) + Send + Sync + 'static) {
        self.inner.hooks.set_error(Arc::new(hook));
    }

    /// Start the worker pool. No-op when already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        {
            let mut running = self.inner.running.lock();
            if *running {
                return;
            }
            *running = true;
        }

        let mut workers = self.workers.lock();
        for worker_id in 0..self.inner.config.worker_count {
            workers.push(tokio::spawn(worker_loop(self.inner.clone(), worker_id)));
        }
        tracing::debug!(
            workers = self.inner.config.worker_count,
            buffer = self.inner.config.buffer_size,
            "synapse.engine.started"
        );
    }

    /// Stop the engine: reject new submissions, drain queued signals, wait
    /// for the workers to finish. No-op when already stopped.
    pub async fn stop(&self) {
        {
            let mut running = self.inner.running.lock();
            if !*running {
                return;
            }
            *running = false;
        }

        self.inner.done.cancel();

        let handles: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for handle in handles {
            // Workers lost to an agent panic yield a join error; shutdown
            // proceeds regardless.
            let _ = handle.await;
        }
        tracing::debug!("synapse.engine.stopped");
    }

    /// Whether the engine is currently running.
    pub fn is_running(&self) -> bool {
        self.inner.is_running()
    }

    /// Snapshot of the engine's runtime statistics.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            running: self.inner.is_running(),
            worker_count: self.inner.config.worker_count,
            buffer_size: self.inner.config.buffer_size,
            buffer_used: self.inner.tx.max_capacity() - self.inner.tx.capacity(),
            process_timeout: self.inner.config.process_timeout,
        }
    }

    /// Enqueue a signal, waiting while the inbox is full.
    ///
    /// Fails with [`EngineError::NotRunning`] on a stopped engine and
    /// [`EngineError::Stopped`] when shutdown interrupts the wait.
    pub async fn submit(&self, signal: Signal) -> Result<(), EngineError> {
        self.inner.submit(signal).await
    }

    /// Enqueue a signal without blocking. Returns `false` when the inbox is
    /// full or the engine is not running.
    pub fn try_submit(&self, signal: Signal) -> bool {
        if !self.inner.is_running() {
            return false;
        }
        self.inner.tx.try_send(signal).is_ok()
    }

    /// Enqueue a signal, waiting at most `timeout` for inbox space.
    pub async fn submit_with_timeout(
        &self,
        signal: Signal,
        timeout: Duration,
    ) -> Result<(), EngineError> {
        if !self.inner.is_running() {
            return Err(EngineError::NotRunning);
        }
        tokio::select! {
            biased;
            _ = self.inner.done.cancelled() => Err(EngineError::Stopped),
            res = self.inner.tx.send(signal) => res.map_err(|_| EngineError::Stopped),
            _ = tokio::time::sleep(timeout) => Err(EngineError::SubmitTimeout(timeout)),
        }
    }
}

impl EngineInner {
    fn is_running(&self) -> bool {
        *self.running.lock()
    }

    async fn submit(&self, signal: Signal) -> Result<(), EngineError> {
        if !self.is_running() {
            return Err(EngineError::NotRunning);
        }
        // `biased` polls the done token first, so a submission racing with
        // shutdown can never slip into the inbox after drain has begun.
        tokio::select! {
            biased;
            _ = self.done.cancelled() => Err(EngineError::Stopped),
            res = self.tx.send(signal) => res.map_err(|_| EngineError::Stopped),
        }
    }

    async fn process_signal(&self, signal: &Signal) {
        self.hooks.received(signal);

        let destinations = self.router.route(signal);
        if destinations.is_empty() {
            tracing::debug!(signal = %signal, "synapse.engine.no_destination");
            self.hooks.error(
                signal,
                &EngineError::NoDestination {
                    signal_type: signal.signal_type.to_string(),
                    id: signal.short_id(),
                },
            );
            return;
        }

        for dest in &destinations {
            self.process_in_agent(signal, dest).await;
        }
    }

    async fn process_in_agent(&self, signal: &Signal, dest: &str) {
        let Some(agent) = self.router.agent(dest) else {
            // The agent was unregistered between routing and dispatch.
            self.hooks
                .error(signal, &EngineError::UnknownAgent(dest.to_owned()));
            return;
        };

        let ctx = ProcessContext::with_timeout(self.config.process_timeout);
        let view = signal.with_destination(dest);

        tracing::trace!(signal = %view, agent = dest, "synapse.engine.dispatch");
        let result = agent.process(&ctx, &view).await;

        self.hooks.processed(&view, &result);

        match result {
            Err(err) => {
                tracing::debug!(signal = %view, agent = dest, error = %err, "synapse.engine.agent_error");
                self.hooks.error(&view, &EngineError::Agent(err));
            }
            Ok(outputs) => {
                for output in outputs {
                    let output = output.with_source(dest);
                    // Best-effort: a failed resubmission (engine stopping)
                    // drops this output but not its siblings.
                    if let Err(err) = self.submit(output.clone()).await {
                        tracing::debug!(signal = %output, error = %err, "synapse.engine.resubmit_failed");
                        self.hooks.error(&output, &err);
                    }
                }
            }
        }
    }
}

/// Worker body: pop and process until shutdown, then drain the inbox.
///
/// The shared receiver sits behind an async mutex; only the dequeue itself
/// holds it, processing happens with the lock released so workers make
/// progress in parallel.
async fn worker_loop(inner: Arc<EngineInner>, worker_id: usize) {
    tracing::trace!(worker_id, "synapse.engine.worker_started");

    loop {
        let signal = {
            let mut rx = inner.rx.lock().await;
            tokio::select! {
                maybe = rx.recv() => match maybe {
                    Some(signal) => signal,
                    None => break,
                },
                _ = inner.done.cancelled() => break,
            }
        };
        inner.process_signal(&signal).await;
    }

    // Drain mode: new submissions are rejected once the done token fires,
    // but everything already queued must still be processed.
    loop {
        let signal = {
            let mut rx = inner.rx.lock().await;
            match rx.try_recv() {
                Ok(signal) => signal,
                Err(_) => break,
            }
        };
        inner.process_signal(&signal).await;
    }

    tracing::trace!(worker_id, "synapse.engine.worker_stopped");
}
