//! Per-call processing context: deadline plus cooperative cancellation.

use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Cancellation context handed to every [`Agent::process`] call.
///
/// Carries an optional absolute deadline and a [`CancellationToken`].
/// Cancellation is cooperative: nothing aborts the agent's future. A
/// well-behaved agent races its work against [`ProcessContext::cancelled`]
/// and returns early when it resolves; one that ignores the context simply
/// occupies its worker until it returns.
///
/// [`Agent::process`]: crate::traits::Agent::process
#[derive(Debug, Clone, Default)]
pub struct ProcessContext {
    deadline: Option<Instant>,
    token: CancellationToken,
}

impl ProcessContext {
    /// Create a context with no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context whose deadline is `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            token: CancellationToken::new(),
        }
    }

    /// The absolute deadline, if one is set.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline. `None` when no deadline is set, zero
    /// once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Cancel the context explicitly, independent of the deadline.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the context is cancelled or past its deadline.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves when the deadline passes or [`ProcessContext::cancel`] is
    /// called, whichever comes first.
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = sleep_until(deadline) => {}
                    _ = self.token.cancelled() => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }
}
