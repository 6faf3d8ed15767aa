//! The signal value — the unit of communication between agents.
//!
//! Signals are immutable after creation. Agents derive new signals instead of
//! mutating existing ones, which keeps concurrent processing safe and keeps
//! the parent-id lineage chain meaningful.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;

/// Routing tag of a signal.
///
/// An opaque string underneath — the engine attaches no meaning to it beyond
/// equality. Embedders define their own vocabulary as `&'static str`
/// constants and compare with `==`.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalType(String);

impl SignalType {
    /// Create a signal type from anything that converts to `String`.
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    /// Borrow the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SignalType {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for SignalType {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<str> for SignalType {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for SignalType {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// An immutable typed message moving through the engine.
///
/// Construct with [`Signal::new`], then narrow with the `with_*` methods or
/// spawn children with [`Signal::derive`]. Every one of those returns a new
/// value; the receiver is never changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    /// Process-unique identifier, `sig-<nanos>-<counter>`.
    pub id: String,
    /// Routing tag; rules and agents dispatch on it.
    pub signal_type: SignalType,
    /// Creation wall-clock time.
    pub timestamp: DateTime<Utc>,
    /// Agent that emitted this signal. `None` for externally-submitted ones.
    pub source: Option<String>,
    /// Explicit target agent. Overrides rule-based routing when the named
    /// agent exists.
    pub destination: Option<String>,
    /// Opaque payload; agents know the concrete shape from `signal_type`.
    pub payload: serde_json::Value,
    /// Id of the signal that caused this one. `None` for roots.
    pub parent_id: Option<String>,
    /// Free-form string annotations, copied on derivation.
    pub metadata: HashMap<String, String>,
}

impl Signal {
    /// Create a new root signal with a fresh id and timestamp.
    pub fn new(signal_type: impl Into<SignalType>, payload: serde_json::Value) -> Self {
        Self {
            id: generate_id(),
            signal_type: signal_type.into(),
            timestamp: Utc::now(),
            source: None,
            destination: None,
            payload,
            parent_id: None,
            metadata: HashMap::new(),
        }
    }

    /// Return a copy of this signal with the destination set.
    #[must_use]
    pub fn with_destination(&self, destination: impl Into<String>) -> Signal {
        let mut next = self.clone();
        next.destination = Some(destination.into());
        next
    }

    /// Return a copy of this signal with the source set.
    #[must_use]
    pub fn with_source(&self, source: impl Into<String>) -> Signal {
        let mut next = self.clone();
        next.source = Some(source.into());
        next
    }

    /// Return a copy of this signal with one metadata entry added.
    ///
    /// The new value wins on key collision. Calls chain:
    /// `sig.with_metadata("a", "1").with_metadata("b", "2")`.
    #[must_use]
    pub fn with_metadata(&self, key: impl Into<String>, value: impl Into<String>) -> Signal {
        let mut next = self.clone();
        next.metadata.insert(key.into(), value.into());
        next
    }

    /// Create a child signal with lineage tracking.
    ///
    /// The child gets a fresh id, `parent_id` pointing at this signal, the
    /// parent's destination as its source, and a copy of the parent's
    /// metadata.
    #[must_use]
    pub fn derive(&self, signal_type: impl Into<SignalType>, payload: serde_json::Value) -> Signal {
        let mut child = Signal::new(signal_type, payload);
        child.parent_id = Some(self.id.clone());
        child.source = self.destination.clone();
        child.metadata = self.metadata.clone();
        child
    }

    /// Decode the payload into a concrete type.
    ///
    /// Fails with [`AgentError::InvalidPayload`] when the payload does not
    /// match — the standard way for an agent to reject a mis-shaped signal.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, AgentError> {
        serde_json::from_value(self.payload.clone())
            .map_err(|_| AgentError::InvalidPayload(std::any::type_name::<T>()))
    }

    /// Shortened id for log lines.
    pub fn short_id(&self) -> String {
        truncate_id(&self.id)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Signal{{id={}, type={}, src={}, dest={}}}",
            self.short_id(),
            self.signal_type,
            self.source.as_deref().unwrap_or("-"),
            self.destination.as_deref().unwrap_or("-"),
        )
    }
}

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Build a process-unique signal id: `sig-{timestamp_nanos}-{counter}`.
///
/// The counter is strictly monotonic, so ids are unique even when the clock
/// ties or steps backwards.
fn generate_id() -> String {
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("sig-{nanos}-{counter}")
}

fn truncate_id(id: &str) -> String {
    if id.len() <= 20 {
        id.to_owned()
    } else {
        format!("{}...", &id[..17])
    }
}
