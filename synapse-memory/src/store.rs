//! The bounded conversation store.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Errors from memory persistence operations.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// I/O error while reading or writing the backing file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Entries could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A single conversation entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Who produced the entry ("user", "assistant", ...).
    pub role: String,
    /// The entry text.
    pub content: String,
    /// When the entry was recorded.
    pub timestamp: DateTime<Utc>,
    /// Optional free-form annotations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

impl MemoryEntry {
    /// Create an entry stamped with the current time.
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            timestamp: Utc::now(),
            metadata: None,
        }
    }
}

/// Size statistics for a store, see [`MemoryStore::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStats {
    /// Number of entries currently held (including not-yet-purged expired
    /// ones).
    pub entries: usize,
    /// Approximate content size in bytes.
    pub bytes: usize,
}

/// Conversation memory for a single agent.
///
/// Insertion is bounded: once `max_entries` is reached the oldest entry is
/// evicted. Expiry is lazy: entries older than the TTL are filtered out on
/// read, not eagerly removed.
pub struct MemoryStore {
    entries: RwLock<VecDeque<MemoryEntry>>,
    max_entries: usize,
    ttl: Option<Duration>,
    path: Option<PathBuf>,
}

impl MemoryStore {
    /// Create a store for `agent_name`/`kind`.
    ///
    /// When `storage_dir` is given, [`MemoryStore::save`] and
    /// [`MemoryStore::load`] use `{dir}/{agent_name}_{kind}.json`; otherwise
    /// both are no-ops. `ttl = None` disables expiry.
    pub fn new(
        agent_name: &str,
        kind: &str,
        max_entries: usize,
        ttl: Option<Duration>,
        storage_dir: Option<&Path>,
    ) -> Self {
        let path = storage_dir.map(|dir| dir.join(format!("{agent_name}_{kind}.json")));
        Self {
            entries: RwLock::new(VecDeque::new()),
            max_entries: max_entries.max(1),
            ttl,
            path,
        }
    }

    /// Append an entry, evicting the oldest when the store is full.
    pub fn add(&self, entry: MemoryEntry) {
        let mut entries = self.entries.write();
        entries.push_back(entry);
        while entries.len() > self.max_entries {
            entries.pop_front();
        }
    }

    /// The most recent `n` live entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<MemoryEntry> {
        let live = self.live_entries();
        let skip = live.len().saturating_sub(n);
        live.into_iter().skip(skip).collect()
    }

    /// All live entries, oldest first.
    pub fn all(&self) -> Vec<MemoryEntry> {
        self.live_entries()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Entry count and approximate byte size.
    pub fn stats(&self) -> MemoryStats {
        let entries = self.entries.read();
        let bytes = entries
            .iter()
            .map(|e| e.content.len() + e.role.len())
            .sum();
        MemoryStats {
            entries: entries.len(),
            bytes,
        }
    }

    /// Persist all entries as pretty-printed JSON. No-op without a storage
    /// path.
    pub async fn save(&self) -> Result<(), MemoryError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let snapshot: Vec<MemoryEntry> = self.entries.read().iter().cloned().collect();
        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| MemoryError::Serialization(e.to_string()))?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Replace the store's contents from the backing file. Missing file (or
    /// no storage path) leaves the store unchanged.
    pub async fn load(&self) -> Result<(), MemoryError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let data = match tokio::fs::read_to_string(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(MemoryError::Io(e)),
        };
        let loaded: Vec<MemoryEntry> = serde_json::from_str(&data)
            .map_err(|e| MemoryError::Serialization(e.to_string()))?;
        *self.entries.write() = loaded.into();
        Ok(())
    }

    fn live_entries(&self) -> Vec<MemoryEntry> {
        let now = Utc::now();
        let cutoff = self
            .ttl
            .map(|ttl| TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX));
        self.entries
            .read()
            .iter()
            .filter(|e| match cutoff {
                Some(cutoff) => now.signed_duration_since(e.timestamp) < cutoff,
                None => true,
            })
            .cloned()
            .collect()
    }
}
