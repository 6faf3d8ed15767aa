//! Shared store management across agents and memory kinds.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Deserialize;

use crate::store::{MemoryError, MemoryStore};

fn default_max_entries() -> usize {
    100
}

fn default_ttl_secs() -> Option<u64> {
    Some(24 * 60 * 60)
}

/// Global memory settings plus per-kind overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    /// Directory for JSON persistence. `None` keeps everything in memory.
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
    /// Entry cap applied when a kind has no override.
    #[serde(default = "default_max_entries")]
    pub default_max_entries: usize,
    /// TTL in seconds applied when a kind has no override. `None` disables
    /// expiry.
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: Option<u64>,
    /// Per-kind overrides, keyed by memory kind name.
    #[serde(default)]
    pub kinds: HashMap<String, MemoryKindConfig>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            storage_dir: None,
            default_max_entries: default_max_entries(),
            default_ttl_secs: default_ttl_secs(),
            kinds: HashMap::new(),
        }
    }
}

/// Overrides for one memory kind.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryKindConfig {
    /// Entry cap for this kind.
    #[serde(default)]
    pub max_entries: Option<usize>,
    /// TTL in seconds for this kind.
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

/// Hands out shared [`MemoryStore`]s keyed by `agent/kind`, creating (and
/// loading) them on first use.
pub struct MemoryManager {
    stores: RwLock<HashMap<String, Arc<MemoryStore>>>,
    config: MemoryConfig,
}

impl MemoryManager {
    /// Create a manager with the given configuration.
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            stores: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Create the storage directory when persistence is configured.
    pub async fn initialize(&self) -> Result<(), MemoryError> {
        if let Some(dir) = &self.config.storage_dir {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }

    /// The default "conversation" store for an agent.
    pub async fn store_for(&self, agent_name: &str) -> Arc<MemoryStore> {
        self.store_for_kind(agent_name, "conversation").await
    }

    /// The store for an agent and memory kind, created and loaded from disk
    /// on first request.
    pub async fn store_for_kind(&self, agent_name: &str, kind: &str) -> Arc<MemoryStore> {
        let key = format!("{agent_name}_{kind}");

        if let Some(store) = self.stores.read().get(&key) {
            return store.clone();
        }

        let (max_entries, ttl) = self.resolve_kind(kind);
        let store = Arc::new(MemoryStore::new(
            agent_name,
            kind,
            max_entries,
            ttl,
            self.config.storage_dir.as_deref(),
        ));
        if let Err(error) = store.load().await {
            tracing::warn!(agent = agent_name, kind, %error, "synapse.memory.load_failed");
        }

        // Another task may have created the store while we loaded; first
        // insertion wins so every caller shares one instance.
        let mut stores = self.stores.write();
        stores.entry(key).or_insert(store).clone()
    }

    /// Persist every store that has been handed out.
    pub async fn save_all(&self) -> Result<(), MemoryError> {
        let snapshot: Vec<(String, Arc<MemoryStore>)> = self
            .stores
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (key, store) in snapshot {
            store.save().await.map_err(|e| {
                tracing::error!(store = %key, error = %e, "synapse.memory.save_failed");
                e
            })?;
        }
        Ok(())
    }

    /// Flush all stores; call before dropping the manager.
    pub async fn shutdown(&self) -> Result<(), MemoryError> {
        self.save_all().await
    }

    fn resolve_kind(&self, kind: &str) -> (usize, Option<Duration>) {
        let mut max_entries = self.config.default_max_entries;
        let mut ttl_secs = self.config.default_ttl_secs;

        if let Some(overrides) = self.config.kinds.get(kind) {
            if let Some(m) = overrides.max_entries {
                max_entries = m;
            }
            if let Some(t) = overrides.ttl_secs {
                ttl_secs = Some(t);
            }
        }

        (max_entries, ttl_secs.map(Duration::from_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryEntry;

    #[tokio::test]
    async fn stores_are_shared_per_agent_and_kind() {
        let manager = MemoryManager::new(MemoryConfig::default());

        let a = manager.store_for("writer").await;
        let b = manager.store_for("writer").await;
        let other = manager.store_for_kind("writer", "scratch").await;

        a.add(MemoryEntry::new("user", "hello"));
        assert_eq!(b.stats().entries, 1, "same store must be shared");
        assert_eq!(other.stats().entries, 0, "kinds are separate");
    }

    #[tokio::test]
    async fn kind_overrides_apply() {
        let mut config = MemoryConfig {
            default_max_entries: 100,
            ..MemoryConfig::default()
        };
        config.kinds.insert(
            "tiny".to_owned(),
            MemoryKindConfig {
                max_entries: Some(2),
                ttl_secs: None,
            },
        );
        let manager = MemoryManager::new(config);

        let store = manager.store_for_kind("agent", "tiny").await;
        for i in 0..5 {
            store.add(MemoryEntry::new("user", format!("m{i}")));
        }
        assert_eq!(store.stats().entries, 2);
    }

    #[tokio::test]
    async fn save_all_persists_every_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = MemoryConfig {
            storage_dir: Some(dir.path().to_path_buf()),
            ..MemoryConfig::default()
        };
        let manager = MemoryManager::new(config.clone());
        manager.initialize().await.expect("init");

        manager
            .store_for("alpha")
            .await
            .add(MemoryEntry::new("user", "one"));
        manager
            .store_for("beta")
            .await
            .add(MemoryEntry::new("user", "two"));
        manager.save_all().await.expect("save_all");

        let reloaded = MemoryManager::new(config);
        let alpha = reloaded.store_for("alpha").await;
        assert_eq!(alpha.all().len(), 1);
        assert_eq!(alpha.all()[0].content, "one");
    }
}
