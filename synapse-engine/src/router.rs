//! Agent registry and rule-based routing.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use synapse_types::{Agent, Signal};

/// A routing rule contributed by the embedder: inspect a signal, propose
/// destination agent ids. Returning an empty list means "does not apply".
pub type RoutingRule = Box<dyn Fn(&Signal) -> Vec<String> + Send + Sync>;

/// Maps a signal to a list of destination agent ids.
///
/// Routing priority:
/// 1. the signal's explicit destination, when that agent is registered;
/// 2. the first rule (in insertion order) whose candidates include at least
///    one registered agent.
///
/// Registry and rules live under one reader-writer lock so that a route
/// query observes a consistent view while agents register and unregister
/// concurrently.
pub struct Router {
    inner: RwLock<RouterInner>,
}

#[derive(Default)]
struct RouterInner {
    agents: HashMap<String, Arc<dyn Agent>>,
    rules: Vec<RoutingRule>,
}

impl Router {
    /// Create a router with an empty registry and no rules.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RouterInner::default()),
        }
    }

    /// Add an agent to the registry, replacing any agent with the same id.
    pub fn register(&self, agent: Arc<dyn Agent>) {
        let mut inner = self.inner.write();
        inner.agents.insert(agent.id().to_owned(), agent);
    }

    /// Remove an agent by id. Returns `false` when no such agent existed.
    pub fn unregister(&self, agent_id: &str) -> bool {
        let mut inner = self.inner.write();
        inner.agents.remove(agent_id).is_some()
    }

    /// Append a routing rule. Rules are evaluated in insertion order; the
    /// first one yielding a registered destination wins.
    pub fn add_rule(&self, rule: impl Fn(&Signal) -> Vec<String> + Send + Sync + 'static) {
        let mut inner = self.inner.write();
        inner.rules.push(Box::new(rule));
    }

    /// Resolve a signal to its destination agent ids.
    ///
    /// Returns an empty list when the signal is undeliverable.
    pub fn route(&self, signal: &Signal) -> Vec<String> {
        let inner = self.inner.read();

        if let Some(dest) = signal.destination.as_deref() {
            if inner.agents.contains_key(dest) {
                return vec![dest.to_owned()];
            }
        }

        for rule in &inner.rules {
            let candidates = rule(signal);
            if candidates.is_empty() {
                continue;
            }
            let valid: Vec<String> = candidates
                .into_iter()
                .filter(|dest| inner.agents.contains_key(dest))
                .collect();
            if !valid.is_empty() {
                return valid;
            }
        }

        Vec::new()
    }

    /// Look up an agent by id.
    pub fn agent(&self, agent_id: &str) -> Option<Arc<dyn Agent>> {
        self.inner.read().agents.get(agent_id).cloned()
    }

    /// Ids of all registered agents, in no particular order.
    pub fn agent_ids(&self) -> Vec<String> {
        self.inner.read().agents.keys().cloned().collect()
    }

    /// Number of registered agents.
    pub fn agent_count(&self) -> usize {
        self.inner.read().agents.len()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use synapse_types::FnAgent;

    fn noop_agent(id: &str) -> Arc<dyn Agent> {
        Arc::new(FnAgent::new(id, |_ctx, _signal| async move { Ok(vec![]) }))
    }

    #[test]
    fn register_and_lookup() {
        let router = Router::new();
        router.register(noop_agent("test-agent"));

        assert_eq!(router.agent_count(), 1);
        let agent = router.agent("test-agent").expect("agent registered");
        assert_eq!(agent.id(), "test-agent");
    }

    #[test]
    fn unregister_removes() {
        let router = Router::new();
        router.register(noop_agent("test"));
        assert!(router.unregister("test"));
        assert!(!router.unregister("test"));
        assert_eq!(router.agent_count(), 0);
    }

    #[test]
    fn explicit_destination_wins_over_rules() {
        let router = Router::new();
        router.register(noop_agent("a"));
        router.register(noop_agent("b"));
        router.add_rule(|signal| {
            if signal.signal_type == "x" {
                vec!["b".to_owned()]
            } else {
                vec![]
            }
        });

        let sig = Signal::new("x", json!(null)).with_destination("a");
        assert_eq!(router.route(&sig), vec!["a".to_owned()]);
    }

    #[test]
    fn missing_explicit_destination_falls_through_to_rules() {
        let router = Router::new();
        router.register(noop_agent("handler"));
        router.add_rule(|_signal| vec!["handler".to_owned()]);

        let sig = Signal::new("x", json!(null)).with_destination("ghost");
        assert_eq!(router.route(&sig), vec!["handler".to_owned()]);
    }

    #[test]
    fn rule_candidates_are_filtered_to_registered_agents() {
        let router = Router::new();
        router.register(noop_agent("handler"));
        router.add_rule(|signal| {
            if signal.signal_type == "special" {
                vec!["handler".to_owned(), "missing".to_owned()]
            } else {
                vec![]
            }
        });

        let sig = Signal::new("special", json!(null));
        assert_eq!(router.route(&sig), vec!["handler".to_owned()]);
    }

    #[test]
    fn first_matching_rule_wins() {
        let router = Router::new();
        router.register(noop_agent("first"));
        router.register(noop_agent("second"));
        router.add_rule(|_signal| vec!["first".to_owned()]);
        router.add_rule(|_signal| vec!["second".to_owned()]);

        let sig = Signal::new("any", json!(null));
        assert_eq!(router.route(&sig), vec!["first".to_owned()]);
    }

    #[test]
    fn rule_with_only_missing_agents_falls_through() {
        let router = Router::new();
        router.register(noop_agent("backup"));
        router.add_rule(|_signal| vec!["missing".to_owned()]);
        router.add_rule(|_signal| vec!["backup".to_owned()]);

        let sig = Signal::new("any", json!(null));
        assert_eq!(router.route(&sig), vec!["backup".to_owned()]);
    }

    #[test]
    fn no_match_is_empty() {
        let router = Router::new();
        let sig = Signal::new("unknown", json!(null));
        assert!(router.route(&sig).is_empty());
    }

    #[test]
    fn fanout_preserves_candidate_order() {
        let router = Router::new();
        router.register(noop_agent("w1"));
        router.register(noop_agent("w2"));
        router.register(noop_agent("w3"));
        router.add_rule(|_signal| {
            vec!["w1".to_owned(), "w2".to_owned(), "w3".to_owned()]
        });

        let sig = Signal::new("broadcast", json!(null));
        assert_eq!(
            router.route(&sig),
            vec!["w1".to_owned(), "w2".to_owned(), "w3".to_owned()]
        );
    }

    #[test]
    fn list_agents() {
        let router = Router::new();
        router.register(noop_agent("a"));
        router.register(noop_agent("b"));
        router.register(noop_agent("c"));

        let mut ids = router.agent_ids();
        ids.sort();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
