//! # synapse-engine — signal routing and dispatch
//!
//! The dispatch substrate of synapse: a [`Router`] mapping signals to
//! destination agents, and an [`Engine`] driving a bounded inbox through a
//! fixed worker pool with per-agent processing deadlines.
//!
//! ```no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use synapse_engine::{Engine, EngineConfig, Router};
//! use synapse_types::{FnAgent, Signal};
//!
//! # async fn run() -> Result<(), synapse_types::EngineError> {
//! let router = Arc::new(Router::new());
//! router.register(Arc::new(FnAgent::new("printer", |_ctx, signal: Signal| async move {
//!     println!("{signal}");
//!     Ok(vec![])
//! })));
//! router.add_rule(|_signal| vec!["printer".to_owned()]);
//!
//! let engine = Engine::new(EngineConfig::default(), router);
//! engine.start();
//! engine.submit(Signal::new("greeting", json!("hello"))).await?;
//! engine.stop().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod engine;
mod hooks;
mod router;

pub use config::EngineConfig;
pub use engine::{Engine, EngineStats};
pub use hooks::{ErrorHook, ProcessedHook, ReceivedHook};
pub use router::{Router, RoutingRule};
