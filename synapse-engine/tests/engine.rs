//! Integration tests for the dispatch engine.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use synapse_engine::{Engine, EngineConfig, Router};
use synapse_types::{Agent, AgentError, EngineError, FnAgent, ProcessContext, Signal};

// ============================================================================
// Shared test helpers
// ============================================================================

/// Poll `condition` until it holds or the deadline passes.
async fn wait_until(condition: impl Fn() -> bool, deadline: Duration) -> bool {
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// An agent that counts invocations and emits nothing.
fn counting_agent(id: &str, counter: Arc<AtomicU32>) -> Arc<dyn Agent> {
    Arc::new(FnAgent::new(id, move |_ctx, _signal| {
        counter.fetch_add(1, Ordering::SeqCst);
        std::future::ready(Ok(vec![]))
    }))
}

fn single_worker_config() -> EngineConfig {
    EngineConfig {
        worker_count: 1,
        ..EngineConfig::default()
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn start_and_stop_are_idempotent() {
    let engine = Engine::new(EngineConfig::default(), Arc::new(Router::new()));
    assert!(!engine.is_running());

    engine.start();
    engine.start();
    assert!(engine.is_running());

    engine.stop().await;
    engine.stop().await;
    assert!(!engine.is_running());
}

#[tokio::test]
async fn submit_fails_when_not_running() {
    let engine = Engine::new(EngineConfig::default(), Arc::new(Router::new()));

    let err = engine.submit(Signal::new("test", json!(null))).await.unwrap_err();
    assert!(matches!(err, EngineError::NotRunning));
    assert!(!engine.try_submit(Signal::new("test", json!(null))));

    let err = engine
        .submit_with_timeout(Signal::new("test", json!(null)), Duration::from_millis(10))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotRunning));
}

#[tokio::test]
async fn stats_reflect_configuration() {
    let config = EngineConfig {
        buffer_size: 50,
        worker_count: 3,
        process_timeout: Duration::from_secs(10),
    };
    let engine = Engine::new(config, Arc::new(Router::new()));
    engine.start();

    let stats = engine.stats();
    assert!(stats.running);
    assert_eq!(stats.worker_count, 3);
    assert_eq!(stats.buffer_size, 50);
    assert_eq!(stats.buffer_used, 0);
    assert_eq!(stats.process_timeout, Duration::from_secs(10));

    engine.stop().await;
    assert!(!engine.stats().running);
}

#[tokio::test]
async fn degenerate_worker_count_is_coerced_to_one() {
    let config = EngineConfig {
        worker_count: 0,
        ..EngineConfig::default()
    };
    let engine = Engine::new(config, Arc::new(Router::new()));
    assert_eq!(engine.stats().worker_count, 1);
}

// ============================================================================
// Dispatch
// ============================================================================

#[tokio::test]
async fn signals_reach_the_routed_agent() {
    let processed = Arc::new(AtomicU32::new(0));

    let router = Arc::new(Router::new());
    router.register(counting_agent("processor", processed.clone()));
    router.add_rule(|_signal| vec!["processor".to_owned()]);

    let engine = Engine::new(single_worker_config(), router);
    engine.start();

    for _ in 0..10 {
        engine
            .submit(Signal::new("test", json!(null)))
            .await
            .expect("submit");
    }

    let done = {
        let processed = processed.clone();
        wait_until(move || processed.load(Ordering::SeqCst) == 10, Duration::from_secs(2)).await
    };
    assert!(done, "expected 10 processed signals");
    engine.stop().await;
}

#[tokio::test]
async fn three_stage_pipeline_runs_in_order() {
    let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    let router = Arc::new(Router::new());
    {
        let order = order.clone();
        router.register(Arc::new(FnAgent::new("A", move |_ctx, signal: Signal| {
            order.lock().push("A");
            std::future::ready(Ok(vec![signal.derive("b-sig", json!(null)).with_destination("B")]))
        })));
    }
    {
        let order = order.clone();
        router.register(Arc::new(FnAgent::new("B", move |_ctx, signal: Signal| {
            order.lock().push("B");
            std::future::ready(Ok(vec![signal.derive("c-sig", json!(null)).with_destination("C")]))
        })));
    }
    {
        let order = order.clone();
        router.register(Arc::new(FnAgent::new("C", move |_ctx, _signal| {
            order.lock().push("C");
            std::future::ready(Ok(vec![]))
        })));
    }

    let engine = Engine::new(single_worker_config(), router);
    engine.start();

    engine
        .submit(Signal::new("start", json!(null)).with_destination("A"))
        .await
        .expect("submit");

    let done = {
        let order = order.clone();
        wait_until(move || order.lock().len() == 3, Duration::from_secs(2)).await
    };
    assert!(done, "pipeline did not complete");
    engine.stop().await;

    assert_eq!(*order.lock(), vec!["A", "B", "C"]);
}

#[tokio::test]
async fn hooks_fire_for_received_and_processed() {
    let received = Arc::new(AtomicU32::new(0));
    let processed = Arc::new(AtomicU32::new(0));
    let errors = Arc::new(AtomicU32::new(0));

    let router = Arc::new(Router::new());
    router.register(Arc::new(FnAgent::new("handler", |_ctx, _signal| {
        std::future::ready(Ok(vec![]))
    })));
    router.add_rule(|_signal| vec!["handler".to_owned()]);

    let engine = Engine::new(single_worker_config(), router);
    {
        let received = received.clone();
        engine.on_signal_received(move |_signal| {
            received.fetch_add(1, Ordering::SeqCst);
        });
    }
    {
        let processed = processed.clone();
        engine.on_signal_processed(move |_signal, _result| {
            processed.fetch_add(1, Ordering::SeqCst);
        });
    }
    {
        let errors = errors.clone();
        engine.on_error(move |_signal, _error| {
            errors.fetch_add(1, Ordering::SeqCst);
        });
    }

    engine.start();
    engine
        .submit(Signal::new("test", json!(null)))
        .await
        .expect("submit");

    let done = {
        let processed = processed.clone();
        wait_until(move || processed.load(Ordering::SeqCst) == 1, Duration::from_secs(2)).await
    };
    assert!(done);
    engine.stop().await;

    assert_eq!(received.load(Ordering::SeqCst), 1);
    assert_eq!(processed.load(Ordering::SeqCst), 1);
    assert_eq!(errors.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn received_order_matches_submit_order_with_one_worker() {
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let router = Arc::new(Router::new());
    router.register(Arc::new(FnAgent::new("sink", |_ctx, _signal| {
        std::future::ready(Ok(vec![]))
    })));
    router.add_rule(|_signal| vec!["sink".to_owned()]);

    let engine = Engine::new(single_worker_config(), router);
    {
        let seen = seen.clone();
        engine.on_signal_received(move |signal| {
            seen.lock().push(signal.id.clone());
        });
    }
    engine.start();

    let mut submitted = Vec::new();
    for _ in 0..20 {
        let signal = Signal::new("test", json!(null));
        submitted.push(signal.id.clone());
        engine.submit(signal).await.expect("submit");
    }

    let done = {
        let seen = seen.clone();
        wait_until(move || seen.lock().len() == 20, Duration::from_secs(2)).await
    };
    assert!(done);
    engine.stop().await;

    assert_eq!(*seen.lock(), submitted);
}

#[tokio::test]
async fn undeliverable_signal_reports_no_destination() {
    let errors: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let engine = Engine::new(single_worker_config(), Arc::new(Router::new()));
    {
        let errors = errors.clone();
        engine.on_error(move |_signal, error| {
            errors.lock().push(error.to_string());
        });
    }
    engine.start();

    engine
        .submit(Signal::new("orphan", json!(null)))
        .await
        .expect("submit");

    let done = {
        let errors = errors.clone();
        wait_until(move || !errors.lock().is_empty(), Duration::from_secs(2)).await
    };
    assert!(done);
    engine.stop().await;

    let errors = errors.lock();
    assert!(errors[0].contains("no destination"), "got: {}", errors[0]);
    assert!(errors[0].contains("orphan"));
}

// ============================================================================
// Fanout and timeouts
// ============================================================================

#[tokio::test]
async fn slow_agent_observes_cancellation_while_siblings_complete() {
    let fast_count = Arc::new(AtomicU32::new(0));
    let errors: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let router = Arc::new(Router::new());
    router.register(Arc::new(FnAgent::new("slow", |ctx: ProcessContext, _signal| async move {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(60)) => Ok(vec![]),
            _ = ctx.cancelled() => Err(AgentError::Cancelled),
        }
    })));
    router.register(counting_agent("fast", fast_count.clone()));
    router.add_rule(|signal| {
        if signal.signal_type == "fan" {
            vec!["slow".to_owned(), "fast".to_owned()]
        } else {
            vec![]
        }
    });

    let config = EngineConfig {
        worker_count: 1,
        process_timeout: Duration::from_millis(50),
        ..EngineConfig::default()
    };
    let engine = Engine::new(config, router);
    {
        let errors = errors.clone();
        engine.on_error(move |signal, error| {
            errors
                .lock()
                .push(format!("{}: {error}", signal.destination.as_deref().unwrap_or("-")));
        });
    }
    engine.start();

    engine
        .submit(Signal::new("fan", json!(null)))
        .await
        .expect("submit");

    let done = {
        let fast_count = fast_count.clone();
        wait_until(move || fast_count.load(Ordering::SeqCst) == 1, Duration::from_secs(2)).await
    };
    assert!(done, "fast sibling should complete despite the slow one");
    engine.stop().await;

    let errors = errors.lock();
    assert_eq!(errors.len(), 1, "exactly one branch should error: {errors:?}");
    assert!(errors[0].starts_with("slow:"));
    assert!(errors[0].contains("cancelled"));
}

// ============================================================================
// Backpressure
// ============================================================================

#[tokio::test]
async fn try_submit_returns_false_when_inbox_is_full() {
    let entered = Arc::new(tokio::sync::Notify::new());
    let release = Arc::new(tokio::sync::Semaphore::new(0));

    let router = Arc::new(Router::new());
    {
        let entered = entered.clone();
        let release = release.clone();
        router.register(Arc::new(FnAgent::new("gate", move |_ctx, _signal| {
            let entered = entered.clone();
            let release = release.clone();
            async move {
                entered.notify_one();
                release
                    .acquire()
                    .await
                    .expect("gate semaphore open")
                    .forget();
                Ok(vec![])
            }
        })));
    }
    router.add_rule(|_signal| vec!["gate".to_owned()]);

    let config = EngineConfig {
        buffer_size: 1,
        worker_count: 1,
        ..EngineConfig::default()
    };
    let engine = Engine::new(config, router);
    engine.start();

    // First signal occupies the single worker...
    engine
        .submit(Signal::new("t", json!(null)))
        .await
        .expect("submit");
    entered.notified().await;

    // ...second fills the one-slot buffer...
    assert!(engine.try_submit(Signal::new("t", json!(null))));
    // ...third has nowhere to go.
    assert!(!engine.try_submit(Signal::new("t", json!(null))));

    let err = engine
        .submit_with_timeout(Signal::new("t", json!(null)), Duration::from_millis(20))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::SubmitTimeout(_)));

    release.add_permits(2);
    engine.stop().await;
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test]
async fn stop_drains_queued_signals() {
    let processed = Arc::new(AtomicU32::new(0));

    let router = Arc::new(Router::new());
    router.register(counting_agent("counter", processed.clone()));
    router.add_rule(|_signal| vec!["counter".to_owned()]);

    let config = EngineConfig {
        buffer_size: 200,
        worker_count: 2,
        ..EngineConfig::default()
    };
    let engine = Engine::new(config, router);
    engine.start();

    for _ in 0..100 {
        engine
            .submit(Signal::new("count", json!(null)))
            .await
            .expect("submit");
    }

    engine.stop().await;
    assert_eq!(processed.load(Ordering::SeqCst), 100);
    assert_eq!(engine.stats().buffer_used, 0);
}

#[tokio::test]
async fn concurrent_submitters_all_get_processed() {
    let processed = Arc::new(AtomicU32::new(0));

    let router = Arc::new(Router::new());
    router.register(counting_agent("handler", processed.clone()));
    router.add_rule(|_signal| vec!["handler".to_owned()]);

    let config = EngineConfig {
        buffer_size: 100,
        worker_count: 4,
        ..EngineConfig::default()
    };
    let engine = Arc::new(Engine::new(config, router));
    engine.start();

    let mut tasks = Vec::new();
    for _ in 0..10 {
        let engine = engine.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..10 {
                engine
                    .submit(Signal::new("test", json!(null)))
                    .await
                    .expect("submit");
            }
        }));
    }
    for task in tasks {
        task.await.expect("submitter task");
    }

    engine.stop().await;
    assert_eq!(processed.load(Ordering::SeqCst), 100);
}
