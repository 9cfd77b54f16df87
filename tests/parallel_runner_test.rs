use pool_sentinel::orchestrator::{run_parallel, AbortSignal, Orchestrator};
use pool_sentinel::pool::SimulatedPool;
use pool_sentinel::scenario::catalog::default_catalog;
use pool_sentinel::utils::config::HarnessConfig;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_parallel_run_preserves_input_order() {
    let cfg = HarnessConfig::default();
    let specs = default_catalog(&cfg);
    let labels: Vec<String> = specs.iter().map(|s| s.label().to_string()).collect();
    let pool_cfg = cfg.clone();
    let report = run_parallel(
        Arc::new(Orchestrator::new(cfg)),
        specs,
        move || SimulatedPool::bootstrap(&pool_cfg),
        4,
        AbortSignal::new(),
    )
    .await
    .unwrap();
    let got: Vec<String> = report
        .results
        .iter()
        .map(|r| r.spec.label().to_string())
        .collect();
    assert_eq!(got, labels);
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_parallel_matches_sequential_verdicts() {
    let cfg = HarnessConfig::default();
    let specs = default_catalog(&cfg);
    let orchestrator = Arc::new(Orchestrator::new(cfg.clone()));
    let sequential = orchestrator
        .run_all(&specs, || SimulatedPool::bootstrap(&cfg))
        .unwrap();
    let pool_cfg = cfg.clone();
    let parallel = run_parallel(
        Arc::clone(&orchestrator),
        specs,
        move || SimulatedPool::bootstrap(&pool_cfg),
        3,
        AbortSignal::new(),
    )
    .await
    .unwrap();
    assert_eq!(sequential.results.len(), parallel.results.len());
    for (a, b) in sequential.results.iter().zip(&parallel.results) {
        assert_eq!(a.invariant_verdicts, b.invariant_verdicts);
        assert_eq!(a.after, b.after);
    }
}

#[tokio::test]
async fn test_aborted_run_starts_nothing() {
    let cfg = HarnessConfig::default();
    let abort = AbortSignal::new();
    abort.abort();
    let pool_cfg = cfg.clone();
    let report = run_parallel(
        Arc::new(Orchestrator::new(cfg.clone())),
        default_catalog(&cfg),
        move || SimulatedPool::bootstrap(&pool_cfg),
        2,
        abort,
    )
    .await
    .unwrap();
    assert!(report.results.is_empty());
    assert_eq!(report.rejected.len(), default_catalog(&cfg).len());
    assert!(report.rejected[0].reason.contains("aborted"));
}

#[tokio::test]
async fn test_worker_panic_fails_the_run() {
    let cfg = HarnessConfig::default();
    let result = run_parallel(
        Arc::new(Orchestrator::new(cfg.clone())),
        default_catalog(&cfg),
        || -> Result<SimulatedPool, pool_sentinel::error::PoolError> { panic!("factory exploded") },
        2,
        AbortSignal::new(),
    )
    .await;
    let err = result.unwrap_err();
    assert!(err.to_string().contains("factory exploded"));
}

#[tokio::test]
async fn test_pool_setup_failure_stops_dispatch() {
    let cfg = HarnessConfig::default();
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let result = run_parallel(
        Arc::new(Orchestrator::new(cfg.clone())),
        default_catalog(&cfg),
        move || -> Result<SimulatedPool, pool_sentinel::error::PoolError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(pool_sentinel::error::PoolError::reverted("bad pool address"))
        },
        1,
        AbortSignal::new(),
    )
    .await;
    let err = result.unwrap_err();
    assert!(err.to_string().contains("pool setup failed"));
    assert!(err.to_string().contains("bad pool address"));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}
