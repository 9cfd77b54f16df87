use pool_sentinel::orchestrator::{run_parallel, AbortSignal, Orchestrator};
use pool_sentinel::pool::SimulatedPool;
use pool_sentinel::scenario::catalog::default_catalog;
use pool_sentinel::utils::config::HarnessConfig;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pool_sentinel::utils::env_guard::harden_env_setup();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        eprintln!("[STARTUP] RUST_LOG invalid or unset; defaulting to 'info'");
        tracing_subscriber::EnvFilter::new("info")
    });
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cfg = match HarnessConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("[STARTUP] Configuration rejected: {}", e);
            std::process::exit(2);
        }
    };
    tracing::info!(
        "[STARTUP] pool {:#x} fee {} pips, block {}s, {} worker(s)",
        cfg.pool_address,
        cfg.fee_pips,
        cfg.block_seconds,
        cfg.max_parallel
    );

    // Every scenario forks this pool; a collaborator that cannot be built halts the run.
    let template = match SimulatedPool::bootstrap(&cfg) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("[STARTUP] Pool setup failed: {}", e);
            std::process::exit(2);
        }
    };

    let specs = default_catalog(&cfg);
    let max_parallel = cfg.max_parallel;
    let report_json = cfg.report_json;
    let orchestrator = Arc::new(Orchestrator::new(cfg));
    let report = run_parallel(
        orchestrator,
        specs,
        move || Ok(template.clone()),
        max_parallel,
        AbortSignal::new(),
    )
    .await?;

    if report_json {
        for result in &report.results {
            println!("{}", serde_json::to_string(result)?);
        }
        for rejected in &report.rejected {
            println!("{}", serde_json::to_string(rejected)?);
        }
    }

    let summary = report.summary();
    if report_json {
        println!("{}", serde_json::to_string(&summary)?);
    }
    tracing::info!(
        "[RUN] {} scenario(s), {} passed, {} verdict(s), {} violation(s), {} unevaluated, {} rejected",
        summary.scenarios,
        summary.passed,
        summary.verdicts,
        summary.violations,
        summary.unevaluated,
        summary.rejected
    );
    for result in report.results.iter().filter(|r| !r.passed()) {
        for violation in result.violations() {
            tracing::warn!(
                "[RUN] {} :: {} :: {}",
                result.spec.label(),
                violation.name,
                violation.detail
            );
        }
    }

    std::process::exit(report.exit_code());
}
