use super::{Orchestrator, RunReport, ScenarioResult};
use crate::error::{HarnessError, PoolError, ScenarioError};
use crate::pool::PoolCollaborator;
use crate::scenario::ScenarioSpec;
use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Cooperative cancellation shared by every worker. Scenarios that have not started when it is
/// raised are skipped; running ones finish.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    flag: Arc<AtomicBool>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

fn panic_payload_to_string(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        return (*s).to_string();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    "panic (unknown payload)".to_string()
}

enum WorkerOutcome {
    Done(Box<ScenarioResult>),
    Rejected(String),
    SetupFailed(PoolError),
}

/// Parallel scenario runner.
///
/// Each scenario gets its own `spawn_blocking` thread and its own pool from `factory`, so no
/// state is shared between scenarios. At most `max_parallel` run at once. Results come back in
/// input order. A worker panic or a pool factory failure fails the whole run; after a factory
/// failure no further scenario is dispatched.
pub async fn run_parallel<P, F>(
    orchestrator: Arc<Orchestrator>,
    specs: Vec<ScenarioSpec>,
    factory: F,
    max_parallel: usize,
    abort: AbortSignal,
) -> Result<RunReport>
where
    P: PoolCollaborator + Clone + Send + 'static,
    F: Fn() -> std::result::Result<P, PoolError> + Send + Sync + 'static,
{
    let factory = Arc::new(factory);
    let semaphore = Arc::new(Semaphore::new(max_parallel.max(1)));
    let mut join_set = JoinSet::new();
    let halted = AbortSignal::new();
    let total = specs.len();
    let mut labels = Vec::with_capacity(total);

    for (index, spec) in specs.into_iter().enumerate() {
        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .map_err(|e| anyhow!("scenario semaphore closed: {e}"))?;
        if halted.is_aborted() {
            break;
        }
        labels.push(spec.label().to_string());
        let orchestrator = Arc::clone(&orchestrator);
        let factory = Arc::clone(&factory);
        let abort = abort.clone();
        let halted = halted.clone();
        join_set.spawn_blocking(move || {
            let _permit = permit;
            if abort.is_aborted() || halted.is_aborted() {
                return (index, WorkerOutcome::Rejected(ScenarioError::Aborted.to_string()));
            }
            if let Err(err) = orchestrator.prepare(&spec) {
                tracing::warn!("[RUN] {} rejected: {}", spec.label(), err);
                return (index, WorkerOutcome::Rejected(err.to_string()));
            }
            let mut pool = match factory() {
                Ok(pool) => pool,
                Err(err) => {
                    tracing::error!("[RUN] {} pool setup failed: {}", spec.label(), err);
                    halted.abort();
                    return (index, WorkerOutcome::SetupFailed(err));
                }
            };
            match orchestrator.run_scenario(&mut pool, &spec) {
                Ok(result) => (index, WorkerOutcome::Done(Box::new(result))),
                Err(err) => (index, WorkerOutcome::Rejected(err.to_string())),
            }
        });
    }

    let mut slots: Vec<Option<WorkerOutcome>> = (0..labels.len()).map(|_| None).collect();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((index, outcome)) => slots[index] = Some(outcome),
            Err(e) => {
                join_set.abort_all();
                let reason = if e.is_panic() {
                    panic_payload_to_string(e.into_panic())
                } else {
                    e.to_string()
                };
                tracing::error!("[RUN] scenario worker failed: {}", reason);
                return Err(anyhow!("scenario worker failed: {reason}"));
            }
        }
    }

    let mut report = RunReport::default();
    for (label, slot) in labels.iter().zip(slots) {
        match slot {
            Some(WorkerOutcome::Done(result)) => report.results.push(*result),
            Some(WorkerOutcome::Rejected(reason)) => report.reject(label, reason),
            Some(WorkerOutcome::SetupFailed(source)) => {
                return Err(HarnessError::Setup {
                    label: label.clone(),
                    source,
                }
                .into())
            }
            None => return Err(anyhow!("scenario `{label}` produced no outcome")),
        }
    }
    tracing::info!(
        "[RUN] {} scenario(s) finished, {} rejected",
        report.results.len(),
        report.rejected.len()
    );
    Ok(report)
}
