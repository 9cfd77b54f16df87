//! Scenario orchestration: snapshot, attack, snapshot, judge.

pub mod runner;

pub use runner::{run_parallel, AbortSignal};

use crate::agents::AttackerAgent;
use crate::error::{HarnessError, PoolError, RevertCategory, ScenarioError};
use crate::invariants::{
    default_checkers, CheckContext, HistoryProbe, InvariantChecker, InvariantVerdict,
};
use crate::pool::{AccountSnapshot, PoolCollaborator, PoolFacade, PoolSnapshot};
use crate::scenario::{RawScenario, ScenarioSpec};
use crate::utils::config::HarnessConfig;
use crate::utils::error::compact_error_message;
use serde::Serialize;
use std::fmt;
use std::time::Instant;

const MAX_REASON_LEN: usize = 240;

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub spec: ScenarioSpec,
    pub before: PoolSnapshot,
    pub after: PoolSnapshot,
    pub reverted: bool,
    pub revert_reason: Option<String>,
    pub revert_category: Option<RevertCategory>,
    pub attacker_before: AccountSnapshot,
    pub attacker_after: AccountSnapshot,
    pub invariant_verdicts: Vec<InvariantVerdict>,
    pub notes: Vec<String>,
    pub elapsed_ms: u64,
}

impl ScenarioResult {
    pub fn violations(&self) -> impl Iterator<Item = &InvariantVerdict> {
        self.invariant_verdicts.iter().filter(|v| v.is_violation())
    }

    pub fn passed(&self) -> bool {
        self.violations().next().is_none()
    }

    pub fn verdict(&self, name: &str) -> Option<&InvariantVerdict> {
        self.invariant_verdicts.iter().find(|v| v.name == name)
    }
}

/// A scenario refused before the pool was touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedScenario {
    pub label: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub scenarios: usize,
    pub passed: usize,
    pub verdicts: usize,
    pub violations: usize,
    pub unevaluated: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub results: Vec<ScenarioResult>,
    pub rejected: Vec<RejectedScenario>,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        let verdicts = self.results.iter().flat_map(|r| r.invariant_verdicts.iter());
        let (mut total, mut violations, mut unevaluated) = (0, 0, 0);
        for v in verdicts {
            total += 1;
            if v.is_violation() {
                violations += 1;
            }
            if !v.evaluated {
                unevaluated += 1;
            }
        }
        RunSummary {
            scenarios: self.results.len(),
            passed: self.results.iter().filter(|r| r.passed()).count(),
            verdicts: total,
            violations,
            unevaluated,
            rejected: self.rejected.len(),
        }
    }

    /// Non-zero when any invariant was violated or any scenario was refused.
    pub fn exit_code(&self) -> i32 {
        let summary = self.summary();
        if summary.violations > 0 || summary.rejected > 0 {
            1
        } else {
            0
        }
    }

    pub fn reject(&mut self, label: &str, reason: impl fmt::Display) {
        self.rejected.push(RejectedScenario {
            label: label.to_string(),
            reason: reason.to_string(),
        });
    }
}

pub struct Orchestrator {
    cfg: HarnessConfig,
    checkers: Vec<Box<dyn InvariantChecker>>,
}

impl Orchestrator {
    pub fn new(cfg: HarnessConfig) -> Self {
        Self::with_checkers(cfg, default_checkers())
    }

    pub fn with_checkers(cfg: HarnessConfig, checkers: Vec<Box<dyn InvariantChecker>>) -> Self {
        Self { cfg, checkers }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.cfg
    }

    /// Gate and agent construction. Everything here happens before the pool is touched.
    pub fn prepare(&self, spec: &ScenarioSpec) -> Result<AttackerAgent, ScenarioError> {
        if !self.cfg.kind_enabled(spec.kind()) {
            return Err(ScenarioError::UnsupportedScenario(format!(
                "{} (disabled for this run)",
                spec.kind()
            )));
        }
        AttackerAgent::for_spec(spec, &self.cfg)
    }

    pub fn run_scenario<P>(
        &self,
        pool: &mut P,
        spec: &ScenarioSpec,
    ) -> Result<ScenarioResult, ScenarioError>
    where
        P: PoolCollaborator + Clone,
    {
        let agent = self.prepare(spec)?;
        let started = Instant::now();
        let ids = self.cfg.identities;

        let baseline = agent.baseline().map(|honest| {
            let mut fork = pool.clone();
            let mut facade = PoolFacade::new(&mut fork);
            let outcome = honest.attack(&mut facade, &ids);
            if let Err(err) = &outcome.result {
                tracing::debug!("[SCENARIO] {} baseline reverted: {}", spec.label(), err);
            }
            facade.read_snapshot()
        });

        let mut facade = PoolFacade::new(pool);
        let before = facade.read_snapshot();
        let attacker_before = facade.balances(ids.attacker);
        let probe_at = facade.now();
        let probe_before = cumulative_at(&facade, 0);

        tracing::debug!("[SCENARIO] {} ({}) starting", spec.label(), spec.kind());
        let outcome = agent.attack(&mut facade, &ids);

        let after = facade.read_snapshot();
        let attacker_after = facade.balances(ids.attacker);
        let age = facade.now().saturating_sub(probe_at);
        let probe_after = cumulative_at(&facade, age);
        let history = HistoryProbe {
            at_timestamp: probe_at,
            before: probe_before,
            after: probe_after,
        };

        let ctx = CheckContext {
            spec,
            before: &before,
            after: &after,
            attacker_before: &attacker_before,
            attacker_after: &attacker_after,
            outcome: &outcome,
            baseline: baseline.as_ref(),
            history: &history,
            fee_pips: facade.fee_pips(),
        };
        let invariant_verdicts: Vec<InvariantVerdict> = self
            .checkers
            .iter()
            .filter(|c| c.applies(spec.kind()))
            .flat_map(|c| c.check(&ctx))
            .collect();

        let err = outcome.result.as_ref().err();
        let result = ScenarioResult {
            spec: spec.clone(),
            before,
            after,
            reverted: err.is_some(),
            revert_reason: err.map(|e| compact_error_message(&e.to_string(), MAX_REASON_LEN)),
            revert_category: err.map(|e| e.category()),
            attacker_before,
            attacker_after,
            invariant_verdicts,
            notes: outcome.evidence.notes.clone(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        log_result(&result);
        Ok(result)
    }

    /// Runs specs one after another, each on a fresh pool from `factory`. A factory failure
    /// stops the run: no later scenario executes.
    pub fn run_all<P, F>(
        &self,
        specs: &[ScenarioSpec],
        mut factory: F,
    ) -> crate::error::Result<RunReport>
    where
        P: PoolCollaborator + Clone,
        F: FnMut() -> Result<P, PoolError>,
    {
        let mut report = RunReport::default();
        for spec in specs {
            if let Err(err) = self.prepare(spec) {
                tracing::warn!("[SCENARIO] {} rejected: {}", spec.label(), err);
                report.reject(spec.label(), err);
                continue;
            }
            let mut pool = factory().map_err(|source| {
                tracing::error!("[SCENARIO] {} pool setup failed: {}", spec.label(), source);
                HarnessError::Setup {
                    label: spec.label().to_string(),
                    source,
                }
            })?;
            match self.run_scenario(&mut pool, spec) {
                Ok(result) => report.results.push(result),
                Err(err) => report.reject(spec.label(), err),
            }
        }
        Ok(report)
    }

    /// Parses externally supplied scenarios; unknown kinds are rejected, never run.
    pub fn run_raw<P, F>(
        &self,
        raw: Vec<RawScenario>,
        factory: F,
    ) -> crate::error::Result<RunReport>
    where
        P: PoolCollaborator + Clone,
        F: FnMut() -> Result<P, PoolError>,
    {
        let mut parse_failures = RunReport::default();
        let mut specs = Vec::with_capacity(raw.len());
        for scenario in raw {
            let label = if scenario.label.is_empty() {
                scenario.kind.clone()
            } else {
                scenario.label.clone()
            };
            match ScenarioSpec::try_from(scenario) {
                Ok(spec) => specs.push(spec),
                Err(err) => {
                    tracing::warn!("[SCENARIO] {} rejected: {}", label, err);
                    parse_failures.reject(&label, err);
                }
            }
        }
        let mut report = self.run_all(&specs, factory)?;
        parse_failures.rejected.append(&mut report.rejected);
        report.rejected = parse_failures.rejected;
        Ok(report)
    }
}

fn cumulative_at<P: PoolCollaborator + ?Sized>(
    facade: &PoolFacade<'_, P>,
    seconds_ago: u32,
) -> Result<i64, PoolError> {
    facade
        .observe(&[seconds_ago])?
        .first()
        .map(|o| o.tick_cumulative)
        .ok_or_else(|| PoolError::reverted("observe returned no value"))
}

fn log_result(result: &ScenarioResult) {
    let violations: Vec<&str> = result.violations().map(|v| v.name.as_str()).collect();
    if violations.is_empty() {
        tracing::info!(
            "[SCENARIO] {} passed ({} verdicts, reverted={}, {}ms)",
            result.spec.label(),
            result.invariant_verdicts.len(),
            result.reverted,
            result.elapsed_ms
        );
    } else {
        tracing::warn!(
            "[SCENARIO] {} VIOLATED: {}",
            result.spec.label(),
            violations.join(", ")
        );
    }
}
