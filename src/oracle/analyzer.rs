//! TWAP manipulation resistance.
//!
//! An attacker who moves the tick by at most `max_tick_delta` and holds it for `elapsed` seconds
//! can shift a window's cumulative delta by at most `max_tick_delta * elapsed`. Dividing by the
//! window length gives the usual TWAP bound; the check stays in integers.

use crate::agents::OracleEvidence;
use crate::error::PoolError;
use crate::invariants::{CheckContext, InvariantChecker, InvariantVerdict};
use crate::oracle::TickWindow;
use crate::scenario::ScenarioKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManipulationBound {
    /// `|delta_after - delta_before|`.
    pub observed: i128,
    /// `max_tick_delta * elapsed_seconds`.
    pub allowed: i128,
}

impl ManipulationBound {
    pub fn holds(&self) -> bool {
        self.observed <= self.allowed
    }
}

pub struct ManipulationAnalyzer;

impl ManipulationAnalyzer {
    pub fn bound(
        before: &TickWindow,
        after: &TickWindow,
        max_tick_delta: u32,
        elapsed_seconds: u32,
    ) -> ManipulationBound {
        let observed = (after.tick_delta() as i128 - before.tick_delta() as i128).abs();
        ManipulationBound {
            observed,
            allowed: max_tick_delta as i128 * elapsed_seconds as i128,
        }
    }

    fn twap_bound(evidence: &OracleEvidence) -> InvariantVerdict {
        const NAME: &str = "twap-manipulation-bound";
        if evidence.window_seconds <= evidence.block_seconds {
            return InvariantVerdict::unevaluated(
                NAME,
                format!(
                    "window {}s does not exceed block time {}s",
                    evidence.window_seconds, evidence.block_seconds
                ),
            );
        }
        let (before, after) = match (&evidence.twap_before, &evidence.twap_after) {
            (Ok(before), Some(Ok(after))) => (before, after),
            (Err(e), _) | (_, Some(Err(e))) => {
                return InvariantVerdict::unevaluated(NAME, format!("window read failed: {e}"))
            }
            (_, None) => {
                return InvariantVerdict::unevaluated(NAME, "manipulation did not complete")
            }
        };
        let max_tick_delta = evidence
            .ticks_during
            .iter()
            .map(|t| t.abs_diff(evidence.tick_before))
            .max()
            .unwrap_or(0);
        let bound = Self::bound(before, after, max_tick_delta, evidence.block_seconds);
        InvariantVerdict::check(
            NAME,
            bound.holds(),
            format!(
                "|dcum| {} <= {} (max tick move {} over {}s, window {}s); mean tick {:?} -> {:?}",
                bound.observed,
                bound.allowed,
                max_tick_delta,
                evidence.block_seconds,
                evidence.window_seconds,
                before.arithmetic_mean_tick(),
                after.arithmetic_mean_tick()
            ),
        )
    }

    fn read_idempotent(evidence: &OracleEvidence) -> InvariantVerdict {
        const NAME: &str = "oracle-read-idempotent";
        match (&evidence.twap_before, &evidence.twap_before_repeat) {
            (Ok(a), Ok(b)) => InvariantVerdict::check(
                NAME,
                a == b,
                format!("repeated observe: {:?} vs {:?}", a, b),
            ),
            (a, b) => InvariantVerdict::check(NAME, a == b, format!("reads: {:?} vs {:?}", a, b)),
        }
    }

    fn lookback_bounded(evidence: &OracleEvidence) -> InvariantVerdict {
        const NAME: &str = "oracle-lookback-bounded";
        match &evidence.lookback_probe {
            Err(PoolError::UnsupportedLookback {
                requested,
                available,
            }) => InvariantVerdict::held(
                NAME,
                format!("{requested}s rejected with {available}s of history"),
            ),
            Err(other) => {
                InvariantVerdict::violated(NAME, format!("unexpected failure: {other}"))
            }
            Ok(value) => InvariantVerdict::violated(
                NAME,
                format!(
                    "read {}s back, past recorded history, returned {value}",
                    evidence.lookback_seconds
                ),
            ),
        }
    }
}

impl InvariantChecker for ManipulationAnalyzer {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn applies(&self, kind: ScenarioKind) -> bool {
        kind == ScenarioKind::OracleManipulation
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<InvariantVerdict> {
        let Some(evidence) = &ctx.outcome.evidence.oracle else {
            return vec![InvariantVerdict::unevaluated(
                "twap-manipulation-bound",
                "no oracle evidence recorded",
            )];
        };
        vec![
            Self::twap_bound(evidence),
            Self::read_idempotent(evidence),
            Self::lookback_bounded(evidence),
        ]
    }
}
