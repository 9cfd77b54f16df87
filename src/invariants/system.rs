use super::{CheckContext, InvariantChecker, InvariantVerdict};
use crate::error::PoolError;
use crate::pool::PoolSnapshot;
use crate::scenario::ScenarioKind;

/// Properties every scenario must preserve regardless of kind.
pub struct SystemInvariants;

impl InvariantChecker for SystemInvariants {
    fn name(&self) -> &'static str {
        "system"
    }

    fn applies(&self, _kind: ScenarioKind) -> bool {
        true
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<InvariantVerdict> {
        vec![
            lock_released(ctx),
            reserves_on_revert(ctx),
            history_immutable(ctx),
            index_advances(ctx.before, ctx.after),
        ]
    }
}

fn lock_released(ctx: &CheckContext<'_>) -> InvariantVerdict {
    InvariantVerdict::check(
        "lock-released",
        !ctx.before.locked && !ctx.after.locked,
        format!("locked before={} after={}", ctx.before.locked, ctx.after.locked),
    )
}

fn reserves_on_revert(ctx: &CheckContext<'_>) -> InvariantVerdict {
    const NAME: &str = "reserves-unchanged-on-revert";
    if !ctx.reverted() {
        return InvariantVerdict::held(NAME, "attack did not revert");
    }
    let (b, a) = (ctx.before.reserves, ctx.after.reserves);
    InvariantVerdict::check(
        NAME,
        a == b,
        format!("reserves before ({}, {}) after ({}, {})", b.0, b.1, a.0, a.1),
    )
}

fn history_immutable(ctx: &CheckContext<'_>) -> InvariantVerdict {
    const NAME: &str = "oracle-history-immutable";
    let cardinality_before = ctx.before.observation_cardinality;
    let cardinality_after = ctx.after.observation_cardinality;
    if cardinality_after < cardinality_before {
        return InvariantVerdict::violated(
            NAME,
            format!("cardinality shrank from {cardinality_before} to {cardinality_after}"),
        );
    }
    let probe = ctx.history;
    match (&probe.before, &probe.after) {
        (Ok(before), Ok(after)) => InvariantVerdict::check(
            NAME,
            before == after,
            format!(
                "cumulative at t={} read {before} before and {after} after",
                probe.at_timestamp
            ),
        ),
        (Ok(_), Err(PoolError::UnsupportedLookback { .. })) => InvariantVerdict::unevaluated(
            NAME,
            format!(
                "t={} fell out of the observation ring during the scenario",
                probe.at_timestamp
            ),
        ),
        (Err(e), _) | (_, Err(e)) => {
            InvariantVerdict::unevaluated(NAME, format!("oracle read failed: {e}"))
        }
    }
}

/// The write index moves only when a new block timestamp is recorded, and stays inside the
/// active cardinality.
fn index_advances(before: &PoolSnapshot, after: &PoolSnapshot) -> InvariantVerdict {
    const NAME: &str = "observation-index-advances";
    let cardinality = after.observation_cardinality.max(1);
    if after.observation_index >= cardinality {
        return InvariantVerdict::violated(
            NAME,
            format!(
                "index {} outside cardinality {cardinality}",
                after.observation_index
            ),
        );
    }
    if after.observation_index == before.observation_index {
        return InvariantVerdict::held(NAME, "no observation written");
    }
    InvariantVerdict::check(
        NAME,
        after.timestamp > before.timestamp,
        format!(
            "index {} -> {} between t={} and t={}",
            before.observation_index, after.observation_index, before.timestamp, after.timestamp
        ),
    )
}
