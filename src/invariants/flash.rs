//! Atomic flash settlement: lend, run the borrower's callback, then require every borrowed token
//! back with `ceil(amount * fee / 1e6)` on top. Anything less undoes the whole loan.

use super::{CheckContext, InvariantChecker, InvariantVerdict};
use crate::agents::{account_delta, FlashLoanAbuser};
use crate::error::PoolError;
use crate::pool::math::flash_fee;
use crate::scenario::ScenarioKind;
use alloy_primitives::{I256, U256};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashCase {
    /// Principal plus fee returned.
    FullRepayment,
    /// Some of principal or fee withheld.
    UnderRepayment,
    /// Borrow exceeds what the pool holds.
    Drain,
}

pub struct FlashSettlementVerifier;

impl FlashSettlementVerifier {
    pub fn classify(agent: &FlashLoanAbuser, reserves: (U256, U256)) -> FlashCase {
        if agent.amount0 > reserves.0 || agent.amount1 > reserves.1 {
            FlashCase::Drain
        } else if !agent.shortfall.is_zero() {
            FlashCase::UnderRepayment
        } else {
            FlashCase::FullRepayment
        }
    }
}

fn signed_or_max(value: U256) -> I256 {
    I256::try_from(value).unwrap_or(I256::MAX)
}

impl InvariantChecker for FlashSettlementVerifier {
    fn name(&self) -> &'static str {
        "flash"
    }

    fn applies(&self, kind: ScenarioKind) -> bool {
        kind == ScenarioKind::FlashLoan
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<InvariantVerdict> {
        let agent = match FlashLoanAbuser::from_spec(ctx.spec) {
            Ok(agent) => agent,
            Err(e) => {
                return vec![InvariantVerdict::unevaluated(
                    "flash-repayment-enforced",
                    e.to_string(),
                )]
            }
        };
        let fees = flash_fee(agent.amount0, ctx.fee_pips)
            .and_then(|f0| flash_fee(agent.amount1, ctx.fee_pips).map(|f1| (f0, f1)));
        let (fee0, fee1) = match fees {
            Ok(fees) => fees,
            Err(e) => {
                return vec![InvariantVerdict::unevaluated(
                    "flash-repayment-enforced",
                    format!("fee computation failed: {e}"),
                )]
            }
        };
        let case = Self::classify(&agent, ctx.before.reserves);
        let reverted = ctx.reverted();
        let err = ctx.revert_error();
        let mut verdicts = Vec::with_capacity(4);

        let enforced = match case {
            FlashCase::FullRepayment => !reverted,
            FlashCase::UnderRepayment => {
                matches!(err, Some(PoolError::InsufficientRepayment { .. }))
            }
            FlashCase::Drain => reverted,
        };
        verdicts.push(InvariantVerdict::check(
            "flash-repayment-enforced",
            enforced,
            format!(
                "{case:?}: {}",
                err.map(|e| e.to_string())
                    .unwrap_or_else(|| "settled".to_string())
            ),
        ));

        let (b, a) = (ctx.before.reserves, ctx.after.reserves);
        let expected = if reverted {
            b
        } else {
            (b.0.saturating_add(fee0), b.1.saturating_add(fee1))
        };
        verdicts.push(InvariantVerdict::check(
            "flash-reserve-delta",
            a == expected,
            format!(
                "reserves ({}, {}) -> ({}, {}), expected ({}, {})",
                b.0, b.1, a.0, a.1, expected.0, expected.1
            ),
        ));

        let (d0, d1) = account_delta(ctx.attacker_before, ctx.attacker_after);
        let expected = if reverted {
            (I256::ZERO, I256::ZERO)
        } else {
            (-signed_or_max(fee0), -signed_or_max(fee1))
        };
        verdicts.push(InvariantVerdict::check(
            "flash-borrower-net-fee",
            (d0, d1) == expected,
            format!(
                "borrower net ({d0}, {d1}), expected ({}, {})",
                expected.0, expected.1
            ),
        ));

        if case == FlashCase::Drain {
            let callback_ran = ctx
                .outcome
                .evidence
                .flash
                .as_ref()
                .is_some_and(|f| f.callback_ran);
            let front_loaded = err.is_some_and(|e| e.is_reason("insufficient reserves"));
            verdicts.push(InvariantVerdict::check(
                "flash-drain-rejected-upfront",
                front_loaded && !callback_ran,
                format!("callback ran: {callback_ran}, error: {err:?}"),
            ));
        }
        verdicts
    }
}
