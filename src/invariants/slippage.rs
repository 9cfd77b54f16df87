//! Slippage-bounded swap execution and the checks over recorded swaps.
//!
//! A price limit bounds where the swap may leave the price; `amount_out_minimum` bounds what the
//! caller receives. The minimum is enforced inside the pool's swap callback, so a short fill
//! reverts the whole swap.

use super::{CheckContext, InvariantChecker, InvariantVerdict};
use crate::agents::{SwapRole, SwapTrace};
use crate::error::PoolError;
use crate::pool::facade::AccountPayer;
use crate::pool::{PoolCollaborator, PoolFacade, SwapCallback, SwapOutcome};
use crate::scenario::ScenarioKind;
use alloy_primitives::{Address, I256, U256};

pub const TOO_LITTLE_RECEIVED: &str = "Too little received";
pub const BPS_DENOMINATOR: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExactInputParams {
    pub zero_for_one: bool,
    pub amount_in: U256,
    pub amount_out_minimum: U256,
    pub sqrt_price_limit_x96: U256,
}

/// `quote * (10000 - bps) / 10000`, rounded down.
pub fn min_out_with_tolerance(quote: U256, tolerance_bps: u32) -> U256 {
    let bps = tolerance_bps.min(BPS_DENOMINATOR);
    quote * U256::from(BPS_DENOMINATOR - bps) / U256::from(BPS_DENOMINATOR)
}

struct MinOutputPayer {
    payer: AccountPayer,
    zero_for_one: bool,
    amount_out_minimum: U256,
}

impl SwapCallback for MinOutputPayer {
    fn on_swap(
        &mut self,
        pool: &mut dyn PoolCollaborator,
        amount0_delta: I256,
        amount1_delta: I256,
    ) -> Result<(), PoolError> {
        let received = if self.zero_for_one {
            amount1_delta
        } else {
            amount0_delta
        };
        let received = if received.is_negative() {
            received.unsigned_abs()
        } else {
            U256::ZERO
        };
        if received < self.amount_out_minimum {
            return Err(PoolError::reverted(TOO_LITTLE_RECEIVED));
        }
        self.payer.on_swap(pool, amount0_delta, amount1_delta)
    }
}

/// Router-style exact-input swap from `caller` to `caller`.
pub fn exact_input_single<P: PoolCollaborator + ?Sized>(
    facade: &mut PoolFacade<'_, P>,
    caller: Address,
    params: ExactInputParams,
) -> Result<SwapOutcome, PoolError> {
    let amount =
        I256::try_from(params.amount_in).map_err(|_| PoolError::reverted("SafeCast"))?;
    let mut callback = MinOutputPayer {
        payer: AccountPayer::new(caller),
        zero_for_one: params.zero_for_one,
        amount_out_minimum: params.amount_out_minimum,
    };
    facade.execute_swap_with(
        caller,
        params.zero_for_one,
        amount,
        params.sqrt_price_limit_x96,
        &mut callback,
    )
}

/// Judges every recorded swap: the final price stays within `[start, limit]`, a fill stopped
/// by the limit consumed no more than specified, and a minimum-output swap either delivered the
/// minimum or reverted.
pub struct SlippageVerifier;

impl InvariantChecker for SlippageVerifier {
    fn name(&self) -> &'static str {
        "slippage"
    }

    fn applies(&self, kind: ScenarioKind) -> bool {
        matches!(kind, ScenarioKind::FrontRun | ScenarioKind::Sandwich)
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<InvariantVerdict> {
        let swaps = &ctx.outcome.evidence.swaps;
        if swaps.is_empty() {
            return vec![InvariantVerdict::unevaluated(
                "price-within-limit",
                "no swap was issued",
            )];
        }
        let mut verdicts = Vec::new();
        verdicts.push(price_within_limit(swaps));
        verdicts.push(partial_fill_bounded(swaps));
        if let Some(victim) = swaps.iter().find(|s| s.role == SwapRole::Victim) {
            verdicts.push(min_output_enforced(victim));
        } else if ctx.reverted() {
            verdicts.push(InvariantVerdict::unevaluated(
                "min-output-enforced",
                "victim swap never ran: the front-run reverted",
            ));
        }
        verdicts
    }
}

fn within(price: U256, start: U256, limit: U256) -> bool {
    price >= start.min(limit) && price <= start.max(limit)
}

fn price_within_limit(swaps: &[SwapTrace]) -> InvariantVerdict {
    const NAME: &str = "price-within-limit";
    let mut notes = Vec::new();
    let mut held = true;
    for swap in swaps {
        match &swap.result {
            Ok(outcome) => {
                if !within(
                    outcome.sqrt_price_after_x96,
                    swap.sqrt_price_start_x96,
                    swap.sqrt_price_limit_x96,
                ) {
                    held = false;
                    notes.push(format!(
                        "{:?} ended at {} outside [{}, {}]",
                        swap.role,
                        outcome.sqrt_price_after_x96,
                        swap.sqrt_price_start_x96,
                        swap.sqrt_price_limit_x96
                    ));
                }
            }
            Err(PoolError::PriceLimitReached(reason)) => {
                notes.push(format!("{:?} rejected at limit ({reason})", swap.role));
            }
            Err(_) => {}
        }
    }
    if held && notes.is_empty() {
        notes.push(format!("{} swap(s) inside their limits", swaps.len()));
    }
    InvariantVerdict::check(NAME, held, notes.join("; "))
}

fn partial_fill_bounded(swaps: &[SwapTrace]) -> InvariantVerdict {
    const NAME: &str = "partial-fill-bounded";
    for swap in swaps {
        let Ok(outcome) = &swap.result else {
            continue;
        };
        if !swap.amount_specified.is_positive() {
            continue;
        }
        let specified = swap.amount_specified.unsigned_abs();
        if outcome.amount_in() > specified {
            return InvariantVerdict::violated(
                NAME,
                format!(
                    "{:?} consumed {} of {} specified",
                    swap.role,
                    outcome.amount_in(),
                    specified
                ),
            );
        }
    }
    InvariantVerdict::held(NAME, "no swap consumed more input than specified")
}

fn min_output_enforced(victim: &SwapTrace) -> InvariantVerdict {
    const NAME: &str = "min-output-enforced";
    let Some(minimum) = victim.amount_out_minimum else {
        return InvariantVerdict::unevaluated(NAME, "victim swap carried no minimum");
    };
    match &victim.result {
        Ok(outcome) => InvariantVerdict::check(
            NAME,
            outcome.amount_out() >= minimum,
            format!("victim received {} with minimum {minimum}", outcome.amount_out()),
        ),
        Err(err) if err.is_reason(TOO_LITTLE_RECEIVED) => InvariantVerdict::held(
            NAME,
            format!("victim swap reverted atomically: {err}"),
        ),
        Err(err) => InvariantVerdict::held(NAME, format!("victim swap failed: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::math::{sqrt_price_limit_from_bps, unbounded_limit, units};
    use crate::pool::SimulatedPool;
    use crate::utils::config::HarnessConfig;

    #[test]
    fn test_min_out_with_tolerance() {
        assert_eq!(min_out_with_tolerance(U256::from(10_000u32), 50), U256::from(9_950u32));
        assert_eq!(min_out_with_tolerance(U256::from(10_000u32), 20_000), U256::ZERO);
    }

    #[test]
    fn test_short_fill_reverts_whole_swap() {
        let cfg = HarnessConfig::default();
        let user = cfg.identities.user;
        let mut pool = SimulatedPool::bootstrap(&cfg).unwrap();
        let mut facade = PoolFacade::new(&mut pool);
        let before = facade.read_snapshot();
        let balances = facade.balances(user);

        let quote = facade
            .quote_exact_input(user, true, units(100), unbounded_limit(true))
            .unwrap();
        let err = exact_input_single(
            &mut facade,
            user,
            ExactInputParams {
                zero_for_one: true,
                amount_in: units(100),
                amount_out_minimum: quote + U256::from(1u8),
                sqrt_price_limit_x96: unbounded_limit(true),
            },
        )
        .unwrap_err();
        assert!(err.is_reason(TOO_LITTLE_RECEIVED));
        assert_eq!(facade.read_snapshot(), before);
        assert_eq!(facade.balances(user), balances);

        let ok = exact_input_single(
            &mut facade,
            user,
            ExactInputParams {
                zero_for_one: true,
                amount_in: units(100),
                amount_out_minimum: quote,
                sqrt_price_limit_x96: unbounded_limit(true),
            },
        )
        .unwrap();
        assert_eq!(ok.amount_out(), quote);
    }

    #[test]
    fn test_limit_stops_partial_fill_inside_bounds() {
        let cfg = HarnessConfig::default();
        let user = cfg.identities.user;
        let mut pool = SimulatedPool::bootstrap(&cfg).unwrap();
        let mut facade = PoolFacade::new(&mut pool);
        let start = facade.read_snapshot().sqrt_price_x96;
        let limit = sqrt_price_limit_from_bps(start, true, 1).unwrap();
        let outcome = exact_input_single(
            &mut facade,
            user,
            ExactInputParams {
                zero_for_one: true,
                amount_in: units(5_000),
                amount_out_minimum: U256::ZERO,
                sqrt_price_limit_x96: limit,
            },
        )
        .unwrap();
        assert_eq!(outcome.sqrt_price_after_x96, limit);
        assert!(outcome.amount_in() < units(5_000));
        assert!(within(outcome.sqrt_price_after_x96, start, limit));
    }
}
