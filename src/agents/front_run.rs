use super::{signed, AttackOutcome, Evidence, SwapRole, SwapTrace};
use crate::error::{PoolError, ScenarioError};
use crate::invariants::slippage::{exact_input_single, min_out_with_tolerance, ExactInputParams};
use crate::pool::math::{sqrt_price_limit_from_bps, unbounded_limit, units};
use crate::pool::{PoolCollaborator, PoolFacade, SwapOutcome};
use crate::scenario::ScenarioSpec;
use crate::utils::config::Identities;
use alloy_primitives::U256;

pub const DEFAULT_SLIPPAGE_BPS: u32 = 50;

/// Sees a pending exact-input swap from the user, quotes it, and swaps the same direction first.
/// The user's swap then runs with a minimum output derived from the quote and a bps tolerance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontRunner {
    pub victim_amount: U256,
    pub attacker_amount: U256,
    pub slippage_bps: u32,
    /// Price limit for the front-run, in bps from the start price. `0` means unbounded.
    pub limit_bps: u32,
    /// Front-run carries a limit already on the wrong side of the price.
    pub stale_limit: bool,
}

impl FrontRunner {
    pub fn from_spec(spec: &ScenarioSpec) -> Result<Self, ScenarioError> {
        Ok(Self {
            victim_amount: spec.positive_amount("victim_amount", units(100))?,
            attacker_amount: spec.positive_amount("attacker_amount", units(5_000))?,
            slippage_bps: spec.u32_in("slippage_bps", DEFAULT_SLIPPAGE_BPS, 0..=10_000)?,
            limit_bps: spec.u32_in("limit_bps", 0, 0..=9_999)?,
            stale_limit: spec.flag("stale_limit", false)?,
        })
    }

    fn front_run_limit(&self, start: U256) -> Result<U256, PoolError> {
        if self.stale_limit {
            // Opposite direction: above the current price for a zero-for-one swap.
            return sqrt_price_limit_from_bps(start, false, self.limit_bps.max(10));
        }
        if self.limit_bps == 0 {
            return Ok(unbounded_limit(true));
        }
        sqrt_price_limit_from_bps(start, true, self.limit_bps)
    }

    /// Front-run then victim. Returns the front-run's fill; `Err` only when the front-run itself
    /// failed, in which case the victim swap is not sent.
    pub(crate) fn front_and_victim<P: PoolCollaborator + ?Sized>(
        &self,
        facade: &mut PoolFacade<'_, P>,
        ids: &Identities,
        evidence: &mut Evidence,
    ) -> Result<SwapOutcome, PoolError> {
        let start = facade.read_snapshot().sqrt_price_x96;
        let quote =
            facade.quote_exact_input(ids.user, true, self.victim_amount, unbounded_limit(true))?;
        let amount_out_minimum = min_out_with_tolerance(quote, self.slippage_bps);

        let limit = self.front_run_limit(start)?;
        let amount = signed(self.attacker_amount)?;
        let front = facade.execute_swap(ids.attacker, true, amount, limit);
        evidence.swaps.push(SwapTrace {
            role: SwapRole::FrontRun,
            zero_for_one: true,
            amount_specified: amount,
            sqrt_price_start_x96: start,
            sqrt_price_limit_x96: limit,
            amount_out_minimum: None,
            result: front.clone(),
        });
        let front = front?;

        let victim_start = facade.read_snapshot().sqrt_price_x96;
        let victim_limit = unbounded_limit(true);
        let victim = exact_input_single(
            facade,
            ids.user,
            ExactInputParams {
                zero_for_one: true,
                amount_in: self.victim_amount,
                amount_out_minimum,
                sqrt_price_limit_x96: victim_limit,
            },
        );
        tracing::debug!(
            "[FRONTRUN] quote {} min {} -> victim {:?}",
            quote,
            amount_out_minimum,
            victim.as_ref().map(|v| v.amount_out())
        );
        evidence.swaps.push(SwapTrace {
            role: SwapRole::Victim,
            zero_for_one: true,
            amount_specified: signed(self.victim_amount)?,
            sqrt_price_start_x96: victim_start,
            sqrt_price_limit_x96: victim_limit,
            amount_out_minimum: Some(amount_out_minimum),
            result: victim,
        });
        Ok(front)
    }

    pub fn attack<P: PoolCollaborator + ?Sized>(
        &self,
        facade: &mut PoolFacade<'_, P>,
        ids: &Identities,
    ) -> AttackOutcome {
        let mut evidence = Evidence::default();
        let result = self.front_and_victim(facade, ids, &mut evidence).map(|_| ());
        AttackOutcome::new(result, evidence)
    }
}
