use super::flash_loan::FlashRepayer;
use super::{signed, AttackOutcome, Evidence, NestedAttempt};
use crate::error::{PoolError, ScenarioError};
use crate::pool::facade::AccountPayer;
use crate::pool::math::{unbounded_limit, units, MAX_TICK, MIN_TICK};
use crate::pool::{FlashCallback, MintCallback, PoolCollaborator, PoolFacade, SwapCallback};
use crate::scenario::ScenarioSpec;
use crate::utils::config::Identities;
use alloy_primitives::{Address, I256, U256};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPoint {
    Flash,
    Swap,
    Mint,
}

impl EntryPoint {
    fn from_code(name: &str, code: Option<i128>, default: EntryPoint) -> Result<Self, ScenarioError> {
        match code {
            None => Ok(default),
            Some(0) => Ok(EntryPoint::Flash),
            Some(1) => Ok(EntryPoint::Swap),
            Some(2) => Ok(EntryPoint::Mint),
            Some(other) => Err(ScenarioError::InvalidParameter {
                name: name.to_string(),
                reason: format!("expected 0 (flash), 1 (swap) or 2 (mint), got {other}"),
            }),
        }
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntryPoint::Flash => "flash",
            EntryPoint::Swap => "swap",
            EntryPoint::Mint => "mint",
        })
    }
}

fn full_range(tick_spacing: i32) -> (i32, i32) {
    (
        (MIN_TICK / tick_spacing) * tick_spacing,
        (MAX_TICK / tick_spacing) * tick_spacing,
    )
}

/// Invokes one pool entry point and, from inside its callback, tries another one before paying
/// what the outer call owes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReentrantCaller {
    pub entry: EntryPoint,
    pub nested: Option<EntryPoint>,
    pub amount: U256,
    /// Pay the outer call's obligation after the nested attempt.
    pub complete_obligation: bool,
}

impl ReentrantCaller {
    pub fn from_spec(spec: &ScenarioSpec) -> Result<Self, ScenarioError> {
        Ok(Self {
            entry: EntryPoint::from_code("entry", spec.param("entry"), EntryPoint::Flash)?,
            nested: Some(EntryPoint::from_code(
                "nested",
                spec.param("nested"),
                EntryPoint::Swap,
            )?),
            amount: spec.positive_amount("amount", units(10))?,
            complete_obligation: spec.flag("complete_obligation", true)?,
        })
    }

    pub fn without_reentry(&self) -> Self {
        Self {
            nested: None,
            ..self.clone()
        }
    }

    pub fn attack<P: PoolCollaborator + ?Sized>(
        &self,
        facade: &mut PoolFacade<'_, P>,
        ids: &Identities,
    ) -> AttackOutcome {
        let mut hook = ReentryHook {
            attacker: ids.attacker,
            entry: self.entry,
            nested: self.nested,
            amount: self.amount,
            complete_obligation: self.complete_obligation,
            tick_spacing: facade.tick_spacing(),
            attempts: Vec::new(),
        };
        let result = match self.entry {
            EntryPoint::Flash => {
                facade.execute_flash(ids.attacker, self.amount, U256::ZERO, &mut hook)
            }
            EntryPoint::Swap => signed(self.amount).and_then(|amount| {
                facade
                    .execute_swap_with(ids.attacker, true, amount, unbounded_limit(true), &mut hook)
                    .map(|_| ())
            }),
            EntryPoint::Mint => u128::try_from(self.amount)
                .map_err(|_| PoolError::reverted("liquidity overflow"))
                .and_then(|liquidity| {
                    let (lower, upper) = full_range(facade.tick_spacing());
                    facade
                        .execute_mint_with(ids.attacker, lower, upper, liquidity, &mut hook)
                        .map(|_| ())
                }),
        };
        for attempt in &hook.attempts {
            tracing::debug!(
                "[REENTRY] {} inside {} (locked={}) -> {:?}",
                attempt.nested,
                attempt.entry,
                attempt.locked_during_callback,
                attempt.error
            );
        }
        let evidence = Evidence {
            nested: hook.attempts,
            ..Evidence::default()
        };
        AttackOutcome::new(result, evidence)
    }
}

struct ReentryHook {
    attacker: Address,
    entry: EntryPoint,
    nested: Option<EntryPoint>,
    amount: U256,
    complete_obligation: bool,
    tick_spacing: i32,
    attempts: Vec<NestedAttempt>,
}

impl ReentryHook {
    fn reenter(&mut self, pool: &mut dyn PoolCollaborator) {
        let Some(nested) = self.nested else {
            return;
        };
        let locked_during_callback = !pool.slot0().unlocked;
        let attacker = self.attacker;
        let result = match nested {
            EntryPoint::Flash => {
                let mut repayer = FlashRepayer::new(attacker, self.amount, U256::ZERO, U256::ZERO);
                pool.flash(attacker, attacker, self.amount, U256::ZERO, &mut repayer)
            }
            EntryPoint::Swap => signed(self.amount).and_then(|amount| {
                let mut payer = AccountPayer::new(attacker);
                pool.swap(attacker, attacker, false, amount, unbounded_limit(false), &mut payer)
                    .map(|_| ())
            }),
            EntryPoint::Mint => u128::try_from(self.amount)
                .map_err(|_| PoolError::reverted("liquidity overflow"))
                .and_then(|liquidity| {
                    let (lower, upper) = full_range(self.tick_spacing);
                    let mut payer = AccountPayer::new(attacker);
                    pool.mint(attacker, attacker, lower, upper, liquidity, &mut payer)
                        .map(|_| ())
                }),
        };
        self.attempts.push(NestedAttempt {
            entry: self.entry,
            nested,
            locked_during_callback,
            error: result.err(),
        });
    }
}

impl FlashCallback for ReentryHook {
    fn on_flash(
        &mut self,
        pool: &mut dyn PoolCollaborator,
        fee0: U256,
        fee1: U256,
    ) -> Result<(), PoolError> {
        self.reenter(pool);
        if !self.complete_obligation {
            return Ok(());
        }
        pool.transfer_to_pool(self.attacker, self.amount.saturating_add(fee0), fee1)
    }
}

impl SwapCallback for ReentryHook {
    fn on_swap(
        &mut self,
        pool: &mut dyn PoolCollaborator,
        amount0_delta: I256,
        amount1_delta: I256,
    ) -> Result<(), PoolError> {
        self.reenter(pool);
        if !self.complete_obligation {
            return Ok(());
        }
        AccountPayer::new(self.attacker).on_swap(pool, amount0_delta, amount1_delta)
    }
}

impl MintCallback for ReentryHook {
    fn on_mint(
        &mut self,
        pool: &mut dyn PoolCollaborator,
        amount0_owed: U256,
        amount1_owed: U256,
    ) -> Result<(), PoolError> {
        self.reenter(pool);
        if !self.complete_obligation {
            return Ok(());
        }
        pool.transfer_to_pool(self.attacker, amount0_owed, amount1_owed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{PoolQuirks, SimulatedPool};
    use crate::utils::config::HarnessConfig;

    fn caller(entry: EntryPoint, nested: EntryPoint) -> ReentrantCaller {
        ReentrantCaller {
            entry,
            nested: Some(nested),
            amount: units(10),
            complete_obligation: true,
        }
    }

    #[test]
    fn test_every_nested_entry_point_hits_the_lock() {
        let cfg = HarnessConfig::default();
        for entry in [EntryPoint::Flash, EntryPoint::Swap, EntryPoint::Mint] {
            for nested in [EntryPoint::Flash, EntryPoint::Swap, EntryPoint::Mint] {
                let mut pool = SimulatedPool::bootstrap(&cfg).unwrap();
                let mut facade = PoolFacade::new(&mut pool);
                let outcome = caller(entry, nested).attack(&mut facade, &cfg.identities);
                assert_eq!(outcome.result, Ok(()), "{entry} outer call must complete");
                let attempt = &outcome.evidence.nested[0];
                assert!(attempt.locked_during_callback);
                assert!(attempt.error.as_ref().is_some_and(|e| e.is_reason("LOK")));
                assert!(!facade.read_snapshot().locked);
            }
        }
    }

    #[test]
    fn test_disabled_guard_lets_nested_call_through() {
        let cfg = HarnessConfig::default();
        let mut pool = SimulatedPool::bootstrap(&cfg).unwrap().with_quirks(PoolQuirks {
            disable_reentrancy_guard: true,
            ..PoolQuirks::default()
        });
        let mut facade = PoolFacade::new(&mut pool);
        let outcome = caller(EntryPoint::Mint, EntryPoint::Mint).attack(&mut facade, &cfg.identities);
        let attempt = &outcome.evidence.nested[0];
        assert!(!attempt.locked_during_callback);
        assert_eq!(attempt.error, None);
    }

    #[test]
    fn test_baseline_makes_no_nested_attempt() {
        let cfg = HarnessConfig::default();
        let mut pool = SimulatedPool::bootstrap(&cfg).unwrap();
        let mut facade = PoolFacade::new(&mut pool);
        let outcome = caller(EntryPoint::Swap, EntryPoint::Flash)
            .without_reentry()
            .attack(&mut facade, &cfg.identities);
        assert_eq!(outcome.result, Ok(()));
        assert!(outcome.evidence.nested.is_empty());
    }
}
