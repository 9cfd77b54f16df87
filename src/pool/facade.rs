use super::{
    AccountSnapshot, FlashCallback, MintCallback, Observation, PoolCollaborator, PoolSnapshot,
    SwapCallback,
};
use crate::error::PoolError;
use alloy_primitives::{Address, I256, U256};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SwapOutcome {
    /// Pool-side deltas: positive was paid in, negative was paid out.
    pub amount0: I256,
    pub amount1: I256,
    pub sqrt_price_before_x96: U256,
    pub sqrt_price_after_x96: U256,
    pub tick_after: i32,
}

impl SwapOutcome {
    pub fn amount_in(&self) -> U256 {
        if self.amount0.is_positive() {
            self.amount0.unsigned_abs()
        } else {
            self.amount1.unsigned_abs()
        }
    }

    pub fn amount_out(&self) -> U256 {
        if self.amount0.is_negative() {
            self.amount0.unsigned_abs()
        } else {
            self.amount1.unsigned_abs()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PositionOutcome {
    pub liquidity: u128,
    pub amount0: U256,
    pub amount1: U256,
}

/// Pays whatever the pool says is owed out of one account's balance.
#[derive(Debug, Clone, Copy)]
pub struct AccountPayer {
    account: Address,
}

impl AccountPayer {
    pub fn new(account: Address) -> Self {
        Self { account }
    }
}

fn positive_part(delta: I256) -> U256 {
    if delta.is_positive() {
        delta.unsigned_abs()
    } else {
        U256::ZERO
    }
}

impl SwapCallback for AccountPayer {
    fn on_swap(
        &mut self,
        pool: &mut dyn PoolCollaborator,
        amount0_delta: I256,
        amount1_delta: I256,
    ) -> Result<(), PoolError> {
        pool.transfer_to_pool(
            self.account,
            positive_part(amount0_delta),
            positive_part(amount1_delta),
        )
    }
}

impl MintCallback for AccountPayer {
    fn on_mint(
        &mut self,
        pool: &mut dyn PoolCollaborator,
        amount0_owed: U256,
        amount1_owed: U256,
    ) -> Result<(), PoolError> {
        pool.transfer_to_pool(self.account, amount0_owed, amount1_owed)
    }
}

const QUOTE_SENTINEL: &str = "quote";

/// Records the swap deltas, then aborts so the pool reverts the dry run.
#[derive(Debug, Default)]
struct QuoteCallback {
    deltas: Option<(I256, I256)>,
}

impl SwapCallback for QuoteCallback {
    fn on_swap(
        &mut self,
        _pool: &mut dyn PoolCollaborator,
        amount0_delta: I256,
        amount1_delta: I256,
    ) -> Result<(), PoolError> {
        self.deltas = Some((amount0_delta, amount1_delta));
        Err(PoolError::reverted(QUOTE_SENTINEL))
    }
}

/// Stateless adapter over the collaborator. Holds a borrow for one call sequence and nothing
/// else.
pub struct PoolFacade<'p, P: PoolCollaborator + ?Sized> {
    pool: &'p mut P,
}

impl<'p, P: PoolCollaborator + ?Sized> PoolFacade<'p, P> {
    pub fn new(pool: &'p mut P) -> Self {
        Self { pool }
    }

    pub fn collaborator(&mut self) -> &mut P {
        self.pool
    }

    pub fn fee_pips(&self) -> u32 {
        self.pool.fee_pips()
    }

    pub fn tick_spacing(&self) -> i32 {
        self.pool.tick_spacing()
    }

    pub fn read_snapshot(&self) -> PoolSnapshot {
        let slot0 = self.pool.slot0();
        PoolSnapshot {
            sqrt_price_x96: slot0.sqrt_price_x96,
            tick: slot0.tick,
            locked: !slot0.unlocked,
            observation_index: slot0.observation_index,
            observation_cardinality: slot0.observation_cardinality,
            reserves: self.pool.reserves(),
            timestamp: self.pool.block_timestamp(),
        }
    }

    pub fn balances(&self, account: Address) -> AccountSnapshot {
        let (balance0, balance1) = self.pool.balance_of(account);
        AccountSnapshot {
            account,
            balance0,
            balance1,
        }
    }

    pub fn now(&self) -> u32 {
        self.pool.block_timestamp()
    }

    /// Age of the oldest recorded observation, located the way the pool itself does: the slot
    /// after the write index, or slot 0 while the ring has not wrapped yet.
    pub fn history_seconds(&self) -> Result<u32, PoolError> {
        let slot0 = self.pool.slot0();
        let cardinality = slot0.observation_cardinality.max(1);
        let next = (slot0.observation_index + 1) % cardinality;
        let oldest = self
            .pool
            .observations(next)
            .or_else(|| self.pool.observations(0))
            .ok_or_else(|| PoolError::reverted("no observations recorded"))?;
        Ok(self.now().saturating_sub(oldest.timestamp_seconds))
    }

    /// Observations for each requested age, timestamped relative to the current block.
    pub fn observe(&self, seconds_agos: &[u32]) -> Result<Vec<Observation>, PoolError> {
        let now = self.pool.block_timestamp();
        let cumulatives = self.pool.observe(seconds_agos)?;
        if cumulatives.len() != seconds_agos.len() {
            return Err(PoolError::reverted(format!(
                "observe returned {} values for {} ages",
                cumulatives.len(),
                seconds_agos.len()
            )));
        }
        let mut out = Vec::with_capacity(seconds_agos.len());
        for (ago, tick_cumulative) in seconds_agos.iter().zip(cumulatives) {
            let timestamp_seconds =
                now.checked_sub(*ago)
                    .ok_or(PoolError::UnsupportedLookback {
                        requested: *ago,
                        available: now,
                    })?;
            out.push(Observation {
                timestamp_seconds,
                tick_cumulative,
            });
        }
        Ok(out)
    }

    /// Swap paid from `caller`'s balance, output to `caller`.
    pub fn execute_swap(
        &mut self,
        caller: Address,
        zero_for_one: bool,
        amount_specified: I256,
        sqrt_price_limit_x96: U256,
    ) -> Result<SwapOutcome, PoolError> {
        let mut payer = AccountPayer::new(caller);
        self.execute_swap_with(
            caller,
            zero_for_one,
            amount_specified,
            sqrt_price_limit_x96,
            &mut payer,
        )
    }

    pub fn execute_swap_with(
        &mut self,
        caller: Address,
        zero_for_one: bool,
        amount_specified: I256,
        sqrt_price_limit_x96: U256,
        callback: &mut dyn SwapCallback,
    ) -> Result<SwapOutcome, PoolError> {
        let sqrt_price_before_x96 = self.pool.slot0().sqrt_price_x96;
        let (amount0, amount1) = self.pool.swap(
            caller,
            caller,
            zero_for_one,
            amount_specified,
            sqrt_price_limit_x96,
            callback,
        )?;
        let slot0 = self.pool.slot0();
        Ok(SwapOutcome {
            amount0,
            amount1,
            sqrt_price_before_x96,
            sqrt_price_after_x96: slot0.sqrt_price_x96,
            tick_after: slot0.tick,
        })
    }

    /// Exact-input quote via a dry-run swap that reverts from its own callback.
    pub fn quote_exact_input(
        &mut self,
        caller: Address,
        zero_for_one: bool,
        amount_in: U256,
        sqrt_price_limit_x96: U256,
    ) -> Result<U256, PoolError> {
        let amount = I256::try_from(amount_in).map_err(|_| PoolError::reverted("SafeCast"))?;
        let mut quote = QuoteCallback::default();
        let result = self.pool.swap(
            caller,
            caller,
            zero_for_one,
            amount,
            sqrt_price_limit_x96,
            &mut quote,
        );
        match (result, quote.deltas) {
            (Err(err), Some((amount0, amount1))) if err.is_reason(QUOTE_SENTINEL) => {
                let out = if zero_for_one { amount1 } else { amount0 };
                Ok(out.unsigned_abs())
            }
            (Err(err), _) => Err(err),
            (Ok(_), _) => Err(PoolError::reverted("quote swap was not reverted")),
        }
    }

    pub fn execute_flash(
        &mut self,
        caller: Address,
        amount0: U256,
        amount1: U256,
        callback: &mut dyn FlashCallback,
    ) -> Result<(), PoolError> {
        self.pool.flash(caller, caller, amount0, amount1, callback)
    }

    /// Mint paid from `caller`'s balance.
    pub fn execute_mint(
        &mut self,
        caller: Address,
        tick_lower: i32,
        tick_upper: i32,
        amount: u128,
    ) -> Result<PositionOutcome, PoolError> {
        let mut payer = AccountPayer::new(caller);
        self.execute_mint_with(caller, tick_lower, tick_upper, amount, &mut payer)
    }

    pub fn execute_mint_with(
        &mut self,
        caller: Address,
        tick_lower: i32,
        tick_upper: i32,
        amount: u128,
        callback: &mut dyn MintCallback,
    ) -> Result<PositionOutcome, PoolError> {
        let (amount0, amount1) =
            self.pool
                .mint(caller, caller, tick_lower, tick_upper, amount, callback)?;
        Ok(PositionOutcome {
            liquidity: amount,
            amount0,
            amount1,
        })
    }

    pub fn grow_observations(&mut self, next: u16) -> Result<(), PoolError> {
        self.pool.increase_observation_cardinality_next(next)
    }

    pub fn advance_time(&mut self, seconds: u32) {
        self.pool.advance_time(seconds);
    }
}
