//! In-memory reference collaborator: a single-range concentrated-liquidity pool with a token
//! ledger, a reentrancy guard, a flash path, an observation ring and a block clock.
//!
//! Every mutating entry point checkpoints the whole state and restores it on error, which is
//! how the collaborator's atomicity contract is met. `PoolQuirks` switch individual safety
//! mechanisms off so the harness can be shown to catch them.

use super::math::{
    amounts_for_liquidity, compute_swap_step, flash_fee, tick_at_sqrt_ratio, units, MAX_SQRT_RATIO,
    MAX_TICK, MIN_SQRT_RATIO, MIN_TICK,
};
use super::{FlashCallback, MintCallback, Observation, PoolCollaborator, Slot0, SwapCallback};
use crate::error::PoolError;
use crate::invariants::lock::{LockState, LockTracker};
use crate::oracle::ring::ObservationRing;
use crate::utils::config::HarnessConfig;
use alloy_primitives::{Address, I256, U256};
use std::collections::BTreeMap;

/// Deliberate defects for negative testing. All off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolQuirks {
    /// Mutating entry points never take the lock.
    pub disable_reentrancy_guard: bool,
    /// Flash loans settle without checking repayment.
    pub skip_flash_repayment_check: bool,
    /// Swaps move the tick before accumulating, crediting the elapsed interval to the new tick.
    pub accumulate_post_swap_tick: bool,
}

#[derive(Debug, Clone)]
struct PoolState {
    sqrt_price_x96: U256,
    tick: i32,
    liquidity: U256,
    oracle: ObservationRing,
    lock: LockTracker,
    balances: BTreeMap<Address, (U256, U256)>,
    positions: BTreeMap<(Address, i32, i32), U256>,
    now: u32,
}

#[derive(Debug, Clone)]
pub struct SimulatedPool {
    address: Address,
    token0: Address,
    token1: Address,
    fee_pips: u32,
    tick_spacing: i32,
    quirks: PoolQuirks,
    state: PoolState,
}

pub const GENESIS_TIMESTAMP: u32 = 1_700_000_000;

impl SimulatedPool {
    pub fn new(
        address: Address,
        fee_pips: u32,
        tick_spacing: i32,
        sqrt_price_x96: U256,
        start_time: u32,
    ) -> Result<Self, PoolError> {
        if sqrt_price_x96 < MIN_SQRT_RATIO || sqrt_price_x96 >= MAX_SQRT_RATIO {
            return Err(PoolError::reverted("R"));
        }
        Ok(Self {
            address,
            token0: Address::repeat_byte(0xa0),
            token1: Address::repeat_byte(0xb0),
            fee_pips,
            tick_spacing,
            quirks: PoolQuirks::default(),
            state: PoolState {
                sqrt_price_x96,
                tick: tick_at_sqrt_ratio(sqrt_price_x96),
                liquidity: U256::ZERO,
                oracle: ObservationRing::initialize(start_time),
                lock: LockTracker::new(),
                balances: BTreeMap::new(),
                positions: BTreeMap::new(),
                now: start_time,
            },
        })
    }

    /// A funded pool per the harness configuration: the owner provides full-range liquidity of
    /// `initial_liquidity_tokens` units, attacker and user each receive
    /// `account_funding_tokens` of both tokens.
    pub fn bootstrap(cfg: &HarnessConfig) -> Result<Self, PoolError> {
        let mut pool = Self::new(
            cfg.pool_address,
            cfg.fee_pips,
            cfg.tick_spacing,
            cfg.initial_sqrt_price_x96,
            GENESIS_TIMESTAMP,
        )?;
        pool.state.oracle.grow(cfg.observation_cardinality);

        let liquidity = units(cfg.initial_liquidity_tokens);
        let (owed0, owed1) = amounts_for_liquidity(cfg.initial_sqrt_price_x96, liquidity)?;
        let owner = cfg.identities.owner;
        pool.fund(owner, owed0, owed1);

        let amount = u128::try_from(liquidity).map_err(|_| PoolError::reverted("liquidity overflow"))?;
        let lower = (MIN_TICK / cfg.tick_spacing) * cfg.tick_spacing;
        let upper = (MAX_TICK / cfg.tick_spacing) * cfg.tick_spacing;
        let mut payer = super::facade::AccountPayer::new(owner);
        pool.mint(owner, owner, lower, upper, amount, &mut payer)?;

        let funding = units(cfg.account_funding_tokens);
        pool.fund(cfg.identities.attacker, funding, funding);
        pool.fund(cfg.identities.user, funding, funding);
        Ok(pool)
    }

    pub fn with_quirks(mut self, quirks: PoolQuirks) -> Self {
        self.quirks = quirks;
        self
    }

    pub fn quirks(&self) -> PoolQuirks {
        self.quirks
    }

    pub fn liquidity(&self) -> U256 {
        self.state.liquidity
    }

    pub fn position(&self, owner: Address, tick_lower: i32, tick_upper: i32) -> U256 {
        self.state
            .positions
            .get(&(owner, tick_lower, tick_upper))
            .copied()
            .unwrap_or_default()
    }

    /// Test-token mint: credits `account` out of thin air.
    pub fn fund(&mut self, account: Address, amount0: U256, amount1: U256) {
        let entry = self.state.balances.entry(account).or_default();
        entry.0 = entry.0.saturating_add(amount0);
        entry.1 = entry.1.saturating_add(amount1);
    }

    fn balances(&self, account: Address) -> (U256, U256) {
        self.state
            .balances
            .get(&account)
            .copied()
            .unwrap_or_default()
    }

    fn move_tokens(
        &mut self,
        from: Address,
        to: Address,
        amount0: U256,
        amount1: U256,
        reason: &str,
    ) -> Result<(), PoolError> {
        let (from0, from1) = self.balances(from);
        if from0 < amount0 || from1 < amount1 {
            return Err(PoolError::reverted(reason));
        }
        self.state.balances.insert(from, (from0 - amount0, from1 - amount1));
        self.fund(to, amount0, amount1);
        Ok(())
    }

    /// Runs `f` against a checkpoint; any error restores the pre-call state.
    fn atomic<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, PoolError>,
    ) -> Result<T, PoolError> {
        let checkpoint = self.state.clone();
        let result = f(self);
        if result.is_err() {
            self.state = checkpoint;
        }
        result
    }

    fn enter(&mut self) -> Result<(), PoolError> {
        if self.quirks.disable_reentrancy_guard {
            return Ok(());
        }
        self.state
            .lock
            .enter()
            .map(|_| ())
            .map_err(|_| PoolError::reverted("LOK"))
    }

    fn exit(&mut self) -> Result<(), PoolError> {
        if self.quirks.disable_reentrancy_guard {
            return Ok(());
        }
        self.state
            .lock
            .exit()
            .map(|_| ())
            .map_err(|e| PoolError::reverted(e.to_string()))
    }

    fn locked<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, PoolError>,
    ) -> Result<T, PoolError> {
        self.atomic(|pool| {
            pool.enter()?;
            let value = f(pool)?;
            pool.exit()?;
            Ok(value)
        })
    }

    fn write_observation(&mut self, tick: i32) {
        let now = self.state.now;
        self.state.oracle.write(now, tick);
    }

    fn swap_locked(
        &mut self,
        recipient: Address,
        zero_for_one: bool,
        amount_specified: I256,
        sqrt_price_limit_x96: U256,
        callback: &mut dyn SwapCallback,
    ) -> Result<(I256, I256), PoolError> {
        if amount_specified.is_zero() {
            return Err(PoolError::reverted("AS"));
        }
        let price = self.state.sqrt_price_x96;
        let limit_ok = if zero_for_one {
            sqrt_price_limit_x96 < price && sqrt_price_limit_x96 > MIN_SQRT_RATIO
        } else {
            sqrt_price_limit_x96 > price && sqrt_price_limit_x96 < MAX_SQRT_RATIO
        };
        if !limit_ok {
            return Err(PoolError::PriceLimitReached("SPL".to_string()));
        }

        let step = compute_swap_step(
            price,
            sqrt_price_limit_x96,
            self.state.liquidity,
            amount_specified,
            zero_for_one,
            self.fee_pips,
        )?;
        let tick_before = self.state.tick;
        let tick_after = tick_at_sqrt_ratio(step.sqrt_price_next_x96);
        if !self.quirks.accumulate_post_swap_tick {
            self.write_observation(tick_before);
        }
        self.state.sqrt_price_x96 = step.sqrt_price_next_x96;
        self.state.tick = tick_after;
        if self.quirks.accumulate_post_swap_tick {
            self.write_observation(tick_after);
        }

        let amount_in = I256::try_from(step.amount_in).map_err(|_| PoolError::reverted("SafeCast"))?;
        let amount_out =
            I256::try_from(step.amount_out).map_err(|_| PoolError::reverted("SafeCast"))?;
        let (amount0, amount1) = if zero_for_one {
            self.move_tokens(self.address, recipient, U256::ZERO, step.amount_out, "insufficient reserves")?;
            (amount_in, -amount_out)
        } else {
            self.move_tokens(self.address, recipient, step.amount_out, U256::ZERO, "insufficient reserves")?;
            (-amount_out, amount_in)
        };

        let before = self.reserves();
        callback.on_swap(self, amount0, amount1)?;
        let after = self.reserves();
        let paid = if zero_for_one {
            after.0 >= before.0.saturating_add(step.amount_in)
        } else {
            after.1 >= before.1.saturating_add(step.amount_in)
        };
        if !paid {
            return Err(PoolError::reverted("IIA"));
        }
        Ok((amount0, amount1))
    }

    fn flash_locked(
        &mut self,
        recipient: Address,
        amount0: U256,
        amount1: U256,
        callback: &mut dyn FlashCallback,
    ) -> Result<(), PoolError> {
        if self.state.liquidity.is_zero() {
            return Err(PoolError::reverted("L"));
        }
        let fee0 = flash_fee(amount0, self.fee_pips)?;
        let fee1 = flash_fee(amount1, self.fee_pips)?;
        let (before0, before1) = self.reserves();
        self.move_tokens(self.address, recipient, amount0, amount1, "insufficient reserves")?;

        callback.on_flash(self, fee0, fee1)?;

        let (after0, after1) = self.reserves();
        if !self.quirks.skip_flash_repayment_check {
            let checks = [
                (0u8, before0, after0, amount0, fee0),
                (1u8, before1, after1, amount1, fee1),
            ];
            for (token, before, after, amount, fee) in checks {
                if after < before.saturating_add(fee) {
                    return Err(PoolError::InsufficientRepayment {
                        token,
                        required: amount.saturating_add(fee),
                        returned: (after + amount).saturating_sub(before),
                    });
                }
            }
        }
        let tick = self.state.tick;
        self.write_observation(tick);
        Ok(())
    }

    fn mint_locked(
        &mut self,
        recipient: Address,
        tick_lower: i32,
        tick_upper: i32,
        amount: u128,
        callback: &mut dyn MintCallback,
    ) -> Result<(U256, U256), PoolError> {
        if tick_lower >= tick_upper {
            return Err(PoolError::reverted("TLU"));
        }
        if tick_lower < MIN_TICK {
            return Err(PoolError::reverted("TLM"));
        }
        if tick_upper > MAX_TICK {
            return Err(PoolError::reverted("TUM"));
        }
        if tick_lower % self.tick_spacing != 0 || tick_upper % self.tick_spacing != 0 {
            return Err(PoolError::reverted("TS"));
        }
        if amount == 0 {
            return Err(PoolError::reverted("AM"));
        }
        let tick = self.state.tick;
        self.write_observation(tick);

        let liquidity = U256::from(amount);
        let (owed0, owed1) = amounts_for_liquidity(self.state.sqrt_price_x96, liquidity)?;
        let (before0, before1) = self.reserves();
        callback.on_mint(self, owed0, owed1)?;
        let (after0, after1) = self.reserves();
        if after0 < before0.saturating_add(owed0) {
            return Err(PoolError::reverted("M0"));
        }
        if after1 < before1.saturating_add(owed1) {
            return Err(PoolError::reverted("M1"));
        }

        self.state.liquidity = self.state.liquidity.saturating_add(liquidity);
        let position = self
            .state
            .positions
            .entry((recipient, tick_lower, tick_upper))
            .or_default();
        *position = position.saturating_add(liquidity);
        Ok((owed0, owed1))
    }
}

impl PoolCollaborator for SimulatedPool {
    fn address(&self) -> Address {
        self.address
    }

    fn token0(&self) -> Address {
        self.token0
    }

    fn token1(&self) -> Address {
        self.token1
    }

    fn fee_pips(&self) -> u32 {
        self.fee_pips
    }

    fn tick_spacing(&self) -> i32 {
        self.tick_spacing
    }

    fn slot0(&self) -> Slot0 {
        Slot0 {
            sqrt_price_x96: self.state.sqrt_price_x96,
            tick: self.state.tick,
            observation_index: self.state.oracle.index(),
            observation_cardinality: self.state.oracle.cardinality(),
            observation_cardinality_next: self.state.oracle.cardinality_next(),
            unlocked: self.state.lock.state() == LockState::Unlocked,
        }
    }

    fn block_timestamp(&self) -> u32 {
        self.state.now
    }

    fn reserves(&self) -> (U256, U256) {
        self.balances(self.address)
    }

    fn balance_of(&self, account: Address) -> (U256, U256) {
        self.balances(account)
    }

    fn observe(&self, seconds_agos: &[u32]) -> Result<Vec<i64>, PoolError> {
        self.state
            .oracle
            .observe(self.state.now, seconds_agos, self.state.tick)
    }

    fn observations(&self, index: u16) -> Option<Observation> {
        self.state.oracle.at(index)
    }

    fn swap(
        &mut self,
        _caller: Address,
        recipient: Address,
        zero_for_one: bool,
        amount_specified: I256,
        sqrt_price_limit_x96: U256,
        callback: &mut dyn SwapCallback,
    ) -> Result<(I256, I256), PoolError> {
        self.locked(|pool| {
            pool.swap_locked(
                recipient,
                zero_for_one,
                amount_specified,
                sqrt_price_limit_x96,
                callback,
            )
        })
    }

    fn flash(
        &mut self,
        _caller: Address,
        recipient: Address,
        amount0: U256,
        amount1: U256,
        callback: &mut dyn FlashCallback,
    ) -> Result<(), PoolError> {
        self.locked(|pool| pool.flash_locked(recipient, amount0, amount1, callback))
    }

    fn mint(
        &mut self,
        _caller: Address,
        recipient: Address,
        tick_lower: i32,
        tick_upper: i32,
        amount: u128,
        callback: &mut dyn MintCallback,
    ) -> Result<(U256, U256), PoolError> {
        self.locked(|pool| pool.mint_locked(recipient, tick_lower, tick_upper, amount, callback))
    }

    fn increase_observation_cardinality_next(&mut self, next: u16) -> Result<(), PoolError> {
        self.locked(|pool| {
            pool.state.oracle.grow(next);
            Ok(())
        })
    }

    fn transfer_to_pool(
        &mut self,
        from: Address,
        amount0: U256,
        amount1: U256,
    ) -> Result<(), PoolError> {
        let to = self.address;
        self.move_tokens(from, to, amount0, amount1, "STF")
    }

    fn advance_time(&mut self, seconds: u32) {
        self.state.now = self.state.now.saturating_add(seconds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::facade::AccountPayer;
    use crate::pool::math::{unbounded_limit, Q96};

    fn pool() -> SimulatedPool {
        SimulatedPool::bootstrap(&HarnessConfig::default()).expect("bootstrap")
    }

    #[test]
    fn test_bootstrap_funds_pool_at_one_to_one() {
        let pool = pool();
        let (r0, r1) = pool.reserves();
        assert_eq!(r0, units(1_000_000));
        assert_eq!(r1, units(1_000_000));
        assert_eq!(pool.slot0().tick, 0);
        assert!(pool.slot0().unlocked);
        assert_eq!(pool.slot0().observation_cardinality, 1);
        assert_eq!(pool.slot0().observation_cardinality_next, 16);
    }

    #[test]
    fn test_failed_swap_restores_state_and_lock() {
        let mut pool = pool();
        let before = pool.clone();
        let broke = Address::repeat_byte(0x11);
        let mut payer = AccountPayer::new(broke);
        let err = pool
            .swap(
                broke,
                broke,
                true,
                I256::from_raw(units(10)),
                unbounded_limit(true),
                &mut payer,
            )
            .unwrap_err();
        assert!(err.is_reason("STF"));
        assert_eq!(pool.reserves(), before.reserves());
        assert_eq!(pool.slot0(), before.slot0());
        assert_eq!(pool.balance_of(broke), (U256::ZERO, U256::ZERO));
    }

    #[test]
    fn test_wrong_side_limit_is_price_limit_reached() {
        let mut pool = pool();
        let user = HarnessConfig::default().identities.user;
        let mut payer = AccountPayer::new(user);
        let err = pool
            .swap(user, user, true, I256::from_raw(units(1)), Q96, &mut payer)
            .unwrap_err();
        assert_eq!(err, PoolError::PriceLimitReached("SPL".to_string()));
    }

    #[test]
    fn test_mint_validates_tick_range() {
        let mut pool = pool();
        let owner = HarnessConfig::default().identities.owner;
        let mut payer = AccountPayer::new(owner);
        let err = pool.mint(owner, owner, 60, -60, 1, &mut payer).unwrap_err();
        assert!(err.is_reason("TLU"));
        let err = pool.mint(owner, owner, -50, 60, 1, &mut payer).unwrap_err();
        assert!(err.is_reason("TS"));
    }

    #[test]
    fn test_flash_on_empty_pool_fails_before_lending() {
        let cfg = HarnessConfig::default();
        let mut pool =
            SimulatedPool::new(cfg.pool_address, 3000, 60, Q96, GENESIS_TIMESTAMP).unwrap();
        let attacker = cfg.identities.attacker;
        let mut repayer =
            crate::agents::FlashRepayer::new(attacker, units(1), U256::ZERO, U256::ZERO);
        let err = pool
            .flash(attacker, attacker, units(1), U256::ZERO, &mut repayer)
            .unwrap_err();
        assert!(err.is_reason("L"));
        assert!(!repayer.evidence().callback_ran);
        assert!(pool.slot0().unlocked);
    }

    #[test]
    fn test_one_wei_swap_after_price_move_is_taken_as_fee() {
        let mut pool = pool();
        let user = HarnessConfig::default().identities.user;
        let mut payer = AccountPayer::new(user);
        pool.swap(
            user,
            user,
            false,
            I256::from_raw(units(3)),
            unbounded_limit(false),
            &mut payer,
        )
        .unwrap();
        let price = pool.slot0().sqrt_price_x96;
        let (amount0, amount1) = pool
            .swap(
                user,
                user,
                true,
                I256::from_raw(U256::from(1u8)),
                unbounded_limit(true),
                &mut payer,
            )
            .unwrap();
        assert_eq!(amount0, I256::from_raw(U256::from(1u8)));
        assert_eq!(amount1, I256::ZERO);
        assert!(pool.slot0().sqrt_price_x96 <= price);
    }
}
