//! Narrow interface to the pool under test.
//!
//! `PoolCollaborator` mirrors the external pool's surface (slot0, observe, swap, flash, mint,
//! token balances) and is object-safe so callbacks can re-enter it. `PoolFacade` is the harness's
//! stateless adapter over it.

pub mod facade;
pub mod math;
pub mod sim;

pub use facade::{PoolFacade, PositionOutcome, SwapOutcome};
pub use sim::{PoolQuirks, SimulatedPool};

use crate::error::PoolError;
use alloy_primitives::{Address, I256, U256};
use serde::Serialize;

/// Raw `slot0()` as the collaborator reports it. Note the collaborator's `unlocked` polarity;
/// the facade converts it to the harness's `locked` convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot0 {
    pub sqrt_price_x96: U256,
    pub tick: i32,
    pub observation_index: u16,
    pub observation_cardinality: u16,
    pub observation_cardinality_next: u16,
    pub unlocked: bool,
}

/// Immutable view of pool state captured before and after each scenario step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolSnapshot {
    pub sqrt_price_x96: U256,
    pub tick: i32,
    pub locked: bool,
    pub observation_index: u16,
    pub observation_cardinality: u16,
    pub reserves: (U256, U256),
    pub timestamp: u32,
}

/// Token balances of one account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AccountSnapshot {
    pub account: Address,
    pub balance0: U256,
    pub balance1: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Observation {
    pub timestamp_seconds: u32,
    pub tick_cumulative: i64,
}

/// Invoked by the pool after it has transferred swap output; positive deltas are owed.
pub trait SwapCallback {
    fn on_swap(
        &mut self,
        pool: &mut dyn PoolCollaborator,
        amount0_delta: I256,
        amount1_delta: I256,
    ) -> Result<(), PoolError>;
}

/// Invoked by the pool after it has lent `amount0/amount1`; `fee0/fee1` are owed on top.
pub trait FlashCallback {
    fn on_flash(
        &mut self,
        pool: &mut dyn PoolCollaborator,
        fee0: U256,
        fee1: U256,
    ) -> Result<(), PoolError>;
}

/// Invoked by the pool with the token amounts owed for a new position.
pub trait MintCallback {
    fn on_mint(
        &mut self,
        pool: &mut dyn PoolCollaborator,
        amount0_owed: U256,
        amount1_owed: U256,
    ) -> Result<(), PoolError>;
}

/// The external pool. Every mutating method is atomic: it either fully applies or returns an
/// error with no state change.
pub trait PoolCollaborator {
    fn address(&self) -> Address;
    fn token0(&self) -> Address;
    fn token1(&self) -> Address;
    fn fee_pips(&self) -> u32;
    fn tick_spacing(&self) -> i32;
    fn slot0(&self) -> Slot0;
    fn block_timestamp(&self) -> u32;
    /// Pool's own token balances.
    fn reserves(&self) -> (U256, U256);
    fn balance_of(&self, account: Address) -> (U256, U256);

    /// Tick cumulatives for each age in `seconds_agos`, in request order.
    fn observe(&self, seconds_agos: &[u32]) -> Result<Vec<i64>, PoolError>;

    /// Raw ring entry at `index` (`observations(i)`); `None` when never written.
    fn observations(&self, index: u16) -> Option<Observation>;

    fn swap(
        &mut self,
        caller: Address,
        recipient: Address,
        zero_for_one: bool,
        amount_specified: I256,
        sqrt_price_limit_x96: U256,
        callback: &mut dyn SwapCallback,
    ) -> Result<(I256, I256), PoolError>;

    fn flash(
        &mut self,
        caller: Address,
        recipient: Address,
        amount0: U256,
        amount1: U256,
        callback: &mut dyn FlashCallback,
    ) -> Result<(), PoolError>;

    fn mint(
        &mut self,
        caller: Address,
        recipient: Address,
        tick_lower: i32,
        tick_upper: i32,
        amount: u128,
        callback: &mut dyn MintCallback,
    ) -> Result<(U256, U256), PoolError>;

    fn increase_observation_cardinality_next(&mut self, next: u16) -> Result<(), PoolError>;

    /// ERC20-style transfer of `from`'s tokens into the pool (how callbacks pay).
    fn transfer_to_pool(
        &mut self,
        from: Address,
        amount0: U256,
        amount1: U256,
    ) -> Result<(), PoolError>;

    /// Chain control: advance block time by `seconds` and mine.
    fn advance_time(&mut self, seconds: u32);
}
