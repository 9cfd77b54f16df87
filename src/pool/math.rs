//! Fixed-point helpers for the reference collaborator.
//!
//! Prices are Q64.96 square roots as in Uniswap V3. Liquidity is a single active range; ticks are
//! derived from the price with `f64` logarithms, which is accurate to within one tick and is all
//! the oracle accumulator needs.

use crate::error::PoolError;
use alloy_primitives::{I256, U256};

pub const Q96: U256 = U256::from_limbs([0, 1 << 32, 0, 0]);
pub const MIN_SQRT_RATIO: U256 = U256::from_limbs([4_295_128_739, 0, 0, 0]);
pub const MAX_SQRT_RATIO: U256 = U256::from_limbs([
    0x5d95_1d52_6398_8d26,
    0xefd1_fc6a_5064_8849,
    0xfffd_8963,
    0,
]);
pub const MIN_TICK: i32 = -887_272;
pub const MAX_TICK: i32 = 887_272;
pub const FEE_DENOMINATOR: u32 = 1_000_000;

const WAD_DECIMALS: u64 = 18;

/// `tokens * 10^18`.
pub fn units(tokens: u64) -> U256 {
    U256::from(tokens) * U256::from(10u64).pow(U256::from(WAD_DECIMALS))
}

/// `numerator / 10^decimals` whole-token fraction helper, e.g. `units_frac(1003, 1)` = 100.3.
pub fn units_frac(numerator: u64, decimals: u64) -> U256 {
    let scale = U256::from(10u64).pow(U256::from(WAD_DECIMALS - decimals.min(WAD_DECIMALS)));
    U256::from(numerator) * scale
}

pub fn u256_to_f64(value: U256) -> f64 {
    value
        .as_limbs()
        .iter()
        .enumerate()
        .map(|(i, limb)| (*limb as f64) * 2f64.powi(64 * i as i32))
        .sum()
}

pub fn tick_at_sqrt_ratio(sqrt_price_x96: U256) -> i32 {
    let ratio = u256_to_f64(sqrt_price_x96) / 2f64.powi(96);
    if ratio <= 0.0 {
        return MIN_TICK;
    }
    let tick = (2.0 * ratio.ln() / 1.0001f64.ln()).floor();
    (tick as i64).clamp(MIN_TICK as i64, MAX_TICK as i64) as i32
}

fn overflow() -> PoolError {
    PoolError::reverted("math overflow")
}

pub fn mul_div(a: U256, b: U256, denominator: U256) -> Result<U256, PoolError> {
    if denominator.is_zero() {
        return Err(PoolError::reverted("division by zero"));
    }
    Ok(a.checked_mul(b).ok_or_else(overflow)? / denominator)
}

pub fn mul_div_rounding_up(a: U256, b: U256, denominator: U256) -> Result<U256, PoolError> {
    if denominator.is_zero() {
        return Err(PoolError::reverted("division by zero"));
    }
    let product = a.checked_mul(b).ok_or_else(overflow)?;
    let quotient = product / denominator;
    if (product % denominator).is_zero() {
        Ok(quotient)
    } else {
        quotient.checked_add(U256::from(1u8)).ok_or_else(overflow)
    }
}

fn div_rounding_up(numerator: U256, denominator: U256) -> Result<U256, PoolError> {
    mul_div_rounding_up(numerator, U256::from(1u8), denominator)
}

/// Uniswap V3 flash fee: `ceil(amount * fee_pips / 1e6)`.
pub fn flash_fee(amount: U256, fee_pips: u32) -> Result<U256, PoolError> {
    mul_div_rounding_up(amount, U256::from(fee_pips), U256::from(FEE_DENOMINATOR))
}

/// Token amounts owed for adding `liquidity` at the current price.
pub fn amounts_for_liquidity(
    sqrt_price_x96: U256,
    liquidity: U256,
) -> Result<(U256, U256), PoolError> {
    let numerator = liquidity.checked_shl(96).ok_or_else(overflow)?;
    let amount0 = div_rounding_up(numerator, sqrt_price_x96)?;
    let amount1 = mul_div_rounding_up(liquidity, sqrt_price_x96, Q96)?;
    Ok((amount0, amount1))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapStep {
    pub sqrt_price_next_x96: U256,
    /// Gross input including the fee.
    pub amount_in: U256,
    pub amount_out: U256,
    pub fee_amount: U256,
    pub reached_limit: bool,
}

/// Price after adding `amount` of token0: `ceil(L*2^96*P / (L*2^96 + amount*P))`. When that
/// product does not fit in 256 bits the divided-through form is used; its floored denominator
/// can land above `P`, so the result is capped there.
fn next_price_from_input0(
    sqrt_price_x96: U256,
    numerator1: U256,
    amount: U256,
) -> Result<U256, PoolError> {
    if amount.is_zero() {
        return Ok(sqrt_price_x96);
    }
    let exact = amount
        .checked_mul(sqrt_price_x96)
        .and_then(|product| numerator1.checked_add(product))
        .filter(|_| numerator1.checked_mul(sqrt_price_x96).is_some());
    if let Some(denominator) = exact {
        return mul_div_rounding_up(numerator1, sqrt_price_x96, denominator);
    }
    let denominator = (numerator1 / sqrt_price_x96)
        .checked_add(amount)
        .ok_or_else(overflow)?;
    Ok(div_rounding_up(numerator1, denominator)?.min(sqrt_price_x96))
}

/// One swap step inside a single liquidity range: price moves from `sqrt_price_x96` toward
/// `sqrt_price_limit_x96` until the specified amount is used up or the limit is hit.
///
/// Positive `amount_specified` is exact input, negative is exact output.
pub fn compute_swap_step(
    sqrt_price_x96: U256,
    sqrt_price_limit_x96: U256,
    liquidity: U256,
    amount_specified: I256,
    zero_for_one: bool,
    fee_pips: u32,
) -> Result<SwapStep, PoolError> {
    if liquidity.is_zero() {
        return Err(PoolError::reverted("L"));
    }
    if amount_specified.is_zero() {
        return Err(PoolError::reverted("AS"));
    }
    let numerator1 = liquidity.checked_shl(96).ok_or_else(overflow)?;
    let fee = U256::from(fee_pips);
    let fee_complement = U256::from(FEE_DENOMINATOR - fee_pips);
    let exact_in = amount_specified.is_positive();
    let amount = amount_specified.unsigned_abs();

    // Net input needed to move from `from` to `to` in the swap direction.
    let input_between = |from: U256, to: U256| -> Result<U256, PoolError> {
        if zero_for_one {
            Ok(div_rounding_up(numerator1, to)?.saturating_sub(numerator1 / from))
        } else {
            let span = to.checked_sub(from).ok_or_else(overflow)?;
            mul_div_rounding_up(liquidity, span, Q96)
        }
    };
    let output_between = |from: U256, to: U256| -> Result<U256, PoolError> {
        if zero_for_one {
            let span = from.checked_sub(to).ok_or_else(overflow)?;
            mul_div(liquidity, span, Q96)
        } else {
            Ok((numerator1 / from).saturating_sub(div_rounding_up(numerator1, to)?))
        }
    };

    let (sqrt_next, net_in, amount_out, fee_amount, reached_limit) = if exact_in {
        let less_fee = mul_div(amount, fee_complement, U256::from(FEE_DENOMINATOR))?;
        let to_limit = input_between(sqrt_price_x96, sqrt_price_limit_x96)?;
        if less_fee >= to_limit {
            let fee_amount = mul_div_rounding_up(to_limit, fee, fee_complement)?;
            let out = output_between(sqrt_price_x96, sqrt_price_limit_x96)?;
            (sqrt_price_limit_x96, to_limit, out, fee_amount, true)
        } else {
            let next = if zero_for_one {
                next_price_from_input0(sqrt_price_x96, numerator1, less_fee)?
            } else {
                sqrt_price_x96
                    .checked_add(mul_div(less_fee, Q96, liquidity)?)
                    .ok_or_else(overflow)?
            };
            let out = output_between(sqrt_price_x96, next)?;
            (next, less_fee, out, amount - less_fee, false)
        }
    } else {
        let to_limit = output_between(sqrt_price_x96, sqrt_price_limit_x96)?;
        let (next, out, reached) = if amount >= to_limit {
            (sqrt_price_limit_x96, to_limit, true)
        } else if zero_for_one {
            let delta = mul_div_rounding_up(amount, Q96, liquidity)?;
            (sqrt_price_x96 - delta, amount, false)
        } else {
            let remaining = (numerator1 / sqrt_price_x96)
                .checked_sub(amount)
                .filter(|v| !v.is_zero())
                .ok_or_else(|| PoolError::reverted("insufficient liquidity"))?;
            (div_rounding_up(numerator1, remaining)?, amount, false)
        };
        let net_in = input_between(sqrt_price_x96, next)?;
        let fee_amount = mul_div_rounding_up(net_in, fee, fee_complement)?;
        (next, net_in, out, fee_amount, reached)
    };

    Ok(SwapStep {
        sqrt_price_next_x96: sqrt_next,
        amount_in: net_in.checked_add(fee_amount).ok_or_else(overflow)?,
        amount_out,
        fee_amount,
        reached_limit,
    })
}

/// Moves `sqrt_price_x96` by `bps` basis points in the swap direction, clamped to the valid
/// sqrt-price range. Used to derive one-sided price limits from a tolerance.
pub fn sqrt_price_limit_from_bps(
    sqrt_price_x96: U256,
    zero_for_one: bool,
    bps: u32,
) -> Result<U256, PoolError> {
    let bps = U256::from(bps.min(9_999));
    let scale = U256::from(10_000u32);
    let limit = if zero_for_one {
        mul_div(sqrt_price_x96, scale - bps, scale)?
    } else {
        mul_div(sqrt_price_x96, scale + bps, scale)?
    };
    Ok(limit.clamp(MIN_SQRT_RATIO + U256::from(1u8), MAX_SQRT_RATIO - U256::from(1u8)))
}

/// Widest valid limit for the direction (the "no limit" sentinel callers pass).
pub fn unbounded_limit(zero_for_one: bool) -> U256 {
    if zero_for_one {
        MIN_SQRT_RATIO + U256::from(1u8)
    } else {
        MAX_SQRT_RATIO - U256::from(1u8)
    }
}
