//! Liquidity arithmetic and token/liquidity conversions for a price range

use types::{AmmError, AmmResult, U256};

use super::full_math::{mul_div, to_u128};
use super::sqrt_price_math::{get_amount0_delta, get_amount1_delta};
use super::Q96;

/// Applies a signed liquidity delta
pub fn add_delta(liquidity: u128, delta: i128) -> AmmResult<u128> {
    if delta < 0 {
        let requested = delta.unsigned_abs();
        liquidity
            .checked_sub(requested)
            .ok_or(AmmError::InsufficientPositionLiquidity {
                requested,
                available: liquidity,
            })
    } else {
        liquidity
            .checked_add(delta.unsigned_abs())
            .ok_or_else(|| AmmError::overflow("liquidity add"))
    }
}

fn ordered(a: U256, b: U256) -> (U256, U256) {
    if a > b {
        (b, a)
    } else {
        (a, b)
    }
}

/// Liquidity backed by `amount0` over `[a, b]`: `amount0 * (a * b) / (b - a)`
fn liquidity_for_amount0(sqrt_a: U256, sqrt_b: U256, amount0: u128) -> AmmResult<u128> {
    let (lower, upper) = ordered(sqrt_a, sqrt_b);
    let intermediate = mul_div(lower, upper, Q96)?;
    let liquidity = mul_div(U256::from(amount0), intermediate, upper - lower)?;
    to_u128(liquidity, "liquidity for amount0")
}

/// Liquidity backed by `amount1` over `[a, b]`: `amount1 / (b - a)`
fn liquidity_for_amount1(sqrt_a: U256, sqrt_b: U256, amount1: u128) -> AmmResult<u128> {
    let (lower, upper) = ordered(sqrt_a, sqrt_b);
    let liquidity = mul_div(U256::from(amount1), Q96, upper - lower)?;
    to_u128(liquidity, "liquidity for amount1")
}

/// Largest liquidity that both desired amounts can fund at the current price
pub fn get_liquidity_for_amounts(
    sqrt_price_x96: U256,
    sqrt_ratio_a_x96: U256,
    sqrt_ratio_b_x96: U256,
    amount0: u128,
    amount1: u128,
) -> AmmResult<u128> {
    let (lower, upper) = ordered(sqrt_ratio_a_x96, sqrt_ratio_b_x96);
    if lower == upper {
        return Err(AmmError::division_by_zero("liquidity for empty price range"));
    }

    if sqrt_price_x96 <= lower {
        liquidity_for_amount0(lower, upper, amount0)
    } else if sqrt_price_x96 < upper {
        let liquidity0 = liquidity_for_amount0(sqrt_price_x96, upper, amount0)?;
        let liquidity1 = liquidity_for_amount1(lower, sqrt_price_x96, amount1)?;
        Ok(liquidity0.min(liquidity1))
    } else {
        liquidity_for_amount1(lower, upper, amount1)
    }
}

/// Token amounts represented by `liquidity` at the current price, rounded down
pub fn get_amounts_for_liquidity(
    sqrt_price_x96: U256,
    sqrt_ratio_a_x96: U256,
    sqrt_ratio_b_x96: U256,
    liquidity: u128,
) -> AmmResult<(u128, u128)> {
    let (lower, upper) = ordered(sqrt_ratio_a_x96, sqrt_ratio_b_x96);

    let (amount0, amount1) = if sqrt_price_x96 <= lower {
        (
            get_amount0_delta(lower, upper, liquidity, false)?,
            U256::zero(),
        )
    } else if sqrt_price_x96 < upper {
        (
            get_amount0_delta(sqrt_price_x96, upper, liquidity, false)?,
            get_amount1_delta(lower, sqrt_price_x96, liquidity, false)?,
        )
    } else {
        (
            U256::zero(),
            get_amount1_delta(lower, upper, liquidity, false)?,
        )
    };

    Ok((
        to_u128(amount0, "amount0 for liquidity")?,
        to_u128(amount1, "amount1 for liquidity")?,
    ))
}
