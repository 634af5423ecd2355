//! Price movement and token deltas for a liquidity range
//!
//! Rounding always favours the pool: amounts paid in round up, amounts paid out round
//! down, and the next price moves no further than the amount allows.

use types::{AmmError, AmmResult, U256};

use super::full_math::{div_rounding_up, mul_div, mul_div_rounding_up};
use super::Q96;

fn ordered(a: U256, b: U256) -> (U256, U256) {
    if a > b {
        (b, a)
    } else {
        (a, b)
    }
}

/// Token0 between two sqrt prices: `L * (sqrt_upper - sqrt_lower) / (sqrt_upper * sqrt_lower)`
pub fn get_amount0_delta(
    sqrt_ratio_a_x96: U256,
    sqrt_ratio_b_x96: U256,
    liquidity: u128,
    round_up: bool,
) -> AmmResult<U256> {
    let (lower, upper) = ordered(sqrt_ratio_a_x96, sqrt_ratio_b_x96);
    if lower.is_zero() {
        return Err(AmmError::InvalidSqrtPrice {
            sqrt_price_x96: lower.to_string(),
        });
    }

    let numerator1 = U256::from(liquidity) << 96;
    let numerator2 = upper - lower;

    if round_up {
        div_rounding_up(mul_div_rounding_up(numerator1, numerator2, upper)?, lower)
    } else {
        Ok(mul_div(numerator1, numerator2, upper)? / lower)
    }
}

/// Token1 between two sqrt prices: `L * (sqrt_upper - sqrt_lower)`
pub fn get_amount1_delta(
    sqrt_ratio_a_x96: U256,
    sqrt_ratio_b_x96: U256,
    liquidity: u128,
    round_up: bool,
) -> AmmResult<U256> {
    let (lower, upper) = ordered(sqrt_ratio_a_x96, sqrt_ratio_b_x96);
    let liquidity = U256::from(liquidity);

    if round_up {
        mul_div_rounding_up(liquidity, upper - lower, Q96)
    } else {
        mul_div(liquidity, upper - lower, Q96)
    }
}

/// Price after `amount_in` enters the pool; `zero_for_one` means token0 is paid in
pub fn get_next_sqrt_price_from_input(
    sqrt_price_x96: U256,
    liquidity: u128,
    amount_in: U256,
    zero_for_one: bool,
) -> AmmResult<U256> {
    check_price_and_liquidity(sqrt_price_x96, liquidity)?;

    if zero_for_one {
        next_sqrt_price_from_amount0_rounding_up(sqrt_price_x96, liquidity, amount_in, true)
    } else {
        next_sqrt_price_from_amount1_rounding_down(sqrt_price_x96, liquidity, amount_in, true)
    }
}

/// Price after `amount_out` leaves the pool; `zero_for_one` means token1 is paid out
pub fn get_next_sqrt_price_from_output(
    sqrt_price_x96: U256,
    liquidity: u128,
    amount_out: U256,
    zero_for_one: bool,
) -> AmmResult<U256> {
    check_price_and_liquidity(sqrt_price_x96, liquidity)?;

    if zero_for_one {
        next_sqrt_price_from_amount1_rounding_down(sqrt_price_x96, liquidity, amount_out, false)
    } else {
        next_sqrt_price_from_amount0_rounding_up(sqrt_price_x96, liquidity, amount_out, false)
    }
}

fn check_price_and_liquidity(sqrt_price_x96: U256, liquidity: u128) -> AmmResult<()> {
    if sqrt_price_x96.is_zero() {
        return Err(AmmError::InvalidSqrtPrice {
            sqrt_price_x96: sqrt_price_x96.to_string(),
        });
    }
    if liquidity == 0 {
        return Err(AmmError::division_by_zero("next sqrt price with zero liquidity"));
    }
    Ok(())
}

/// `L * sqrt_p / (L ± amount * sqrt_p)`, rounded up
fn next_sqrt_price_from_amount0_rounding_up(
    sqrt_price_x96: U256,
    liquidity: u128,
    amount: U256,
    add: bool,
) -> AmmResult<U256> {
    if amount.is_zero() {
        return Ok(sqrt_price_x96);
    }
    let numerator1 = U256::from(liquidity) << 96;

    if add {
        if let Some(product) = amount.checked_mul(sqrt_price_x96) {
            if let Some(denominator) = numerator1.checked_add(product) {
                return mul_div_rounding_up(numerator1, sqrt_price_x96, denominator);
            }
        }
        // Equivalent form that avoids the overflowing product
        let denominator = (numerator1 / sqrt_price_x96)
            .checked_add(amount)
            .ok_or_else(|| AmmError::overflow("next sqrt price from amount0"))?;
        div_rounding_up(numerator1, denominator)
    } else {
        let product = amount
            .checked_mul(sqrt_price_x96)
            .ok_or_else(|| AmmError::overflow("next sqrt price from amount0"))?;
        if numerator1 <= product {
            return Err(AmmError::overflow("next sqrt price from amount0"));
        }
        mul_div_rounding_up(numerator1, sqrt_price_x96, numerator1 - product)
    }
}

/// `sqrt_p ± amount / L`, rounded down
fn next_sqrt_price_from_amount1_rounding_down(
    sqrt_price_x96: U256,
    liquidity: u128,
    amount: U256,
    add: bool,
) -> AmmResult<U256> {
    let liquidity = U256::from(liquidity);

    if add {
        let quotient = mul_div(amount, Q96, liquidity)?;
        sqrt_price_x96
            .checked_add(quotient)
            .ok_or_else(|| AmmError::overflow("next sqrt price from amount1"))
    } else {
        let quotient = mul_div_rounding_up(amount, Q96, liquidity)?;
        if sqrt_price_x96 <= quotient {
            return Err(AmmError::overflow("next sqrt price from amount1"));
        }
        Ok(sqrt_price_x96 - quotient)
    }
}
