//! Single swap step within one liquidity range

use types::{AmmResult, U256};

use super::full_math::{mul_div, mul_div_rounding_up};
use super::sqrt_price_math::{
    get_amount0_delta, get_amount1_delta, get_next_sqrt_price_from_input,
    get_next_sqrt_price_from_output,
};
use super::FEE_PIPS_DENOMINATOR;

/// Outcome of one step toward a target price
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapStep {
    pub sqrt_price_next: U256,
    /// Input consumed, excluding the fee
    pub amount_in: U256,
    pub amount_out: U256,
    pub fee_amount: U256,
}

/// Swap as far toward `sqrt_price_target` as `amount_remaining` allows
///
/// The direction follows from the two prices (`current >= target` sells token0).
/// With `exact_input`, `amount_remaining` is the input still to spend including fees;
/// otherwise it is the output still to receive.
pub fn compute_swap_step(
    sqrt_price_current: U256,
    sqrt_price_target: U256,
    liquidity: u128,
    amount_remaining: U256,
    exact_input: bool,
    fee_pips: u32,
) -> AmmResult<SwapStep> {
    let zero_for_one = sqrt_price_current >= sqrt_price_target;
    let fee_denominator = U256::from(FEE_PIPS_DENOMINATOR);
    let fee = U256::from(fee_pips);

    let mut amount_in = U256::zero();
    let mut amount_out = U256::zero();

    let sqrt_price_next = if exact_input {
        let remaining_less_fee = mul_div(amount_remaining, fee_denominator - fee, fee_denominator)?;
        amount_in = if zero_for_one {
            get_amount0_delta(sqrt_price_target, sqrt_price_current, liquidity, true)?
        } else {
            get_amount1_delta(sqrt_price_current, sqrt_price_target, liquidity, true)?
        };
        if remaining_less_fee >= amount_in {
            sqrt_price_target
        } else {
            get_next_sqrt_price_from_input(
                sqrt_price_current,
                liquidity,
                remaining_less_fee,
                zero_for_one,
            )?
        }
    } else {
        amount_out = if zero_for_one {
            get_amount1_delta(sqrt_price_target, sqrt_price_current, liquidity, false)?
        } else {
            get_amount0_delta(sqrt_price_current, sqrt_price_target, liquidity, false)?
        };
        if amount_remaining >= amount_out {
            sqrt_price_target
        } else {
            get_next_sqrt_price_from_output(
                sqrt_price_current,
                liquidity,
                amount_remaining,
                zero_for_one,
            )?
        }
    };

    let reached_target = sqrt_price_next == sqrt_price_target;

    if zero_for_one {
        if !(reached_target && exact_input) {
            amount_in = get_amount0_delta(sqrt_price_next, sqrt_price_current, liquidity, true)?;
        }
        if !(reached_target && !exact_input) {
            amount_out = get_amount1_delta(sqrt_price_next, sqrt_price_current, liquidity, false)?;
        }
    } else {
        if !(reached_target && exact_input) {
            amount_in = get_amount1_delta(sqrt_price_current, sqrt_price_next, liquidity, true)?;
        }
        if !(reached_target && !exact_input) {
            amount_out = get_amount0_delta(sqrt_price_current, sqrt_price_next, liquidity, false)?;
        }
    }

    // Rounding up the price for an exact output can overshoot the request
    if !exact_input && amount_out > amount_remaining {
        amount_out = amount_remaining;
    }

    let fee_amount = if exact_input && !reached_target {
        // Whatever the step did not use for price movement is kept as fee
        amount_remaining - amount_in
    } else {
        mul_div_rounding_up(amount_in, fee, fee_denominator - fee)?
    };

    Ok(SwapStep {
        sqrt_price_next,
        amount_in,
        amount_out,
        fee_amount,
    })
}
