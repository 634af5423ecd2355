//! Uniswap V2 AMM math with exact integer calculations
//!
//! All amounts are raw token units. Products are widened to 256 bits so
//! `amount * reserve * 10000` never overflows, and every division floors except
//! where noted.

use types::{AmmError, AmmResult, U256};

use crate::math::{mul_div, to_u128};

/// Basis-point denominator for V2 fees
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Reserves oriented for one swap direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct V2PoolState {
    pub reserve_in: u128,
    pub reserve_out: u128,
    pub fee_bps: u32, // Fee in basis points (30 = 0.3%)
}

impl V2PoolState {
    pub fn get_amount_out(&self, amount_in: u128) -> AmmResult<u128> {
        V2Math::get_amount_out(amount_in, self.reserve_in, self.reserve_out, self.fee_bps)
    }

    pub fn get_amount_in(&self, amount_out: u128) -> AmmResult<u128> {
        V2Math::get_amount_in(amount_out, self.reserve_in, self.reserve_out, self.fee_bps)
    }
}

/// V2 constant-product formulas
pub struct V2Math;

impl V2Math {
    /// Exact output for `amount_in` using the fee-adjusted `x*y=k` formula
    ///
    /// `amount_out = in*(10000-fee)*reserve_out / (reserve_in*10000 + in*(10000-fee))`
    pub fn get_amount_out(
        amount_in: u128,
        reserve_in: u128,
        reserve_out: u128,
        fee_bps: u32,
    ) -> AmmResult<u128> {
        if amount_in == 0 {
            return Err(AmmError::InvalidAmount {
                reason: "input amount must be positive",
            });
        }
        if reserve_in == 0 || reserve_out == 0 {
            return Err(AmmError::InsufficientLiquidity {
                requested: amount_in,
                available: reserve_out,
            });
        }

        let amount_in_with_fee = U256::from(amount_in) * U256::from(fee_multiplier(fee_bps)?);
        let denominator = U256::from(reserve_in) * U256::from(BPS_DENOMINATOR) + amount_in_with_fee;
        let amount_out = mul_div(amount_in_with_fee, U256::from(reserve_out), denominator)?;

        // amount_out < reserve_out, so it always fits
        let amount_out = to_u128(amount_out, "v2 amount out")?;
        if amount_out == 0 {
            return Err(AmmError::InsufficientLiquidity {
                requested: amount_in,
                available: reserve_out,
            });
        }
        Ok(amount_out)
    }

    /// Minimum input that yields at least `amount_out`
    ///
    /// `floor(reserve_in*amount_out*10000 / ((reserve_out-amount_out)*(10000-fee))) + 1`
    pub fn get_amount_in(
        amount_out: u128,
        reserve_in: u128,
        reserve_out: u128,
        fee_bps: u32,
    ) -> AmmResult<u128> {
        if amount_out == 0 {
            return Err(AmmError::InvalidAmount {
                reason: "output amount must be positive",
            });
        }
        if reserve_in == 0 || amount_out >= reserve_out {
            return Err(AmmError::InsufficientLiquidity {
                requested: amount_out,
                available: reserve_out,
            });
        }

        let numerator = U256::from(reserve_in) * U256::from(BPS_DENOMINATOR);
        let denominator =
            U256::from(reserve_out - amount_out) * U256::from(fee_multiplier(fee_bps)?);
        let amount_in = mul_div(numerator, U256::from(amount_out), denominator)? + U256::one();

        to_u128(amount_in, "v2 amount in")
    }

    /// Amount of token B worth `amount_a` at the current reserve ratio (no fee)
    pub fn quote(amount_a: u128, reserve_a: u128, reserve_b: u128) -> AmmResult<u128> {
        if amount_a == 0 {
            return Err(AmmError::InvalidAmount {
                reason: "quote amount must be positive",
            });
        }
        if reserve_a == 0 || reserve_b == 0 {
            return Err(AmmError::InsufficientLiquidity {
                requested: amount_a,
                available: 0,
            });
        }
        let amount_b = mul_div(
            U256::from(amount_a),
            U256::from(reserve_b),
            U256::from(reserve_a),
        )?;
        to_u128(amount_b, "v2 quote")
    }

    /// Deposit amounts that keep the reserve ratio, bounded by the caller's desired
    /// amounts and minimums. An empty pool accepts the desired amounts as-is.
    pub fn optimal_deposit(
        desired_a: u128,
        desired_b: u128,
        min_a: u128,
        min_b: u128,
        reserve_a: u128,
        reserve_b: u128,
    ) -> AmmResult<(u128, u128)> {
        if reserve_a == 0 && reserve_b == 0 {
            return Ok((desired_a, desired_b));
        }

        let optimal_b = Self::quote(desired_a, reserve_a, reserve_b)?;
        if optimal_b <= desired_b {
            if optimal_b < min_b {
                return Err(AmmError::SlippageExceeded {
                    amount: optimal_b,
                    bound: min_b,
                });
            }
            return Ok((desired_a, optimal_b));
        }

        let optimal_a = Self::quote(desired_b, reserve_b, reserve_a)?;
        // optimal_b > desired_b implies optimal_a <= desired_a up to rounding
        if optimal_a > desired_a {
            return Err(AmmError::SlippageExceeded {
                amount: optimal_a,
                bound: desired_a,
            });
        }
        if optimal_a < min_a {
            return Err(AmmError::SlippageExceeded {
                amount: optimal_a,
                bound: min_a,
            });
        }
        Ok((optimal_a, desired_b))
    }
}

fn fee_multiplier(fee_bps: u32) -> AmmResult<u32> {
    BPS_DENOMINATOR
        .checked_sub(fee_bps)
        .filter(|multiplier| *multiplier > 0)
        .ok_or(AmmError::InvalidAmount {
            reason: "fee must be below 10000 bps",
        })
}
