//! Range positions inside a concentrated-liquidity pool

use serde::Serialize;
use types::{Address, AmmError, AmmResult, U256};

use crate::math::{add_delta, mul_div, to_u128, Q128};

/// Identifies a position within one pool
///
/// `salt` lets a single owner (such as the position manager) keep several
/// independent positions over the same range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PositionKey {
    pub owner: Address,
    pub salt: u64,
    pub tick_lower: i32,
    pub tick_upper: i32,
}

impl PositionKey {
    pub fn new(owner: Address, salt: u64, tick_lower: i32, tick_upper: i32) -> Self {
        Self {
            owner,
            salt,
            tick_lower,
            tick_upper,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PositionInfo {
    pub liquidity: u128,
    /// Fee growth inside the range at the last touch
    pub fee_growth_inside_0_last_x128: U256,
    pub fee_growth_inside_1_last_x128: U256,
    /// Fees and withdrawn principal not yet collected
    pub tokens_owed_0: u128,
    pub tokens_owed_1: u128,
}

impl PositionInfo {
    /// Accrues fees earned since the last touch and applies `liquidity_delta`
    pub fn update(
        &mut self,
        liquidity_delta: i128,
        fee_growth_inside_0_x128: U256,
        fee_growth_inside_1_x128: U256,
    ) -> AmmResult<()> {
        if liquidity_delta == 0 && self.liquidity == 0 {
            return Err(AmmError::InvalidAmount {
                reason: "cannot poke an empty position",
            });
        }
        let liquidity_next = add_delta(self.liquidity, liquidity_delta)?;

        let owed_0 = fees_earned(
            fee_growth_inside_0_x128,
            self.fee_growth_inside_0_last_x128,
            self.liquidity,
        )?;
        let owed_1 = fees_earned(
            fee_growth_inside_1_x128,
            self.fee_growth_inside_1_last_x128,
            self.liquidity,
        )?;

        self.tokens_owed_0 = self
            .tokens_owed_0
            .checked_add(owed_0)
            .ok_or_else(|| AmmError::overflow("tokens owed 0"))?;
        self.tokens_owed_1 = self
            .tokens_owed_1
            .checked_add(owed_1)
            .ok_or_else(|| AmmError::overflow("tokens owed 1"))?;
        self.liquidity = liquidity_next;
        self.fee_growth_inside_0_last_x128 = fee_growth_inside_0_x128;
        self.fee_growth_inside_1_last_x128 = fee_growth_inside_1_x128;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.liquidity == 0 && self.tokens_owed_0 == 0 && self.tokens_owed_1 == 0
    }
}

/// `(inside_now - inside_last) * liquidity / 2^128`, with the growth delta taken mod 2^256
fn fees_earned(inside_now: U256, inside_last: U256, liquidity: u128) -> AmmResult<u128> {
    let growth = inside_now.overflowing_sub(inside_last).0;
    to_u128(
        mul_div(growth, U256::from(liquidity), Q128)?,
        "position fees earned",
    )
}
