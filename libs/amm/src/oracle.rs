//! Out-of-band price source for slippage bounds
//!
//! Oracles only help callers choose `min_amount_out`; settlement never reads them.

use std::collections::HashMap;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use types::{Address, AmmError, AmmResult, U256};

use crate::math::{mul_div, to_u128};
use crate::v2_math::BPS_DENOMINATOR;

pub trait PriceOracle {
    /// Expected raw output of `token_out` for `amount_in` raw units of `token_in`
    fn expected_amount_out(&self, token_in: Address, token_out: Address, amount_in: u128)
        -> Option<u128>;
}

/// Fixed prices, in raw units of the output token per raw unit of the input token
#[derive(Debug, Clone, Default)]
pub struct StaticOracle {
    prices: HashMap<(Address, Address), Decimal>,
}

impl StaticOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the price both ways; a non-positive price is ignored
    pub fn set_price(&mut self, token_in: Address, token_out: Address, price: Decimal) {
        if price <= Decimal::ZERO {
            return;
        }
        self.prices.insert((token_in, token_out), price);
        if let Some(inverse) = Decimal::ONE.checked_div(price) {
            self.prices.insert((token_out, token_in), inverse);
        }
    }

    pub fn price(&self, token_in: Address, token_out: Address) -> Option<Decimal> {
        self.prices.get(&(token_in, token_out)).copied()
    }
}

impl PriceOracle for StaticOracle {
    fn expected_amount_out(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: u128,
    ) -> Option<u128> {
        let price = self.price(token_in, token_out)?;
        Decimal::from_u128(amount_in)?
            .checked_mul(price)?
            .floor()
            .to_u128()
    }
}

/// `expected * (10000 - slippage_bps) / 10000`, rounded down
pub fn min_amount_out(expected: u128, slippage_bps: u32) -> AmmResult<u128> {
    if slippage_bps > BPS_DENOMINATOR {
        return Err(AmmError::InvalidAmount {
            reason: "slippage above 100%",
        });
    }
    to_u128(
        mul_div(
            U256::from(expected),
            U256::from(BPS_DENOMINATOR - slippage_bps),
            U256::from(BPS_DENOMINATOR),
        )?,
        "min amount out",
    )
}

/// Oracle-derived minimum output, or `None` when the oracle has no price
pub fn oracle_min_amount_out(
    oracle: &dyn PriceOracle,
    token_in: Address,
    token_out: Address,
    amount_in: u128,
    slippage_bps: u32,
) -> AmmResult<Option<u128>> {
    oracle
        .expected_amount_out(token_in, token_out, amount_in)
        .map(|expected| min_amount_out(expected, slippage_bps))
        .transpose()
}
