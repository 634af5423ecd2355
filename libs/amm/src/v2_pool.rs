//! Constant-product pool state
//!
//! Holds reserves and the LP share ledger for one token pair. The pool only does
//! bookkeeping; moving tokens is the engine's job, which calls in here after (or
//! before) instructing the ledger.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;
use types::{sort_tokens, Address, AmmError, AmmResult, PoolId, U256};

use crate::math::{mul_div, mul_div_rounding_up, sqrt, to_u128};
use crate::pool_traits::decimal_ratio;
use crate::v2_math::{V2Math, V2PoolState};

/// Result of a V2 deposit, amounts in the caller's token order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct V2Deposit {
    pub amount_a: u128,
    pub amount_b: u128,
    pub shares: u128,
}

/// `x * y = k` pool over an ordered token pair
#[derive(Debug, Clone)]
pub struct ConstantProductPool {
    id: PoolId,
    token0: Address,
    token1: Address,
    reserve0: u128,
    reserve1: u128,
    fee_bps: u32,
    total_supply: u128,
    shares: HashMap<Address, u128>,
    minimum_liquidity: u128,
    k_last: U256,
}

impl ConstantProductPool {
    pub fn new(
        id: PoolId,
        token_a: Address,
        token_b: Address,
        fee_bps: u32,
        minimum_liquidity: u128,
    ) -> AmmResult<Self> {
        if token_a == token_b {
            return Err(AmmError::IdenticalTokens(token_a));
        }
        let (token0, token1) = sort_tokens(token_a, token_b);
        Ok(Self {
            id,
            token0,
            token1,
            reserve0: 0,
            reserve1: 0,
            fee_bps,
            total_supply: 0,
            shares: HashMap::new(),
            minimum_liquidity,
            k_last: U256::zero(),
        })
    }

    pub fn id(&self) -> PoolId {
        self.id
    }

    pub fn tokens(&self) -> (Address, Address) {
        (self.token0, self.token1)
    }

    pub fn reserves(&self) -> (u128, u128) {
        (self.reserve0, self.reserve1)
    }

    pub fn fee_bps(&self) -> u32 {
        self.fee_bps
    }

    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    pub fn shares_of(&self, owner: Address) -> u128 {
        self.shares.get(&owner).copied().unwrap_or(0)
    }

    /// `reserve0 * reserve1` recorded after the last state change
    pub fn k_last(&self) -> U256 {
        self.k_last
    }

    /// Whether `token_in` is token0, or an error if it is not in the pair
    fn is_token0(&self, token: Address) -> AmmResult<bool> {
        if token == self.token0 {
            Ok(true)
        } else if token == self.token1 {
            Ok(false)
        } else {
            Err(AmmError::invalid_path(format!(
                "token {token:#x} is not in {}",
                self.id
            )))
        }
    }

    /// Reserves oriented for a swap that pays in `token_in`
    pub fn state_for(&self, token_in: Address) -> AmmResult<V2PoolState> {
        let (reserve_in, reserve_out) = if self.is_token0(token_in)? {
            (self.reserve0, self.reserve1)
        } else {
            (self.reserve1, self.reserve0)
        };
        Ok(V2PoolState {
            reserve_in,
            reserve_out,
            fee_bps: self.fee_bps,
        })
    }

    pub fn quote_exact_input(&self, token_in: Address, amount_in: u128) -> AmmResult<u128> {
        self.state_for(token_in)?.get_amount_out(amount_in)
    }

    pub fn quote_exact_output(&self, token_in: Address, amount_out: u128) -> AmmResult<u128> {
        self.state_for(token_in)?.get_amount_in(amount_out)
    }

    /// Applies an exact-input swap; fails before mutating if `amount_out < min_amount_out`
    pub fn swap_exact_input(
        &mut self,
        token_in: Address,
        amount_in: u128,
        min_amount_out: u128,
    ) -> AmmResult<u128> {
        let amount_out = self.quote_exact_input(token_in, amount_in)?;
        if amount_out < min_amount_out {
            return Err(AmmError::SlippageExceeded {
                amount: amount_out,
                bound: min_amount_out,
            });
        }
        self.apply_swap(token_in, amount_in, amount_out)?;
        Ok(amount_out)
    }

    /// Applies an exact-output swap; fails before mutating if the input exceeds `max_amount_in`
    pub fn swap_exact_output(
        &mut self,
        token_in: Address,
        amount_out: u128,
        max_amount_in: u128,
    ) -> AmmResult<u128> {
        let amount_in = self.quote_exact_output(token_in, amount_out)?;
        if amount_in > max_amount_in {
            return Err(AmmError::SlippageExceeded {
                amount: amount_in,
                bound: max_amount_in,
            });
        }
        self.apply_swap(token_in, amount_in, amount_out)?;
        Ok(amount_in)
    }

    fn apply_swap(
        &mut self,
        token_in: Address,
        amount_in: u128,
        amount_out: u128,
    ) -> AmmResult<()> {
        let in_is_token0 = self.is_token0(token_in)?;
        let (reserve_in, reserve_out) = if in_is_token0 {
            (self.reserve0, self.reserve1)
        } else {
            (self.reserve1, self.reserve0)
        };
        let new_in = reserve_in
            .checked_add(amount_in)
            .ok_or_else(|| AmmError::overflow("v2 reserve in"))?;
        let new_out = reserve_out
            .checked_sub(amount_out)
            .ok_or(AmmError::InsufficientLiquidity {
                requested: amount_out,
                available: reserve_out,
            })?;

        let k = U256::from(new_in) * U256::from(new_out);
        if k < self.k_last {
            return Err(AmmError::InvalidAmount {
                reason: "constant product decreased",
            });
        }

        if in_is_token0 {
            self.reserve0 = new_in;
            self.reserve1 = new_out;
        } else {
            self.reserve1 = new_in;
            self.reserve0 = new_out;
        }
        self.k_last = k;
        debug!(
            pool = %self.id,
            reserve0 = self.reserve0,
            reserve1 = self.reserve1,
            "v2 swap applied"
        );
        Ok(())
    }

    fn invariant(&self) -> U256 {
        U256::from(self.reserve0) * U256::from(self.reserve1)
    }

    /// Deposits at the current ratio and mints shares to `owner`
    ///
    /// The first deposit mints `sqrt(amount0 * amount1)` and locks
    /// `minimum_liquidity` of it to the zero address.
    pub fn add_liquidity(
        &mut self,
        owner: Address,
        token_a: Address,
        desired_a: u128,
        desired_b: u128,
        min_a: u128,
        min_b: u128,
    ) -> AmmResult<V2Deposit> {
        if desired_a == 0 || desired_b == 0 {
            return Err(AmmError::InvalidAmount {
                reason: "deposit amounts must be positive",
            });
        }
        let a_is_token0 = self.is_token0(token_a)?;
        let (reserve_a, reserve_b) = if a_is_token0 {
            (self.reserve0, self.reserve1)
        } else {
            (self.reserve1, self.reserve0)
        };

        let (mut amount_a, mut amount_b) =
            V2Math::optimal_deposit(desired_a, desired_b, min_a, min_b, reserve_a, reserve_b)?;

        let shares = if self.total_supply == 0 {
            let root = to_u128(
                sqrt(U256::from(amount_a) * U256::from(amount_b)),
                "v2 initial shares",
            )?;
            if root <= self.minimum_liquidity {
                return Err(AmmError::InsufficientLiquidity {
                    requested: root,
                    available: self.minimum_liquidity,
                });
            }
            root - self.minimum_liquidity
        } else {
            let supply = U256::from(self.total_supply);
            let by_a = mul_div(U256::from(amount_a), supply, U256::from(reserve_a))?;
            let by_b = mul_div(U256::from(amount_b), supply, U256::from(reserve_b))?;
            let minted = to_u128(by_a.min(by_b), "v2 minted shares")?;
            // charge what the minted shares redeem for, rounded up
            amount_a = share_backing(minted, reserve_a, self.total_supply)?;
            amount_b = share_backing(minted, reserve_b, self.total_supply)?;
            minted
        };
        if shares == 0 {
            return Err(AmmError::InvalidAmount {
                reason: "deposit mints zero shares",
            });
        }
        if amount_a < min_a {
            return Err(AmmError::SlippageExceeded {
                amount: amount_a,
                bound: min_a,
            });
        }
        if amount_b < min_b {
            return Err(AmmError::SlippageExceeded {
                amount: amount_b,
                bound: min_b,
            });
        }

        if self.total_supply == 0 && self.minimum_liquidity > 0 {
            *self.shares.entry(Address::zero()).or_default() += self.minimum_liquidity;
            self.total_supply = self.minimum_liquidity;
        }

        let (amount0, amount1) = if a_is_token0 {
            (amount_a, amount_b)
        } else {
            (amount_b, amount_a)
        };
        self.credit(owner, amount0, amount1, shares)?;

        Ok(V2Deposit {
            amount_a,
            amount_b,
            shares,
        })
    }

    /// Mints exactly `shares` to `owner` into a funded pool; returns the
    /// `(amount0, amount1)` the pool must receive for them
    pub fn mint_shares(&mut self, owner: Address, shares: u128) -> AmmResult<(u128, u128)> {
        if self.total_supply == 0 {
            return Err(AmmError::InsufficientLiquidity {
                requested: shares,
                available: 0,
            });
        }
        if shares == 0 {
            return Err(AmmError::InvalidAmount {
                reason: "deposit mints zero shares",
            });
        }
        let amount0 = share_backing(shares, self.reserve0, self.total_supply)?;
        let amount1 = share_backing(shares, self.reserve1, self.total_supply)?;
        self.credit(owner, amount0, amount1, shares)?;
        Ok((amount0, amount1))
    }

    fn credit(
        &mut self,
        owner: Address,
        amount0: u128,
        amount1: u128,
        shares: u128,
    ) -> AmmResult<()> {
        let reserve0 = self
            .reserve0
            .checked_add(amount0)
            .ok_or_else(|| AmmError::overflow("v2 reserve0"))?;
        let reserve1 = self
            .reserve1
            .checked_add(amount1)
            .ok_or_else(|| AmmError::overflow("v2 reserve1"))?;
        let total_supply = self
            .total_supply
            .checked_add(shares)
            .ok_or_else(|| AmmError::overflow("v2 total supply"))?;
        self.reserve0 = reserve0;
        self.reserve1 = reserve1;
        self.total_supply = total_supply;
        *self.shares.entry(owner).or_default() += shares;
        self.k_last = self.invariant();
        Ok(())
    }

    /// Burns `shares` from `owner` and returns `(amount_a, amount_b)` pro rata
    pub fn remove_liquidity(
        &mut self,
        owner: Address,
        token_a: Address,
        shares: u128,
        min_a: u128,
        min_b: u128,
    ) -> AmmResult<(u128, u128)> {
        let balance = self.shares_of(owner);
        if shares > balance {
            return Err(AmmError::InsufficientShares {
                requested: shares,
                balance,
            });
        }
        if shares == 0 || self.total_supply == 0 {
            return Err(AmmError::InvalidAmount {
                reason: "no shares to burn",
            });
        }

        let supply = U256::from(self.total_supply);
        let amount0 = to_u128(
            mul_div(U256::from(shares), U256::from(self.reserve0), supply)?,
            "v2 burn amount0",
        )?;
        let amount1 = to_u128(
            mul_div(U256::from(shares), U256::from(self.reserve1), supply)?,
            "v2 burn amount1",
        )?;
        if amount0 == 0 && amount1 == 0 {
            return Err(AmmError::InvalidAmount {
                reason: "burn returns zero amounts",
            });
        }

        let (amount_a, amount_b) = if self.is_token0(token_a)? {
            (amount0, amount1)
        } else {
            (amount1, amount0)
        };
        if amount_a < min_a {
            return Err(AmmError::SlippageExceeded {
                amount: amount_a,
                bound: min_a,
            });
        }
        if amount_b < min_b {
            return Err(AmmError::SlippageExceeded {
                amount: amount_b,
                bound: min_b,
            });
        }

        self.reserve0 -= amount0;
        self.reserve1 -= amount1;
        self.total_supply -= shares;
        if balance == shares {
            self.shares.remove(&owner);
        } else {
            self.shares.insert(owner, balance - shares);
        }
        self.k_last = self.invariant();

        Ok((amount_a, amount_b))
    }

    /// Adopts ledger balances as reserves, e.g. after a flash repayment added fees
    pub fn sync(&mut self, balance0: u128, balance1: u128) -> AmmResult<()> {
        let k = U256::from(balance0) * U256::from(balance1);
        if k < self.k_last {
            return Err(AmmError::InvalidAmount {
                reason: "constant product decreased",
            });
        }
        self.reserve0 = balance0;
        self.reserve1 = balance1;
        self.k_last = k;
        Ok(())
    }

    /// Marginal price of `token_in` in units of the other token (raw amounts)
    pub fn spot_price(&self, token_in: Address) -> AmmResult<Decimal> {
        let state = self.state_for(token_in)?;
        decimal_ratio(U256::from(state.reserve_out), U256::from(state.reserve_in))
    }
}

/// Reserve backing `shares` out of `supply`, rounded up
fn share_backing(shares: u128, reserve: u128, supply: u128) -> AmmResult<u128> {
    let amount = mul_div_rounding_up(U256::from(shares), U256::from(reserve), U256::from(supply))?;
    to_u128(amount, "v2 share backing")
}
