//! Flash-borrow fees, records and reentrancy tracking
//!
//! A flash borrow lives entirely inside one engine call: the pool's tokens go out,
//! the caller's repayment step runs, and the pool balance is checked exactly once
//! afterwards. The types here carry that lifecycle; the engine drives it.

use std::collections::HashSet;

use serde::Serialize;
use types::{Address, AmmError, AmmResult, PoolId, U256};

use crate::math::{mul_div_rounding_up, to_u128, FEE_PIPS_DENOMINATOR};
use crate::v2_math::BPS_DENOMINATOR;

/// Flash fee as a fraction of the borrowed amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlashFee {
    pub numerator: u32,
    pub denominator: u32,
}

impl FlashFee {
    /// Fee a constant-product pool needs so that `reserve * k` is preserved:
    /// `fee_bps / (10000 - fee_bps)`, i.e. 3/997 at 30 bps
    pub fn constant_product(fee_bps: u32) -> Self {
        Self {
            numerator: fee_bps,
            denominator: BPS_DENOMINATOR.saturating_sub(fee_bps),
        }
    }

    /// Concentrated pools charge their swap fee on the borrowed amount
    pub fn concentrated(fee_pips: u32) -> Self {
        Self {
            numerator: fee_pips,
            denominator: FEE_PIPS_DENOMINATOR,
        }
    }

    /// `ceil(amount * numerator / denominator)`
    pub fn fee_for(&self, amount: u128) -> AmmResult<u128> {
        let fee = mul_div_rounding_up(
            U256::from(amount),
            U256::from(self.numerator),
            U256::from(self.denominator),
        )?;
        to_u128(fee, "flash fee")
    }

    /// Borrowed amount plus fee
    pub fn required_repayment(&self, amount: u128) -> AmmResult<u128> {
        amount
            .checked_add(self.fee_for(amount)?)
            .ok_or_else(|| AmmError::overflow("flash repayment"))
    }
}

/// Lifecycle of a borrow within its enclosing operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashState {
    Idle,
    Borrowed,
    Repaid,
}

/// One flash borrow against a pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlashBorrowRecord {
    pub pool: PoolId,
    pub token: Address,
    pub amount: u128,
    pub fee: u128,
    pub required_repayment: u128,
    /// Pool balance of `token` before the borrow
    pub balance_before: u128,
    pub state: FlashState,
}

impl FlashBorrowRecord {
    pub fn new(
        pool: PoolId,
        token: Address,
        amount: u128,
        fee: FlashFee,
        balance_before: u128,
    ) -> AmmResult<Self> {
        if amount == 0 {
            return Err(AmmError::InvalidAmount {
                reason: "flash borrow amount must be positive",
            });
        }
        let fee_amount = fee.fee_for(amount)?;
        Ok(Self {
            pool,
            token,
            amount,
            fee: fee_amount,
            required_repayment: amount + fee_amount,
            balance_before,
            state: FlashState::Idle,
        })
    }

    /// Moves `Idle -> Borrowed`
    pub fn mark_borrowed(&mut self) {
        self.state = FlashState::Borrowed;
    }

    /// Post-condition check: the pool must hold at least its pre-borrow balance plus
    /// the fee. Moves `Borrowed -> Repaid` or reports the shortfall.
    pub fn settle(&mut self, balance_after: u128) -> AmmResult<u128> {
        let floor = self
            .balance_before
            .checked_add(self.fee)
            .ok_or_else(|| AmmError::overflow("flash settlement"))?;
        // balance went from before - amount to after, so this is what came back
        let repaid = balance_after
            .saturating_add(self.amount)
            .saturating_sub(self.balance_before);
        if balance_after < floor {
            return Err(AmmError::FlashRepaymentShortfall {
                pool: self.pool,
                required: self.required_repayment,
                repaid,
            });
        }
        self.state = FlashState::Repaid;
        Ok(repaid)
    }
}

/// Pools with an open borrow in the current call stack
#[derive(Debug, Clone, Default)]
pub struct FlashGuard {
    open: HashSet<PoolId>,
}

impl FlashGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `pool` as borrowed; a second borrow before repayment is rejected
    pub fn enter(&mut self, pool: PoolId) -> AmmResult<()> {
        if !self.open.insert(pool) {
            return Err(AmmError::ReentrantBorrow { pool });
        }
        Ok(())
    }

    pub fn exit(&mut self, pool: PoolId) {
        self.open.remove(&pool);
    }

    pub fn is_open(&self, pool: PoolId) -> bool {
        self.open.contains(&pool)
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }
}
