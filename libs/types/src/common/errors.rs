//! Error taxonomy for AMM operations
//!
//! Every failure the engine can report is one [`AmmError`] variant. Variants carry the
//! values that caused the rejection so integration layers can act on them without
//! parsing messages. Errors are never recovered inside the engine: the enclosing
//! operation is aborted and its tentative state discarded.

use ethereum_types::Address;
use thiserror::Error;

use super::identifiers::{PoolId, PositionId};

/// Result alias used across the math kernel and pool models
pub type AmmResult<T> = std::result::Result<T, AmmError>;

/// Broad classification of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Market conditions rejected the request (slippage, liquidity, balances)
    Economic,
    /// The request itself is malformed or breaks a pool invariant
    Programming,
}

/// All failure kinds produced by the engine
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmmError {
    #[error("Arithmetic overflow in {context}")]
    ArithmeticOverflow { context: &'static str },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: &'static str },

    #[error("Insufficient liquidity: requested {requested}, available {available}")]
    InsufficientLiquidity { requested: u128, available: u128 },

    #[error("Insufficient shares: requested {requested}, balance {balance}")]
    InsufficientShares { requested: u128, balance: u128 },

    #[error("Insufficient position liquidity: requested {requested}, available {available}")]
    InsufficientPositionLiquidity { requested: u128, available: u128 },

    /// `amount` violated `bound` (a minimum output or a maximum input)
    #[error("Slippage exceeded: amount {amount} violates bound {bound}")]
    SlippageExceeded { amount: u128, bound: u128 },

    #[error("Invalid path: {reason}")]
    InvalidPath { reason: String },

    #[error("Pool not found for {token_a:#x}/{token_b:#x} (fee {fee:?})")]
    PoolNotFound {
        token_a: Address,
        token_b: Address,
        fee: Option<u32>,
    },

    #[error("Unknown pool {0}")]
    UnknownPool(PoolId),

    #[error("Insufficient balance of {token:#x} for {account:#x}: {available} < {needed}")]
    InsufficientBalance {
        token: Address,
        account: Address,
        needed: u128,
        available: u128,
    },

    #[error("Insufficient allowance of {token:#x} for {spender:#x}: {allowed} < {needed}")]
    InsufficientAllowance {
        token: Address,
        owner: Address,
        spender: Address,
        needed: u128,
        allowed: u128,
    },

    #[error("Flash repayment shortfall on {pool}: required {required}, repaid {repaid}")]
    FlashRepaymentShortfall {
        pool: PoolId,
        required: u128,
        repaid: u128,
    },

    #[error("Reentrant flash borrow on {pool} while a borrow is still open")]
    ReentrantBorrow { pool: PoolId },

    #[error("Price limit reached with {amount_remaining} left unfilled")]
    PriceLimitReached { amount_remaining: u128 },

    #[error("Invalid tick range [{tick_lower}, {tick_upper}]")]
    InvalidTickRange { tick_lower: i32, tick_upper: i32 },

    #[error("Tick {tick} out of bounds")]
    TickOutOfBounds { tick: i32 },

    #[error("Invalid sqrt price {sqrt_price_x96}")]
    InvalidSqrtPrice { sqrt_price_x96: String },

    #[error("Position {0} not found")]
    PositionNotFound(PositionId),

    #[error("Position {position} is not owned by {caller:#x}")]
    NotPositionOwner { position: PositionId, caller: Address },

    #[error("Position {0} still holds liquidity or owed tokens")]
    PositionNotCleared(PositionId),

    #[error("Pool already exists: {0}")]
    PoolAlreadyExists(PoolId),

    #[error("Identical tokens {0:#x}")]
    IdenticalTokens(Address),

    #[error("Unsupported fee tier {0}")]
    UnsupportedFeeTier(u32),

    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: &'static str },
}

impl AmmError {
    pub fn overflow(context: &'static str) -> Self {
        Self::ArithmeticOverflow { context }
    }

    pub fn division_by_zero(context: &'static str) -> Self {
        Self::DivisionByZero { context }
    }

    pub fn invalid_path(reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            reason: reason.into(),
        }
    }

    /// Separates economic rejections from malformed requests
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InsufficientLiquidity { .. }
            | Self::InsufficientShares { .. }
            | Self::InsufficientPositionLiquidity { .. }
            | Self::SlippageExceeded { .. }
            | Self::InsufficientBalance { .. }
            | Self::InsufficientAllowance { .. }
            | Self::FlashRepaymentShortfall { .. }
            | Self::PriceLimitReached { .. } => ErrorCategory::Economic,
            _ => ErrorCategory::Programming,
        }
    }

    pub fn is_economic(&self) -> bool {
        self.category() == ErrorCategory::Economic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_split() {
        let slippage = AmmError::SlippageExceeded {
            amount: 9,
            bound: 10,
        };
        assert!(slippage.is_economic());

        let path = AmmError::invalid_path("empty path");
        assert_eq!(path.category(), ErrorCategory::Programming);

        let reentrant = AmmError::ReentrantBorrow {
            pool: PoolId::new(Address::repeat_byte(0x11)),
        };
        assert_eq!(reentrant.category(), ErrorCategory::Programming);
    }

    #[test]
    fn test_messages_carry_inputs() {
        let err = AmmError::FlashRepaymentShortfall {
            pool: PoolId::new(Address::repeat_byte(0xab)),
            required: 501_504_514,
            repaid: 501_504_513,
        };
        let msg = err.to_string();
        assert!(msg.contains("501504514"));
        assert!(msg.contains("501504513"));
    }
}
