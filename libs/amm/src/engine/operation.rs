//! Operation descriptors attached to every engine failure

use serde::Serialize;
use thiserror::Error;
use types::{Address, AmmError, ErrorCategory, PoolId, PositionId};

/// A public engine operation and its declared inputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Operation {
    CreatePool {
        token_a: Address,
        token_b: Address,
        fee: Option<u32>,
    },
    GetAmountOutMin {
        token_in: Address,
        token_out: Address,
        amount_in: u128,
    },
    Quote {
        tokens: Vec<Address>,
        amount: u128,
        exact_input: bool,
    },
    Swap {
        token_in: Address,
        token_out: Address,
        amount_in: u128,
        amount_out_min: u128,
        to: Address,
    },
    AddLiquidity {
        token_a: Address,
        token_b: Address,
        amount_a_desired: u128,
        amount_b_desired: u128,
    },
    RemoveLiquidity {
        token_a: Address,
        token_b: Address,
        shares: u128,
    },
    FlashSwap {
        pool: PoolId,
        token: Address,
        amount: u128,
    },
    MintNewPosition {
        token0: Address,
        token1: Address,
        fee: u32,
        tick_lower: i32,
        tick_upper: i32,
        amount0_desired: u128,
        amount1_desired: u128,
    },
    IncreaseLiquidity {
        position: PositionId,
        amount0_desired: u128,
        amount1_desired: u128,
    },
    DecreaseLiquidity {
        position: PositionId,
        liquidity: u128,
    },
    CollectFees {
        position: PositionId,
    },
    BurnPosition {
        position: PositionId,
    },
    PositionQuery {
        position: PositionId,
    },
    SwapExactInput {
        tokens: Vec<Address>,
        amount_in: u128,
        amount_out_minimum: u128,
    },
    SwapExactOutput {
        tokens: Vec<Address>,
        amount_out: u128,
        amount_in_maximum: u128,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreatePool { .. } => "create_pool",
            Self::GetAmountOutMin { .. } => "get_amount_out_min",
            Self::Quote { .. } => "quote",
            Self::Swap { .. } => "swap",
            Self::AddLiquidity { .. } => "add_liquidity",
            Self::RemoveLiquidity { .. } => "remove_liquidity",
            Self::FlashSwap { .. } => "flash_swap",
            Self::MintNewPosition { .. } => "mint_new_position",
            Self::IncreaseLiquidity { .. } => "increase_liquidity",
            Self::DecreaseLiquidity { .. } => "decrease_liquidity",
            Self::CollectFees { .. } => "collect_fees",
            Self::BurnPosition { .. } => "burn_position",
            Self::PositionQuery { .. } => "position_query",
            Self::SwapExactInput { .. } => "swap_exact_input",
            Self::SwapExactOutput { .. } => "swap_exact_output",
        }
    }
}

/// Failure of a public operation: what went wrong and what was asked
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} failed: {kind}", .operation.name())]
pub struct OperationError {
    pub operation: Operation,
    #[source]
    pub kind: AmmError,
}

impl OperationError {
    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }
}

impl From<OperationError> for AmmError {
    fn from(err: OperationError) -> Self {
        err.kind
    }
}

pub type EngineResult<T> = Result<T, OperationError>;
