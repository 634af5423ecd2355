//! # AMM Types Library
//!
//! Shared vocabulary for the AMM engine crates: tokens with their native precision,
//! typed identifiers for pools and positions, and the error taxonomy every operation
//! reports through.
//!
//! ## Design Philosophy
//!
//! - **No Precision Loss**: amounts are raw integers in each token's smallest unit
//! - **Typed Identifiers**: pools and positions cannot be confused with accounts
//! - **Specific Failures**: every rejection names its kind and the values involved
//!
//! ```rust
//! use types::{precision::tokens, sort_tokens};
//!
//! let (token0, token1) = sort_tokens(tokens::DAI, tokens::WBTC);
//! assert_eq!(token0, tokens::WBTC);
//! assert_eq!(token1, tokens::DAI);
//! ```

pub mod common;
pub mod precision;

pub use common::{
    sort_tokens, AmmError, AmmResult, ErrorCategory, FeeTier, PoolId, PoolKind, PositionId,
};
pub use ethereum_types::{Address, U256, U512};
pub use precision::Token;
