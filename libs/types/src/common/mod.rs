//! Common types shared by every AMM crate

pub mod errors;
pub mod identifiers;

pub use errors::{AmmError, AmmResult, ErrorCategory};
pub use identifiers::{sort_tokens, FeeTier, PoolId, PoolKind, PositionId};
