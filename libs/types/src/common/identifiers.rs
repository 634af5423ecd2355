//! Typed identifiers for pools, positions and fee tiers
//!
//! Pools are addressed like on-chain accounts so the ledger can hold balances for
//! them. Positions are numbered sequentially by the position manager.

use std::fmt;

use ethereum_types::Address;
use serde::{Deserialize, Serialize};

/// Account-style identifier of a pool; the pool's ledger balances live at this address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PoolId(Address);

impl PoolId {
    pub const fn new(address: Address) -> Self {
        Self(address)
    }

    pub fn address(&self) -> Address {
        self.0
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool:{:#x}", self.0)
    }
}

impl From<PoolId> for Address {
    fn from(id: PoolId) -> Self {
        id.0
    }
}

/// Sequential token id of a managed liquidity position
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PositionId(pub u64);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "position#{}", self.0)
    }
}

/// Pool pricing model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    /// `x * y = k` reserves
    ConstantProduct,
    /// Tick-indexed range liquidity
    Concentrated,
}

impl PoolKind {
    pub fn tag(&self) -> u8 {
        match self {
            Self::ConstantProduct => 2,
            Self::Concentrated => 3,
        }
    }
}

/// Swap fee in hundredths of a basis point (3000 = 0.3%) paired with its tick spacing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeeTier {
    pub fee_pips: u32,
    pub tick_spacing: i32,
}

impl FeeTier {
    pub const LOWEST: Self = Self::new(100, 1);
    pub const LOW: Self = Self::new(500, 10);
    pub const MEDIUM: Self = Self::new(3000, 60);
    pub const HIGH: Self = Self::new(10_000, 200);

    pub const fn new(fee_pips: u32, tick_spacing: i32) -> Self {
        Self {
            fee_pips,
            tick_spacing,
        }
    }
}

/// Orders two token addresses as (token0, token1)
pub fn sort_tokens(token_a: Address, token_b: Address) -> (Address, Address) {
    if token_a < token_b {
        (token_a, token_b)
    } else {
        (token_b, token_a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_tokens_orders_by_address() {
        let dai = Address::from_low_u64_be(0x6b17);
        let wbtc = Address::from_low_u64_be(0x2260);
        assert_eq!(sort_tokens(dai, wbtc), (wbtc, dai));
        assert_eq!(sort_tokens(wbtc, dai), (wbtc, dai));
    }

    #[test]
    fn test_pool_id_display() {
        let id = PoolId::new(Address::from_low_u64_be(1));
        assert_eq!(
            id.to_string(),
            "pool:0x0000000000000000000000000000000000000001"
        );
    }
}
