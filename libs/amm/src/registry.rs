//! Pool registry: creation, lookup by pair and fee, and deterministic pool ids

use std::collections::{BTreeMap, HashMap};

use amm_config::{V2Config, V3Config};
use sha3::{Digest, Keccak256};
use tracing::info;
use types::{sort_tokens, Address, AmmError, AmmResult, FeeTier, PoolId, PoolKind, U256};

use crate::pool_traits::Pool;
use crate::v2_pool::ConstantProductPool;
use crate::v3_pool::ConcentratedPool;

/// Lookup key: sorted pair, model and fee (bps for constant product, pips for concentrated)
type PairKey = (Address, Address, PoolKind, u32);

/// Derives a pool's address from its defining parameters:
/// the last 20 bytes of `keccak256(token0 ‖ token1 ‖ fee_be ‖ kind_tag)`
pub fn derive_pool_id(token_a: Address, token_b: Address, fee: u32, kind: PoolKind) -> PoolId {
    let (token0, token1) = sort_tokens(token_a, token_b);
    let mut hasher = Keccak256::new();
    hasher.update(token0.as_bytes());
    hasher.update(token1.as_bytes());
    hasher.update(fee.to_be_bytes());
    hasher.update([kind.tag()]);
    let hash = hasher.finalize();
    PoolId::new(Address::from_slice(&hash[12..]))
}

/// All pools known to an engine
#[derive(Debug, Clone)]
pub struct PoolRegistry {
    v2: V2Config,
    v3: V3Config,
    pools: BTreeMap<PoolId, Pool>,
    by_pair: HashMap<PairKey, PoolId>,
}

impl PoolRegistry {
    pub fn new(v2: V2Config, v3: V3Config) -> Self {
        Self {
            v2,
            v3,
            pools: BTreeMap::new(),
            by_pair: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PoolId, &Pool)> {
        self.pools.iter()
    }

    /// Creates a constant-product pool with the configured fee
    pub fn create_v2_pool(&mut self, token_a: Address, token_b: Address) -> AmmResult<PoolId> {
        let fee_bps = self.v2.fee_bps;
        let key = pair_key(token_a, token_b, PoolKind::ConstantProduct, fee_bps);
        let id = derive_pool_id(token_a, token_b, fee_bps, PoolKind::ConstantProduct);
        if self.by_pair.contains_key(&key) {
            return Err(AmmError::PoolAlreadyExists(id));
        }
        let pool = ConstantProductPool::new(
            id,
            token_a,
            token_b,
            fee_bps,
            u128::from(self.v2.minimum_liquidity),
        )?;
        self.insert(key, pool.into());
        info!(pool = %id, ?token_a, ?token_b, fee_bps, "v2 pool created");
        Ok(id)
    }

    /// Creates and initializes a concentrated pool for an enabled fee tier
    pub fn create_v3_pool(
        &mut self,
        token_a: Address,
        token_b: Address,
        fee_pips: u32,
        sqrt_price_x96: U256,
    ) -> AmmResult<PoolId> {
        let tick_spacing = self
            .v3
            .tick_spacing(fee_pips)
            .ok_or(AmmError::UnsupportedFeeTier(fee_pips))?;
        let key = pair_key(token_a, token_b, PoolKind::Concentrated, fee_pips);
        let id = derive_pool_id(token_a, token_b, fee_pips, PoolKind::Concentrated);
        if self.by_pair.contains_key(&key) {
            return Err(AmmError::PoolAlreadyExists(id));
        }
        let mut pool =
            ConcentratedPool::new(id, token_a, token_b, FeeTier::new(fee_pips, tick_spacing))?;
        pool.initialize(sqrt_price_x96)?;
        info!(pool = %id, ?token_a, ?token_b, fee_pips, tick = pool.tick(), "v3 pool created");
        self.insert(key, pool.into());
        Ok(id)
    }

    fn insert(&mut self, key: PairKey, pool: Pool) {
        let id = match &pool {
            Pool::ConstantProduct(p) => p.id(),
            Pool::Concentrated(p) => p.id(),
        };
        self.by_pair.insert(key, id);
        self.pools.insert(id, pool);
    }

    /// Finds the pool for a pair: the constant-product pool when `fee` is `None`,
    /// otherwise the concentrated pool of that fee tier
    pub fn resolve(
        &self,
        token_a: Address,
        token_b: Address,
        fee: Option<u32>,
    ) -> AmmResult<PoolId> {
        let key = match fee {
            None => pair_key(token_a, token_b, PoolKind::ConstantProduct, self.v2.fee_bps),
            Some(fee_pips) => pair_key(token_a, token_b, PoolKind::Concentrated, fee_pips),
        };
        self.by_pair
            .get(&key)
            .copied()
            .ok_or(AmmError::PoolNotFound {
                token_a,
                token_b,
                fee,
            })
    }

    pub fn get(&self, id: PoolId) -> AmmResult<&Pool> {
        self.pools.get(&id).ok_or(AmmError::UnknownPool(id))
    }

    pub fn get_mut(&mut self, id: PoolId) -> AmmResult<&mut Pool> {
        self.pools.get_mut(&id).ok_or(AmmError::UnknownPool(id))
    }

    pub fn v2(&self, id: PoolId) -> AmmResult<&ConstantProductPool> {
        self.get(id)?.as_v2().ok_or(AmmError::UnknownPool(id))
    }

    pub fn v2_mut(&mut self, id: PoolId) -> AmmResult<&mut ConstantProductPool> {
        self.get_mut(id)?.as_v2_mut().ok_or(AmmError::UnknownPool(id))
    }

    pub fn v3(&self, id: PoolId) -> AmmResult<&ConcentratedPool> {
        self.get(id)?.as_v3().ok_or(AmmError::UnknownPool(id))
    }

    pub fn v3_mut(&mut self, id: PoolId) -> AmmResult<&mut ConcentratedPool> {
        self.get_mut(id)?.as_v3_mut().ok_or(AmmError::UnknownPool(id))
    }
}

fn pair_key(token_a: Address, token_b: Address, kind: PoolKind, fee: u32) -> PairKey {
    let (token0, token1) = sort_tokens(token_a, token_b);
    (token0, token1, kind, fee)
}
