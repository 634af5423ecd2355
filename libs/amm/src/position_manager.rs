//! Numbered liquidity positions on concentrated pools
//!
//! The manager owns every pool-level position it creates (keyed by its own address and
//! the position's token id as salt) and tracks which account each token id belongs to.
//! Token movements are the engine's job; the manager only does the position math and
//! the bookkeeping, returning the amounts to settle.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;
use types::{Address, AmmError, AmmResult, PoolId, PositionId};

use crate::math::{get_liquidity_for_amounts, get_sqrt_ratio_at_tick};
use crate::pool_traits::LiquidityPool;
use crate::position::PositionKey;
use crate::v3_pool::ConcentratedPool;

/// A position as seen by its owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagedPosition {
    pub owner: Address,
    pub pool: PoolId,
    pub token0: Address,
    pub token1: Address,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity: u128,
}

/// Desired deposit for a new or existing position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositRequest {
    pub amount0_desired: u128,
    pub amount1_desired: u128,
    pub amount0_min: u128,
    pub amount1_min: u128,
}

/// Liquidity added and the token amounts it requires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LiquidityChange {
    pub position: PositionId,
    pub liquidity: u128,
    pub amount0: u128,
    pub amount1: u128,
}

#[derive(Debug, Clone)]
pub struct PositionManager {
    address: Address,
    next_id: u64,
    positions: BTreeMap<PositionId, ManagedPosition>,
}

impl PositionManager {
    /// `address` owns the pool-level positions
    pub fn new(address: Address) -> Self {
        Self {
            address,
            next_id: 1,
            positions: BTreeMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn position(&self, id: PositionId) -> AmmResult<&ManagedPosition> {
        self.positions.get(&id).ok_or(AmmError::PositionNotFound(id))
    }

    pub fn get_liquidity(&self, id: PositionId) -> AmmResult<u128> {
        Ok(self.position(id)?.liquidity)
    }

    /// Token ids held by `owner`, ascending
    pub fn positions_of(&self, owner: Address) -> Vec<PositionId> {
        self.positions
            .iter()
            .filter(|(_, position)| position.owner == owner)
            .map(|(id, _)| *id)
            .collect()
    }

    fn key(&self, id: PositionId, position: &ManagedPosition) -> PositionKey {
        PositionKey::new(self.address, id.0, position.tick_lower, position.tick_upper)
    }

    fn owned(&self, id: PositionId, caller: Address) -> AmmResult<&ManagedPosition> {
        let position = self.position(id)?;
        if position.owner != caller {
            return Err(AmmError::NotPositionOwner {
                position: id,
                caller,
            });
        }
        Ok(position)
    }

    /// Opens a position with as much liquidity as the desired amounts fund
    pub fn mint_new_position(
        &mut self,
        pool: &mut ConcentratedPool,
        owner: Address,
        tick_lower: i32,
        tick_upper: i32,
        request: DepositRequest,
    ) -> AmmResult<LiquidityChange> {
        let id = PositionId(self.next_id);
        let key = PositionKey::new(self.address, id.0, tick_lower, tick_upper);
        let (liquidity, amount0, amount1) = add_liquidity(pool, key, request)?;

        let (token0, token1) = pool.tokens();
        self.positions.insert(
            id,
            ManagedPosition {
                owner,
                pool: pool.id(),
                token0,
                token1,
                tick_lower,
                tick_upper,
                liquidity,
            },
        );
        self.next_id += 1;
        debug!(position = %id, ?owner, liquidity, amount0, amount1, "position minted");
        Ok(LiquidityChange {
            position: id,
            liquidity,
            amount0,
            amount1,
        })
    }

    /// Adds liquidity to an existing position at its range
    pub fn increase_liquidity(
        &mut self,
        pool: &mut ConcentratedPool,
        caller: Address,
        id: PositionId,
        request: DepositRequest,
    ) -> AmmResult<LiquidityChange> {
        let position = self.owned(id, caller)?;
        let key = self.key(id, position);
        let (liquidity, amount0, amount1) = add_liquidity(pool, key, request)?;

        if let Some(position) = self.positions.get_mut(&id) {
            position.liquidity = position
                .liquidity
                .checked_add(liquidity)
                .ok_or_else(|| AmmError::overflow("position liquidity"))?;
        }
        Ok(LiquidityChange {
            position: id,
            liquidity,
            amount0,
            amount1,
        })
    }

    /// Removes liquidity; the released principal becomes collectable, it is not paid out
    pub fn decrease_liquidity(
        &mut self,
        pool: &mut ConcentratedPool,
        caller: Address,
        id: PositionId,
        liquidity: u128,
        amount0_min: u128,
        amount1_min: u128,
    ) -> AmmResult<(u128, u128)> {
        let position = self.owned(id, caller)?;
        if liquidity > position.liquidity {
            return Err(AmmError::InsufficientPositionLiquidity {
                requested: liquidity,
                available: position.liquidity,
            });
        }
        let key = self.key(id, position);
        let (amount0, amount1) =
            pool.amounts_for_burn(key.tick_lower, key.tick_upper, liquidity)?;
        check_minimum(amount0, amount0_min)?;
        check_minimum(amount1, amount1_min)?;

        pool.withdraw(key, liquidity)?;
        if let Some(position) = self.positions.get_mut(&id) {
            position.liquidity -= liquidity;
        }
        debug!(position = %id, liquidity, amount0, amount1, "position decreased");
        Ok((amount0, amount1))
    }

    /// Collects up to the given maxima of fees and released principal
    pub fn collect(
        &mut self,
        pool: &mut ConcentratedPool,
        caller: Address,
        id: PositionId,
        amount0_max: u128,
        amount1_max: u128,
    ) -> AmmResult<(u128, u128)> {
        let position = self.owned(id, caller)?;
        let key = self.key(id, position);
        pool.poke(key)?;
        pool.collect(key, amount0_max, amount1_max)
    }

    /// Fees and principal currently collectable, including fees not yet folded in
    pub fn tokens_owed(&self, pool: &ConcentratedPool, id: PositionId) -> AmmResult<(u128, u128)> {
        let position = self.position(id)?;
        let key = self.key(id, position);
        let mut preview = pool.clone();
        preview.poke(key)?;
        Ok(preview
            .position(&key)
            .map_or((0, 0), |info| (info.tokens_owed_0, info.tokens_owed_1)))
    }

    /// Retires a token id whose liquidity and owed tokens are all withdrawn
    pub fn burn(
        &mut self,
        pool: &ConcentratedPool,
        caller: Address,
        id: PositionId,
    ) -> AmmResult<()> {
        let position = self.owned(id, caller)?;
        let key = self.key(id, position);
        let cleared = position.liquidity == 0
            && pool.position(&key).map_or(true, |info| info.is_empty());
        if !cleared {
            return Err(AmmError::PositionNotCleared(id));
        }
        self.positions.remove(&id);
        debug!(position = %id, "position burned");
        Ok(())
    }
}

fn check_minimum(amount: u128, minimum: u128) -> AmmResult<()> {
    if amount < minimum {
        return Err(AmmError::SlippageExceeded {
            amount,
            bound: minimum,
        });
    }
    Ok(())
}

/// Converts desired amounts to liquidity, checks minima, then mints
fn add_liquidity(
    pool: &mut ConcentratedPool,
    key: PositionKey,
    request: DepositRequest,
) -> AmmResult<(u128, u128, u128)> {
    let liquidity = get_liquidity_for_amounts(
        pool.sqrt_price_x96(),
        get_sqrt_ratio_at_tick(key.tick_lower)?,
        get_sqrt_ratio_at_tick(key.tick_upper)?,
        request.amount0_desired,
        request.amount1_desired,
    )?;
    if liquidity == 0 {
        return Err(AmmError::InvalidAmount {
            reason: "desired amounts fund zero liquidity",
        });
    }
    let (amount0, amount1) = pool.amounts_for_mint(key.tick_lower, key.tick_upper, liquidity)?;
    check_minimum(amount0, request.amount0_min)?;
    check_minimum(amount1, request.amount1_min)?;
    pool.provide(key, liquidity)?;
    Ok((liquidity, amount0, amount1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Q96;
    use types::FeeTier;

    const E18: u128 = 1_000_000_000_000_000_000;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    fn pool() -> ConcentratedPool {
        let mut pool =
            ConcentratedPool::new(PoolId::new(addr(0xcc)), addr(1), addr(2), FeeTier::LOWEST)
                .unwrap();
        pool.initialize(Q96).unwrap();
        pool
    }

    fn request(amount0: u128, amount1: u128) -> DepositRequest {
        DepositRequest {
            amount0_desired: amount0,
            amount1_desired: amount1,
            amount0_min: 0,
            amount1_min: 0,
        }
    }

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let mut pool = pool();
        let mut manager = PositionManager::new(addr(0xaa));
        let first = manager
            .mint_new_position(&mut pool, addr(7), -100, 100, request(100 * E18, 100 * E18))
            .unwrap();
        let second = manager
            .mint_new_position(&mut pool, addr(8), -100, 100, request(E18, E18))
            .unwrap();
        assert_eq!(first.position, PositionId(1));
        assert_eq!(second.position, PositionId(2));
        assert!(first.amount0 <= 100 * E18 && first.amount1 <= 100 * E18);
        assert_eq!(pool.liquidity(), first.liquidity + second.liquidity);
        assert_eq!(manager.positions_of(addr(7)), vec![PositionId(1)]);
    }

    #[test]
    fn test_ownership_enforced() {
        let mut pool = pool();
        let mut manager = PositionManager::new(addr(0xaa));
        let minted = manager
            .mint_new_position(&mut pool, addr(7), -100, 100, request(E18, E18))
            .unwrap();
        assert_eq!(
            manager
                .decrease_liquidity(&mut pool, addr(8), minted.position, 1, 0, 0)
                .unwrap_err(),
            AmmError::NotPositionOwner {
                position: minted.position,
                caller: addr(8)
            }
        );
        assert!(matches!(
            manager.get_liquidity(PositionId(99)),
            Err(AmmError::PositionNotFound(_))
        ));
    }

    #[test]
    fn test_full_lifecycle_leaves_nothing_owed() {
        let mut pool = pool();
        let mut manager = PositionManager::new(addr(0xaa));
        let minted = manager
            .mint_new_position(&mut pool, addr(7), -100, 100, request(100 * E18, 100 * E18))
            .unwrap();
        let id = minted.position;

        let added = manager
            .increase_liquidity(&mut pool, addr(7), id, request(E18, E18))
            .unwrap();
        let total = minted.liquidity + added.liquidity;
        assert_eq!(manager.get_liquidity(id).unwrap(), total);

        assert!(matches!(
            manager.decrease_liquidity(&mut pool, addr(7), id, total + 1, 0, 0),
            Err(AmmError::InsufficientPositionLiquidity { .. })
        ));
        assert!(matches!(
            manager.burn(&pool, addr(7), id),
            Err(AmmError::PositionNotCleared(_))
        ));

        let (amount0, amount1) = manager
            .decrease_liquidity(&mut pool, addr(7), id, total, 0, 0)
            .unwrap();
        assert_eq!(manager.get_liquidity(id).unwrap(), 0);
        assert_eq!(manager.tokens_owed(&pool, id).unwrap(), (amount0, amount1));

        let collected = manager
            .collect(&mut pool, addr(7), id, u128::MAX, u128::MAX)
            .unwrap();
        assert_eq!(collected, (amount0, amount1));
        assert_eq!(
            manager
                .collect(&mut pool, addr(7), id, u128::MAX, u128::MAX)
                .unwrap(),
            (0, 0)
        );
        manager.burn(&pool, addr(7), id).unwrap();
        assert!(manager.position(id).is_err());
    }

    #[test]
    fn test_minimums_checked_before_mutation() {
        let mut pool = pool();
        let mut manager = PositionManager::new(addr(0xaa));
        let mut strict = request(E18, E18);
        strict.amount0_min = E18 + 1;
        assert!(matches!(
            manager.mint_new_position(&mut pool, addr(7), -100, 100, strict),
            Err(AmmError::SlippageExceeded { .. })
        ));
        assert_eq!(pool.liquidity(), 0);
        assert!(pool.ticks().is_empty());
    }

    #[test]
    fn test_collect_capped_by_maxima() {
        let mut pool = pool();
        let mut manager = PositionManager::new(addr(0xaa));
        let minted = manager
            .mint_new_position(&mut pool, addr(7), -100, 100, request(E18, E18))
            .unwrap();
        let (amount0, _) = manager
            .decrease_liquidity(&mut pool, addr(7), minted.position, minted.liquidity, 0, 0)
            .unwrap();
        let (first, _) = manager
            .collect(&mut pool, addr(7), minted.position, 10, 0)
            .unwrap();
        assert_eq!(first, 10);
        let (rest, _) = manager
            .collect(&mut pool, addr(7), minted.position, u128::MAX, 0)
            .unwrap();
        assert_eq!(first + rest, amount0);
    }
}
