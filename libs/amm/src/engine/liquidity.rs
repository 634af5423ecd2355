//! Liquidity surface: constant-product deposits and managed concentrated positions

use tracing::info;
use types::{Address, AmmError, AmmResult, PoolId, PositionId};

use super::{Engine, EngineResult, Operation};
use crate::ledger::Ledger;
use crate::position_manager::{DepositRequest, LiquidityChange, ManagedPosition};
use crate::v2_pool::V2Deposit;

/// Parameters of a new concentrated position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintParams {
    /// Must sort before `token1`
    pub token0: Address,
    pub token1: Address,
    pub fee: u32,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub amount0_desired: u128,
    pub amount1_desired: u128,
    pub amount0_min: u128,
    pub amount1_min: u128,
}

impl<L: Ledger> Engine<L> {
    /// Deposits into the constant-product pool of a pair, creating it if needed;
    /// shares are credited to `caller`
    #[allow(clippy::too_many_arguments)]
    pub fn add_liquidity(
        &mut self,
        caller: Address,
        token_a: Address,
        token_b: Address,
        amount_a_desired: u128,
        amount_b_desired: u128,
        amount_a_min: u128,
        amount_b_min: u128,
    ) -> EngineResult<V2Deposit> {
        let operation = Operation::AddLiquidity {
            token_a,
            token_b,
            amount_a_desired,
            amount_b_desired,
        };
        self.atomic(operation, |engine| {
            let pool_id = match engine.registry.resolve(token_a, token_b, None) {
                Ok(id) => id,
                Err(AmmError::PoolNotFound { .. }) => {
                    engine.registry.create_v2_pool(token_a, token_b)?
                }
                Err(err) => return Err(err),
            };
            engine.ensure_unlocked(pool_id)?;
            let deposit = engine.registry.v2_mut(pool_id)?.add_liquidity(
                caller,
                token_a,
                amount_a_desired,
                amount_b_desired,
                amount_a_min,
                amount_b_min,
            )?;
            engine.pull(token_a, caller, pool_id, deposit.amount_a)?;
            engine.pull(token_b, caller, pool_id, deposit.amount_b)?;
            info!(
                pool = %pool_id,
                ?caller,
                amount_a = deposit.amount_a,
                amount_b = deposit.amount_b,
                shares = deposit.shares,
                "v2 liquidity added"
            );
            Ok(deposit)
        })
    }

    /// Burns `shares` of the pair's pool and pays both tokens to `caller`
    pub fn remove_liquidity(
        &mut self,
        caller: Address,
        token_a: Address,
        token_b: Address,
        shares: u128,
        amount_a_min: u128,
        amount_b_min: u128,
    ) -> EngineResult<(u128, u128)> {
        let operation = Operation::RemoveLiquidity {
            token_a,
            token_b,
            shares,
        };
        self.atomic(operation, |engine| {
            let pool_id = engine.registry.resolve(token_a, token_b, None)?;
            engine.ensure_unlocked(pool_id)?;
            let (amount_a, amount_b) = engine.registry.v2_mut(pool_id)?.remove_liquidity(
                caller,
                token_a,
                shares,
                amount_a_min,
                amount_b_min,
            )?;
            engine.pay(token_a, pool_id, caller, amount_a)?;
            engine.pay(token_b, pool_id, caller, amount_b)?;
            info!(pool = %pool_id, ?caller, amount_a, amount_b, shares, "v2 liquidity removed");
            Ok((amount_a, amount_b))
        })
    }

    /// Constant-product pool shares held by `owner`
    pub fn shares_of(&self, token_a: Address, token_b: Address, owner: Address) -> u128 {
        self.registry
            .resolve(token_a, token_b, None)
            .and_then(|id| self.registry.v2(id))
            .map_or(0, |pool| pool.shares_of(owner))
    }

    /// Opens a managed position for `caller` and pulls the amounts it needs
    pub fn mint_new_position(
        &mut self,
        caller: Address,
        params: MintParams,
    ) -> EngineResult<LiquidityChange> {
        let operation = Operation::MintNewPosition {
            token0: params.token0,
            token1: params.token1,
            fee: params.fee,
            tick_lower: params.tick_lower,
            tick_upper: params.tick_upper,
            amount0_desired: params.amount0_desired,
            amount1_desired: params.amount1_desired,
        };
        self.atomic(operation, |engine| {
            if params.token0 >= params.token1 {
                return Err(AmmError::invalid_path("token0 must sort before token1"));
            }
            let pool_id = engine
                .registry
                .resolve(params.token0, params.token1, Some(params.fee))?;
            engine.ensure_unlocked(pool_id)?;
            let request = DepositRequest {
                amount0_desired: params.amount0_desired,
                amount1_desired: params.amount1_desired,
                amount0_min: params.amount0_min,
                amount1_min: params.amount1_min,
            };
            let pool = engine.registry.v3_mut(pool_id)?;
            let change = engine.positions.mint_new_position(
                pool,
                caller,
                params.tick_lower,
                params.tick_upper,
                request,
            )?;
            engine.pull(params.token0, caller, pool_id, change.amount0)?;
            engine.pull(params.token1, caller, pool_id, change.amount1)?;
            info!(
                pool = %pool_id,
                position = %change.position,
                liquidity = change.liquidity,
                amount0 = change.amount0,
                amount1 = change.amount1,
                "position minted"
            );
            Ok(change)
        })
    }

    /// Adds liquidity to an existing position at the pool's current price
    pub fn increase_liquidity_current_range(
        &mut self,
        caller: Address,
        position: PositionId,
        amount0_desired: u128,
        amount1_desired: u128,
    ) -> EngineResult<LiquidityChange> {
        let operation = Operation::IncreaseLiquidity {
            position,
            amount0_desired,
            amount1_desired,
        };
        self.atomic(operation, |engine| {
            let (pool_id, token0, token1) = engine.position_pool(position)?;
            engine.ensure_unlocked(pool_id)?;
            let request = DepositRequest {
                amount0_desired,
                amount1_desired,
                amount0_min: 0,
                amount1_min: 0,
            };
            let pool = engine.registry.v3_mut(pool_id)?;
            let change = engine
                .positions
                .increase_liquidity(pool, caller, position, request)?;
            engine.pull(token0, caller, pool_id, change.amount0)?;
            engine.pull(token1, caller, pool_id, change.amount1)?;
            Ok(change)
        })
    }

    /// Removes liquidity from a position; the principal becomes collectable
    pub fn decrease_liquidity(
        &mut self,
        caller: Address,
        position: PositionId,
        liquidity: u128,
        amount0_min: u128,
        amount1_min: u128,
    ) -> EngineResult<(u128, u128)> {
        let operation = Operation::DecreaseLiquidity {
            position,
            liquidity,
        };
        self.atomic(operation, |engine| {
            let (pool_id, _, _) = engine.position_pool(position)?;
            engine.ensure_unlocked(pool_id)?;
            let pool = engine.registry.v3_mut(pool_id)?;
            engine.positions.decrease_liquidity(
                pool,
                caller,
                position,
                liquidity,
                amount0_min,
                amount1_min,
            )
        })
    }

    /// Pays out everything a position is owed (fees and released principal)
    pub fn collect_all_fees(
        &mut self,
        caller: Address,
        position: PositionId,
    ) -> EngineResult<(u128, u128)> {
        let operation = Operation::CollectFees { position };
        self.atomic(operation, |engine| {
            let (pool_id, token0, token1) = engine.position_pool(position)?;
            engine.ensure_unlocked(pool_id)?;
            let pool = engine.registry.v3_mut(pool_id)?;
            let (amount0, amount1) =
                engine
                    .positions
                    .collect(pool, caller, position, u128::MAX, u128::MAX)?;
            engine.pay(token0, pool_id, caller, amount0)?;
            engine.pay(token1, pool_id, caller, amount1)?;
            info!(position = %position, amount0, amount1, "fees collected");
            Ok((amount0, amount1))
        })
    }

    /// Retires an emptied position
    pub fn burn_position(&mut self, caller: Address, position: PositionId) -> EngineResult<()> {
        self.atomic(Operation::BurnPosition { position }, |engine| {
            let (pool_id, _, _) = engine.position_pool(position)?;
            let pool = engine.registry.v3(pool_id)?;
            engine.positions.burn(pool, caller, position)
        })
    }

    /// Liquidity currently held by a position
    pub fn get_liquidity(&self, position: PositionId) -> EngineResult<u128> {
        self.read(Operation::PositionQuery { position }, |engine| {
            engine.positions.get_liquidity(position)
        })
    }

    pub fn position(&self, position: PositionId) -> Option<&ManagedPosition> {
        self.positions.position(position).ok()
    }

    /// Most recently minted position still held by `owner`
    pub fn token_id(&self, owner: Address) -> Option<PositionId> {
        self.positions.positions_of(owner).last().copied()
    }

    /// Fees and principal collectable right now by a position
    pub fn tokens_owed(&self, position: PositionId) -> EngineResult<(u128, u128)> {
        self.read(Operation::PositionQuery { position }, |engine| {
            let (pool_id, _, _) = engine.position_pool(position)?;
            engine
                .positions
                .tokens_owed(engine.registry.v3(pool_id)?, position)
        })
    }

    fn position_pool(&self, position: PositionId) -> AmmResult<(PoolId, Address, Address)> {
        let managed = self.positions.position(position)?;
        Ok((managed.pool, managed.token0, managed.token1))
    }
}
