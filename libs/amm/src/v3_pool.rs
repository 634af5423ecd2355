//! Concentrated-liquidity pool state machine
//!
//! Liquidity is provided over tick ranges. A swap walks from the current price toward
//! the next initialized tick in its direction, consuming as much of the request as the
//! active liquidity allows, crossing ticks (which flips their fee-growth-outside and
//! applies their net liquidity) until the request is satisfied.
//!
//! Swaps are computed read-only first and applied afterwards, so a quote is the same
//! computation without the apply step and a failed swap never touches state.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;
use types::{sort_tokens, Address, AmmError, AmmResult, FeeTier, PoolId, U256};

use crate::math::{
    add_delta, compute_swap_step, get_amount0_delta, get_amount1_delta, get_sqrt_ratio_at_tick,
    get_tick_at_sqrt_ratio, mul_div, to_u128, MAX_SQRT_RATIO, MAX_TICK, MIN_SQRT_RATIO, MIN_TICK,
    Q128, Q96,
};
use crate::pool_traits::decimal_ratio;
use crate::position::{PositionInfo, PositionKey};
use crate::tick::{max_liquidity_per_tick, TickMap};

/// Settled result of a swap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SwapOutcome {
    /// Input paid including the fee
    pub amount_in: u128,
    pub amount_out: u128,
    pub fee_amount: u128,
    pub sqrt_price_x96: U256,
    pub tick: i32,
    pub ticks_crossed: usize,
}

/// Read-only result of the swap walk, applied by [`ConcentratedPool::swap`]
#[derive(Debug, Clone)]
struct SwapComputation {
    outcome: SwapOutcome,
    liquidity: u128,
    fee_growth_global_0_x128: U256,
    fee_growth_global_1_x128: U256,
    /// Crossed ticks with the global fee growth at the moment of crossing
    crossings: Vec<(i32, U256, U256)>,
}

/// V3-style pool over an ordered token pair and one fee tier
#[derive(Debug, Clone)]
pub struct ConcentratedPool {
    id: PoolId,
    token0: Address,
    token1: Address,
    fee_tier: FeeTier,
    max_liquidity_per_tick: u128,
    sqrt_price_x96: U256,
    tick: i32,
    liquidity: u128,
    fee_growth_global_0_x128: U256,
    fee_growth_global_1_x128: U256,
    ticks: TickMap,
    positions: HashMap<PositionKey, PositionInfo>,
}

impl ConcentratedPool {
    pub fn new(
        id: PoolId,
        token_a: Address,
        token_b: Address,
        fee_tier: FeeTier,
    ) -> AmmResult<Self> {
        if token_a == token_b {
            return Err(AmmError::IdenticalTokens(token_a));
        }
        if fee_tier.tick_spacing <= 0 {
            return Err(AmmError::UnsupportedFeeTier(fee_tier.fee_pips));
        }
        let (token0, token1) = sort_tokens(token_a, token_b);
        Ok(Self {
            id,
            token0,
            token1,
            fee_tier,
            max_liquidity_per_tick: max_liquidity_per_tick(fee_tier.tick_spacing),
            sqrt_price_x96: U256::zero(),
            tick: 0,
            liquidity: 0,
            fee_growth_global_0_x128: U256::zero(),
            fee_growth_global_1_x128: U256::zero(),
            ticks: TickMap::new(),
            positions: HashMap::new(),
        })
    }

    /// Sets the starting price; allowed once
    pub fn initialize(&mut self, sqrt_price_x96: U256) -> AmmResult<()> {
        if self.is_initialized() {
            return Err(AmmError::PoolAlreadyExists(self.id));
        }
        self.tick = get_tick_at_sqrt_ratio(sqrt_price_x96)?;
        self.sqrt_price_x96 = sqrt_price_x96;
        debug!(pool = %self.id, tick = self.tick, "v3 pool initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        !self.sqrt_price_x96.is_zero()
    }

    pub fn id(&self) -> PoolId {
        self.id
    }

    pub fn tokens(&self) -> (Address, Address) {
        (self.token0, self.token1)
    }

    pub fn fee_tier(&self) -> FeeTier {
        self.fee_tier
    }

    pub fn sqrt_price_x96(&self) -> U256 {
        self.sqrt_price_x96
    }

    pub fn tick(&self) -> i32 {
        self.tick
    }

    /// Liquidity active at the current price
    pub fn liquidity(&self) -> u128 {
        self.liquidity
    }

    pub fn fee_growth_global(&self) -> (U256, U256) {
        (self.fee_growth_global_0_x128, self.fee_growth_global_1_x128)
    }

    pub fn ticks(&self) -> &TickMap {
        &self.ticks
    }

    pub fn position(&self, key: &PositionKey) -> Option<&PositionInfo> {
        self.positions.get(key)
    }

    fn ensure_initialized(&self) -> AmmResult<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(AmmError::InvalidSqrtPrice {
                sqrt_price_x96: "0".to_string(),
            })
        }
    }

    fn check_ticks(&self, tick_lower: i32, tick_upper: i32) -> AmmResult<()> {
        let spacing = self.fee_tier.tick_spacing;
        if tick_lower >= tick_upper
            || tick_lower < MIN_TICK
            || tick_upper > MAX_TICK
            || tick_lower % spacing != 0
            || tick_upper % spacing != 0
        {
            return Err(AmmError::InvalidTickRange {
                tick_lower,
                tick_upper,
            });
        }
        Ok(())
    }

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

    /// Token amounts (rounded up) required to add `liquidity` over a range
    pub fn amounts_for_mint(
        &self,
        tick_lower: i32,
        tick_upper: i32,
        liquidity: u128,
    ) -> AmmResult<(u128, u128)> {
        self.ensure_initialized()?;
        self.check_ticks(tick_lower, tick_upper)?;
        self.range_amounts(tick_lower, tick_upper, liquidity, true)
    }

    /// Principal (rounded down) that burning `liquidity` over a range would release
    pub fn amounts_for_burn(
        &self,
        tick_lower: i32,
        tick_upper: i32,
        liquidity: u128,
    ) -> AmmResult<(u128, u128)> {
        self.ensure_initialized()?;
        self.check_ticks(tick_lower, tick_upper)?;
        self.range_amounts(tick_lower, tick_upper, liquidity, false)
    }

    fn range_amounts(
        &self,
        tick_lower: i32,
        tick_upper: i32,
        liquidity: u128,
        round_up: bool,
    ) -> AmmResult<(u128, u128)> {
        let sqrt_lower = get_sqrt_ratio_at_tick(tick_lower)?;
        let sqrt_upper = get_sqrt_ratio_at_tick(tick_upper)?;

        let (amount0, amount1) = if self.tick < tick_lower {
            (
                get_amount0_delta(sqrt_lower, sqrt_upper, liquidity, round_up)?,
                U256::zero(),
            )
        } else if self.tick < tick_upper {
            (
                get_amount0_delta(self.sqrt_price_x96, sqrt_upper, liquidity, round_up)?,
                get_amount1_delta(sqrt_lower, self.sqrt_price_x96, liquidity, round_up)?,
            )
        } else {
            (
                U256::zero(),
                get_amount1_delta(sqrt_lower, sqrt_upper, liquidity, round_up)?,
            )
        };
        Ok((
            to_u128(amount0, "range amount0")?,
            to_u128(amount1, "range amount1")?,
        ))
    }

    /// Adds `liquidity` to a position; returns the token amounts owed to the pool
    pub fn mint(&mut self, key: PositionKey, liquidity: u128) -> AmmResult<(u128, u128)> {
        if liquidity == 0 {
            return Err(AmmError::InvalidAmount {
                reason: "mint liquidity must be positive",
            });
        }
        let delta = i128::try_from(liquidity).map_err(|_| AmmError::overflow("mint liquidity"))?;
        let amounts = self.amounts_for_mint(key.tick_lower, key.tick_upper, liquidity)?;
        self.modify_position(key, delta)?;
        debug!(
            pool = %self.id,
            ?key,
            liquidity,
            amount0 = amounts.0,
            amount1 = amounts.1,
            "v3 mint"
        );
        Ok(amounts)
    }

    /// Removes `liquidity` from a position, crediting the principal (rounded down)
    /// to the position's tokens owed; returns that principal
    pub fn burn(&mut self, key: PositionKey, liquidity: u128) -> AmmResult<(u128, u128)> {
        self.ensure_initialized()?;
        self.check_ticks(key.tick_lower, key.tick_upper)?;
        let available = self.positions.get(&key).map_or(0, |p| p.liquidity);
        if liquidity > available {
            return Err(AmmError::InsufficientPositionLiquidity {
                requested: liquidity,
                available,
            });
        }
        let delta = i128::try_from(liquidity).map_err(|_| AmmError::overflow("burn liquidity"))?;
        let (amount0, amount1) =
            self.range_amounts(key.tick_lower, key.tick_upper, liquidity, false)?;

        self.modify_position(key, -delta)?;

        if let Some(position) = self.positions.get_mut(&key) {
            position.tokens_owed_0 = position
                .tokens_owed_0
                .checked_add(amount0)
                .ok_or_else(|| AmmError::overflow("tokens owed 0"))?;
            position.tokens_owed_1 = position
                .tokens_owed_1
                .checked_add(amount1)
                .ok_or_else(|| AmmError::overflow("tokens owed 1"))?;
        }
        debug!(pool = %self.id, ?key, liquidity, amount0, amount1, "v3 burn");
        Ok((amount0, amount1))
    }

    /// Pays out up to the requested amounts of what the position is owed
    pub fn collect(
        &mut self,
        key: PositionKey,
        amount0_requested: u128,
        amount1_requested: u128,
    ) -> AmmResult<(u128, u128)> {
        let Some(position) = self.positions.get_mut(&key) else {
            return Ok((0, 0));
        };
        let amount0 = amount0_requested.min(position.tokens_owed_0);
        let amount1 = amount1_requested.min(position.tokens_owed_1);
        position.tokens_owed_0 -= amount0;
        position.tokens_owed_1 -= amount1;
        if position.is_empty() {
            self.positions.remove(&key);
        }
        Ok((amount0, amount1))
    }

    /// Folds fees earned since the last touch into the position's tokens owed
    pub fn poke(&mut self, key: PositionKey) -> AmmResult<()> {
        self.ensure_initialized()?;
        if self.positions.get(&key).map_or(0, |p| p.liquidity) == 0 {
            return Ok(());
        }
        self.modify_position(key, 0)
    }

    fn modify_position(&mut self, key: PositionKey, delta: i128) -> AmmResult<()> {
        self.check_ticks(key.tick_lower, key.tick_upper)?;

        // Validate everything fallible before the first mutation
        let position_liquidity = self.positions.get(&key).map_or(0, |p| p.liquidity);
        add_delta(position_liquidity, delta)?;
        if delta != 0 {
            self.ticks
                .gross_after(key.tick_lower, delta, self.max_liquidity_per_tick)?;
            self.ticks
                .gross_after(key.tick_upper, delta, self.max_liquidity_per_tick)?;
        }
        let in_range = self.tick >= key.tick_lower && self.tick < key.tick_upper;
        let liquidity_next = if in_range {
            add_delta(self.liquidity, delta)?
        } else {
            self.liquidity
        };

        let (global_0, global_1) = self.fee_growth_global();
        let mut flipped_lower = false;
        let mut flipped_upper = false;
        if delta != 0 {
            flipped_lower = self.ticks.update(
                key.tick_lower,
                self.tick,
                delta,
                global_0,
                global_1,
                false,
                self.max_liquidity_per_tick,
            )?;
            flipped_upper = self.ticks.update(
                key.tick_upper,
                self.tick,
                delta,
                global_0,
                global_1,
                true,
                self.max_liquidity_per_tick,
            )?;
        }

        let (inside_0, inside_1) = self.ticks.fee_growth_inside(
            key.tick_lower,
            key.tick_upper,
            self.tick,
            global_0,
            global_1,
        );
        self.positions
            .entry(key)
            .or_default()
            .update(delta, inside_0, inside_1)?;

        if delta < 0 {
            if flipped_lower {
                self.ticks.clear(key.tick_lower);
            }
            if flipped_upper {
                self.ticks.clear(key.tick_upper);
            }
        }
        self.liquidity = liquidity_next;
        Ok(())
    }

    /// Computes a swap without changing state
    pub fn quote(
        &self,
        zero_for_one: bool,
        amount: u128,
        exact_input: bool,
        sqrt_price_limit_x96: Option<U256>,
    ) -> AmmResult<SwapOutcome> {
        Ok(self
            .compute_swap(zero_for_one, amount, exact_input, sqrt_price_limit_x96)?
            .outcome)
    }

    /// Executes a swap; `amount` is the input (with fee) when `exact_input`, else the output
    ///
    /// Fails with `PriceLimitReached` when the request cannot be filled completely before
    /// the price limit (or the end of initialized liquidity).
    pub fn swap(
        &mut self,
        zero_for_one: bool,
        amount: u128,
        exact_input: bool,
        sqrt_price_limit_x96: Option<U256>,
    ) -> AmmResult<SwapOutcome> {
        let computation =
            self.compute_swap(zero_for_one, amount, exact_input, sqrt_price_limit_x96)?;
        Ok(self.apply_swap(computation, zero_for_one))
    }

    fn apply_swap(&mut self, computation: SwapComputation, zero_for_one: bool) -> SwapOutcome {
        for (tick, global_0, global_1) in &computation.crossings {
            self.ticks.cross(*tick, *global_0, *global_1);
        }
        self.sqrt_price_x96 = computation.outcome.sqrt_price_x96;
        self.tick = computation.outcome.tick;
        self.liquidity = computation.liquidity;
        self.fee_growth_global_0_x128 = computation.fee_growth_global_0_x128;
        self.fee_growth_global_1_x128 = computation.fee_growth_global_1_x128;

        debug!(
            pool = %self.id,
            zero_for_one,
            amount_in = computation.outcome.amount_in,
            amount_out = computation.outcome.amount_out,
            tick = self.tick,
            ticks_crossed = computation.outcome.ticks_crossed,
            "v3 swap applied"
        );
        computation.outcome
    }

    fn compute_swap(
        &self,
        zero_for_one: bool,
        amount: u128,
        exact_input: bool,
        sqrt_price_limit_x96: Option<U256>,
    ) -> AmmResult<SwapComputation> {
        self.ensure_initialized()?;
        if amount == 0 {
            return Err(AmmError::InvalidAmount {
                reason: "swap amount must be positive",
            });
        }

        let limit = sqrt_price_limit_x96.unwrap_or(if zero_for_one {
            MIN_SQRT_RATIO + U256::one()
        } else {
            MAX_SQRT_RATIO - U256::one()
        });
        let limit_valid = if zero_for_one {
            limit < self.sqrt_price_x96 && limit > MIN_SQRT_RATIO
        } else {
            limit > self.sqrt_price_x96 && limit < MAX_SQRT_RATIO
        };
        if !limit_valid {
            return Err(AmmError::InvalidSqrtPrice {
                sqrt_price_x96: limit.to_string(),
            });
        }

        let fee_pips = self.fee_tier.fee_pips;
        let mut remaining = U256::from(amount);
        let mut calculated = U256::zero();
        let mut fee_total = U256::zero();
        let mut sqrt_price = self.sqrt_price_x96;
        let mut tick = self.tick;
        let mut liquidity = self.liquidity;
        let mut fee_growth_0 = self.fee_growth_global_0_x128;
        let mut fee_growth_1 = self.fee_growth_global_1_x128;
        let mut crossings = Vec::new();

        while !remaining.is_zero() && sqrt_price != limit {
            let next = self.ticks.next_initialized(tick, zero_for_one);
            let tick_next = next
                .unwrap_or(if zero_for_one { MIN_TICK } else { MAX_TICK })
                .clamp(MIN_TICK, MAX_TICK);
            let sqrt_price_next = get_sqrt_ratio_at_tick(tick_next)?;

            let target = if zero_for_one {
                sqrt_price_next.max(limit)
            } else {
                sqrt_price_next.min(limit)
            };
            let step = compute_swap_step(
                sqrt_price,
                target,
                liquidity,
                remaining,
                exact_input,
                fee_pips,
            )?;

            let paid = step.amount_in + step.fee_amount;
            if exact_input {
                remaining -= paid;
                calculated += step.amount_out;
            } else {
                remaining -= step.amount_out;
                calculated += paid;
            }
            fee_total += step.fee_amount;

            if liquidity > 0 {
                let growth = mul_div(step.fee_amount, Q128, U256::from(liquidity))?;
                if zero_for_one {
                    fee_growth_0 = fee_growth_0.overflowing_add(growth).0;
                } else {
                    fee_growth_1 = fee_growth_1.overflowing_add(growth).0;
                }
            }

            if step.sqrt_price_next == sqrt_price_next {
                if next.is_some() {
                    let net = self.ticks.get(tick_next).map_or(0, |info| info.liquidity_net);
                    let net = if zero_for_one { -net } else { net };
                    liquidity = add_delta(liquidity, net)?;
                    crossings.push((tick_next, fee_growth_0, fee_growth_1));
                    debug!(pool = %self.id, tick = tick_next, liquidity, "tick crossed");
                }
                tick = if zero_for_one { tick_next - 1 } else { tick_next };
            } else if step.sqrt_price_next != sqrt_price {
                tick = get_tick_at_sqrt_ratio(step.sqrt_price_next)?;
            }
            sqrt_price = step.sqrt_price_next;
        }

        if !remaining.is_zero() {
            return Err(AmmError::PriceLimitReached {
                amount_remaining: to_u128(remaining, "swap amount remaining")?,
            });
        }

        let (amount_in, amount_out) = if exact_input {
            (amount, to_u128(calculated, "swap amount out")?)
        } else {
            (to_u128(calculated, "swap amount in")?, amount)
        };

        Ok(SwapComputation {
            outcome: SwapOutcome {
                amount_in,
                amount_out,
                fee_amount: to_u128(fee_total, "swap fee")?,
                sqrt_price_x96: sqrt_price,
                tick,
                ticks_crossed: crossings.len(),
            },
            liquidity,
            fee_growth_global_0_x128: fee_growth_0,
            fee_growth_global_1_x128: fee_growth_1,
            crossings,
        })
    }

    /// Exact-input quote paying `token_in`
    pub fn quote_exact_input(&self, token_in: Address, amount_in: u128) -> AmmResult<u128> {
        let zero_for_one = self.is_token0(token_in)?;
        Ok(self.quote(zero_for_one, amount_in, true, None)?.amount_out)
    }

    /// Exact-output quote paying `token_in`
    pub fn quote_exact_output(&self, token_in: Address, amount_out: u128) -> AmmResult<u128> {
        let zero_for_one = self.is_token0(token_in)?;
        Ok(self.quote(zero_for_one, amount_out, false, None)?.amount_in)
    }

    pub fn swap_exact_input(
        &mut self,
        token_in: Address,
        amount_in: u128,
        min_amount_out: u128,
    ) -> AmmResult<u128> {
        let zero_for_one = self.is_token0(token_in)?;
        let computation = self.compute_swap(zero_for_one, amount_in, true, None)?;
        if computation.outcome.amount_out < min_amount_out {
            return Err(AmmError::SlippageExceeded {
                amount: computation.outcome.amount_out,
                bound: min_amount_out,
            });
        }
        Ok(self.apply_swap(computation, zero_for_one).amount_out)
    }

    pub fn swap_exact_output(
        &mut self,
        token_in: Address,
        amount_out: u128,
        max_amount_in: u128,
    ) -> AmmResult<u128> {
        let zero_for_one = self.is_token0(token_in)?;
        let computation = self.compute_swap(zero_for_one, amount_out, false, None)?;
        if computation.outcome.amount_in > max_amount_in {
            return Err(AmmError::SlippageExceeded {
                amount: computation.outcome.amount_in,
                bound: max_amount_in,
            });
        }
        Ok(self.apply_swap(computation, zero_for_one).amount_in)
    }

    /// Distributes flash fees to in-range liquidity through fee growth
    ///
    /// With no active liquidity the fees stay in the pool's balance unattributed.
    pub fn flash_settle(&mut self, fee0: u128, fee1: u128) -> AmmResult<()> {
        if self.liquidity == 0 {
            return Ok(());
        }
        let liquidity = U256::from(self.liquidity);
        if fee0 > 0 {
            let growth = mul_div(U256::from(fee0), Q128, liquidity)?;
            self.fee_growth_global_0_x128 = self.fee_growth_global_0_x128.overflowing_add(growth).0;
        }
        if fee1 > 0 {
            let growth = mul_div(U256::from(fee1), Q128, liquidity)?;
            self.fee_growth_global_1_x128 = self.fee_growth_global_1_x128.overflowing_add(growth).0;
        }
        Ok(())
    }

    /// Marginal price of `token_in` in units of the other token (raw amounts)
    pub fn spot_price(&self, token_in: Address) -> AmmResult<Decimal> {
        self.ensure_initialized()?;
        let price_x96 = mul_div(self.sqrt_price_x96, self.sqrt_price_x96, Q96)?;
        if self.is_token0(token_in)? {
            decimal_ratio(price_x96, Q96)
        } else {
            decimal_ratio(Q96, price_x96)
        }
    }
}
