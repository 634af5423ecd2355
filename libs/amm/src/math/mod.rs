//! Fixed-point math kernel
//!
//! Exact integer arithmetic for prices, square-root prices and liquidity. Square-root
//! prices are Q64.96 values in [`U256`], fee-growth accumulators are Q128.128, token
//! amounts and liquidity are `u128`. Nothing here uses floating point, and every
//! overflow or zero division surfaces as an [`types::AmmError`].

pub mod full_math;
pub mod liquidity_math;
pub mod sqrt_price_math;
pub mod swap_math;
pub mod tick_math;

pub use full_math::{div_rounding_up, mul_div, mul_div_rounding_up, sqrt, to_u128};
pub use liquidity_math::{
    add_delta, get_amounts_for_liquidity, get_liquidity_for_amounts,
};
pub use sqrt_price_math::{
    get_amount0_delta, get_amount1_delta, get_next_sqrt_price_from_input,
    get_next_sqrt_price_from_output,
};
pub use swap_math::{compute_swap_step, SwapStep};
pub use tick_math::{
    get_sqrt_ratio_at_tick, get_tick_at_sqrt_ratio, MAX_SQRT_RATIO, MAX_TICK, MIN_SQRT_RATIO,
    MIN_TICK,
};

use types::U256;

/// 2^96, the Q64.96 unit
pub const Q96: U256 = U256([0, 1 << 32, 0, 0]);

/// 2^128, the Q128.128 unit used by fee-growth accumulators
pub const Q128: U256 = U256([0, 0, 1, 0]);

/// Fee denominator for hundredths of a basis point
pub const FEE_PIPS_DENOMINATOR: u32 = 1_000_000;
