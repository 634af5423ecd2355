//! Initialized-tick bookkeeping for concentrated liquidity
//!
//! Only ticks that bound at least one position are stored. The ordered map gives the
//! swap loop its next crossing in O(log n) without a bitmap.

use std::collections::BTreeMap;

use serde::Serialize;
use types::{AmmError, AmmResult, U256};

use crate::math::{add_delta, MAX_TICK, MIN_TICK};

/// Per-tick state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickInfo {
    /// Total liquidity of positions using this tick as a boundary
    pub liquidity_gross: u128,
    /// Liquidity added when crossing left to right, removed right to left
    pub liquidity_net: i128,
    /// Fee growth on the other side of this tick from the current price
    pub fee_growth_outside_0_x128: U256,
    pub fee_growth_outside_1_x128: U256,
}

/// Largest gross liquidity a single tick may carry for a spacing
pub fn max_liquidity_per_tick(tick_spacing: i32) -> u128 {
    let min_tick = (MIN_TICK / tick_spacing) * tick_spacing;
    let max_tick = (MAX_TICK / tick_spacing) * tick_spacing;
    let num_ticks = ((max_tick - min_tick) / tick_spacing) as u128 + 1;
    u128::MAX / num_ticks
}

fn wrapping_sub(a: U256, b: U256) -> U256 {
    a.overflowing_sub(b).0
}

/// Sparse ordered map of initialized ticks
#[derive(Debug, Clone, Default)]
pub struct TickMap {
    ticks: BTreeMap<i32, TickInfo>,
}

impl TickMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tick: i32) -> Option<&TickInfo> {
        self.ticks.get(&tick)
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&i32, &TickInfo)> {
        self.ticks.iter()
    }

    /// Gross liquidity `tick` would hold after `liquidity_delta`, without mutating
    pub fn gross_after(
        &self,
        tick: i32,
        liquidity_delta: i128,
        max_liquidity: u128,
    ) -> AmmResult<u128> {
        let before = self.get(tick).map_or(0, |info| info.liquidity_gross);
        let after = add_delta(before, liquidity_delta)?;
        if after > max_liquidity {
            return Err(AmmError::overflow("tick gross liquidity"));
        }
        Ok(after)
    }

    /// Applies a position's liquidity change to one of its boundary ticks
    ///
    /// Returns true when the tick flipped between initialized and uninitialized.
    /// A newly initialized tick at or below the current tick assumes all fee growth
    /// so far happened below it.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        tick: i32,
        tick_current: i32,
        liquidity_delta: i128,
        fee_growth_global_0_x128: U256,
        fee_growth_global_1_x128: U256,
        upper: bool,
        max_liquidity: u128,
    ) -> AmmResult<bool> {
        let gross_after = self.gross_after(tick, liquidity_delta, max_liquidity)?;
        let info = self.ticks.entry(tick).or_default();
        let gross_before = info.liquidity_gross;

        if gross_before == 0 && tick <= tick_current {
            info.fee_growth_outside_0_x128 = fee_growth_global_0_x128;
            info.fee_growth_outside_1_x128 = fee_growth_global_1_x128;
        }

        info.liquidity_gross = gross_after;
        let net = if upper {
            info.liquidity_net.checked_sub(liquidity_delta)
        } else {
            info.liquidity_net.checked_add(liquidity_delta)
        };
        info.liquidity_net = net.ok_or_else(|| AmmError::overflow("tick net liquidity"))?;

        Ok((gross_after == 0) != (gross_before == 0))
    }

    pub fn clear(&mut self, tick: i32) {
        self.ticks.remove(&tick);
    }

    /// Flips fee growth outside as the price crosses `tick`; returns its net liquidity
    pub fn cross(
        &mut self,
        tick: i32,
        fee_growth_global_0_x128: U256,
        fee_growth_global_1_x128: U256,
    ) -> i128 {
        match self.ticks.get_mut(&tick) {
            Some(info) => {
                info.fee_growth_outside_0_x128 =
                    wrapping_sub(fee_growth_global_0_x128, info.fee_growth_outside_0_x128);
                info.fee_growth_outside_1_x128 =
                    wrapping_sub(fee_growth_global_1_x128, info.fee_growth_outside_1_x128);
                info.liquidity_net
            }
            None => 0,
        }
    }

    /// Fee growth per unit of liquidity accumulated inside `[tick_lower, tick_upper)`
    pub fn fee_growth_inside(
        &self,
        tick_lower: i32,
        tick_upper: i32,
        tick_current: i32,
        fee_growth_global_0_x128: U256,
        fee_growth_global_1_x128: U256,
    ) -> (U256, U256) {
        let empty = TickInfo::default();
        let lower = self.get(tick_lower).unwrap_or(&empty);
        let upper = self.get(tick_upper).unwrap_or(&empty);

        let (below_0, below_1) = if tick_current >= tick_lower {
            (
                lower.fee_growth_outside_0_x128,
                lower.fee_growth_outside_1_x128,
            )
        } else {
            (
                wrapping_sub(fee_growth_global_0_x128, lower.fee_growth_outside_0_x128),
                wrapping_sub(fee_growth_global_1_x128, lower.fee_growth_outside_1_x128),
            )
        };

        let (above_0, above_1) = if tick_current < tick_upper {
            (
                upper.fee_growth_outside_0_x128,
                upper.fee_growth_outside_1_x128,
            )
        } else {
            (
                wrapping_sub(fee_growth_global_0_x128, upper.fee_growth_outside_0_x128),
                wrapping_sub(fee_growth_global_1_x128, upper.fee_growth_outside_1_x128),
            )
        };

        (
            wrapping_sub(wrapping_sub(fee_growth_global_0_x128, below_0), above_0),
            wrapping_sub(wrapping_sub(fee_growth_global_1_x128, below_1), above_1),
        )
    }

    /// Next initialized tick: the greatest `<= tick` when `lte`, else the least `> tick`
    pub fn next_initialized(&self, tick: i32, lte: bool) -> Option<i32> {
        if lte {
            self.ticks.range(..=tick).next_back().map(|(t, _)| *t)
        } else {
            self.ticks
                .range((std::ops::Bound::Excluded(tick), std::ops::Bound::Unbounded))
                .next()
                .map(|(t, _)| *t)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: u128 = u128::MAX;

    fn g(value: u64) -> U256 {
        U256::from(value)
    }

    #[test]
    fn test_max_liquidity_per_tick() {
        // 887272 / 60 = 14787 -> ticks -887220..=887220
        assert_eq!(max_liquidity_per_tick(60), u128::MAX / 29_575);
        assert_eq!(max_liquidity_per_tick(1), u128::MAX / 1_774_545);
    }

    #[test]
    fn test_update_flips_and_initializes_fee_growth() {
        let mut ticks = TickMap::new();
        // below current tick: outside growth starts at global
        assert!(ticks.update(-60, 0, 100, g(7), g(9), false, MAX).unwrap());
        let info = ticks.get(-60).unwrap();
        assert_eq!(info.fee_growth_outside_0_x128, g(7));
        assert_eq!(info.liquidity_net, 100);

        // above current tick: outside growth starts at zero
        assert!(ticks.update(60, 0, 100, g(7), g(9), true, MAX).unwrap());
        let info = ticks.get(60).unwrap();
        assert!(info.fee_growth_outside_0_x128.is_zero());
        assert_eq!(info.liquidity_net, -100);

        // adding more does not flip
        assert!(!ticks.update(60, 0, 50, g(7), g(9), true, MAX).unwrap());
        assert_eq!(ticks.get(60).unwrap().liquidity_gross, 150);

        // removing all flips back
        assert!(ticks.update(60, 0, -150, g(7), g(9), true, MAX).unwrap());
    }

    #[test]
    fn test_update_limits() {
        let mut ticks = TickMap::new();
        assert!(ticks.update(0, 0, 11, g(0), g(0), false, 10).is_err());
        assert!(matches!(
            ticks.update(0, 0, -1, g(0), g(0), false, 10),
            Err(AmmError::InsufficientPositionLiquidity { .. })
        ));
    }

    #[test]
    fn test_cross_flips_outside_growth() {
        let mut ticks = TickMap::new();
        ticks.update(60, 0, 100, g(0), g(0), true, MAX).unwrap();
        let net = ticks.cross(60, g(40), g(10));
        assert_eq!(net, -100);
        assert_eq!(ticks.get(60).unwrap().fee_growth_outside_0_x128, g(40));
        ticks.cross(60, g(50), g(10));
        assert_eq!(ticks.get(60).unwrap().fee_growth_outside_0_x128, g(10));
        assert_eq!(ticks.cross(1234, g(0), g(0)), 0);
    }

    #[test]
    fn test_fee_growth_inside_regions() {
        let mut ticks = TickMap::new();
        ticks.update(-60, 0, 100, g(10), g(0), false, MAX).unwrap();
        ticks.update(60, 0, 100, g(10), g(0), true, MAX).unwrap();

        // current inside: global 25 minus the 10 below
        let (inside0, _) = ticks.fee_growth_inside(-60, 60, 0, g(25), g(0));
        assert_eq!(inside0, g(15));

        // price moved above the range: upper crossed at global 30
        ticks.cross(60, g(30), g(0));
        let (inside0, _) = ticks.fee_growth_inside(-60, 60, 100, g(45), g(0));
        assert_eq!(inside0, g(20));
    }

    #[test]
    fn test_fee_growth_inside_wraps() {
        let mut ticks = TickMap::new();
        ticks.update(-60, 0, 1, U256::MAX, g(0), false, MAX).unwrap();
        ticks.update(60, 0, 1, U256::MAX, g(0), true, MAX).unwrap();
        // global wrapped past zero: 5 - MAX = 6 growth since initialization
        let (inside0, _) = ticks.fee_growth_inside(-60, 60, 0, g(5), g(0));
        assert_eq!(inside0, g(6));
    }

    #[test]
    fn test_next_initialized() {
        let mut ticks = TickMap::new();
        for tick in [-120, 0, 60] {
            ticks.update(tick, 0, 1, g(0), g(0), false, MAX).unwrap();
        }
        assert_eq!(ticks.next_initialized(0, true), Some(0));
        assert_eq!(ticks.next_initialized(-1, true), Some(-120));
        assert_eq!(ticks.next_initialized(-121, true), None);
        assert_eq!(ticks.next_initialized(0, false), Some(60));
        assert_eq!(ticks.next_initialized(-120, false), Some(0));
        assert_eq!(ticks.next_initialized(60, false), None);

        ticks.clear(0);
        assert_eq!(ticks.next_initialized(30, true), Some(-120));
        assert_eq!(ticks.len(), 2);
    }
}
