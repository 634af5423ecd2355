//! Pool trait definitions for a unified AMM interface
//!
//! Both pricing models answer the same questions (quote, swap, flash fee, spot price)
//! so the router and the engine can walk a path without caring which model each hop is.

use rust_decimal::Decimal;
use types::{Address, AmmError, AmmResult, FeeTier, PoolId, PoolKind, U256};

use crate::flash::FlashFee;
use crate::math::{mul_div, to_u128};
use crate::position::PositionKey;
use crate::v2_pool::ConstantProductPool;
use crate::v3_pool::ConcentratedPool;

/// Largest mantissa a `Decimal` can hold
const DECIMAL_MAX_MANTISSA: u128 = (1u128 << 96) - 1;

/// `num / den` as a `Decimal`, keeping up to 18 fractional digits
pub(crate) fn decimal_ratio(num: U256, den: U256) -> AmmResult<Decimal> {
    let mut scale = 18u32;
    let mut scaled = to_u128(
        mul_div(num, U256::exp10(scale as usize), den)?,
        "decimal ratio",
    )?;
    while scaled > DECIMAL_MAX_MANTISSA {
        if scale == 0 {
            return Err(AmmError::overflow("decimal ratio"));
        }
        scaled /= 10;
        scale -= 1;
    }
    let mantissa = i128::try_from(scaled).map_err(|_| AmmError::overflow("decimal ratio"))?;
    Decimal::try_from_i128_with_scale(mantissa, scale)
        .map(|d| d.normalize())
        .map_err(|_| AmmError::overflow("decimal ratio"))
}

/// Unified pool interface used by routing and settlement
pub trait AmmPool {
    fn id(&self) -> PoolId;

    fn kind(&self) -> PoolKind;

    /// (token0, token1), sorted
    fn tokens(&self) -> (Address, Address);

    /// Swap fee in hundredths of a basis point
    fn fee_pips(&self) -> u32;

    fn contains(&self, token: Address) -> bool {
        let (token0, token1) = self.tokens();
        token == token0 || token == token1
    }

    /// The pool's other token
    fn counterpart(&self, token: Address) -> AmmResult<Address> {
        let (token0, token1) = self.tokens();
        if token == token0 {
            Ok(token1)
        } else if token == token1 {
            Ok(token0)
        } else {
            Err(AmmError::invalid_path(format!(
                "token {token:#x} is not in {}",
                self.id()
            )))
        }
    }

    /// Output for an exact input of `token_in`
    fn quote_exact_input(&self, token_in: Address, amount_in: u128) -> AmmResult<u128>;

    /// Input of `token_in` required for an exact output
    fn quote_exact_output(&self, token_in: Address, amount_out: u128) -> AmmResult<u128>;

    /// Returns the output; fails with `SlippageExceeded` below `min_amount_out`
    fn swap_exact_input(
        &mut self,
        token_in: Address,
        amount_in: u128,
        min_amount_out: u128,
    ) -> AmmResult<u128>;

    /// Returns the input paid; fails with `SlippageExceeded` above `max_amount_in`
    fn swap_exact_output(
        &mut self,
        token_in: Address,
        amount_out: u128,
        max_amount_in: u128,
    ) -> AmmResult<u128>;

    fn flash_fee(&self) -> FlashFee;

    /// Marginal price of `token_in` in raw units of the other token
    fn spot_price(&self, token_in: Address) -> AmmResult<Decimal>;
}

impl AmmPool for ConstantProductPool {
    fn id(&self) -> PoolId {
        ConstantProductPool::id(self)
    }

    fn kind(&self) -> PoolKind {
        PoolKind::ConstantProduct
    }

    fn tokens(&self) -> (Address, Address) {
        ConstantProductPool::tokens(self)
    }

    fn fee_pips(&self) -> u32 {
        self.fee_bps() * 100
    }

    fn quote_exact_input(&self, token_in: Address, amount_in: u128) -> AmmResult<u128> {
        ConstantProductPool::quote_exact_input(self, token_in, amount_in)
    }

    fn quote_exact_output(&self, token_in: Address, amount_out: u128) -> AmmResult<u128> {
        ConstantProductPool::quote_exact_output(self, token_in, amount_out)
    }

    fn swap_exact_input(
        &mut self,
        token_in: Address,
        amount_in: u128,
        min_amount_out: u128,
    ) -> AmmResult<u128> {
        ConstantProductPool::swap_exact_input(self, token_in, amount_in, min_amount_out)
    }

    fn swap_exact_output(
        &mut self,
        token_in: Address,
        amount_out: u128,
        max_amount_in: u128,
    ) -> AmmResult<u128> {
        ConstantProductPool::swap_exact_output(self, token_in, amount_out, max_amount_in)
    }

    fn flash_fee(&self) -> FlashFee {
        FlashFee::constant_product(self.fee_bps())
    }

    fn spot_price(&self, token_in: Address) -> AmmResult<Decimal> {
        ConstantProductPool::spot_price(self, token_in)
    }
}

impl AmmPool for ConcentratedPool {
    fn id(&self) -> PoolId {
        ConcentratedPool::id(self)
    }

    fn kind(&self) -> PoolKind {
        PoolKind::Concentrated
    }

    fn tokens(&self) -> (Address, Address) {
        ConcentratedPool::tokens(self)
    }

    fn fee_pips(&self) -> u32 {
        self.fee_tier().fee_pips
    }

    fn quote_exact_input(&self, token_in: Address, amount_in: u128) -> AmmResult<u128> {
        ConcentratedPool::quote_exact_input(self, token_in, amount_in)
    }

    fn quote_exact_output(&self, token_in: Address, amount_out: u128) -> AmmResult<u128> {
        ConcentratedPool::quote_exact_output(self, token_in, amount_out)
    }

    fn swap_exact_input(
        &mut self,
        token_in: Address,
        amount_in: u128,
        min_amount_out: u128,
    ) -> AmmResult<u128> {
        ConcentratedPool::swap_exact_input(self, token_in, amount_in, min_amount_out)
    }

    fn swap_exact_output(
        &mut self,
        token_in: Address,
        amount_out: u128,
        max_amount_in: u128,
    ) -> AmmResult<u128> {
        ConcentratedPool::swap_exact_output(self, token_in, amount_out, max_amount_in)
    }

    fn flash_fee(&self) -> FlashFee {
        FlashFee::concentrated(self.fee_tier().fee_pips)
    }

    fn spot_price(&self, token_in: Address) -> AmmResult<Decimal> {
        ConcentratedPool::spot_price(self, token_in)
    }
}

/// Liquidity provision shared by both pool models
///
/// A claim identifies one provider's stake: the owner address for constant-product
/// shares, a [`PositionKey`] for a concentrated range. Units are shares or range
/// liquidity respectively.
pub trait LiquidityPool: AmmPool {
    type Claim: Copy;

    /// Adds `units` to `claim`; returns `(amount0, amount1)` the pool must receive
    fn provide(&mut self, claim: Self::Claim, units: u128) -> AmmResult<(u128, u128)>;

    /// Removes `units` from `claim`; returns `(amount0, amount1)` released.
    /// Concentrated pools hold released amounts as owed until collected.
    fn withdraw(&mut self, claim: Self::Claim, units: u128) -> AmmResult<(u128, u128)>;

    /// Pays out everything owed to `claim` outside its active liquidity
    fn collect_fees(&mut self, claim: Self::Claim) -> AmmResult<(u128, u128)>;

    fn liquidity_of(&self, claim: &Self::Claim) -> u128;
}

impl LiquidityPool for ConstantProductPool {
    type Claim = Address;

    fn provide(&mut self, owner: Address, shares: u128) -> AmmResult<(u128, u128)> {
        self.mint_shares(owner, shares)
    }

    fn withdraw(&mut self, owner: Address, shares: u128) -> AmmResult<(u128, u128)> {
        let (token0, _) = ConstantProductPool::tokens(self);
        self.remove_liquidity(owner, token0, shares, 0, 0)
    }

    // swap fees compound into the reserves and leave with the shares
    fn collect_fees(&mut self, _owner: Address) -> AmmResult<(u128, u128)> {
        Ok((0, 0))
    }

    fn liquidity_of(&self, owner: &Address) -> u128 {
        self.shares_of(*owner)
    }
}

impl LiquidityPool for ConcentratedPool {
    type Claim = PositionKey;

    fn provide(&mut self, key: PositionKey, liquidity: u128) -> AmmResult<(u128, u128)> {
        self.mint(key, liquidity)
    }

    fn withdraw(&mut self, key: PositionKey, liquidity: u128) -> AmmResult<(u128, u128)> {
        self.burn(key, liquidity)
    }

    fn collect_fees(&mut self, key: PositionKey) -> AmmResult<(u128, u128)> {
        self.collect(key, u128::MAX, u128::MAX)
    }

    fn liquidity_of(&self, key: &PositionKey) -> u128 {
        self.position(key).map_or(0, |info| info.liquidity)
    }
}

/// A registered pool of either model
#[derive(Debug, Clone)]
pub enum Pool {
    ConstantProduct(ConstantProductPool),
    Concentrated(ConcentratedPool),
}

impl Pool {
    pub fn as_v2(&self) -> Option<&ConstantProductPool> {
        match self {
            Self::ConstantProduct(pool) => Some(pool),
            Self::Concentrated(_) => None,
        }
    }

    pub fn as_v2_mut(&mut self) -> Option<&mut ConstantProductPool> {
        match self {
            Self::ConstantProduct(pool) => Some(pool),
            Self::Concentrated(_) => None,
        }
    }

    pub fn as_v3(&self) -> Option<&ConcentratedPool> {
        match self {
            Self::Concentrated(pool) => Some(pool),
            Self::ConstantProduct(_) => None,
        }
    }

    pub fn as_v3_mut(&mut self) -> Option<&mut ConcentratedPool> {
        match self {
            Self::Concentrated(pool) => Some(pool),
            Self::ConstantProduct(_) => None,
        }
    }

    /// Fee tier for concentrated pools; constant-product pools report their fee with no spacing
    pub fn fee_tier(&self) -> FeeTier {
        match self {
            Self::ConstantProduct(pool) => FeeTier::new(pool.fee_bps() * 100, 0),
            Self::Concentrated(pool) => pool.fee_tier(),
        }
    }

    fn inner(&self) -> &dyn AmmPool {
        match self {
            Self::ConstantProduct(pool) => pool,
            Self::Concentrated(pool) => pool,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn AmmPool {
        match self {
            Self::ConstantProduct(pool) => pool,
            Self::Concentrated(pool) => pool,
        }
    }
}

impl AmmPool for Pool {
    fn id(&self) -> PoolId {
        self.inner().id()
    }

    fn kind(&self) -> PoolKind {
        self.inner().kind()
    }

    fn tokens(&self) -> (Address, Address) {
        self.inner().tokens()
    }

    fn fee_pips(&self) -> u32 {
        self.inner().fee_pips()
    }

    fn quote_exact_input(&self, token_in: Address, amount_in: u128) -> AmmResult<u128> {
        self.inner().quote_exact_input(token_in, amount_in)
    }

    fn quote_exact_output(&self, token_in: Address, amount_out: u128) -> AmmResult<u128> {
        self.inner().quote_exact_output(token_in, amount_out)
    }

    fn swap_exact_input(
        &mut self,
        token_in: Address,
        amount_in: u128,
        min_amount_out: u128,
    ) -> AmmResult<u128> {
        self.inner_mut()
            .swap_exact_input(token_in, amount_in, min_amount_out)
    }

    fn swap_exact_output(
        &mut self,
        token_in: Address,
        amount_out: u128,
        max_amount_in: u128,
    ) -> AmmResult<u128> {
        self.inner_mut()
            .swap_exact_output(token_in, amount_out, max_amount_in)
    }

    fn flash_fee(&self) -> FlashFee {
        self.inner().flash_fee()
    }

    fn spot_price(&self, token_in: Address) -> AmmResult<Decimal> {
        self.inner().spot_price(token_in)
    }
}

impl From<ConstantProductPool> for Pool {
    fn from(pool: ConstantProductPool) -> Self {
        Self::ConstantProduct(pool)
    }
}

impl From<ConcentratedPool> for Pool {
    fn from(pool: ConcentratedPool) -> Self {
        Self::Concentrated(pool)
    }
}
