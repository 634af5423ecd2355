//! # AMM Engine Library - Exact Pool Mathematics and Atomic Settlement
//!
//! ## Purpose
//!
//! Deterministic automated-market-maker engine: swap quoting and execution against
//! constant-product (V2-style) and concentrated-liquidity (V3-style) pools, managed
//! liquidity positions, multi-hop routing and flash borrows whose repayment is verified
//! before the operation completes. All arithmetic is integer fixed-point; nothing is
//! rounded through floating point.
//!
//! ## Layers
//!
//! - **Math kernel** ([`math`]): `mul_div`, tick/sqrt-price conversion, amount deltas,
//!   single swap steps
//! - **Pool models** ([`v2_pool`], [`v3_pool`]): state and bookkeeping per pool,
//!   unified by [`AmmPool`] and the [`Pool`] variant
//! - **Routing** ([`router`]): validated paths and composed quotes
//! - **Settlement** ([`flash`], [`engine`]): flash fees, borrow records, and the
//!   [`Engine`] facade that runs every operation all-or-nothing against a [`Ledger`]
//!
//! ```rust
//! use amm::{Engine, InMemoryLedger, Ledger};
//! use amm_config::EngineConfig;
//! use types::precision::tokens::{DAI, WBTC};
//! use types::Address;
//!
//! let lp = Address::repeat_byte(0x11);
//! let mut ledger = InMemoryLedger::new();
//! ledger.mint(DAI, lp, 10_000_000 * 10u128.pow(18)).unwrap();
//! ledger.mint(WBTC, lp, 500 * 10u128.pow(8)).unwrap();
//!
//! let mut engine = Engine::new(EngineConfig::default(), ledger);
//! let spender = engine.address();
//! engine.ledger_mut().approve(DAI, lp, spender, u128::MAX);
//! engine.ledger_mut().approve(WBTC, lp, spender, u128::MAX);
//! engine
//!     .add_liquidity(lp, DAI, WBTC, 10_000_000 * 10u128.pow(18), 500 * 10u128.pow(8), 0, 0)
//!     .unwrap();
//!
//! let out = engine
//!     .get_amount_out_min(DAI, WBTC, 1_000_000 * 10u128.pow(18))
//!     .unwrap();
//! assert_eq!(out, 4_533_054_469);
//! ```

pub mod engine;
pub mod flash;
pub mod ledger;
pub mod math;
pub mod oracle;
pub mod pool_traits;
pub mod position;
pub mod position_manager;
pub mod registry;
pub mod router;
pub mod tick;
pub mod v2_math;
pub mod v2_pool;
pub mod v3_pool;

pub use engine::{
    Engine, EngineResult, MintParams, Operation, OperationError, SharedEngine, ENGINE_ADDRESS,
};
pub use flash::{FlashBorrowRecord, FlashFee, FlashGuard, FlashState};
pub use ledger::{InMemoryLedger, Ledger};
pub use oracle::{min_amount_out, oracle_min_amount_out, PriceOracle, StaticOracle};
pub use pool_traits::{AmmPool, LiquidityPool, Pool};
pub use position::{PositionInfo, PositionKey};
pub use position_manager::{DepositRequest, LiquidityChange, ManagedPosition, PositionManager};
pub use registry::{derive_pool_id, PoolRegistry};
pub use router::{Hop, Router, SwapPath};
pub use tick::{TickInfo, TickMap};
pub use v2_math::{V2Math, V2PoolState};
pub use v2_pool::{ConstantProductPool, V2Deposit};
pub use v3_pool::{ConcentratedPool, SwapOutcome};

/// Common types for AMM calculations
pub use rust_decimal::Decimal;
pub use rust_decimal_macros::dec;
