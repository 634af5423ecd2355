//! Shared fixtures for the engine integration suites
//!
//! Accounts are funded through [`InMemoryLedger::mint`] and approve the engine for
//! unlimited spending, the way a wallet would before trading through a router.

#![allow(dead_code)]

use amm::{Engine, InMemoryLedger, Ledger, MintParams, ENGINE_ADDRESS};
use amm_config::EngineConfig;
use ethereum_types::H160;
use types::precision::tokens::{DAI, USDC, WBTC, WETH};
use types::{Address, PoolId, U256};

pub const LP: Address = H160([0x11; 20]);
pub const TRADER: Address = H160([0x22; 20]);
pub const BORROWER: Address = H160([0x33; 20]);

pub const DAI_UNIT: u128 = 1_000_000_000_000_000_000;
pub const WBTC_UNIT: u128 = 100_000_000;
pub const USDC_UNIT: u128 = 1_000_000;
pub const WETH_UNIT: u128 = 1_000_000_000_000_000_000;

/// Q64.96 encoding of a raw price of 1
pub fn price_one() -> U256 {
    U256::one() << 96
}

pub fn engine() -> Engine<InMemoryLedger> {
    Engine::new(EngineConfig::default(), InMemoryLedger::new())
}

pub fn engine_with(config: EngineConfig) -> Engine<InMemoryLedger> {
    Engine::new(config, InMemoryLedger::new())
}

/// Credits `amount` and grants the engine an unlimited allowance
pub fn fund(engine: &mut Engine<InMemoryLedger>, token: Address, account: Address, amount: u128) {
    let ledger = engine.ledger_mut();
    ledger.mint(token, account, amount).unwrap();
    ledger.approve(token, account, ENGINE_ADDRESS, u128::MAX);
}

pub fn balance(engine: &Engine<InMemoryLedger>, token: Address, account: Address) -> u128 {
    engine.ledger().balance_of(token, account)
}

pub fn pool_balance(engine: &Engine<InMemoryLedger>, token: Address, pool: PoolId) -> u128 {
    engine.ledger().balance_of(token, pool.address())
}

/// The DAI/WBTC pool of the reference scenario: 10M DAI against 500 WBTC
pub fn dai_wbtc_engine() -> Engine<InMemoryLedger> {
    let mut engine = engine();
    fund(&mut engine, DAI, LP, 10_000_000 * DAI_UNIT);
    fund(&mut engine, WBTC, LP, 500 * WBTC_UNIT);
    engine
        .add_liquidity(LP, DAI, WBTC, 10_000_000 * DAI_UNIT, 500 * WBTC_UNIT, 0, 0)
        .unwrap();
    engine
}

/// USDC/WETH constant-product pool with 1M USDC against 500 WETH
pub fn usdc_weth_engine() -> (Engine<InMemoryLedger>, PoolId) {
    let mut engine = engine();
    fund(&mut engine, USDC, LP, 1_000_000 * USDC_UNIT);
    fund(&mut engine, WETH, LP, 500 * WETH_UNIT);
    engine
        .add_liquidity(LP, USDC, WETH, 1_000_000 * USDC_UNIT, 500 * WETH_UNIT, 0, 0)
        .unwrap();
    let pool = engine.registry().resolve(USDC, WETH, None).unwrap();
    (engine, pool)
}

/// DAI/USDC concentrated pool at 0.3% and a raw price of 1, with 100 units of each
/// token deposited by [`LP`] over ticks [-600, 600]
pub fn dai_usdc_concentrated() -> (Engine<InMemoryLedger>, PoolId) {
    let mut engine = engine();
    let pool = engine.create_v3_pool(DAI, USDC, 3000, price_one()).unwrap();
    fund(&mut engine, DAI, LP, 1_000 * DAI_UNIT);
    fund(&mut engine, USDC, LP, 1_000 * DAI_UNIT);
    engine
        .mint_new_position(LP, wide_mint(100 * DAI_UNIT, 100 * DAI_UNIT))
        .unwrap();
    (engine, pool)
}

pub fn wide_mint(amount0: u128, amount1: u128) -> MintParams {
    MintParams {
        token0: DAI,
        token1: USDC,
        fee: 3000,
        tick_lower: -600,
        tick_upper: 600,
        amount0_desired: amount0,
        amount1_desired: amount1,
        amount0_min: 0,
        amount1_min: 0,
    }
}
