//! Constant-product engine scenarios
//!
//! The DAI/WBTC pool is the reference case: 10M DAI against 500 WBTC, a 1M DAI swap
//! at 0.3% must yield exactly 4_533_054_469 satoshi.

mod common;

use amm::{Engine, InMemoryLedger, V2Math};
use amm_config::EngineConfig;
use common::*;
use types::precision::tokens::{DAI, USDC, WBTC, WETH};
use types::{Address, AmmError, ErrorCategory, U256};

const EXPECTED_OUT: u128 = 4_533_054_469;

#[test]
fn test_reference_quote_and_swap() {
    let mut engine = dai_wbtc_engine();
    let amount_in = 1_000_000 * DAI_UNIT;

    let quoted = engine.get_amount_out_min(DAI, WBTC, amount_in).unwrap();
    assert_eq!(quoted, EXPECTED_OUT);

    fund(&mut engine, DAI, TRADER, amount_in);
    let out = engine
        .swap(TRADER, DAI, WBTC, amount_in, quoted, TRADER)
        .unwrap();
    assert_eq!(out, EXPECTED_OUT);
    assert_eq!(balance(&engine, WBTC, TRADER), EXPECTED_OUT);
    assert_eq!(balance(&engine, DAI, TRADER), 0);

    let pool = engine.registry().resolve(DAI, WBTC, None).unwrap();
    assert_eq!(pool_balance(&engine, DAI, pool), 11_000_000 * DAI_UNIT);
    assert_eq!(
        pool_balance(&engine, WBTC, pool),
        500 * WBTC_UNIT - EXPECTED_OUT
    );
}

#[test]
fn test_swap_output_to_other_recipient() {
    let mut engine = dai_wbtc_engine();
    fund(&mut engine, DAI, TRADER, 1_000 * DAI_UNIT);
    let out = engine
        .swap(TRADER, DAI, WBTC, 1_000 * DAI_UNIT, 0, BORROWER)
        .unwrap();
    assert!(out > 0);
    assert_eq!(balance(&engine, WBTC, BORROWER), out);
    assert_eq!(balance(&engine, WBTC, TRADER), 0);
}

#[test]
fn test_minimum_above_quote_fails_without_side_effects() {
    let mut engine = dai_wbtc_engine();
    let amount_in = 1_000_000 * DAI_UNIT;
    fund(&mut engine, DAI, TRADER, amount_in);
    let pool = engine.registry().resolve(DAI, WBTC, None).unwrap();
    let reserves_before = engine.registry().v2(pool).unwrap().reserves();

    let err = engine
        .swap(TRADER, DAI, WBTC, amount_in, EXPECTED_OUT + 1, TRADER)
        .unwrap_err();

    assert_eq!(
        err.kind,
        AmmError::SlippageExceeded {
            amount: EXPECTED_OUT,
            bound: EXPECTED_OUT + 1,
        }
    );
    assert_eq!(err.category(), ErrorCategory::Economic);
    assert_eq!(err.operation.name(), "swap");
    assert_eq!(balance(&engine, DAI, TRADER), amount_in);
    assert_eq!(balance(&engine, WBTC, TRADER), 0);
    assert_eq!(
        engine.registry().v2(pool).unwrap().reserves(),
        reserves_before
    );
    assert_eq!(engine.ledger().depth(), 0);
}

#[test]
fn test_swap_without_allowance_is_rejected() {
    let mut engine = dai_wbtc_engine();
    engine.ledger_mut().mint(DAI, TRADER, DAI_UNIT).unwrap();

    let err = engine
        .swap(TRADER, DAI, WBTC, DAI_UNIT, 0, TRADER)
        .unwrap_err();
    assert!(matches!(err.kind, AmmError::InsufficientAllowance { .. }));
    assert_eq!(balance(&engine, DAI, TRADER), DAI_UNIT);
}

#[test]
fn test_swap_with_unfunded_caller_is_rejected() {
    let mut engine = dai_wbtc_engine();
    fund(&mut engine, DAI, TRADER, DAI_UNIT - 1);

    let err = engine
        .swap(TRADER, DAI, WBTC, DAI_UNIT, 0, TRADER)
        .unwrap_err();
    assert!(matches!(err.kind, AmmError::InsufficientBalance { .. }));
    assert_eq!(balance(&engine, WBTC, TRADER), 0);
}

#[test]
fn test_unknown_pair_reports_pool_not_found() {
    let engine = dai_wbtc_engine();
    let err = engine.get_amount_out_min(DAI, USDC, DAI_UNIT).unwrap_err();
    assert_eq!(
        err.kind,
        AmmError::PoolNotFound {
            token_a: DAI,
            token_b: USDC,
            fee: None,
        }
    );
}

fn redeemable(engine: &Engine<InMemoryLedger>, owner: Address) -> (u128, u128) {
    let pool = engine.registry().resolve(DAI, WBTC, None).unwrap();
    let state = engine.registry().v2(pool).unwrap();
    let (wbtc_reserve, dai_reserve) = state.reserves();
    let shares = U256::from(state.shares_of(owner));
    let supply = U256::from(state.total_supply());
    (
        (shares * U256::from(dai_reserve) / supply).as_u128(),
        (shares * U256::from(wbtc_reserve) / supply).as_u128(),
    )
}

#[test]
fn test_add_then_remove_returns_deposit() {
    let mut engine = dai_wbtc_engine();
    let deposit_dai = 20_000 * DAI_UNIT + 123_456_789;
    let deposit_wbtc = WBTC_UNIT + 7;
    fund(&mut engine, DAI, TRADER, deposit_dai);
    fund(&mut engine, WBTC, TRADER, deposit_wbtc);
    let (lp_dai, lp_wbtc) = redeemable(&engine, LP);

    let deposit = engine
        .add_liquidity(TRADER, DAI, WBTC, deposit_dai, deposit_wbtc, 0, 0)
        .unwrap();
    assert!(deposit.shares > 0);
    assert!(deposit.amount_a <= deposit_dai);
    assert_eq!(deposit.amount_b, WBTC_UNIT);
    assert_eq!(engine.shares_of(DAI, WBTC, TRADER), deposit.shares);
    assert_eq!(balance(&engine, DAI, TRADER), deposit_dai - deposit.amount_a);

    let (after_dai, after_wbtc) = redeemable(&engine, LP);
    assert!(after_dai >= lp_dai);
    assert!(after_wbtc >= lp_wbtc);

    let (dai_back, wbtc_back) = engine
        .remove_liquidity(TRADER, DAI, WBTC, deposit.shares, 0, 0)
        .unwrap();
    assert!(deposit.amount_a - dai_back <= 1);
    assert!(deposit.amount_b - wbtc_back <= 1);
    assert_eq!(engine.shares_of(DAI, WBTC, TRADER), 0);
    assert_eq!(balance(&engine, DAI, TRADER), deposit_dai - deposit.amount_a + dai_back);
    assert_eq!(balance(&engine, WBTC, TRADER), 7 + wbtc_back);

    let (final_dai, final_wbtc) = redeemable(&engine, LP);
    assert!(final_dai >= lp_dai);
    assert!(final_wbtc >= lp_wbtc);
}

#[test]
fn test_sole_provider_withdraws_everything() {
    let mut engine = dai_wbtc_engine();
    let shares = engine.shares_of(DAI, WBTC, LP);
    let (dai_back, wbtc_back) = engine
        .remove_liquidity(LP, DAI, WBTC, shares, 0, 0)
        .unwrap();
    assert_eq!(dai_back, 10_000_000 * DAI_UNIT);
    assert_eq!(wbtc_back, 500 * WBTC_UNIT);

    let pool = engine.registry().resolve(DAI, WBTC, None).unwrap();
    assert_eq!(engine.registry().v2(pool).unwrap().reserves(), (0, 0));
}

#[test]
fn test_deposit_follows_pool_ratio() {
    let mut engine = dai_wbtc_engine();
    fund(&mut engine, DAI, TRADER, 40_000 * DAI_UNIT);
    fund(&mut engine, WBTC, TRADER, WBTC_UNIT);

    // 40k DAI desired but only 1 WBTC: the pool ratio (20k DAI per WBTC) caps DAI
    let deposit = engine
        .add_liquidity(TRADER, DAI, WBTC, 40_000 * DAI_UNIT, WBTC_UNIT, 0, 0)
        .unwrap();
    assert_eq!(deposit.amount_b, WBTC_UNIT);
    // only what the minted shares redeem for is taken, at most one share's worth short
    let pool = engine.registry().resolve(DAI, WBTC, None).unwrap();
    let state = engine.registry().v2(pool).unwrap();
    let dai_per_share = state.reserves().1 / state.total_supply() + 1;
    assert!(deposit.amount_a <= 20_000 * DAI_UNIT);
    assert!(20_000 * DAI_UNIT - deposit.amount_a <= dai_per_share);
    assert_eq!(
        balance(&engine, DAI, TRADER),
        40_000 * DAI_UNIT - deposit.amount_a
    );
}

#[test]
fn test_remove_more_than_owned_is_rejected() {
    let mut engine = dai_wbtc_engine();
    let shares = engine.shares_of(DAI, WBTC, LP);
    let err = engine
        .remove_liquidity(LP, DAI, WBTC, shares + 1, 0, 0)
        .unwrap_err();
    assert!(matches!(err.kind, AmmError::InsufficientShares { .. }));
    assert_eq!(engine.shares_of(DAI, WBTC, LP), shares);
}

#[test]
fn test_swap_never_decreases_k() {
    let mut engine = dai_wbtc_engine();
    let pool = engine.registry().resolve(DAI, WBTC, None).unwrap();
    let k_before = engine.registry().v2(pool).unwrap().k_last();

    fund(&mut engine, DAI, TRADER, 250_000 * DAI_UNIT);
    engine
        .swap(TRADER, DAI, WBTC, 250_000 * DAI_UNIT, 0, TRADER)
        .unwrap();
    let k_after = engine.registry().v2(pool).unwrap().k_last();
    assert!(k_after >= k_before);
}

#[test]
fn test_quote_matches_pool_math() {
    let engine = dai_wbtc_engine();
    let expected = V2Math::get_amount_out(
        5_000 * DAI_UNIT,
        10_000_000 * DAI_UNIT,
        500 * WBTC_UNIT,
        30,
    )
    .unwrap();
    assert_eq!(
        engine
            .get_amount_out_min(DAI, WBTC, 5_000 * DAI_UNIT)
            .unwrap(),
        expected
    );
}

#[test]
fn test_swap_routes_through_hub_token() {
    let mut config = EngineConfig::default();
    config.router.hub_token = Some(WETH);
    let mut engine = engine_with(config);

    fund(&mut engine, DAI, LP, 2_000_000 * DAI_UNIT);
    fund(&mut engine, WETH, LP, 1_000 * WETH_UNIT);
    fund(&mut engine, USDC, LP, 1_000_000 * USDC_UNIT);
    engine
        .add_liquidity(LP, DAI, WETH, 1_000_000 * DAI_UNIT, 500 * WETH_UNIT, 0, 0)
        .unwrap();
    engine
        .add_liquidity(LP, WETH, USDC, 500 * WETH_UNIT, 1_000_000 * USDC_UNIT, 0, 0)
        .unwrap();

    let amount_in = 1_000 * DAI_UNIT;
    let first = V2Math::get_amount_out(amount_in, 1_000_000 * DAI_UNIT, 500 * WETH_UNIT, 30)
        .unwrap();
    let second =
        V2Math::get_amount_out(first, 500 * WETH_UNIT, 1_000_000 * USDC_UNIT, 30).unwrap();
    assert_eq!(
        engine.get_amount_out_min(DAI, USDC, amount_in).unwrap(),
        second
    );

    fund(&mut engine, DAI, TRADER, amount_in);
    let out = engine
        .swap(TRADER, DAI, USDC, amount_in, second, TRADER)
        .unwrap();
    assert_eq!(out, second);
    assert_eq!(balance(&engine, USDC, TRADER), second);
    assert_eq!(balance(&engine, WETH, TRADER), 0);
}
