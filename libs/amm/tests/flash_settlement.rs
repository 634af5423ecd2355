//! Flash borrow settlement through the engine
//!
//! A 500 USDC borrow from a 0.3% constant-product pool costs a fee of
//! `ceil(500e6 * 30 / 9970) = 1_504_514`.

mod common;

use amm::{AmmPool, FlashState, Ledger};
use common::*;
use types::precision::tokens::{DAI, USDC, WETH};
use types::{AmmError, PoolId};

const BORROW: u128 = 500 * USDC_UNIT;
const FEE: u128 = 1_504_514;

#[test]
fn test_flash_fee_for_reference_borrow() {
    let (engine, pool) = usdc_weth_engine();
    let fee = engine.registry().get(pool).unwrap().flash_fee();
    assert_eq!(fee.fee_for(BORROW).unwrap(), FEE);
    assert_eq!(fee.required_repayment(BORROW).unwrap(), BORROW + FEE);
}

#[test]
fn test_exact_repayment_settles() {
    let (mut engine, pool) = usdc_weth_engine();
    fund(&mut engine, USDC, BORROWER, 10 * USDC_UNIT);
    let pool_before = pool_balance(&engine, USDC, pool);

    let record = engine
        .test_flash_swap(BORROWER, USDC, WETH, BORROW)
        .unwrap();

    assert_eq!(record.fee, FEE);
    assert_eq!(record.required_repayment, BORROW + FEE);
    assert_eq!(record.state, FlashState::Repaid);
    assert_eq!(pool_balance(&engine, USDC, pool), pool_before + FEE);
    assert_eq!(balance(&engine, USDC, BORROWER), 10 * USDC_UNIT - FEE);

    // the fee is folded into the reserves
    let (usdc_reserve, _) = engine.registry().v2(pool).unwrap().reserves();
    assert_eq!(usdc_reserve, pool_before + FEE);
}

#[test]
fn test_shortfall_undoes_the_borrow() {
    let (mut engine, pool) = usdc_weth_engine();
    fund(&mut engine, USDC, BORROWER, 10 * USDC_UNIT);
    let pool_before = pool_balance(&engine, USDC, pool);

    let err = engine
        .flash_swap(BORROWER, pool, USDC, BORROW, |engine, record| {
            engine.ledger_mut().transfer(
                record.token,
                BORROWER,
                record.pool.address(),
                record.required_repayment - 1,
            )
        })
        .unwrap_err();

    assert_eq!(
        err.kind,
        AmmError::FlashRepaymentShortfall {
            pool,
            required: BORROW + FEE,
            repaid: BORROW + FEE - 1,
        }
    );
    assert_eq!(err.operation.name(), "flash_swap");
    assert_eq!(pool_balance(&engine, USDC, pool), pool_before);
    assert_eq!(balance(&engine, USDC, BORROWER), 10 * USDC_UNIT);
    assert_eq!(engine.ledger().depth(), 0);
}

#[test]
fn test_borrower_without_fee_funds_fails() {
    let (mut engine, pool) = usdc_weth_engine();
    let pool_before = pool_balance(&engine, USDC, pool);

    let err = engine
        .test_flash_swap(BORROWER, USDC, WETH, BORROW)
        .unwrap_err();
    assert!(matches!(err.kind, AmmError::InsufficientBalance { .. }));
    assert_eq!(pool_balance(&engine, USDC, pool), pool_before);
    assert_eq!(balance(&engine, USDC, BORROWER), 0);
}

#[test]
fn test_overpayment_is_kept_by_the_pool() {
    let (mut engine, pool) = usdc_weth_engine();
    fund(&mut engine, USDC, BORROWER, 10 * USDC_UNIT);
    let pool_before = pool_balance(&engine, USDC, pool);

    engine
        .flash_swap(BORROWER, pool, USDC, BORROW, |engine, record| {
            engine.ledger_mut().transfer(
                record.token,
                BORROWER,
                record.pool.address(),
                record.required_repayment + 7,
            )
        })
        .unwrap();
    assert_eq!(pool_balance(&engine, USDC, pool), pool_before + FEE + 7);
}

#[test]
fn test_borrow_above_pool_balance_is_rejected() {
    let (mut engine, pool) = usdc_weth_engine();
    let available = pool_balance(&engine, USDC, pool);
    let err = engine
        .flash_swap(BORROWER, pool, USDC, available + 1, |_, _| Ok(()))
        .unwrap_err();
    assert_eq!(
        err.kind,
        AmmError::InsufficientLiquidity {
            requested: available + 1,
            available,
        }
    );
}

#[test]
fn test_zero_borrow_is_rejected() {
    let (mut engine, pool) = usdc_weth_engine();
    let err = engine
        .flash_swap(BORROWER, pool, USDC, 0, |_, _| Ok(()))
        .unwrap_err();
    assert!(matches!(err.kind, AmmError::InvalidAmount { .. }));
}

#[test]
fn test_token_outside_pool_is_rejected() {
    let (mut engine, pool) = usdc_weth_engine();
    let err = engine
        .flash_swap(BORROWER, pool, DAI, USDC_UNIT, |_, _| Ok(()))
        .unwrap_err();
    assert!(matches!(err.kind, AmmError::InvalidPath { .. }));
}

#[test]
fn test_unknown_pair_names_no_pool() {
    let (mut engine, _) = usdc_weth_engine();
    let err = engine
        .test_flash_swap(BORROWER, USDC, DAI, BORROW)
        .unwrap_err();
    assert!(matches!(err.kind, AmmError::PoolNotFound { .. }));
}

#[test]
fn test_reentrant_borrow_on_same_pool_is_rejected() {
    let (mut engine, pool) = usdc_weth_engine();
    fund(&mut engine, USDC, BORROWER, 10 * USDC_UNIT);

    let err = engine
        .flash_swap(BORROWER, pool, USDC, BORROW, |engine, _| {
            engine.flash_swap(BORROWER, pool, USDC, USDC_UNIT, |_, _| Ok(()))?;
            Ok(())
        })
        .unwrap_err();
    assert_eq!(err.kind, AmmError::ReentrantBorrow { pool });
    assert_eq!(balance(&engine, USDC, BORROWER), 10 * USDC_UNIT);
}

#[test]
fn test_swap_against_borrowed_pool_is_rejected() {
    let (mut engine, pool) = usdc_weth_engine();
    fund(&mut engine, USDC, BORROWER, 10 * USDC_UNIT);

    let err = engine
        .flash_swap(BORROWER, pool, USDC, BORROW, |engine, _| {
            engine.swap(BORROWER, USDC, WETH, USDC_UNIT, 0, BORROWER)?;
            Ok(())
        })
        .unwrap_err();
    assert_eq!(err.kind, AmmError::ReentrantBorrow { pool });
}

#[test]
fn test_guard_releases_after_failure() {
    let (mut engine, pool) = usdc_weth_engine();
    fund(&mut engine, USDC, BORROWER, 10 * USDC_UNIT);

    engine
        .flash_swap(BORROWER, pool, USDC, BORROW, |_, _| {
            Err(AmmError::InvalidAmount {
                reason: "borrower gave up",
            })
        })
        .unwrap_err();

    // a failed borrow leaves the pool usable
    engine
        .test_flash_swap(BORROWER, USDC, WETH, BORROW)
        .unwrap();
}

#[test]
fn test_borrow_from_other_pool_inside_repayment() {
    let (mut engine, usdc_weth) = usdc_weth_engine();
    fund(&mut engine, DAI, LP, 1_000_000 * DAI_UNIT);
    fund(&mut engine, USDC, LP, 1_000_000 * USDC_UNIT);
    engine
        .add_liquidity(LP, DAI, USDC, 1_000_000 * DAI_UNIT, 1_000_000 * USDC_UNIT, 0, 0)
        .unwrap();
    let dai_usdc: PoolId = engine.registry().resolve(DAI, USDC, None).unwrap();
    fund(&mut engine, USDC, BORROWER, 10 * USDC_UNIT);

    engine
        .flash_swap(BORROWER, usdc_weth, USDC, BORROW, |engine, outer| {
            engine.flash_swap(BORROWER, dai_usdc, USDC, BORROW, |engine, inner| {
                engine.ledger_mut().transfer(
                    inner.token,
                    BORROWER,
                    inner.pool.address(),
                    inner.required_repayment,
                )
            })?;
            engine.ledger_mut().transfer(
                outer.token,
                BORROWER,
                outer.pool.address(),
                outer.required_repayment,
            )
        })
        .unwrap();
    assert_eq!(balance(&engine, USDC, BORROWER), 10 * USDC_UNIT - 2 * FEE);
}

#[test]
fn test_concentrated_pool_borrow_credits_fee_growth() {
    let (mut engine, pool) = dai_usdc_concentrated();
    fund(&mut engine, DAI, BORROWER, DAI_UNIT);
    let liquidity = engine.registry().v3(pool).unwrap().liquidity();
    let borrow = 10 * DAI_UNIT;

    let record = engine
        .flash_swap(BORROWER, pool, DAI, borrow, |engine, record| {
            engine.ledger_mut().transfer(
                record.token,
                BORROWER,
                record.pool.address(),
                record.required_repayment,
            )
        })
        .unwrap();

    // 0.3% of 10 DAI, rounded up
    assert_eq!(record.fee, 30_000_000_000_000_000);
    let (growth0, growth1) = engine.registry().v3(pool).unwrap().fee_growth_global();
    assert!(!growth0.is_zero());
    assert!(growth1.is_zero());
    assert_eq!(engine.registry().v3(pool).unwrap().liquidity(), liquidity);

    let position = engine.token_id(LP).unwrap();
    let (owed0, owed1) = engine.tokens_owed(position).unwrap();
    assert!(owed0 > 0 && owed0 <= record.fee);
    assert_eq!(owed1, 0);
}
