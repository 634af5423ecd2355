//! Property tests for the pool invariants
//!
//! These hold for any reserves and trade sizes the generators produce, not only for
//! the reference scenarios.

mod common;

use amm::{FlashFee, InMemoryLedger, Ledger, V2Math};
use common::*;
use proptest::prelude::*;
use types::precision::tokens::{DAI, USDC, WBTC};
use types::Address;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Swaps pay a fee, so the product of reserves never shrinks
    #[test]
    fn prop_swap_never_decreases_k(amount_in in 1_000_000u128..=2_000_000 * DAI_UNIT) {
        let mut engine = dai_wbtc_engine();
        let pool = engine.registry().resolve(DAI, WBTC, None).unwrap();
        let k_before = engine.registry().v2(pool).unwrap().k_last();
        let reserve_wbtc = engine.registry().v2(pool).unwrap().reserves().0;

        fund(&mut engine, DAI, TRADER, amount_in);
        match engine.swap(TRADER, DAI, WBTC, amount_in, 0, TRADER) {
            Ok(out) => {
                prop_assert!(out < reserve_wbtc);
                prop_assert!(engine.registry().v2(pool).unwrap().k_last() >= k_before);
            }
            // too small to buy a single satoshi
            Err(err) => prop_assert!(err.kind.is_economic()),
        }
    }

    /// The input quoted for an output always buys at least that output
    #[test]
    fn prop_amount_in_covers_amount_out(
        reserve_in in 1_000u128..1_000_000_000_000_000_000_000_000,
        reserve_out in 1_000u128..1_000_000_000_000_000_000_000_000,
        fraction in 1u128..1000,
    ) {
        let amount_out = reserve_out * fraction / 1000;
        prop_assume!(amount_out > 0);
        let amount_in = V2Math::get_amount_in(amount_out, reserve_in, reserve_out, 30).unwrap();
        let bought = V2Math::get_amount_out(amount_in, reserve_in, reserve_out, 30).unwrap();
        prop_assert!(bought >= amount_out);
    }

    /// Flash fees round up: the smallest fee not below the exact proportional fee
    #[test]
    fn prop_flash_fee_is_ceiling(amount in 1u128..u64::MAX as u128, fee_bps in 1u32..1000) {
        let fee = FlashFee::constant_product(fee_bps);
        let charged = fee.fee_for(amount).unwrap();
        let exact_numerator = amount * fee_bps as u128;
        let denominator = 10_000 - fee_bps as u128;
        prop_assert!(charged * denominator >= exact_numerator);
        prop_assert!((charged - 1) * denominator < exact_numerator);
        prop_assert_eq!(fee.required_repayment(amount).unwrap(), amount + charged);
    }

    /// Any transfer sequence, committed or rolled back, conserves supply
    #[test]
    fn prop_ledger_conserves_supply(
        transfers in prop::collection::vec((0u8..4, 0u8..4, 0u128..2_000), 1..40),
        rollback in any::<bool>(),
    ) {
        let accounts: Vec<Address> = (0u8..4).map(Address::repeat_byte).collect();
        let mut ledger = InMemoryLedger::new();
        for account in &accounts {
            ledger.mint(USDC, *account, 1_000).unwrap();
        }
        let before: Vec<u128> = accounts.iter().map(|a| ledger.balance_of(USDC, *a)).collect();

        ledger.begin();
        for (from, to, amount) in transfers {
            // failed transfers must not move anything either
            let _ = ledger.transfer(USDC, accounts[from as usize], accounts[to as usize], amount);
        }
        if rollback {
            ledger.rollback();
        } else {
            ledger.commit();
        }

        let after: Vec<u128> = accounts.iter().map(|a| ledger.balance_of(USDC, *a)).collect();
        prop_assert_eq!(after.iter().sum::<u128>(), 4_000);
        if rollback {
            prop_assert_eq!(after, before);
        }
    }

    /// Exact-input quotes through the engine never exceed the pool's output reserve and
    /// grow with the input
    #[test]
    fn prop_concentrated_quotes_are_monotonic(small in 1u128..DAI_UNIT, extra in 1u128..DAI_UNIT) {
        let (engine, pool) = dai_usdc_concentrated();
        let v3 = engine.registry().v3(pool).unwrap();
        let out_small = v3.quote_exact_input(DAI, small).unwrap();
        let out_large = v3.quote_exact_input(DAI, small + extra).unwrap();
        prop_assert!(out_small <= out_large);
        prop_assert!(out_large < small + extra);
    }
}
