//! Flash borrows: lend, run the borrower's repayment step, verify once

use tracing::info;
use types::{Address, AmmError, AmmResult, PoolId};

use super::{Engine, EngineResult, Operation};
use crate::flash::FlashBorrowRecord;
use crate::ledger::Ledger;
use crate::pool_traits::{AmmPool, Pool};

impl<L: Ledger> Engine<L> {
    /// Lends `amount` of `token` from `pool` to `borrower`, runs `repay`, then checks
    /// that the pool holds its pre-borrow balance plus the flash fee
    ///
    /// `repay` receives the engine (to move tokens back, or to trade with the borrowed
    /// funds) and the open borrow record. The balance is checked exactly once, after
    /// `repay` returns; a shortfall, or any error from `repay`, aborts the whole
    /// operation with every change undone. A second borrow from the same pool while
    /// this one is open fails with `ReentrantBorrow`.
    pub fn flash_swap<F>(
        &mut self,
        borrower: Address,
        pool: PoolId,
        token: Address,
        amount: u128,
        repay: F,
    ) -> EngineResult<FlashBorrowRecord>
    where
        F: FnOnce(&mut Self, &FlashBorrowRecord) -> AmmResult<()>,
    {
        let operation = Operation::FlashSwap {
            pool,
            token,
            amount,
        };
        self.atomic(operation, |engine| {
            engine.flash_guard.enter(pool)?;
            let result = engine.run_flash(borrower, pool, token, amount, repay);
            engine.flash_guard.exit(pool);
            result
        })
    }

    fn run_flash<F>(
        &mut self,
        borrower: Address,
        pool_id: PoolId,
        token: Address,
        amount: u128,
        repay: F,
    ) -> AmmResult<FlashBorrowRecord>
    where
        F: FnOnce(&mut Self, &FlashBorrowRecord) -> AmmResult<()>,
    {
        let pool = self.registry.get(pool_id)?;
        if !pool.contains(token) {
            return Err(AmmError::invalid_path(format!(
                "token {token:#x} is not in {pool_id}"
            )));
        }
        let fee = pool.flash_fee();
        let pool_address = pool_id.address();

        let balance_before = self.ledger.balance_of(token, pool_address);
        if amount > balance_before {
            return Err(AmmError::InsufficientLiquidity {
                requested: amount,
                available: balance_before,
            });
        }
        let mut record = FlashBorrowRecord::new(pool_id, token, amount, fee, balance_before)?;

        self.ledger.transfer(token, pool_address, borrower, amount)?;
        record.mark_borrowed();
        info!(pool = %pool_id, ?borrower, ?token, amount, fee = record.fee, "flash borrow opened");

        repay(self, &record)?;

        let balance_after = self.ledger.balance_of(token, pool_address);
        let repaid = record.settle(balance_after)?;
        self.absorb_flash_payment(pool_id, token, balance_after - balance_before)?;
        info!(pool = %pool_id, repaid, fee = record.fee, "flash borrow repaid");
        Ok(record)
    }

    /// Folds what a borrower paid beyond the principal into the pool's accounting
    fn absorb_flash_payment(
        &mut self,
        pool_id: PoolId,
        token: Address,
        paid: u128,
    ) -> AmmResult<()> {
        let pool_address = pool_id.address();
        let (token0, token1) = self.registry.get(pool_id)?.tokens();
        let balance0 = self.ledger.balance_of(token0, pool_address);
        let balance1 = self.ledger.balance_of(token1, pool_address);
        match self.registry.get_mut(pool_id)? {
            Pool::ConstantProduct(pool) => pool.sync(balance0, balance1),
            Pool::Concentrated(pool) => {
                if token == token0 {
                    pool.flash_settle(paid, 0)
                } else {
                    pool.flash_settle(0, paid)
                }
            }
        }
    }

    /// Flash borrow from the constant-product pool of `token_borrow`/`token_pair` in
    /// which `borrower` repays exactly the required amount out of its own balance
    pub fn test_flash_swap(
        &mut self,
        borrower: Address,
        token_borrow: Address,
        token_pair: Address,
        amount: u128,
    ) -> EngineResult<FlashBorrowRecord> {
        // the pool is unknown until resolved, so the failure names the zero pool
        let unresolved = Operation::FlashSwap {
            pool: PoolId::new(Address::zero()),
            token: token_borrow,
            amount,
        };
        let pool = self.read(unresolved, |engine| {
            engine.registry.resolve(token_borrow, token_pair, None)
        })?;
        self.flash_swap(borrower, pool, token_borrow, amount, |engine, record| {
            engine.ledger_mut().transfer(
                record.token,
                borrower,
                record.pool.address(),
                record.required_repayment,
            )
        })
    }
}
