//! Token balance collaborator
//!
//! The engine never holds tokens itself; it instructs a [`Ledger`] to move balances
//! between accounts (callers, pools, the engine's own address). The ledger is also the
//! unit of atomicity: every engine operation runs inside `begin` and ends with either
//! `commit` or `rollback`.

use std::collections::HashMap;

use tracing::trace;
use types::{Address, AmmError, AmmResult};

/// Balance and allowance store with nested transactions
pub trait Ledger {
    fn balance_of(&self, token: Address, account: Address) -> u128;

    /// Moves `amount` of `token` from `from` to `to`
    fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> AmmResult<()>;

    fn allowance(&self, token: Address, owner: Address, spender: Address) -> u128;

    fn approve(&mut self, token: Address, owner: Address, spender: Address, amount: u128);

    /// Moves `amount` from `from` to `to` on behalf of `spender`, consuming allowance
    ///
    /// An allowance of `u128::MAX` is treated as unlimited and never decremented.
    fn transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> AmmResult<()>;

    /// Opens a (possibly nested) transaction
    fn begin(&mut self);

    /// Keeps the changes of the innermost open transaction
    fn commit(&mut self);

    /// Discards the changes of the innermost open transaction
    fn rollback(&mut self);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct LedgerState {
    balances: HashMap<(Address, Address), u128>,
    allowances: HashMap<(Address, Address, Address), u128>,
}

/// Ledger kept entirely in memory, with a snapshot per open transaction
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    state: LedgerState,
    snapshots: Vec<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits new tokens to `account`; used to seed balances
    pub fn mint(&mut self, token: Address, account: Address, amount: u128) -> AmmResult<()> {
        let balance = self.state.balances.entry((token, account)).or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| AmmError::overflow("ledger mint"))?;
        Ok(())
    }

    /// Number of open transactions
    pub fn depth(&self) -> usize {
        self.snapshots.len()
    }

    fn debit(&mut self, token: Address, account: Address, amount: u128) -> AmmResult<()> {
        let available = self.balance_of(token, account);
        if available < amount {
            return Err(AmmError::InsufficientBalance {
                token,
                account,
                needed: amount,
                available,
            });
        }
        self.state
            .balances
            .insert((token, account), available - amount);
        Ok(())
    }
}

impl Ledger for InMemoryLedger {
    fn balance_of(&self, token: Address, account: Address) -> u128 {
        self.state
            .balances
            .get(&(token, account))
            .copied()
            .unwrap_or(0)
    }

    fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> AmmResult<()> {
        if amount == 0 || from == to {
            // still enforce that `from` could have paid
            let available = self.balance_of(token, from);
            if available < amount {
                return Err(AmmError::InsufficientBalance {
                    token,
                    account: from,
                    needed: amount,
                    available,
                });
            }
            return Ok(());
        }
        let credited = self
            .balance_of(token, to)
            .checked_add(amount)
            .ok_or_else(|| AmmError::overflow("ledger transfer"))?;
        self.debit(token, from, amount)?;
        self.state.balances.insert((token, to), credited);
        trace!(?token, ?from, ?to, amount, "transfer");
        Ok(())
    }

    fn allowance(&self, token: Address, owner: Address, spender: Address) -> u128 {
        self.state
            .allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or(0)
    }

    fn approve(&mut self, token: Address, owner: Address, spender: Address, amount: u128) {
        self.state
            .allowances
            .insert((token, owner, spender), amount);
    }

    fn transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> AmmResult<()> {
        let allowed = self.allowance(token, from, spender);
        if spender != from && allowed < amount {
            return Err(AmmError::InsufficientAllowance {
                token,
                owner: from,
                spender,
                needed: amount,
                allowed,
            });
        }
        self.transfer(token, from, to, amount)?;
        if spender != from && allowed != u128::MAX {
            self.approve(token, from, spender, allowed - amount);
        }
        Ok(())
    }

    fn begin(&mut self) {
        self.snapshots.push(self.state.clone());
    }

    fn commit(&mut self) {
        self.snapshots.pop();
    }

    fn rollback(&mut self) {
        if let Some(snapshot) = self.snapshots.pop() {
            self.state = snapshot;
        }
    }
}
