//! Atomic operation facade over pools, positions, flash settlement and the ledger
//!
//! Every public method runs as one all-or-nothing operation: the pool registry and the
//! position book are snapshotted, a ledger transaction is opened, and any failure
//! restores the snapshot and rolls the ledger back before the error is returned.
//! Operations may nest (a flash repayment step may swap), each level with its own
//! snapshot.

mod liquidity;
mod operation;
mod settlement;
mod swap;

use std::sync::Arc;

use amm_config::EngineConfig;
use ethereum_types::H160;
use parking_lot::Mutex;
use tracing::{info, warn};
use types::{Address, AmmError, AmmResult, PoolId, U256};

use crate::flash::FlashGuard;
use crate::ledger::Ledger;
use crate::position_manager::PositionManager;
use crate::registry::PoolRegistry;

pub use liquidity::MintParams;
pub use operation::{EngineResult, Operation, OperationError};

/// Account the engine acts from: spender of caller allowances and owner of managed positions
pub const ENGINE_ADDRESS: Address = H160([
    0xee, 0xee, 0xee, 0xee, 0xee, 0xee, 0xee, 0xee, 0xee, 0xee, 0xee, 0xee, 0xee, 0xee, 0xee,
    0xee, 0xee, 0xee, 0xee, 0x01,
]);

/// Engine shared across threads; the mutex linearizes operations
pub type SharedEngine<L> = Arc<Mutex<Engine<L>>>;

pub struct Engine<L: Ledger> {
    config: EngineConfig,
    address: Address,
    registry: PoolRegistry,
    positions: PositionManager,
    flash_guard: FlashGuard,
    ledger: L,
}

impl<L: Ledger> Engine<L> {
    pub fn new(config: EngineConfig, ledger: L) -> Self {
        Self::with_address(config, ledger, ENGINE_ADDRESS)
    }

    pub fn with_address(config: EngineConfig, ledger: L, address: Address) -> Self {
        Self {
            registry: PoolRegistry::new(config.v2.clone(), config.v3.clone()),
            positions: PositionManager::new(address),
            flash_guard: FlashGuard::new(),
            config,
            address,
            ledger,
        }
    }

    pub fn into_shared(self) -> SharedEngine<L> {
        Arc::new(Mutex::new(self))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &PoolRegistry {
        &self.registry
    }

    pub fn positions(&self) -> &PositionManager {
        &self.positions
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Direct ledger access, e.g. for a flash borrower's repayment transfer
    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    pub fn create_v2_pool(&mut self, token_a: Address, token_b: Address) -> EngineResult<PoolId> {
        let operation = Operation::CreatePool {
            token_a,
            token_b,
            fee: None,
        };
        self.atomic(operation, |engine| {
            engine.registry.create_v2_pool(token_a, token_b)
        })
    }

    /// Creates a concentrated pool at a starting price
    pub fn create_v3_pool(
        &mut self,
        token_a: Address,
        token_b: Address,
        fee: u32,
        sqrt_price_x96: U256,
    ) -> EngineResult<PoolId> {
        let operation = Operation::CreatePool {
            token_a,
            token_b,
            fee: Some(fee),
        };
        self.atomic(operation, |engine| {
            engine
                .registry
                .create_v3_pool(token_a, token_b, fee, sqrt_price_x96)
        })
    }

    /// Runs `body` as one operation; on error every change it made is undone
    pub(crate) fn atomic<T>(
        &mut self,
        operation: Operation,
        body: impl FnOnce(&mut Self) -> AmmResult<T>,
    ) -> EngineResult<T> {
        let registry = self.registry.clone();
        let positions = self.positions.clone();
        self.ledger.begin();

        match body(self) {
            Ok(value) => {
                self.ledger.commit();
                info!(operation = operation.name(), inputs = ?operation, "operation committed");
                Ok(value)
            }
            Err(kind) => {
                self.ledger.rollback();
                self.registry = registry;
                self.positions = positions;
                warn!(
                    operation = operation.name(),
                    inputs = ?operation,
                    error = %kind,
                    economic = kind.is_economic(),
                    "operation rolled back"
                );
                Err(OperationError { operation, kind })
            }
        }
    }

    /// Read-only counterpart of [`Self::atomic`]
    pub(crate) fn read<T>(
        &self,
        operation: Operation,
        body: impl FnOnce(&Self) -> AmmResult<T>,
    ) -> EngineResult<T> {
        body(self).map_err(|kind| OperationError { operation, kind })
    }

    /// Pools with an open flash borrow accept no other operation until it settles
    fn ensure_unlocked(&self, pool: PoolId) -> AmmResult<()> {
        if self.flash_guard.is_open(pool) {
            return Err(AmmError::ReentrantBorrow { pool });
        }
        Ok(())
    }

    /// Pulls `amount` of `token` from `from` into `pool` using the engine's allowance
    fn pull(&mut self, token: Address, from: Address, pool: PoolId, amount: u128) -> AmmResult<()> {
        if amount == 0 {
            return Ok(());
        }
        self.ledger
            .transfer_from(token, self.address, from, pool.address(), amount)
    }

    /// Pays `amount` of `token` out of `pool`
    fn pay(&mut self, token: Address, pool: PoolId, to: Address, amount: u128) -> AmmResult<()> {
        if amount == 0 {
            return Ok(());
        }
        self.ledger.transfer(token, pool.address(), to, amount)
    }
}
