//! Swap surface: V2-style pair swaps and router-style single and multi-hop swaps

use tracing::info;
use types::{Address, AmmError, AmmResult};

use super::{Engine, EngineResult, Operation};
use crate::ledger::Ledger;
use crate::pool_traits::AmmPool;
use crate::router::{Router, SwapPath};

fn path_tokens(path: &SwapPath) -> Vec<Address> {
    let mut tokens: Vec<Address> = path.hops().iter().map(|hop| hop.token_in).collect();
    tokens.extend(path.token_out());
    tokens
}

fn concentrated_fees(fees: &[u32]) -> Vec<Option<u32>> {
    fees.iter().map(|fee| Some(*fee)).collect()
}

impl<L: Ledger> Engine<L> {
    /// Constant-product path between two tokens: the direct pool, else through the
    /// configured hub token
    fn v2_path(&self, token_in: Address, token_out: Address) -> AmmResult<SwapPath> {
        match SwapPath::resolve(&self.registry, &[token_in, token_out], &[None]) {
            Err(AmmError::PoolNotFound { .. }) => match self.config.router.hub_token {
                Some(hub) if hub != token_in && hub != token_out => {
                    SwapPath::resolve(&self.registry, &[token_in, hub, token_out], &[None, None])
                }
                _ => Err(AmmError::PoolNotFound {
                    token_a: token_in,
                    token_b: token_out,
                    fee: None,
                }),
            },
            resolved => resolved,
        }
    }

    /// Output a constant-product swap of `amount_in` would yield right now
    pub fn get_amount_out_min(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: u128,
    ) -> EngineResult<u128> {
        let operation = Operation::GetAmountOutMin {
            token_in,
            token_out,
            amount_in,
        };
        self.read(operation, |engine| {
            let path = engine.v2_path(token_in, token_out)?;
            path.validate(&engine.registry, engine.config.router.max_hops)?;
            let amounts = Router::quote_exact_input(&engine.registry, &path, amount_in)?;
            amounts
                .last()
                .copied()
                .ok_or_else(|| AmmError::invalid_path("empty path"))
        })
    }

    /// Constant-product exact-input swap paid by `caller`, output sent to `to`
    pub fn swap(
        &mut self,
        caller: Address,
        token_in: Address,
        token_out: Address,
        amount_in: u128,
        amount_out_min: u128,
        to: Address,
    ) -> EngineResult<u128> {
        let operation = Operation::Swap {
            token_in,
            token_out,
            amount_in,
            amount_out_min,
            to,
        };
        self.atomic(operation, |engine| {
            let path = engine.v2_path(token_in, token_out)?;
            engine.execute_exact_input(caller, &path, amount_in, amount_out_min, to)
        })
    }

    /// Per-hop amounts of an exact-input path without executing it
    pub fn quote_exact_input(&self, path: &SwapPath, amount_in: u128) -> EngineResult<Vec<u128>> {
        let operation = Operation::Quote {
            tokens: path_tokens(path),
            amount: amount_in,
            exact_input: true,
        };
        self.read(operation, |engine| {
            path.validate(&engine.registry, engine.config.router.max_hops)?;
            Router::quote_exact_input(&engine.registry, path, amount_in)
        })
    }

    /// Per-hop amounts of an exact-output path without executing it
    pub fn quote_exact_output(
        &self,
        path: &SwapPath,
        amount_out: u128,
    ) -> EngineResult<Vec<u128>> {
        let operation = Operation::Quote {
            tokens: path_tokens(path),
            amount: amount_out,
            exact_input: false,
        };
        self.read(operation, |engine| {
            path.validate(&engine.registry, engine.config.router.max_hops)?;
            Router::quote_exact_output(&engine.registry, path, amount_out)
        })
    }

    /// Swaps exactly `amount_in` along `path`; returns the final output
    pub fn swap_exact_input(
        &mut self,
        caller: Address,
        path: &SwapPath,
        amount_in: u128,
        amount_out_minimum: u128,
        recipient: Address,
    ) -> EngineResult<u128> {
        let operation = Operation::SwapExactInput {
            tokens: path_tokens(path),
            amount_in,
            amount_out_minimum,
        };
        self.atomic(operation, |engine| {
            engine.execute_exact_input(caller, path, amount_in, amount_out_minimum, recipient)
        })
    }

    /// Swaps for exactly `amount_out` along `path`; returns the input paid
    pub fn swap_exact_output(
        &mut self,
        caller: Address,
        path: &SwapPath,
        amount_out: u128,
        amount_in_maximum: u128,
        recipient: Address,
    ) -> EngineResult<u128> {
        let operation = Operation::SwapExactOutput {
            tokens: path_tokens(path),
            amount_out,
            amount_in_maximum,
        };
        self.atomic(operation, |engine| {
            engine.execute_exact_output(caller, path, amount_out, amount_in_maximum, recipient)
        })
    }

    /// Single concentrated-pool swap of exactly `amount_in`; output goes to `caller`
    pub fn swap_exact_input_single(
        &mut self,
        caller: Address,
        token_in: Address,
        token_out: Address,
        fee: u32,
        amount_in: u128,
        amount_out_minimum: u128,
    ) -> EngineResult<u128> {
        self.swap_exact_input_multihop(
            caller,
            &[token_in, token_out],
            &[fee],
            amount_in,
            amount_out_minimum,
        )
    }

    /// Single concentrated-pool swap for exactly `amount_out`; returns the input paid
    pub fn swap_exact_output_single(
        &mut self,
        caller: Address,
        token_in: Address,
        token_out: Address,
        fee: u32,
        amount_out: u128,
        amount_in_maximum: u128,
    ) -> EngineResult<u128> {
        self.swap_exact_output_multihop(
            caller,
            &[token_in, token_out],
            &[fee],
            amount_out,
            amount_in_maximum,
        )
    }

    /// Exact-input swap through concentrated pools `tokens[i] -(fees[i])-> tokens[i + 1]`
    pub fn swap_exact_input_multihop(
        &mut self,
        caller: Address,
        tokens: &[Address],
        fees: &[u32],
        amount_in: u128,
        amount_out_minimum: u128,
    ) -> EngineResult<u128> {
        let operation = Operation::SwapExactInput {
            tokens: tokens.to_vec(),
            amount_in,
            amount_out_minimum,
        };
        self.atomic(operation, |engine| {
            let path = SwapPath::resolve(&engine.registry, tokens, &concentrated_fees(fees))?;
            engine.execute_exact_input(caller, &path, amount_in, amount_out_minimum, caller)
        })
    }

    /// Exact-output swap through concentrated pools; the last hop is filled first
    pub fn swap_exact_output_multihop(
        &mut self,
        caller: Address,
        tokens: &[Address],
        fees: &[u32],
        amount_out: u128,
        amount_in_maximum: u128,
    ) -> EngineResult<u128> {
        let operation = Operation::SwapExactOutput {
            tokens: tokens.to_vec(),
            amount_out,
            amount_in_maximum,
        };
        self.atomic(operation, |engine| {
            let path = SwapPath::resolve(&engine.registry, tokens, &concentrated_fees(fees))?;
            engine.execute_exact_output(caller, &path, amount_out, amount_in_maximum, caller)
        })
    }

    fn execute_exact_input(
        &mut self,
        caller: Address,
        path: &SwapPath,
        amount_in: u128,
        amount_out_minimum: u128,
        recipient: Address,
    ) -> AmmResult<u128> {
        path.validate(&self.registry, self.config.router.max_hops)?;
        let mut amounts = Vec::with_capacity(path.len() + 1);
        amounts.push(amount_in);
        let mut amount = amount_in;
        for hop in path.hops() {
            self.ensure_unlocked(hop.pool)?;
            amount = self
                .registry
                .get_mut(hop.pool)?
                .swap_exact_input(hop.token_in, amount, 0)?;
            amounts.push(amount);
        }
        if amount < amount_out_minimum {
            return Err(AmmError::SlippageExceeded {
                amount,
                bound: amount_out_minimum,
            });
        }
        self.settle_path(caller, path, &amounts, recipient)?;
        info!(?caller, hops = path.len(), amount_in, amount_out = amount, "exact input swap");
        Ok(amount)
    }

    fn execute_exact_output(
        &mut self,
        caller: Address,
        path: &SwapPath,
        amount_out: u128,
        amount_in_maximum: u128,
        recipient: Address,
    ) -> AmmResult<u128> {
        path.validate(&self.registry, self.config.router.max_hops)?;
        let mut amounts = vec![0; path.len() + 1];
        amounts[path.len()] = amount_out;
        for (index, hop) in path.hops().iter().enumerate().rev() {
            self.ensure_unlocked(hop.pool)?;
            amounts[index] = self
                .registry
                .get_mut(hop.pool)?
                .swap_exact_output(hop.token_in, amounts[index + 1], u128::MAX)?;
        }
        let amount_in = amounts[0];
        if amount_in > amount_in_maximum {
            return Err(AmmError::SlippageExceeded {
                amount: amount_in,
                bound: amount_in_maximum,
            });
        }
        self.settle_path(caller, path, &amounts, recipient)?;
        info!(?caller, hops = path.len(), amount_in, amount_out, "exact output swap");
        Ok(amount_in)
    }

    /// Moves tokens for an executed path: the caller pays the first pool, each pool
    /// pays the next, the last pays the recipient
    fn settle_path(
        &mut self,
        caller: Address,
        path: &SwapPath,
        amounts: &[u128],
        recipient: Address,
    ) -> AmmResult<()> {
        let hops = path.hops();
        let first = hops
            .first()
            .ok_or_else(|| AmmError::invalid_path("empty path"))?;
        self.pull(first.token_in, caller, first.pool, amounts[0])?;
        for (index, hop) in hops.iter().enumerate() {
            let to = hops
                .get(index + 1)
                .map_or(recipient, |next| next.pool.address());
            self.pay(hop.token_out, hop.pool, to, amounts[index + 1])?;
        }
        Ok(())
    }
}
