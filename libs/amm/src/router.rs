//! Swap paths and multi-hop quoting
//!
//! A path is an ordered list of hops where each hop's output token is the next hop's
//! input token. Exact-input quotes run left to right, exact-output quotes right to left;
//! each hop rounds on its own and nothing is rounded across hops.

use serde::Serialize;
use types::{Address, AmmError, AmmResult, PoolId};

use crate::pool_traits::AmmPool;
use crate::registry::PoolRegistry;

/// One pool traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Hop {
    pub pool: PoolId,
    pub token_in: Address,
    pub token_out: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapPath {
    hops: Vec<Hop>,
}

impl SwapPath {
    pub fn new(hops: Vec<Hop>) -> Self {
        Self { hops }
    }

    /// Builds a path from `tokens[0] -> tokens[1] -> ...`, choosing each hop's pool by
    /// `fees[i]` (`None` for the constant-product pool of the pair)
    pub fn resolve(
        registry: &PoolRegistry,
        tokens: &[Address],
        fees: &[Option<u32>],
    ) -> AmmResult<Self> {
        if tokens.len() < 2 {
            return Err(AmmError::invalid_path("a path needs at least two tokens"));
        }
        if fees.len() != tokens.len() - 1 {
            return Err(AmmError::invalid_path(format!(
                "{} tokens need {} fees, got {}",
                tokens.len(),
                tokens.len() - 1,
                fees.len()
            )));
        }
        let hops = tokens
            .windows(2)
            .zip(fees)
            .map(|(pair, fee)| {
                Ok(Hop {
                    pool: registry.resolve(pair[0], pair[1], *fee)?,
                    token_in: pair[0],
                    token_out: pair[1],
                })
            })
            .collect::<AmmResult<Vec<_>>>()?;
        Ok(Self { hops })
    }

    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    pub fn token_in(&self) -> Option<Address> {
        self.hops.first().map(|hop| hop.token_in)
    }

    pub fn token_out(&self) -> Option<Address> {
        self.hops.last().map(|hop| hop.token_out)
    }

    /// Checks the path is non-empty, within `max_hops`, chains token to token, and
    /// that every hop's tokens are the two tokens of its pool
    pub fn validate(&self, registry: &PoolRegistry, max_hops: usize) -> AmmResult<()> {
        if self.hops.is_empty() {
            return Err(AmmError::invalid_path("empty path"));
        }
        if self.hops.len() > max_hops {
            return Err(AmmError::invalid_path(format!(
                "{} hops exceeds the limit of {max_hops}",
                self.hops.len()
            )));
        }
        for (index, pair) in self.hops.windows(2).enumerate() {
            if pair[0].token_out != pair[1].token_in {
                return Err(AmmError::invalid_path(format!(
                    "hop {index} outputs {:#x} but hop {} takes {:#x}",
                    pair[0].token_out,
                    index + 1,
                    pair[1].token_in
                )));
            }
        }
        for (index, hop) in self.hops.iter().enumerate() {
            if hop.token_in == hop.token_out {
                return Err(AmmError::invalid_path(format!(
                    "hop {index} swaps {:#x} for itself",
                    hop.token_in
                )));
            }
            let pool = registry.get(hop.pool)?;
            if !pool.contains(hop.token_in) || !pool.contains(hop.token_out) {
                return Err(AmmError::invalid_path(format!(
                    "hop {index} tokens are not the tokens of {}",
                    hop.pool
                )));
            }
        }
        Ok(())
    }
}

/// Read-only multi-hop quoting over a registry
pub struct Router;

impl Router {
    /// Amounts at every step of an exact-input path: `amounts[0]` is the input,
    /// `amounts[i + 1]` the output of hop `i`
    pub fn quote_exact_input(
        registry: &PoolRegistry,
        path: &SwapPath,
        amount_in: u128,
    ) -> AmmResult<Vec<u128>> {
        let mut amounts = Vec::with_capacity(path.len() + 1);
        amounts.push(amount_in);
        let mut amount = amount_in;
        for hop in path.hops() {
            amount = registry
                .get(hop.pool)?
                .quote_exact_input(hop.token_in, amount)?;
            amounts.push(amount);
        }
        Ok(amounts)
    }

    /// Amounts at every step of an exact-output path, computed from the last hop back:
    /// `amounts[0]` is the required input, the last entry the requested output
    pub fn quote_exact_output(
        registry: &PoolRegistry,
        path: &SwapPath,
        amount_out: u128,
    ) -> AmmResult<Vec<u128>> {
        let mut amounts = vec![0; path.len() + 1];
        amounts[path.len()] = amount_out;
        for (index, hop) in path.hops().iter().enumerate().rev() {
            amounts[index] = registry
                .get(hop.pool)?
                .quote_exact_output(hop.token_in, amounts[index + 1])?;
        }
        Ok(amounts)
    }
}
