//! Executes a scenario against a fresh engine

use std::collections::BTreeMap;

use amm::math::get_sqrt_ratio_at_tick;
use amm::{min_amount_out, Engine, InMemoryLedger, Ledger, MintParams, OperationError, SwapPath};
use amm_config::EngineConfig;
use anyhow::{anyhow, Context, Result};
use ethereum_types::Address;
use rust_decimal::Decimal;
use tracing::{info, warn};
use types::precision::tokens;
use types::Token;

use crate::scenario::{Action, Scenario};

/// Outcome counts of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: usize,
    pub rejected_as_expected: usize,
    /// Steps whose outcome contradicted `expect_failure`, with the reason
    pub unexpected: Vec<(usize, String)>,
}

impl RunSummary {
    pub fn is_clean(&self) -> bool {
        self.unexpected.is_empty()
    }
}

pub struct Runner {
    engine: Engine<InMemoryLedger>,
    accounts: BTreeMap<String, Address>,
    /// Every token the scenario touched, by upper-case symbol
    tokens: BTreeMap<String, Token>,
}

impl Runner {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            engine: Engine::new(config, InMemoryLedger::new()),
            accounts: BTreeMap::new(),
            tokens: BTreeMap::new(),
        }
    }

    pub fn engine(&self) -> &Engine<InMemoryLedger> {
        &self.engine
    }

    /// Seeds balances, then runs every step; a failing step does not stop the run
    pub fn run(&mut self, scenario: &Scenario) -> Result<RunSummary> {
        info!(scenario = %scenario.name, steps = scenario.steps.len(), "running scenario");
        self.accounts = scenario.accounts.clone();

        for seed in &scenario.balances {
            let account = self.account(&seed.account)?;
            let token = self.token(&seed.token)?;
            let amount = token
                .parse_units(&seed.amount)
                .with_context(|| format!("balance {} {}", seed.amount, token.symbol))?;
            let spender = self.engine.address();
            let ledger = self.engine.ledger_mut();
            ledger.mint(token.address, account, amount)?;
            ledger.approve(token.address, account, spender, u128::MAX);
        }

        let mut summary = RunSummary::default();
        for (index, step) in scenario.steps.iter().enumerate() {
            let name = step.action.name();
            match (self.execute(&step.action), step.expect_failure) {
                (Ok(detail), false) => {
                    info!(step = index, op = name, "{detail}");
                    summary.succeeded += 1;
                }
                (Err(err), true) => {
                    info!(step = index, op = name, error = %err, "rejected as expected");
                    summary.rejected_as_expected += 1;
                }
                (Ok(detail), true) => {
                    warn!(step = index, op = name, "expected a rejection: {detail}");
                    summary.unexpected.push((index, format!("{name} succeeded: {detail}")));
                }
                (Err(err), false) => {
                    let economic = err
                        .downcast_ref::<OperationError>()
                        .is_some_and(|op| op.kind.is_economic());
                    warn!(
                        step = index,
                        op = name,
                        economic,
                        error = %format!("{err:#}"),
                        "step failed"
                    );
                    summary.unexpected.push((index, format!("{err:#}")));
                }
            }
        }
        Ok(summary)
    }

    /// Whole-token balances of every named account in every token the scenario used
    pub fn balances(&self) -> Result<Vec<(String, String, Decimal)>> {
        let mut rows = Vec::new();
        for (name, account) in &self.accounts {
            for token in self.tokens.values() {
                let raw = self.engine.ledger().balance_of(token.address, *account);
                if raw > 0 {
                    rows.push((name.clone(), token.symbol.clone(), token.format_units(raw)?));
                }
            }
        }
        Ok(rows)
    }

    fn account(&self, name: &str) -> Result<Address> {
        self.accounts
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("unknown account {name}"))
    }

    fn token(&mut self, symbol: &str) -> Result<Token> {
        let token = tokens::by_symbol(symbol).ok_or_else(|| anyhow!("unknown token {symbol}"))?;
        self.tokens
            .entry(token.symbol.to_ascii_uppercase())
            .or_insert_with(|| token.clone());
        Ok(token)
    }

    fn amount(&mut self, symbol: &str, amount: &str) -> Result<(Token, u128)> {
        let token = self.token(symbol)?;
        let raw = token
            .parse_units(amount)
            .with_context(|| format!("amount {amount} {symbol}"))?;
        Ok((token, raw))
    }

    fn addresses(&mut self, symbols: &[String]) -> Result<Vec<Address>> {
        symbols
            .iter()
            .map(|symbol| self.token(symbol).map(|token| token.address))
            .collect()
    }

    fn execute(&mut self, action: &Action) -> Result<String> {
        match action {
            Action::CreateV3Pool {
                token_a,
                token_b,
                fee,
                tick,
            } => {
                let a = self.token(token_a)?;
                let b = self.token(token_b)?;
                let pool = self
                    .engine
                    .create_v3_pool(a.address, b.address, *fee, get_sqrt_ratio_at_tick(*tick)?)?;
                Ok(format!("created {pool} ({}/{} fee {fee})", a.symbol, b.symbol))
            }
            Action::AddLiquidity {
                account,
                token_a,
                token_b,
                amount_a,
                amount_b,
            } => {
                let caller = self.account(account)?;
                let (a, raw_a) = self.amount(token_a, amount_a)?;
                let (b, raw_b) = self.amount(token_b, amount_b)?;
                let deposit = self
                    .engine
                    .add_liquidity(caller, a.address, b.address, raw_a, raw_b, 0, 0)?;
                Ok(format!(
                    "deposited {} {} + {} {} for {} shares",
                    a.format_units(deposit.amount_a)?,
                    a.symbol,
                    b.format_units(deposit.amount_b)?,
                    b.symbol,
                    deposit.shares
                ))
            }
            Action::RemoveLiquidity {
                account,
                token_a,
                token_b,
            } => {
                let caller = self.account(account)?;
                let a = self.token(token_a)?;
                let b = self.token(token_b)?;
                let shares = self.engine.shares_of(a.address, b.address, caller);
                let (out_a, out_b) = self
                    .engine
                    .remove_liquidity(caller, a.address, b.address, shares, 0, 0)?;
                Ok(format!(
                    "withdrew {} {} + {} {}",
                    a.format_units(out_a)?,
                    a.symbol,
                    b.format_units(out_b)?,
                    b.symbol
                ))
            }
            Action::Quote {
                token_in,
                token_out,
                amount,
            } => {
                let (input, raw) = self.amount(token_in, amount)?;
                let output = self.token(token_out)?;
                let out = self
                    .engine
                    .get_amount_out_min(input.address, output.address, raw)?;
                Ok(format!(
                    "{amount} {} quotes {} {}",
                    input.symbol,
                    output.format_units(out)?,
                    output.symbol
                ))
            }
            Action::Swap {
                account,
                token_in,
                token_out,
                amount,
                slippage_bps,
            } => {
                let caller = self.account(account)?;
                let (input, raw) = self.amount(token_in, amount)?;
                let output = self.token(token_out)?;
                let expected = self
                    .engine
                    .get_amount_out_min(input.address, output.address, raw)?;
                let minimum = min_amount_out(expected, *slippage_bps)?;
                let out = self.engine.swap(
                    caller,
                    input.address,
                    output.address,
                    raw,
                    minimum,
                    caller,
                )?;
                Ok(format!(
                    "swapped {amount} {} for {} {}",
                    input.symbol,
                    output.format_units(out)?,
                    output.symbol
                ))
            }
            Action::SwapMultihop {
                account,
                tokens,
                fees,
                amount,
                slippage_bps,
            } => {
                let caller = self.account(account)?;
                let first = tokens.first().ok_or_else(|| anyhow!("empty token list"))?;
                let last = tokens.last().ok_or_else(|| anyhow!("empty token list"))?;
                let (_, raw) = self.amount(first, amount)?;
                let output = self.token(last)?;
                let path_tokens = self.addresses(tokens)?;
                let path_fees: Vec<Option<u32>> = fees.iter().map(|fee| Some(*fee)).collect();
                let path = SwapPath::resolve(self.engine.registry(), &path_tokens, &path_fees)?;
                let quoted = self.engine.quote_exact_input(&path, raw)?;
                let expected = quoted.last().copied().unwrap_or_default();
                let minimum = min_amount_out(expected, *slippage_bps)?;
                let out = self
                    .engine
                    .swap_exact_input_multihop(caller, &path_tokens, fees, raw, minimum)?;
                Ok(format!(
                    "{} hops: {amount} {first} -> {} {}",
                    path.len(),
                    output.format_units(out)?,
                    output.symbol
                ))
            }
            Action::SwapExactOutput {
                account,
                tokens,
                fees,
                amount_out,
                max_amount_in,
            } => {
                let caller = self.account(account)?;
                let first = tokens.first().ok_or_else(|| anyhow!("empty token list"))?;
                let last = tokens.last().ok_or_else(|| anyhow!("empty token list"))?;
                let (input, max_in) = self.amount(first, max_amount_in)?;
                let (_, raw_out) = self.amount(last, amount_out)?;
                let path_tokens = self.addresses(tokens)?;
                let paid = self
                    .engine
                    .swap_exact_output_multihop(caller, &path_tokens, fees, raw_out, max_in)?;
                Ok(format!(
                    "bought {amount_out} {last} for {} {}",
                    input.format_units(paid)?,
                    input.symbol
                ))
            }
            Action::MintPosition {
                account,
                token0,
                token1,
                fee,
                tick_lower,
                tick_upper,
                amount0,
                amount1,
            } => {
                let caller = self.account(account)?;
                let (t0, raw0) = self.amount(token0, amount0)?;
                let (t1, raw1) = self.amount(token1, amount1)?;
                let change = self.engine.mint_new_position(
                    caller,
                    MintParams {
                        token0: t0.address,
                        token1: t1.address,
                        fee: *fee,
                        tick_lower: *tick_lower,
                        tick_upper: *tick_upper,
                        amount0_desired: raw0,
                        amount1_desired: raw1,
                        amount0_min: 0,
                        amount1_min: 0,
                    },
                )?;
                Ok(format!(
                    "{} holds liquidity {} for {} {} + {} {}",
                    change.position,
                    change.liquidity,
                    t0.format_units(change.amount0)?,
                    t0.symbol,
                    t1.format_units(change.amount1)?,
                    t1.symbol
                ))
            }
            Action::CollectFees { account } => {
                let caller = self.account(account)?;
                let position = self
                    .engine
                    .token_id(caller)
                    .ok_or_else(|| anyhow!("{account} holds no position"))?;
                let (amount0, amount1) = self.engine.collect_all_fees(caller, position)?;
                Ok(format!("{position} collected {amount0} + {amount1} raw units"))
            }
            Action::ClosePosition { account } => {
                let caller = self.account(account)?;
                let position = self
                    .engine
                    .token_id(caller)
                    .ok_or_else(|| anyhow!("{account} holds no position"))?;
                let liquidity = self.engine.get_liquidity(position)?;
                if liquidity > 0 {
                    self.engine
                        .decrease_liquidity(caller, position, liquidity, 0, 0)?;
                }
                let (amount0, amount1) = self.engine.collect_all_fees(caller, position)?;
                self.engine.burn_position(caller, position)?;
                Ok(format!("{position} closed, paid {amount0} + {amount1} raw units"))
            }
            Action::FlashSwap {
                account,
                token,
                pair,
                amount,
            } => {
                let borrower = self.account(account)?;
                let (borrowed, raw) = self.amount(token, amount)?;
                let other = self.token(pair)?;
                let record =
                    self.engine
                        .test_flash_swap(borrower, borrowed.address, other.address, raw)?;
                Ok(format!(
                    "borrowed {amount} {} from {}, fee {} {}",
                    borrowed.symbol,
                    record.pool,
                    borrowed.format_units(record.fee)?,
                    borrowed.symbol
                ))
            }
        }
    }
}
