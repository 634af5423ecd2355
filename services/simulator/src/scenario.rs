//! Scenario files
//!
//! A scenario names its accounts, seeds balances in human units, and lists the engine
//! operations to run in order:
//!
//! ```toml
//! name = "dai-wbtc"
//!
//! [accounts]
//! lp = "0x1111111111111111111111111111111111111111"
//!
//! [[balances]]
//! account = "lp"
//! token = "DAI"
//! amount = "10000000"
//!
//! [[steps]]
//! op = "add_liquidity"
//! account = "lp"
//! token_a = "DAI"
//! token_b = "WBTC"
//! amount_a = "10000000"
//! amount_b = "500"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use ethereum_types::Address;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Account name to address
    pub accounts: BTreeMap<String, Address>,
    #[serde(default)]
    pub balances: Vec<Seed>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// Initial balance; `amount` is in whole tokens ("1.5")
#[derive(Debug, Clone, Deserialize)]
pub struct Seed {
    pub account: String,
    pub token: String,
    pub amount: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    #[serde(flatten)]
    pub action: Action,
    /// The step is a negative check: it passes only if the operation is rejected
    #[serde(default)]
    pub expect_failure: bool,
}

/// Engine operations a scenario can drive; token fields are symbols, amounts are
/// whole-token decimal strings
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    CreateV3Pool {
        token_a: String,
        token_b: String,
        fee: u32,
        /// Starting price as a tick
        #[serde(default)]
        tick: i32,
    },
    AddLiquidity {
        account: String,
        token_a: String,
        token_b: String,
        amount_a: String,
        amount_b: String,
    },
    /// Withdraws all of the account's shares
    RemoveLiquidity {
        account: String,
        token_a: String,
        token_b: String,
    },
    Quote {
        token_in: String,
        token_out: String,
        amount: String,
    },
    Swap {
        account: String,
        token_in: String,
        token_out: String,
        amount: String,
        #[serde(default)]
        slippage_bps: u32,
    },
    SwapMultihop {
        account: String,
        tokens: Vec<String>,
        fees: Vec<u32>,
        amount: String,
        #[serde(default)]
        slippage_bps: u32,
    },
    SwapExactOutput {
        account: String,
        tokens: Vec<String>,
        fees: Vec<u32>,
        amount_out: String,
        max_amount_in: String,
    },
    MintPosition {
        account: String,
        token0: String,
        token1: String,
        fee: u32,
        tick_lower: i32,
        tick_upper: i32,
        amount0: String,
        amount1: String,
    },
    /// Collects from the account's latest position
    CollectFees { account: String },
    /// Withdraws, collects and burns the account's latest position
    ClosePosition { account: String },
    /// Borrows from the constant-product pool of `token`/`pair` and repays exactly
    FlashSwap {
        account: String,
        token: String,
        pair: String,
        amount: String,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateV3Pool { .. } => "create_v3_pool",
            Self::AddLiquidity { .. } => "add_liquidity",
            Self::RemoveLiquidity { .. } => "remove_liquidity",
            Self::Quote { .. } => "quote",
            Self::Swap { .. } => "swap",
            Self::SwapMultihop { .. } => "swap_multihop",
            Self::SwapExactOutput { .. } => "swap_exact_output",
            Self::MintPosition { .. } => "mint_position",
            Self::CollectFees { .. } => "collect_fees",
            Self::ClosePosition { .. } => "close_position",
            Self::FlashSwap { .. } => "flash_swap",
        }
    }
}

impl Scenario {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid scenario {}", path.display()))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse scenario TOML")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
        name = "minimal"

        [accounts]
        alice = "0x1111111111111111111111111111111111111111"

        [[balances]]
        account = "alice"
        token = "USDC"
        amount = "12.5"

        [[steps]]
        op = "swap"
        account = "alice"
        token_in = "USDC"
        token_out = "WETH"
        amount = "1"
        slippage_bps = 50

        [[steps]]
        op = "collect_fees"
        account = "alice"
        expect_failure = true
    "#;

    #[test]
    fn test_parse_steps() {
        let scenario = Scenario::from_toml_str(MINIMAL).unwrap();
        assert_eq!(scenario.name, "minimal");
        assert_eq!(scenario.accounts.len(), 1);
        assert_eq!(scenario.balances[0].amount, "12.5");
        assert_eq!(scenario.steps.len(), 2);
        assert!(matches!(
            scenario.steps[0].action,
            Action::Swap {
                slippage_bps: 50,
                ..
            }
        ));
        assert!(!scenario.steps[0].expect_failure);
        assert_eq!(scenario.steps[1].action.name(), "collect_fees");
        assert!(scenario.steps[1].expect_failure);
    }

    #[test]
    fn test_unknown_operation_is_rejected() {
        let parsed = Scenario::from_toml_str(
            r#"
            name = "bad"
            [accounts]
            [[steps]]
            op = "teleport"
            "#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let scenario = Scenario::from_file(file.path()).unwrap();
        assert_eq!(scenario.steps.len(), 2);
        assert!(Scenario::from_file(Path::new("/nonexistent/scenario.toml")).is_err());
    }
}
