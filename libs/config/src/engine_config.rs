//! Engine Configuration Module
//!
//! Provides configuration loading for the AMM engine. Values come from built-in
//! defaults, an optional TOML file, then `AMM__`-prefixed environment variables
//! (e.g. `AMM__V2__FEE_BPS=25`, `AMM__ROUTER__MAX_HOPS=3`).

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File};
use ethereum_types::Address;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Constant-product pool defaults
    pub v2: V2Config,
    /// Concentrated-liquidity fee tiers
    pub v3: V3Config,
    /// Path execution limits
    pub router: RouterConfig,
    /// Log output settings
    pub logging: LoggingConfig,
}

/// Constant-product pool parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct V2Config {
    /// Swap fee in basis points (30 = 0.3%)
    pub fee_bps: u32,
    /// Shares permanently locked on a pool's first deposit
    pub minimum_liquidity: u64,
}

/// One enabled concentrated-liquidity fee tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeTierConfig {
    /// Fee in hundredths of a basis point (3000 = 0.3%)
    pub fee_pips: u32,
    pub tick_spacing: i32,
}

/// Concentrated-liquidity parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct V3Config {
    pub fee_tiers: Vec<FeeTierConfig>,
}

/// Router limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Longest accepted path
    pub max_hops: usize,
    /// Intermediate token for quotes between tokens without a direct pool
    pub hub_token: Option<Address>,
}

/// Logging settings consumed by binaries when installing a subscriber
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for V2Config {
    fn default() -> Self {
        Self {
            fee_bps: 30,
            minimum_liquidity: 0,
        }
    }
}

impl Default for V3Config {
    fn default() -> Self {
        Self {
            fee_tiers: vec![
                FeeTierConfig {
                    fee_pips: 100,
                    tick_spacing: 1,
                },
                FeeTierConfig {
                    fee_pips: 500,
                    tick_spacing: 10,
                },
                FeeTierConfig {
                    fee_pips: 3000,
                    tick_spacing: 60,
                },
                FeeTierConfig {
                    fee_pips: 10_000,
                    tick_spacing: 200,
                },
            ],
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_hops: 4,
            hub_token: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl V3Config {
    /// Tick spacing for an enabled fee, if any
    pub fn tick_spacing(&self, fee_pips: u32) -> Option<i32> {
        self.fee_tiers
            .iter()
            .find(|tier| tier.fee_pips == fee_pips)
            .map(|tier| tier.tick_spacing)
    }
}

impl EngineConfig {
    /// Load configuration from an optional file with environment overrides
    ///
    /// Missing keys fall back to [`Default`] through `#[serde(default)]`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            info!("Loading engine config: {:?}", path);
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("AMM")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        debug!(?config, "Engine configuration loaded");
        Ok(config)
    }

    /// Parse configuration from a TOML string without environment overrides
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).context("Failed to parse TOML config")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.v2.fee_bps >= 10_000 {
            bail!("v2.fee_bps must be below 10000 (100%)");
        }

        if self.v3.fee_tiers.is_empty() {
            bail!("v3.fee_tiers must enable at least one tier");
        }

        let mut seen = HashSet::new();
        for tier in &self.v3.fee_tiers {
            if tier.fee_pips >= 1_000_000 {
                bail!("fee tier {} must be below 1000000 (100%)", tier.fee_pips);
            }
            if tier.tick_spacing <= 0 || tier.tick_spacing > 16_384 {
                bail!(
                    "fee tier {} has invalid tick_spacing {}",
                    tier.fee_pips,
                    tier.tick_spacing
                );
            }
            if !seen.insert(tier.fee_pips) {
                bail!("fee tier {} is declared twice", tier.fee_pips);
            }
        }

        if self.router.max_hops == 0 {
            bail!("router.max_hops must be positive");
        }

        Ok(())
    }
}
