//! # AMM Engine Configuration
//!
//! Centralized configuration for the AMM engine and the binaries built on it.
//!
//! ## Usage
//!
//! ```rust
//! use amm_config::EngineConfig;
//!
//! let config = EngineConfig::default();
//! assert_eq!(config.v2.fee_bps, 30);
//! assert_eq!(config.v3.tick_spacing(500), Some(10));
//! ```

pub mod engine_config;

pub use engine_config::{
    EngineConfig, FeeTierConfig, LoggingConfig, RouterConfig, V2Config, V3Config,
};
