//! Token Precision Handling
//!
//! Token amounts are always carried as raw integers in the token's smallest unit.
//! Conversion to and from human-readable decimal amounts happens only at the edges
//! (configuration, logging, CLI output) and never during settlement.
//!
//! ## Precision by Token
//! - **DAI / WETH / AAVE / LINK**: 18 decimal places
//! - **WBTC**: 8 decimal places
//! - **USDC / USDT**: 6 decimal places
//!
//! ```rust
//! use types::precision::tokens;
//!
//! let usdc = tokens::usdc();
//! assert_eq!(usdc.parse_units("500").unwrap(), 500_000_000);
//! ```

use std::fmt;

use ethereum_types::{Address, H160};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::errors::{AmmError, AmmResult};

/// Largest supported decimals value
pub const MAX_DECIMALS: u8 = 18;

/// Fungible token identified by address; decimals fix the raw-unit scale
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
}

impl Token {
    pub fn new(address: Address, symbol: impl Into<String>, decimals: u8) -> AmmResult<Self> {
        if decimals > MAX_DECIMALS {
            return Err(AmmError::InvalidAmount {
                reason: "token decimals above 18",
            });
        }
        Ok(Self {
            address,
            symbol: symbol.into(),
            decimals,
        })
    }

    /// One whole token in raw units
    pub fn unit(&self) -> u128 {
        10u128.pow(u32::from(self.decimals))
    }

    /// Converts a human amount ("1000000", "0.5") to raw units; rejects sub-unit dust
    pub fn parse_units(&self, amount: &str) -> AmmResult<u128> {
        let value: Decimal = amount.trim().parse().map_err(|_| AmmError::InvalidAmount {
            reason: "not a decimal number",
        })?;
        self.from_decimal(value)
    }

    pub fn from_decimal(&self, value: Decimal) -> AmmResult<u128> {
        if value.is_sign_negative() {
            return Err(AmmError::InvalidAmount {
                reason: "negative amount",
            });
        }
        let mut scaled = value
            .checked_mul(Decimal::from(10u64.pow(u32::from(self.decimals))))
            .ok_or_else(|| AmmError::overflow("token amount scaling"))?;
        if !scaled.fract().is_zero() {
            return Err(AmmError::InvalidAmount {
                reason: "more fractional digits than token decimals",
            });
        }
        scaled.rescale(0);
        u128::try_from(scaled.mantissa()).map_err(|_| AmmError::overflow("token amount scaling"))
    }

    /// Raw units as a human amount; fails only when the value exceeds Decimal's 96-bit range
    pub fn format_units(&self, raw: u128) -> AmmResult<Decimal> {
        let raw = i128::try_from(raw).map_err(|_| AmmError::overflow("token amount format"))?;
        Decimal::try_from_i128_with_scale(raw, u32::from(self.decimals))
            .map(|d| d.normalize())
            .map_err(|_| AmmError::overflow("token amount format"))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:#x})", self.symbol, self.address)
    }
}

/// Mainnet tokens used by the reference scenarios
pub mod tokens {
    use super::*;

    pub const DAI: Address = H160([
        0x6b, 0x17, 0x54, 0x74, 0xe8, 0x90, 0x94, 0xc4, 0x4d, 0xa9, 0x8b, 0x95, 0x4e, 0xed, 0xea,
        0xc4, 0x95, 0x27, 0x1d, 0x0f,
    ]);
    pub const WBTC: Address = H160([
        0x22, 0x60, 0xfa, 0xc5, 0xe5, 0x54, 0x2a, 0x77, 0x3a, 0xa4, 0x4f, 0xbc, 0xfe, 0xdf, 0x7c,
        0x19, 0x3b, 0xc2, 0xc5, 0x99,
    ]);
    pub const AAVE: Address = H160([
        0x7f, 0xc6, 0x65, 0x00, 0xc8, 0x4a, 0x76, 0xad, 0x7e, 0x9c, 0x93, 0x43, 0x7b, 0xfc, 0x5a,
        0xc3, 0x3e, 0x2d, 0xda, 0xe9,
    ]);
    pub const LINK: Address = H160([
        0x51, 0x49, 0x10, 0x77, 0x1a, 0xf9, 0xca, 0x65, 0x6a, 0xf8, 0x40, 0xdf, 0xf8, 0x3e, 0x82,
        0x64, 0xec, 0xf9, 0x86, 0xca,
    ]);
    pub const USDC: Address = H160([
        0xa0, 0xb8, 0x69, 0x91, 0xc6, 0x21, 0x8b, 0x36, 0xc1, 0xd1, 0x9d, 0x4a, 0x2e, 0x9e, 0xb0,
        0xce, 0x36, 0x06, 0xeb, 0x48,
    ]);
    pub const USDT: Address = H160([
        0xda, 0xc1, 0x7f, 0x95, 0x8d, 0x2e, 0xe5, 0x23, 0xa2, 0x20, 0x62, 0x06, 0x99, 0x45, 0x97,
        0xc1, 0x3d, 0x83, 0x1e, 0xc7,
    ]);
    pub const WETH: Address = H160([
        0xc0, 0x2a, 0xaa, 0x39, 0xb2, 0x23, 0xfe, 0x8d, 0x0a, 0x0e, 0x5c, 0x4f, 0x27, 0xea, 0xd9,
        0x08, 0x3c, 0x75, 0x6c, 0xc2,
    ]);

    fn known(address: Address, symbol: &str, decimals: u8) -> Token {
        Token {
            address,
            symbol: symbol.to_string(),
            decimals,
        }
    }

    pub fn dai() -> Token {
        known(DAI, "DAI", 18)
    }

    pub fn wbtc() -> Token {
        known(WBTC, "WBTC", 8)
    }

    pub fn aave() -> Token {
        known(AAVE, "AAVE", 18)
    }

    pub fn link() -> Token {
        known(LINK, "LINK", 18)
    }

    pub fn usdc() -> Token {
        known(USDC, "USDC", 6)
    }

    pub fn usdt() -> Token {
        known(USDT, "USDT", 6)
    }

    pub fn weth() -> Token {
        known(WETH, "WETH", 18)
    }

    /// Case-insensitive lookup among the tokens above
    pub fn by_symbol(symbol: &str) -> Option<Token> {
        [dai(), wbtc(), aave(), link(), usdc(), usdt(), weth()]
            .into_iter()
            .find(|token| token.symbol.eq_ignore_ascii_case(symbol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_units_native_precision() {
        assert_eq!(
            tokens::dai().parse_units("1000000").unwrap(),
            1_000_000_000_000_000_000_000_000
        );
        assert_eq!(tokens::wbtc().parse_units("30").unwrap(), 3_000_000_000);
        assert_eq!(tokens::usdc().parse_units("500").unwrap(), 500_000_000);
        assert_eq!(tokens::usdc().parse_units("0.000001").unwrap(), 1);
    }

    #[test]
    fn test_parse_units_rejects_dust() {
        let err = tokens::usdc().parse_units("0.0000001").unwrap_err();
        assert!(matches!(err, AmmError::InvalidAmount { .. }));
        assert!(tokens::usdc().parse_units("-1").is_err());
        assert!(tokens::usdc().parse_units("abc").is_err());
    }

    #[test]
    fn test_format_units() {
        assert_eq!(tokens::wbtc().format_units(150_000_000).unwrap(), dec!(1.5));
        assert_eq!(tokens::usdc().format_units(1_504_514).unwrap(), dec!(1.504514));
    }

    #[test]
    fn test_decimals_limit() {
        assert!(Token::new(Address::zero(), "BAD", 19).is_err());
        assert_eq!(Token::new(Address::zero(), "OK", 8).unwrap().unit(), 100_000_000);
    }

    #[test]
    fn test_lookup_by_symbol() {
        assert_eq!(tokens::by_symbol("usdc"), Some(tokens::usdc()));
        assert_eq!(tokens::by_symbol("WBTC").map(|t| t.decimals), Some(8));
        assert_eq!(tokens::by_symbol("XYZ"), None);
    }
}
