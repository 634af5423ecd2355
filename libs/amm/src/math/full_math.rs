//! Multiply-divide with 512-bit intermediates and explicit rounding

use types::{AmmError, AmmResult, U256, U512};

/// `floor(a * b / denominator)` without intermediate overflow
pub fn mul_div(a: U256, b: U256, denominator: U256) -> AmmResult<U256> {
    if denominator.is_zero() {
        return Err(AmmError::division_by_zero("mul_div"));
    }
    let quotient = a.full_mul(b) / U512::from(denominator);
    U256::try_from(quotient).map_err(|_| AmmError::overflow("mul_div"))
}

/// `ceil(a * b / denominator)` without intermediate overflow
pub fn mul_div_rounding_up(a: U256, b: U256, denominator: U256) -> AmmResult<U256> {
    if denominator.is_zero() {
        return Err(AmmError::division_by_zero("mul_div_rounding_up"));
    }
    let (quotient, remainder) = a.full_mul(b).div_mod(U512::from(denominator));
    let quotient =
        U256::try_from(quotient).map_err(|_| AmmError::overflow("mul_div_rounding_up"))?;
    if remainder.is_zero() {
        Ok(quotient)
    } else {
        quotient
            .checked_add(U256::one())
            .ok_or_else(|| AmmError::overflow("mul_div_rounding_up"))
    }
}

/// `ceil(a / b)`
pub fn div_rounding_up(a: U256, b: U256) -> AmmResult<U256> {
    if b.is_zero() {
        return Err(AmmError::division_by_zero("div_rounding_up"));
    }
    let (quotient, remainder) = a.div_mod(b);
    if remainder.is_zero() {
        Ok(quotient)
    } else {
        // b >= 2 here, so quotient < U256::MAX
        Ok(quotient + U256::one())
    }
}

/// Floor square root (Babylonian method)
pub fn sqrt(value: U256) -> U256 {
    if value.is_zero() {
        return U256::zero();
    }

    // Start from a power of two above the root so the sequence decreases monotonically
    let mut x = U256::one() << ((value.bits() + 1) / 2);
    loop {
        let next = (x + value / x) >> 1;
        if next >= x {
            return x;
        }
        x = next;
    }
}

/// Narrows to `u128`, failing instead of truncating
pub fn to_u128(value: U256, context: &'static str) -> AmmResult<u128> {
    if value > U256::from(u128::MAX) {
        return Err(AmmError::overflow(context));
    }
    Ok(value.low_u128())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Q128, Q96};

    fn u(value: u128) -> U256 {
        U256::from(value)
    }

    #[test]
    fn test_mul_div_basic_and_floor() {
        assert_eq!(mul_div(u(10), u(20), u(5)).unwrap(), u(40));
        assert_eq!(mul_div(u(1), u(1), u(2)).unwrap(), u(0));
        assert_eq!(mul_div(u(5), u(1), u(3)).unwrap(), u(1));
        assert_eq!(mul_div(u(0), u(100), u(50)).unwrap(), u(0));
    }

    #[test]
    fn test_mul_div_phantom_overflow() {
        // a * b overflows 256 bits while the result fits
        let max = U256::MAX;
        assert_eq!(mul_div(max, max, max).unwrap(), max);
        assert_eq!(mul_div(Q128, Q128 * u(3), Q128).unwrap(), Q128 * u(3));
    }

    #[test]
    fn test_mul_div_result_overflow_detected() {
        let err = mul_div(U256::MAX, u(2), u(1)).unwrap_err();
        assert!(matches!(err, AmmError::ArithmeticOverflow { .. }));
    }

    #[test]
    fn test_mul_div_zero_denominator() {
        let err = mul_div(u(10), u(20), U256::zero()).unwrap_err();
        assert!(matches!(err, AmmError::DivisionByZero { .. }));
        assert!(mul_div_rounding_up(u(10), u(20), U256::zero()).is_err());
        assert!(div_rounding_up(u(10), U256::zero()).is_err());
    }

    #[test]
    fn test_mul_div_rounding_up() {
        assert_eq!(mul_div_rounding_up(u(10), u(20), u(5)).unwrap(), u(40));
        assert_eq!(mul_div_rounding_up(u(10), u(3), u(7)).unwrap(), u(5));
        assert_eq!(mul_div(u(7), u(11), u(13)).unwrap(), u(5));
        assert_eq!(mul_div_rounding_up(u(7), u(11), u(13)).unwrap(), u(6));
    }

    #[test]
    fn test_mul_div_rounding_up_cannot_exceed_max() {
        // floor result is U256::MAX with a remainder, rounding up must overflow
        let err = mul_div_rounding_up(U256::MAX, U256::MAX - u(1), U256::MAX - u(2)).unwrap_err();
        assert!(matches!(err, AmmError::ArithmeticOverflow { .. }));
    }

    #[test]
    fn test_div_rounding_up() {
        assert_eq!(div_rounding_up(u(9), u(3)).unwrap(), u(3));
        assert_eq!(div_rounding_up(u(10), u(3)).unwrap(), u(4));
        assert_eq!(div_rounding_up(u(0), u(5)).unwrap(), u(0));
        assert_eq!(div_rounding_up(U256::MAX, U256::MAX).unwrap(), u(1));
    }

    #[test]
    fn test_q96_scaling_precision() {
        let price = Q96 + Q96 / u(1000); // 1.001
        let result = mul_div(u(1_000_000_000_000), price, Q96).unwrap();
        assert_eq!(result, u(1_001_000_000_000));
    }

    #[test]
    fn test_integer_sqrt() {
        assert_eq!(sqrt(U256::zero()), U256::zero());
        assert_eq!(sqrt(u(1)), u(1));
        assert_eq!(sqrt(u(15)), u(3));
        assert_eq!(sqrt(u(16)), u(4));
        assert_eq!(sqrt(u(900) * u(10_000)), u(3000));
        assert_eq!(sqrt(U256::MAX), U256::from(u128::MAX));
        // 900e18 * 10000e18 -> 3000e18
        let a = u(900_000_000_000_000_000_000);
        let b = u(10_000_000_000_000_000_000_000);
        assert_eq!(sqrt(a * b), u(3_000_000_000_000_000_000_000));
    }

    #[test]
    fn test_to_u128_narrowing() {
        assert_eq!(to_u128(u(u128::MAX), "test").unwrap(), u128::MAX);
        assert!(to_u128(u(u128::MAX) + u(1), "test").is_err());
    }
}
