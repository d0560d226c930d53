//! Fixed-point amount conversion
//!
//! Human-readable decimal amounts vs integer base units at arbitrary token
//! precision. Conversion in is truncating (floor for non-negative input),
//! conversion out is exact. All arithmetic is base-10 via `rust_decimal`,
//! never binary floats - 0.1 at 18 decimals must come out exact.

use alloy_primitives::U256;
use eyre::{eyre, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Largest scale `rust_decimal` can represent. Chain tokens top out at 18.
const MAX_DECIMALS: u8 = 28;

fn pow10(decimals: u8) -> Result<Decimal> {
    if decimals > MAX_DECIMALS {
        return Err(eyre!("unsupported precision: {} decimals", decimals));
    }
    Ok(Decimal::from_i128_with_scale(10i128.pow(decimals as u32), 0))
}

/// Convert a human-readable amount to integer base units, truncating toward
/// zero. The float is routed through its shortest decimal representation so
/// `0.0335` means exactly `0.0335`, not its binary neighbour.
pub fn to_base_units(amount_human: f64, decimals: u8) -> Result<U256> {
    if !amount_human.is_finite() {
        return Err(eyre!("amount must be finite"));
    }
    let amount = Decimal::from_str(&amount_human.to_string())
        .map_err(|e| eyre!("unrepresentable amount {}: {}", amount_human, e))?;
    to_base_units_dec(amount, decimals)
}

/// Decimal-input variant of [`to_base_units`]
pub fn to_base_units_dec(amount: Decimal, decimals: u8) -> Result<U256> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(eyre!("negative amounts are not defined: {}", amount));
    }
    let scaled = amount
        .checked_mul(pow10(decimals)?)
        .ok_or_else(|| eyre!("amount {} overflows at {} decimals", amount, decimals))?;
    let truncated = scaled
        .trunc()
        .to_u128()
        .ok_or_else(|| eyre!("amount {} does not fit in base units", amount))?;
    Ok(U256::from(truncated))
}

/// Convert integer base units back to a high-precision decimal amount.
/// Exact: the mantissa is reinterpreted at the token's scale, no rounding.
pub fn from_base_units(amount_base: U256, decimals: u8) -> Result<Decimal> {
    if decimals > MAX_DECIMALS {
        return Err(eyre!("unsupported precision: {} decimals", decimals));
    }
    let mut value = Decimal::from_str(&amount_base.to_string())
        .map_err(|e| eyre!("base amount {} exceeds decimal range: {}", amount_base, e))?;
    value
        .set_scale(decimals as u32)
        .map_err(|e| eyre!("cannot rescale {}: {}", amount_base, e))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_whole_amounts() {
        assert_eq!(to_base_units(100.0, 6).unwrap(), U256::from(100_000_000u64));
        assert_eq!(
            to_base_units(1.0, 18).unwrap(),
            U256::from(1_000_000_000_000_000_000u128)
        );
    }

    #[test]
    fn fractional_amounts_are_exact() {
        // 0.0335 WETH: binary-float arithmetic would land on ...49999 here
        assert_eq!(
            to_base_units(0.0335, 18).unwrap(),
            U256::from(33_500_000_000_000_000u128)
        );
        assert_eq!(to_base_units(0.1, 6).unwrap(), U256::from(100_000u64));
    }

    #[test]
    fn truncates_toward_zero() {
        // sub-base-unit dust is floored away
        assert_eq!(to_base_units(1.9999999, 6).unwrap(), U256::from(1_999_999u64));
        assert_eq!(to_base_units(0.0000001, 6).unwrap(), U256::ZERO);
    }

    #[test]
    fn zero_decimals_is_identity_floor() {
        assert_eq!(to_base_units(42.7, 0).unwrap(), U256::from(42u64));
    }

    #[test]
    fn from_base_units_is_exact_division() {
        let v = from_base_units(U256::from(33_500_000_000_000_000u128), 18).unwrap();
        assert_eq!(v, Decimal::from_str("0.033500000000000000").unwrap());

        let v = from_base_units(U256::from(101_000_000u64), 6).unwrap();
        assert_eq!(v, Decimal::from_str("101.000000").unwrap());
    }

    #[test]
    fn round_trip_never_gains() {
        // from(to(x, d), d) <= x, equality when x is representable at d
        for (x, d) in [
            (100.0f64, 6u8),
            (0.0335, 18),
            (1.9999999, 6),
            (0.0000001, 6),
            (42.7, 0),
        ] {
            let base = to_base_units(x, d).unwrap();
            let back = from_base_units(base, d).unwrap().to_f64().unwrap();
            assert!(back <= x, "{} -> {} gained value", x, back);
        }
        // exactly representable at the target precision: lossless
        let base = to_base_units(101.0, 6).unwrap();
        let back = from_base_units(base, 6).unwrap();
        assert_eq!(back, Decimal::from_str("101.000000").unwrap());
    }

    #[test]
    fn negative_amount_rejected() {
        assert!(to_base_units(-1.0, 6).is_err());
    }

    #[test]
    fn absurd_precision_rejected() {
        assert!(to_base_units(1.0, 29).is_err());
        assert!(from_base_units(U256::from(1u64), 29).is_err());
    }
}
