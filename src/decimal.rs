//! Fixed-point decimal arithmetic for prices and amounts.
//!
//! Prices and amounts in this engine are never floats: IEEE 754 cannot
//! represent most decimal fractions exactly, and matching code that
//! silently accumulates that drift is a correctness bug, not a rounding
//! nuance. `Decimal` stores a signed integer scaled by `10^6` (precision
//! 10, scale 6 — up to `9999.999999`) so that addition, subtraction and
//! multiplication are exact and overflow is a detectable `Result`, never
//! a wraparound.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Number of fractional decimal digits carried by every `Decimal`.
pub const SCALE: u32 = 6;
const SCALE_FACTOR: i64 = 1_000_000;
/// Largest magnitude representable at precision 10, scale 6: `9999.999999`.
const MAX_RAW: i64 = 9_999_999_999;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecimalError {
    #[error("arithmetic overflow")]
    Overflow,
    #[error("invalid decimal literal: {0}")]
    Parse(String),
}

/// A signed fixed-point number with precision 10 and scale 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, bincode::Encode, bincode::Decode)]
pub struct Decimal {
    raw: i64,
}

impl Decimal {
    pub const ZERO: Decimal = Decimal { raw: 0 };

    /// Build a `Decimal` from an already-scaled raw integer (`human * 10^6`).
    pub const fn from_raw(raw: i64) -> Self {
        Decimal { raw }
    }

    pub const fn raw(&self) -> i64 {
        self.raw
    }

    pub fn is_zero(&self) -> bool {
        self.raw == 0
    }

    pub fn is_positive(&self) -> bool {
        self.raw > 0
    }

    fn in_bounds(raw: i64) -> Result<Decimal, DecimalError> {
        if raw.abs() > MAX_RAW {
            return Err(DecimalError::Overflow);
        }
        Ok(Decimal { raw })
    }

    pub fn checked_add(&self, other: Decimal) -> Result<Decimal, DecimalError> {
        let raw = self
            .raw
            .checked_add(other.raw)
            .ok_or(DecimalError::Overflow)?;
        Self::in_bounds(raw)
    }

    pub fn checked_sub(&self, other: Decimal) -> Result<Decimal, DecimalError> {
        let raw = self
            .raw
            .checked_sub(other.raw)
            .ok_or(DecimalError::Overflow)?;
        Self::in_bounds(raw)
    }

    /// Multiply two scale-6 values, truncating the result back to scale 6.
    ///
    /// `raw = (a/10^6) * (b/10^6)`, so the naive product is scale 12; we
    /// divide by `10^6` with truncation (never rounds up) to land back at
    /// scale 6, matching "the engine never introduces rounding beyond this".
    pub fn checked_mul(&self, other: Decimal) -> Result<Decimal, DecimalError> {
        let product = (self.raw as i128) * (other.raw as i128);
        let truncated = product / (SCALE_FACTOR as i128);
        if truncated.abs() > MAX_RAW as i128 {
            return Err(DecimalError::Overflow);
        }
        Ok(Decimal {
            raw: truncated as i64,
        })
    }

    pub fn min(&self, other: Decimal) -> Decimal {
        if *self <= other { *self } else { other }
    }
}

impl Default for Decimal {
    fn default() -> Self {
        Decimal::ZERO
    }
}

impl FromStr for Decimal {
    type Err = DecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DecimalError::Parse(s.to_string()));
        }

        let (sign, rest) = match s.strip_prefix('-') {
            Some(rest) => (-1i64, rest),
            None => (1i64, s.strip_prefix('+').unwrap_or(s)),
        };

        let mut parts = rest.splitn(2, '.');
        let int_part = parts.next().unwrap_or("");
        let frac_part = parts.next();

        if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DecimalError::Parse(s.to_string()));
        }
        let integer: i64 = int_part
            .parse()
            .map_err(|_| DecimalError::Parse(s.to_string()))?;

        let fractional: i64 = match frac_part {
            None => 0,
            Some("") => return Err(DecimalError::Parse(s.to_string())),
            Some(digits) => {
                if digits.len() > SCALE as usize || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(DecimalError::Parse(s.to_string()));
                }
                let pad = SCALE as usize - digits.len();
                let scaled: i64 = digits
                    .parse()
                    .map_err(|_| DecimalError::Parse(s.to_string()))?;
                scaled * 10i64.pow(pad as u32)
            }
        };

        let raw = sign
            * integer
                .checked_mul(SCALE_FACTOR)
                .and_then(|v| v.checked_add(fractional))
                .ok_or_else(|| DecimalError::Parse(s.to_string()))?;

        Decimal::in_bounds(raw).map_err(|_| DecimalError::Parse(s.to_string()))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.raw < 0 { "-" } else { "" };
        let magnitude = self.raw.unsigned_abs();
        let integer = magnitude / SCALE_FACTOR as u64;
        let fraction = magnitude % SCALE_FACTOR as u64;
        write!(f, "{sign}{integer}.{fraction:06}")
    }
}

impl serde::Serialize for Decimal {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Decimal {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Decimal::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_integer_and_fraction() {
        assert_eq!("5".parse::<Decimal>().unwrap().raw(), 5_000_000);
        assert_eq!("3.5".parse::<Decimal>().unwrap().raw(), 3_500_000);
        assert_eq!("0.000001".parse::<Decimal>().unwrap().raw(), 1);
        assert_eq!("-2.5".parse::<Decimal>().unwrap().raw(), -2_500_000);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("".parse::<Decimal>().is_err());
        assert!("1.2.3".parse::<Decimal>().is_err());
        assert!("abc".parse::<Decimal>().is_err());
        assert!("1.".parse::<Decimal>().is_err());
        assert!("1.0000001".parse::<Decimal>().is_err()); // too many fractional digits
    }

    #[test]
    fn display_round_trips() {
        let d: Decimal = "101.5".parse().unwrap();
        assert_eq!(d.to_string(), "101.500000");
    }

    #[test]
    fn add_sub_exact() {
        let a: Decimal = "0.1".parse().unwrap();
        let b: Decimal = "0.2".parse().unwrap();
        let c: Decimal = "0.3".parse().unwrap();
        assert_eq!(a.checked_add(b).unwrap(), c);
        assert_eq!(c.checked_sub(b).unwrap(), a);
    }

    #[test]
    fn mul_truncates_not_rounds() {
        let price: Decimal = "3.333333".parse().unwrap();
        let qty: Decimal = "3".parse().unwrap();
        // 3.333333 * 3 = 9.999999, exact, no truncation needed here.
        assert_eq!(price.checked_mul(qty).unwrap().to_string(), "9.999999");

        let price: Decimal = "0.000001".parse().unwrap();
        let qty: Decimal = "0.5".parse().unwrap();
        // 0.0000005 truncates to 0, never rounds up.
        assert_eq!(price.checked_mul(qty).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn overflow_is_detected() {
        let max: Decimal = "9999.999999".parse().unwrap();
        let one: Decimal = "1".parse().unwrap();
        assert_eq!(max.checked_add(one), Err(DecimalError::Overflow));
    }

    #[test]
    fn ordering_is_total() {
        let a: Decimal = "1.5".parse().unwrap();
        let b: Decimal = "1.500001".parse().unwrap();
        assert!(a < b);
        assert_eq!(a.min(b), a);
    }
}
