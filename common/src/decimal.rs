use crate::config::{COIN_VALUE, DECIMALS};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecimalError {
    #[error("Empty decimal string")]
    Empty,

    #[error("Invalid decimal string: {0}")]
    Invalid(String),

    #[error("Too many fractional digits: {digits}, maximum: {max}")]
    TooPrecise { digits: usize, max: u32 },

    #[error("Decimal overflow")]
    Overflow,
}

/// Fixed point decimal with 18 fractional digits.
///
/// The value is signed so that configuration can carry a negative amount
/// up to the point where parameter validation rejects it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Decimal(i128);

/// Token amounts share the decimal representation.
pub type Amount = Decimal;

impl Decimal {
    pub const fn zero() -> Self {
        Self(0)
    }

    pub const fn from_base_units(units: i128) -> Self {
        Self(units)
    }

    pub const fn from_coins(coins: i64) -> Self {
        Self(coins as i128 * COIN_VALUE)
    }

    pub const fn base_units(&self) -> i128 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn checked_mul_int(self, factor: u64) -> Option<Self> {
        self.0.checked_mul(factor as i128).map(Self)
    }

    // Rounds toward positive infinity so that splitting never under-funds
    pub fn div_ceil_int(self, divisor: u64) -> Option<Self> {
        if divisor == 0 {
            return None;
        }
        let divisor = divisor as i128;
        let quotient = self.0 / divisor;
        if self.0 % divisor > 0 {
            Some(Self(quotient + 1))
        } else {
            Some(Self(quotient))
        }
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl FromStr for Decimal {
    type Err = DecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DecimalError::Empty);
        }

        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };

        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(DecimalError::Invalid(s.to_owned()));
        }
        let is_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if !is_digits(whole) || !is_digits(fraction) {
            return Err(DecimalError::Invalid(s.to_owned()));
        }
        if fraction.len() > DECIMALS as usize {
            return Err(DecimalError::TooPrecise {
                digits: fraction.len(),
                max: DECIMALS,
            });
        }

        let whole_units = if whole.is_empty() {
            0
        } else {
            whole
                .parse::<i128>()
                .map_err(|_| DecimalError::Overflow)?
        };
        let fraction_units = if fraction.is_empty() {
            0
        } else {
            let scale = 10i128.pow(DECIMALS - fraction.len() as u32);
            fraction
                .parse::<i128>()
                .map_err(|_| DecimalError::Overflow)?
                * scale
        };

        let units = whole_units
            .checked_mul(COIN_VALUE)
            .and_then(|v| v.checked_add(fraction_units))
            .ok_or(DecimalError::Overflow)?;

        Ok(Self(if negative { -units } else { units }))
    }
}

impl Display for Decimal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let units = self.0.unsigned_abs();
        let whole = units / COIN_VALUE as u128;
        let fraction = units % COIN_VALUE as u128;

        if self.0 < 0 {
            write!(f, "-")?;
        }
        write!(f, "{}", whole)?;
        if fraction != 0 {
            let padded = format!("{:0width$}", fraction, width = DECIMALS as usize);
            write!(f, ".{}", padded.trim_end_matches('0'))?;
        }
        Ok(())
    }
}

impl Serialize for Decimal {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

struct DecimalVisitor;

impl<'de> Visitor<'de> for DecimalVisitor {
    type Value = Decimal;

    fn expecting(&self, formatter: &mut Formatter) -> fmt::Result {
        formatter.write_str("a decimal string or an integer")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Decimal::from_str(v).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        (v as i128)
            .checked_mul(COIN_VALUE)
            .map(Decimal)
            .ok_or_else(|| E::custom(DecimalError::Overflow))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        (v as i128)
            .checked_mul(COIN_VALUE)
            .map(Decimal)
            .ok_or_else(|| E::custom(DecimalError::Overflow))
    }

    // YAML rates such as `0.1` arrive as floats; go through the shortest
    // round-trip representation rather than the binary value
    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        if !v.is_finite() {
            return Err(E::custom(DecimalError::Invalid(v.to_string())));
        }
        Decimal::from_str(&v.to_string()).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Decimal {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(DecimalVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whole_and_fraction() {
        let value: Decimal = "1.5".parse().unwrap();
        assert_eq!(value.base_units(), COIN_VALUE + COIN_VALUE / 2);

        let gas_price: Decimal = "0.000000001".parse().unwrap();
        assert_eq!(gas_price.base_units(), 1_000_000_000);

        let leading_dot: Decimal = ".25".parse().unwrap();
        assert_eq!(leading_dot.to_string(), "0.25");
    }

    #[test]
    fn test_parse_negative_keeps_sign() {
        let value: Decimal = "-10".parse().unwrap();
        assert!(value.is_negative());
        assert_eq!(value.to_string(), "-10");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!("".parse::<Decimal>(), Err(DecimalError::Empty));
        assert!(matches!(
            "12a".parse::<Decimal>(),
            Err(DecimalError::Invalid(_))
        ));
        assert!(matches!(
            "1.0000000000000000001".parse::<Decimal>(),
            Err(DecimalError::TooPrecise { .. })
        ));
        assert_eq!(
            "999999999999999999999999999999999999999".parse::<Decimal>(),
            Err(DecimalError::Overflow)
        );
    }

    #[test]
    fn test_display_trims_trailing_zeros() {
        assert_eq!(Decimal::from_coins(42).to_string(), "42");
        assert_eq!("3.140".parse::<Decimal>().unwrap().to_string(), "3.14");
        assert_eq!(Decimal::zero().to_string(), "0");
    }

    #[test]
    fn test_div_ceil_rounds_up() {
        let value = Decimal::from_base_units(10);
        assert_eq!(value.div_ceil_int(3), Some(Decimal::from_base_units(4)));
        assert_eq!(value.div_ceil_int(5), Some(Decimal::from_base_units(2)));
        assert_eq!(value.div_ceil_int(0), None);
    }

    #[test]
    fn test_serde_accepts_strings_and_integers() {
        let from_str: Decimal = serde_json::from_str("\"100.5\"").unwrap();
        assert_eq!(from_str.to_string(), "100.5");

        let from_int: Decimal = serde_json::from_str("7").unwrap();
        assert_eq!(from_int, Decimal::from_coins(7));

        let json = serde_json::to_string(&from_str).unwrap();
        assert_eq!(json, "\"100.5\"");
    }

    #[test]
    fn test_serde_accepts_short_floats() {
        let rate: Decimal = serde_json::from_str("0.1").unwrap();
        assert_eq!(rate, "0.1".parse::<Decimal>().unwrap());
    }
}
