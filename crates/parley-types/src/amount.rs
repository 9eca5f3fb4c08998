//! Amount and asset types
//!
//! Parley amounts are unsigned 128-bit integers counted in smallest units.
//! At every serialization boundary (storage, refund messages, HTTP) they
//! travel as base-10 strings so no JSON number precision is lost.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::{ParleyError, Result};

/// Non-negative amount in smallest units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(pub u128);

impl Amount {
    /// Create a zero amount
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Create a new amount
    pub const fn new(value: u128) -> Self {
        Self(value)
    }

    /// Raw value in smallest units
    pub const fn value(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// Parse a base-10 wire string.
    ///
    /// Accepts only ASCII digits. Signs, whitespace, separators, exponents
    /// and values above `u128::MAX` are rejected rather than truncated.
    pub fn parse_decimal(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(ParleyError::invalid_amount(s, "empty string"));
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParleyError::invalid_amount(s, "expected decimal digits only"));
        }

        let mut value: u128 = 0;
        for digit in s.bytes().map(|b| u128::from(b - b'0')) {
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(digit))
                .ok_or_else(|| ParleyError::invalid_amount(s, "exceeds u128 range"))?;
        }
        Ok(Self(value))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = ParleyError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_decimal(s)
    }
}

impl From<u128> for Amount {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct AmountVisitor;

        impl<'de> de::Visitor<'de> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a base-10 string of an unsigned 128-bit amount")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Amount, E> {
                Amount::parse_decimal(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(AmountVisitor)
    }
}

/// Asset class tracked by the value-transfer ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Asset {
    /// Currency attached to calls (what `buy` is paid in)
    Native,
    /// Ledger units escrowed per conversation and sold by the purchase gate
    Token,
}

impl Asset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Token => "token",
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Asset {
    type Err = ParleyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "native" => Ok(Self::Native),
            "token" => Ok(Self::Token),
            other => Err(ParleyError::invalid_input("asset", format!("unknown asset {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decimal() {
        assert_eq!(Amount::parse_decimal("200000000").unwrap(), Amount(200_000_000));
        assert_eq!(Amount::parse_decimal("0").unwrap(), Amount::zero());
        assert_eq!(Amount::parse_decimal("007").unwrap(), Amount(7));
    }

    #[test]
    fn test_parse_u128_bounds() {
        let max = u128::MAX.to_string();
        assert_eq!(Amount::parse_decimal(&max).unwrap(), Amount(u128::MAX));

        // u128::MAX + 1
        let over = "340282366920938463463374607431768211456";
        assert!(matches!(
            Amount::parse_decimal(over),
            Err(ParleyError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_non_digits() {
        for bad in ["", "-1", "+1", " 1", "1 ", "1.0", "1e9", "0x10", "1_000"] {
            assert!(Amount::parse_decimal(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_serde_uses_strings() {
        let amount = Amount(500_000_000_000_000_000_000_000);
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"500000000000000000000000\"");

        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);

        // numbers are not accepted on the wire
        assert!(serde_json::from_str::<Amount>("200000000").is_err());
    }

    #[test]
    fn test_checked_arithmetic() {
        assert_eq!(Amount(5).checked_sub(Amount(6)), None);
        assert_eq!(Amount(u128::MAX).checked_add(Amount(1)), None);
        assert_eq!(Amount(5).checked_add(Amount(6)), Some(Amount(11)));
    }

    #[test]
    fn test_asset_names() {
        assert_eq!("token".parse::<Asset>().unwrap(), Asset::Token);
        assert_eq!(serde_json::to_string(&Asset::Native).unwrap(), "\"native\"");
        assert!("gold".parse::<Asset>().is_err());
    }
}
