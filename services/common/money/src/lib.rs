use std::fmt;
use std::str::FromStr;

use bigdecimal::{BigDecimal, Zero};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of decimal places every stored amount carries.
pub const MONEY_SCALE: i64 = 2;

/// Normalize a monetary value to 2 decimal places. Extra digits are truncated.
pub fn normalize_scale(value: &BigDecimal) -> BigDecimal {
    value.with_scale(MONEY_SCALE)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("amount is not a finite number")]
    NotFinite,
    #[error("unable to parse amount '{0}'")]
    Parse(String),
}

/// Monetary amount held at a fixed scale of two decimal places.
///
/// Serialized as a decimal string so persisted ledgers never pass through
/// binary floating point.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "AmountRepr")]
pub struct Amount(BigDecimal);

/// Accepted wire forms: decimal strings, and bare JSON numbers from older files.
#[derive(Deserialize)]
#[serde(untagged)]
enum AmountRepr {
    Text(String),
    Number(f64),
}

impl TryFrom<AmountRepr> for Amount {
    type Error = MoneyError;

    fn try_from(value: AmountRepr) -> Result<Self, Self::Error> {
        match value {
            AmountRepr::Text(text) => text.parse(),
            AmountRepr::Number(number) => Self::from_f64(number),
        }
    }
}

impl Amount {
    pub fn new(raw: BigDecimal) -> Self {
        Self(normalize_scale(&raw))
    }

    /// Converts a JSON-style float using its shortest decimal representation,
    /// so `12.35` stays `12.35` instead of its binary expansion.
    pub fn from_f64(value: f64) -> Result<Self, MoneyError> {
        if !value.is_finite() {
            return Err(MoneyError::NotFinite);
        }
        value.to_string().parse()
    }

    pub fn inner(&self) -> &BigDecimal {
        &self.0
    }

    /// True when the normalized amount is strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        self.0 > BigDecimal::zero()
    }
}

impl From<BigDecimal> for Amount {
    fn from(value: BigDecimal) -> Self {
        Self::new(value)
    }
}

impl FromStr for Amount {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BigDecimal::from_str(s.trim())
            .map(Self::new)
            .map_err(|_| MoneyError::Parse(s.to_string()))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_to_two_places() {
        let v = BigDecimal::from_str("12.3456").unwrap();
        assert_eq!(normalize_scale(&v).to_string(), "12.34");
        assert_eq!(Amount::from_str("7").unwrap().to_string(), "7.00");
    }

    #[test]
    fn float_conversion_keeps_decimal_digits() {
        let amount = Amount::from_f64(12.35).unwrap();
        assert_eq!(amount.to_string(), "12.35");
        assert_eq!(Amount::from_f64(f64::NAN), Err(MoneyError::NotFinite));
        assert_eq!(Amount::from_f64(f64::INFINITY), Err(MoneyError::NotFinite));
    }

    #[test]
    fn sub_cent_amounts_are_not_positive() {
        assert!(!Amount::from_str("0.009").unwrap().is_positive());
        assert!(!Amount::from_str("0").unwrap().is_positive());
        assert!(!Amount::from_str("-5").unwrap().is_positive());
        assert!(Amount::from_str("0.01").unwrap().is_positive());
    }

    #[test]
    fn deserialization_normalizes_scale() {
        let amount: Amount = serde_json::from_str("\"12.345\"").unwrap();
        assert_eq!(amount.to_string(), "12.34");
        let amount: Amount = serde_json::from_str("12.35").unwrap();
        assert_eq!(amount.to_string(), "12.35");
        assert!(serde_json::from_str::<Amount>("\"ten\"").is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(Amount::from_str("ten"), Err(MoneyError::Parse(_))));
    }
}
