use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;

/// Minor units (paisa) per major unit (rupee)
pub const MINOR_PER_MAJOR: i64 = 100;

const BPS_DENOMINATOR: i128 = 10_000;

/// Fixed-point amount in minor currency units. Every fare figure in the pipeline is a `Money`;
/// floats only appear at the JSON boundary with the backend (see [`decimal`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MoneyError {
    #[error("Amount is not a finite number: {0}")]
    NotFinite(f64),

    #[error("Amount must not be negative: {0}")]
    Negative(f64),

    #[error("Amount out of range: {0}")]
    OutOfRange(f64),
}

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    pub const fn from_major(major: i64) -> Self {
        Self(major.saturating_mul(MINOR_PER_MAJOR))
    }

    /// Convert a decimal amount (as sent by the backend) rounding half-up to the minor unit.
    pub fn from_decimal(value: f64) -> Result<Self, MoneyError> {
        if !value.is_finite() {
            return Err(MoneyError::NotFinite(value));
        }
        if value < 0.0 {
            return Err(MoneyError::Negative(value));
        }

        let minor = (value * MINOR_PER_MAJOR as f64).round();
        if minor > i64::MAX as f64 {
            return Err(MoneyError::OutOfRange(value));
        }

        Ok(Self(minor as i64))
    }

    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Decimal major units for wire payloads
    pub fn to_decimal(&self) -> f64 {
        self.0 as f64 / MINOR_PER_MAJOR as f64
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_mul(self, factor: u32) -> Option<Money> {
        self.0.checked_mul(i64::from(factor)).map(Money)
    }

    /// Apply a rate expressed in basis points (1% = 100 bps), rounding half-up.
    pub fn percent_bps(self, basis_points: u32) -> Money {
        let scaled = i128::from(self.0) * i128::from(basis_points);
        let rounded = if scaled >= 0 {
            (scaled + BPS_DENOMINATOR / 2) / BPS_DENOMINATOR
        } else {
            (scaled - BPS_DENOMINATOR / 2) / BPS_DENOMINATOR
        };

        Money(i64::try_from(rounded).unwrap_or(i64::MAX))
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, other: Money) -> Money {
        Money(self.0.saturating_add(other.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per_major = MINOR_PER_MAJOR as u64;
        write!(f, "{}{}.{:02}", sign, abs / per_major, abs % per_major)
    }
}

/// Serde adapter for amounts the backend sends in major units, either as a JSON number
/// (`1250.5`) or a string (`"1250.50"`). Serializes back as a decimal number.
///
/// Use with `#[serde(with = "yatra_shared::money::decimal")]`.
pub mod decimal {
    use super::Money;
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum DecimalRepr {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(money: &Money, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(money.to_decimal())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Money, D::Error> {
        let value = match DecimalRepr::deserialize(deserializer)? {
            DecimalRepr::Number(n) => n,
            DecimalRepr::Text(text) => text
                .trim()
                .parse::<f64>()
                .map_err(|_| de::Error::custom(format!("invalid amount {text:?}")))?,
        };
        Money::from_decimal(value).map_err(de::Error::custom)
    }
}
