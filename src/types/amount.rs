use crate::types::errors::AmountError;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

const DECIMAL_PLACES: u32 = 2;
const SCALE: i64 = 10i64.pow(DECIMAL_PLACES);

/// A monetary amount held as a signed count of minor units (cents).
///
/// Integer cents keep wallet arithmetic free of floating-point drift; the
/// string form `"1234.56"` is the canonical wire representation.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Builds an amount directly from a count of cents.
    pub fn from_cents(cents: i64) -> Self {
        Amount(cents)
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Amount)
    }
}

impl Display for Amount {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        let integer = abs / SCALE;
        let fraction = abs % SCALE;
        write!(formatter, "{}{}.{:0width$}", sign, integer, fraction, width = DECIMAL_PLACES as usize)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();

        if value.is_empty() {
            return Err(AmountError::InvalidFormat("value is an empty string".to_string()));
        }

        let decimal = Decimal::from_str(value)?;

        if decimal.scale() > DECIMAL_PLACES {
            return Err(AmountError::InvalidFormat("value has sub-cent precision".to_string()));
        }

        decimal.checked_mul(Decimal::from(SCALE))
            .and_then(|cents| cents.to_i64())
            .map(Amount)
            .ok_or(AmountError::Overflow)
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Amount::from_str(&value).map_err(de::Error::custom)
    }
}
