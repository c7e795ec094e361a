use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::engine::Amount;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid counterparty {0:?}: digits only")]
    Counterparty(String),

    #[error("Invalid amount {0}: must be positive")]
    NonPositiveAmount(Amount),
}

/// Phone-number-like identifier a transaction is recorded against.
/// Only ever holds one or more ASCII digits; no other normalization is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Counterparty(String);

impl Counterparty {
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
            Ok(Counterparty(s.to_owned()))
        } else {
            Err(ValidationError::Counterparty(s.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Counterparty {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Counterparty::parse(s)
    }
}

impl fmt::Display for Counterparty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored money-transfer notification. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: i64,
    pub counterparty: Counterparty,
    pub amount: Amount,
    pub details: Option<String>,
    /// Business timestamp, used for window filtering.
    pub occurred_at: DateTime<Utc>,
    /// Write-order timestamp, strictly increasing across appends.
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::{Counterparty, ValidationError};

    #[test]
    fn test_that_digit_strings_are_valid_counterparties() {
        for input in ["0", "9876543210", "0000000000", "919649210000"] {
            let counterparty = Counterparty::parse(input).unwrap();
            assert_eq!(counterparty.as_str(), input);
            assert_eq!(counterparty.to_string(), input);
        }
    }

    #[test]
    fn test_that_non_digit_counterparties_are_rejected() {
        for input in ["", "+919876543210", "98765 43210", "98a", "-1", "١٢٣"] {
            assert_eq!(
                input.parse::<Counterparty>(),
                Err(ValidationError::Counterparty(input.to_owned()))
            );
        }
    }
}
