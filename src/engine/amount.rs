use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const SCALE: i64 = 10_000;

/// Amount of money carried by a transaction.
/// It is using internally an i64 in order to avoid floating point rounding error.
/// The Amount precision is four places past the decimal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount {
    store: i64,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("Amount parsing error: {0}")]
    Parse(String),

    #[error("Overflow error while creating Amount")]
    Overflow,

    #[error("Underflow error while creating Amount")]
    Underflow,
}

impl Amount {
    pub fn new() -> Self {
        Amount { store: 0 }
    }

    /// Builds an amount from whole units (`500` -> `500.0000`).
    pub fn from_units(units: i64) -> Result<Amount, AmountError> {
        match units.checked_mul(SCALE) {
            Some(store) => Ok(Amount { store }),
            None => Err(AmountError::Overflow),
        }
    }

    pub fn is_positive(&self) -> bool {
        self.store > 0
    }

    pub fn is_zero(&self) -> bool {
        self.store == 0
    }

    pub fn add(&self, other: &Amount) -> Result<Amount, AmountError> {
        match self.store.checked_add(other.store) {
            Some(total) => Ok(Amount { store: total }),
            None => Err(AmountError::Overflow)?,
        }
    }

    pub fn sub(&self, other: &Amount) -> Result<Amount, AmountError> {
        match self.store.checked_sub(other.store) {
            Some(total) => Ok(Amount { store: total }),
            None => Err(AmountError::Underflow)?,
        }
    }

    /// Sums a sequence of amounts, failing on overflow. Empty input sums to zero.
    pub fn checked_sum<'a, I>(amounts: I) -> Result<Amount, AmountError>
    where
        I: IntoIterator<Item = &'a Amount>,
    {
        amounts
            .into_iter()
            .try_fold(Amount::new(), |total, amount| total.add(amount))
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            Err(AmountError::Parse(s.into()))?
        }

        let (negative, unsigned) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let (left_part, decimal_part) = match unsigned.split_once('.') {
            Some((left, dec)) => (left, Some(dec)),
            None => (unsigned, None),
        };

        // Checking for extra '.' or an empty number ("-", ".")
        if decimal_part.is_some_and(|d| d.contains('.'))
            || (left_part.is_empty() && decimal_part.is_none_or(str::is_empty))
        {
            Err(AmountError::Parse(s.into()))?
        }
        if !left_part.chars().all(|c| c.is_ascii_digit()) {
            Err(AmountError::Parse(s.into()))?
        }

        // Checking if integer part is empty (ex: ".05")
        let left_str = if left_part.is_empty() { "0" } else { left_part };

        let left: i64 = left_str
            .parse()
            .map_err(|_| AmountError::Parse(s.into()))?;
        let left = left.checked_mul(SCALE).ok_or(AmountError::Overflow)?;

        let mut dec_str = decimal_part.unwrap_or_default().to_owned();
        if !dec_str.chars().all(|c| c.is_ascii_digit()) {
            Err(AmountError::Parse(s.into()))?
        }

        // Ensure 4 digits for decimal part
        dec_str.truncate(4);
        while dec_str.len() < 4 {
            dec_str.push('0');
        }
        let dec: i64 = dec_str
            .parse()
            .map_err(|_| AmountError::Parse(s.into()))?;

        let total = left.checked_add(dec).ok_or(AmountError::Overflow)?;
        let store = if negative { -total } else { total };

        Ok(Self { store })
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.store;
        let sign = if value < 0 { "-" } else { "" };
        let abs_val = value.unsigned_abs();

        let left_part = abs_val / SCALE as u64;
        let decimal_part = abs_val % SCALE as u64;

        if decimal_part == 0 {
            return write!(f, "{sign}{left_part}");
        }

        let decimals = format!("{decimal_part:04}");
        write!(f, "{sign}{left_part}.{}", decimals.trim_end_matches('0'))
    }
}
