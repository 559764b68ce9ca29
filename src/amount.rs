use std::{fmt, str::FromStr};

use num_bigint::BigUint;
use thiserror::Error;

/// On-chain decimals of the watched token.
pub const DECIMALS: usize = 6;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("amount cannot be negative")]
    Negative,
    #[error("invalid amount: {0}")]
    InvalidFormat(String),
    #[error("amount has more than {} decimal places", DECIMALS)]
    TooManyDecimals,
}

fn decimal_factor() -> BigUint {
    BigUint::from(10u32).pow(DECIMALS as u32)
}

/// A token quantity in base units (10^-6 of one display unit).
///
/// Comparisons always happen on the integer; the decimal form is only used
/// for input and display.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(BigUint);

impl Amount {
    pub fn from_base_units(units: impl Into<BigUint>) -> Self {
        Self(units.into())
    }

    pub fn base_units(&self) -> &BigUint {
        &self.0
    }

    /// Parses a human readable decimal like `12.5` into base units.
    pub fn parse(input: &str) -> Result<Self, AmountError> {
        let trimmed = input.trim();
        if trimmed.starts_with('-') {
            return Err(AmountError::Negative);
        }
        let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
        if unsigned.is_empty() {
            return Err(AmountError::Empty);
        }
        if unsigned.contains(|c: char| c.is_whitespace() || c == '_') {
            return Err(AmountError::InvalidFormat(format!(
                "{} contains spaces or underscores",
                input
            )));
        }

        let (whole, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        if frac.len() > DECIMALS {
            return Err(AmountError::TooManyDecimals);
        }
        let whole = if whole.is_empty() { "0" } else { whole };
        let combined = format!("{}{:0<width$}", whole, frac, width = DECIMALS);

        // BigUint's own parser tolerates separators and signs, so check digits first.
        if !combined.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AmountError::InvalidFormat(input.to_string()));
        }
        BigUint::parse_bytes(combined.as_bytes(), 10)
            .map(Self)
            .ok_or_else(|| AmountError::InvalidFormat(input.to_string()))
    }

    /// Renders with exactly six fractional digits, e.g. `1.000000`.
    pub fn fixed(&self) -> String {
        let (whole, frac) = self.split();
        format!("{}.{:0>width$}", whole, frac.to_string(), width = DECIMALS)
    }

    fn split(&self) -> (BigUint, BigUint) {
        let factor = decimal_factor();
        (&self.0 / &factor, &self.0 % &factor)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (whole, frac) = self.split();
        if frac == BigUint::default() {
            write!(f, "{}", whole)
        } else {
            write!(
                f,
                "{}.{:0>width$}",
                whole,
                frac.to_string(),
                width = DECIMALS
            )
        }
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::parse(s)
    }
}

impl From<BigUint> for Amount {
    fn from(units: BigUint) -> Self {
        Self(units)
    }
}
