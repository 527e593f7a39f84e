//! Fixed-point monetary amounts
//!
//! Amounts are stored as an integer count of the smallest unit (sela),
//! with eight decimal places per coin. Parsing and arithmetic are exact;
//! nothing in this module touches floating point.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Number of fractional digits
pub const DECIMALS: u32 = 8;

/// Sela per coin (10^8)
pub const SELA_PER_COIN: i64 = 100_000_000;

// =============================================================================
// Errors
// =============================================================================

/// Amount parsing and arithmetic errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("Invalid amount format: {0:?}")]
    InvalidFormat(String),
    #[error("Amount out of range: {0}")]
    Overflow(String),
}

// =============================================================================
// Amount
// =============================================================================

/// A non-negative fixed-point amount with 8 decimal places
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);
    pub const ONE_COIN: Amount = Amount(SELA_PER_COIN);

    /// Create from a raw sela count; negative values are rejected
    pub fn from_sela(sela: i64) -> Option<Self> {
        (sela >= 0).then_some(Self(sela))
    }

    /// Raw sela count
    pub fn sela(&self) -> i64 {
        self.0
    }

    /// Strictly greater than zero
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Subtraction that refuses to go below zero
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0
            .checked_sub(other.0)
            .filter(|v| *v >= 0)
            .map(Amount)
    }

    /// Sum of an iterator, `None` on overflow
    pub fn checked_sum<I: IntoIterator<Item = Amount>>(amounts: I) -> Option<Amount> {
        amounts
            .into_iter()
            .try_fold(Amount::ZERO, |acc, amount| acc.checked_add(amount))
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || AmountError::InvalidFormat(text.to_string());
        let overflow = || AmountError::Overflow(text.to_string());

        let (integer, fraction) = match text.split_once('.') {
            Some((integer, fraction)) => (integer, Some(fraction)),
            None => (text, None),
        };

        if integer.is_empty() || !integer.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let mut value = integer
            .parse::<i64>()
            .map_err(|_| overflow())?
            .checked_mul(SELA_PER_COIN)
            .ok_or_else(overflow)?;

        if let Some(fraction) = fraction {
            if fraction.is_empty()
                || fraction.len() > DECIMALS as usize
                || !fraction.bytes().all(|b| b.is_ascii_digit())
            {
                return Err(invalid());
            }

            // Pad to exactly 8 digits: "25" -> 25_000_000
            let scale = 10i64.pow(DECIMALS - fraction.len() as u32);
            let fractional: i64 = fraction.parse().map_err(|_| invalid())?;
            value = value.checked_add(fractional * scale).ok_or_else(overflow)?;
        }

        Ok(Amount(value))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 0 {
            f.write_str("-")?;
        }
        let magnitude = self.0.unsigned_abs();
        let per_coin = SELA_PER_COIN as u64;
        let integer = magnitude / per_coin;
        let fraction = magnitude % per_coin;

        if fraction == 0 {
            write!(f, "{}", integer)
        } else {
            let digits = format!("{:08}", fraction);
            write!(f, "{}.{}", integer, digits.trim_end_matches('0'))
        }
    }
}
