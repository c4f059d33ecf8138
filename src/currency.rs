//! Fixed-precision, non-negative currency value

use crate::error::{ConsensusError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Currency: a count of indivisible base units.
///
/// Negative values are unrepresentable. Arithmetic is either checked
/// (returning [`ConsensusError::ValueOverflow`]) or explicitly saturating;
/// there is no wrapping arithmetic on this type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Currency(u128);

impl Currency {
    pub const ZERO: Currency = Currency(0);

    pub const fn new(units: u128) -> Self {
        Currency(units)
    }

    pub const fn units(self) -> u128 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Currency) -> Result<Currency> {
        self.0
            .checked_add(other.0)
            .map(Currency)
            .ok_or(ConsensusError::ValueOverflow)
    }

    pub fn checked_sub(self, other: Currency) -> Result<Currency> {
        self.0
            .checked_sub(other.0)
            .map(Currency)
            .ok_or(ConsensusError::ValueOverflow)
    }

    pub fn checked_mul(self, factor: u128) -> Result<Currency> {
        self.0
            .checked_mul(factor)
            .map(Currency)
            .ok_or(ConsensusError::ValueOverflow)
    }

    pub fn saturating_add(self, other: Currency) -> Currency {
        Currency(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Currency) -> Currency {
        Currency(self.0.saturating_sub(other.0))
    }

    pub fn saturating_mul(self, factor: u128) -> Currency {
        Currency(self.0.saturating_mul(factor))
    }

    /// Sum an iterator of values, failing on overflow.
    pub fn checked_sum<I>(values: I) -> Result<Currency>
    where
        I: IntoIterator<Item = Currency>,
    {
        values
            .into_iter()
            .try_fold(Currency::ZERO, |acc, value| acc.checked_add(value))
    }
}

impl From<u64> for Currency {
    fn from(units: u64) -> Self {
        Currency(units as u128)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
