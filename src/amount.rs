//! Arbitrary-precision token amounts.
//!
//! Ledger amounts do not fit in native integers, so every amount read from
//! storage is parsed into a [`BigUint`] and summed exactly. Storage hands
//! amounts over as base-10 strings; anything that is not a plain run of
//! digits is a data-integrity failure.

use std::collections::BTreeMap;
use std::fmt;
use std::iter::Sum;
use std::ops::AddAssign;
use std::str::FromStr;

use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// Per-asset totals, keyed by asset id.
pub type AssetTokenCounts = BTreeMap<String, TokenAmount>;

/// A non-negative integer amount of some asset.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenAmount(BigUint);

impl TokenAmount {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        self.0.bits() == 0
    }
}

impl FromStr for TokenAmount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidAmount(s.to_string()));
        }
        BigUint::parse_bytes(s.as_bytes(), 10)
            .map(TokenAmount)
            .ok_or_else(|| Error::InvalidAmount(s.to_string()))
    }
}

impl From<u64> for TokenAmount {
    fn from(value: u64) -> Self {
        TokenAmount(BigUint::from(value))
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AddAssign<&TokenAmount> for TokenAmount {
    fn add_assign(&mut self, rhs: &TokenAmount) {
        self.0 += &rhs.0;
    }
}

impl<'a> Sum<&'a TokenAmount> for TokenAmount {
    fn sum<I: Iterator<Item = &'a TokenAmount>>(iter: I) -> Self {
        iter.fold(TokenAmount::zero(), |mut acc, amount| {
            acc += amount;
            acc
        })
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Adds `amount` to the running total for `asset_id`.
pub fn accumulate(totals: &mut AssetTokenCounts, asset_id: &str, amount: &TokenAmount) {
    *totals.entry(asset_id.to_string()).or_default() += amount;
}
