//! A single recorded price observation across all tracked symbols.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::symbol::Symbol;

/// Prices for every tracked symbol at one instant.
///
/// Fields are private: once a sample is recorded it is never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSample {
    timestamp: DateTime<Utc>,
    values: BTreeMap<Symbol, Decimal>,
}

impl PriceSample {
    /// Create a sample from a timestamp and a symbol → price map.
    pub fn new(timestamp: DateTime<Utc>, values: BTreeMap<Symbol, Decimal>) -> Self {
        Self { timestamp, values }
    }

    /// Wall-clock time the sample was taken.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// All prices in the sample.
    pub fn values(&self) -> &BTreeMap<Symbol, Decimal> {
        &self.values
    }

    /// Price for one symbol, if present.
    pub fn price(&self, symbol: &Symbol) -> Option<Decimal> {
        self.values.get(symbol).copied()
    }

    /// Same values re-stamped at a later time.
    pub(crate) fn with_timestamp(self, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            values: self.values,
        }
    }
}
