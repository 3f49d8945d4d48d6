//! Tracked symbols and their per-provider identifiers.
//!
//! A `Symbol` is the dashboard-facing ticker (`SOL`, `BONK`). Each
//! provider addresses the same asset differently (a mint address for
//! Birdeye, a coin id for CoinGecko), so `SymbolSpec` carries one id
//! per provider kind alongside the synthetic profile used when no
//! provider is usable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::synthetic::SyntheticProfile;

/// Upper-cased ticker identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Create a symbol, normalizing to upper case.
    pub fn new(ticker: impl AsRef<str>) -> Self {
        Self(ticker.as_ref().trim().to_ascii_uppercase())
    }

    /// Ticker as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Symbol {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<Symbol> for String {
    fn from(value: Symbol) -> Self {
        value.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A tracked symbol with its provider id mappings.
#[derive(Debug, Clone, Deserialize)]
pub struct SymbolSpec {
    /// Dashboard ticker.
    pub symbol: Symbol,
    /// Provider kind (`birdeye`, `coingecko`) → provider-specific id.
    #[serde(default)]
    pub ids: BTreeMap<String, String>,
    /// Band and wave shape for synthetic data.
    pub synthetic: SyntheticProfile,
}

impl SymbolSpec {
    /// Look up the identifier a given provider kind uses for this symbol.
    pub fn id_for(&self, provider_kind: &str) -> Option<&str> {
        self.ids.get(provider_kind).map(String::as_str)
    }
}
