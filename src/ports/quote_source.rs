//! Quote Source Port - External Price Provider Interface
//!
//! Defines the trait every price provider adapter implements, the
//! typed failure taxonomy, and the validation applied to every batch
//! before it may touch feed state.

use std::collections::BTreeMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::symbol::{Symbol, SymbolSpec};

/// Whether a provider needs configuration before it may be contacted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialRequirement {
  /// Public endpoint.
  None,
  /// Requires an API key header.
  ApiKey,
}

/// Why a provider attempt did not produce a usable batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
  /// Provider needs a credential that is not configured. Skip, not a failure.
  #[error("credential missing for {provider}")]
  CredentialMissing { provider: String },

  /// Network error, timeout, or non-success HTTP status.
  #[error("transport failure: {0}")]
  Transport(String),

  /// Response missing a field or not shaped as expected.
  #[error("schema violation: {0}")]
  SchemaViolation(String),

  /// A parsed price was zero or negative.
  #[error("invalid value for {symbol}: {value}")]
  InvalidValue { symbol: Symbol, value: Decimal },
}

impl ProviderError {
  /// Short label for metrics.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::CredentialMissing { .. } => "credential_missing",
      Self::Transport(_) => "transport",
      Self::SchemaViolation(_) => "schema",
      Self::InvalidValue { .. } => "invalid_value",
    }
  }
}

/// One symbol's quote from a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
  /// Spot price in USD.
  pub price: Decimal,
  /// 24h change in percent, when the provider supplies it.
  pub change_24h_pct: Option<Decimal>,
}

/// Quotes for a set of symbols from one provider attempt.
pub type QuoteBatch = BTreeMap<Symbol, Quote>;

/// Outcome of one provider attempt.
pub type ProviderResult = Result<QuoteBatch, ProviderError>;

/// Check that a batch covers every requested symbol with a positive price.
///
/// Extra symbols in the batch are ignored.
pub fn validate_batch(batch: &QuoteBatch, symbols: &[SymbolSpec]) -> Result<(), ProviderError> {
  for spec in symbols {
    let quote = batch.get(&spec.symbol).ok_or_else(|| {
      ProviderError::SchemaViolation(format!("no quote for {}", spec.symbol))
    })?;
    if quote.price <= Decimal::ZERO {
      return Err(ProviderError::InvalidValue {
        symbol: spec.symbol.clone(),
        value: quote.price,
      });
    }
  }
  Ok(())
}

/// Trait for price quote providers.
///
/// Implementors issue HTTP requests against one endpoint candidate and
/// parse the provider-specific schema. Ordering across endpoints and
/// providers is the use case's job, so adapters never fall back on
/// their own.
#[async_trait]
pub trait QuoteSource: Send + Sync + 'static {
  /// Display name, recorded as provenance on success.
  fn name(&self) -> String;

  /// Credential this provider needs.
  fn credential(&self) -> CredentialRequirement;

  /// Whether the credential requirement is satisfied.
  fn has_credential(&self) -> bool;

  /// Endpoint candidates, in the order they must be tried.
  fn endpoints(&self) -> Vec<String>;

  /// Fetch quotes for every symbol from a single endpoint candidate.
  async fn fetch_quotes(&self, endpoint: &str, symbols: &[SymbolSpec]) -> ProviderResult;
}

#[cfg(test)]
mod tests {
  use rust_decimal_macros::dec;

  use super::*;
  use crate::domain::synthetic::SyntheticProfile;

  fn spec(symbol: &str) -> SymbolSpec {
    SymbolSpec {
      symbol: Symbol::new(symbol),
      ids: BTreeMap::new(),
      synthetic: SyntheticProfile {
        base: dec!(1),
        min: dec!(0.5),
        max: dec!(2),
        max_step: dec!(0.1),
        amplitude: Decimal::ZERO,
        frequency: 0.2,
        noise: Decimal::ZERO,
        decimals: 2,
      },
    }
  }

  fn quote(price: Decimal) -> Quote {
    Quote {
      price,
      change_24h_pct: None,
    }
  }

  #[test]
  fn test_validate_accepts_complete_positive_batch() {
    let mut batch = QuoteBatch::new();
    batch.insert(Symbol::new("SOL"), quote(dec!(150.5)));
    batch.insert(Symbol::new("BONK"), quote(dec!(0.00002)));
    assert!(validate_batch(&batch, &[spec("SOL"), spec("BONK")]).is_ok());
  }

  #[test]
  fn test_validate_rejects_missing_symbol() {
    let mut batch = QuoteBatch::new();
    batch.insert(Symbol::new("SOL"), quote(dec!(150.5)));
    let err = validate_batch(&batch, &[spec("SOL"), spec("BONK")]).unwrap_err();
    assert_eq!(err.kind(), "schema");
  }

  #[test]
  fn test_validate_rejects_non_positive_price() {
    let mut batch = QuoteBatch::new();
    batch.insert(Symbol::new("SOL"), quote(Decimal::ZERO));
    let err = validate_batch(&batch, &[spec("SOL")]).unwrap_err();
    assert_eq!(
      err,
      ProviderError::InvalidValue {
        symbol: Symbol::new("SOL"),
        value: Decimal::ZERO
      }
    );
  }
}
