//! CoinGecko Quote Source - Public batched price API
//!
//! A single `simple/price` request covers every tracked symbol. No
//! credential needed, which makes it the natural fallback provider.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::JsonDecimal;
use super::http::QuoteHttpClient;
use crate::config::{ProviderConfig, ProviderKind};
use crate::domain::symbol::SymbolSpec;
use crate::ports::quote_source::{
    CredentialRequirement, ProviderError, ProviderResult, Quote, QuoteBatch, QuoteSource,
};

/// Per-coin entry of a `simple/price` response.
#[derive(Debug, Deserialize)]
struct SimplePrice {
    usd: Option<JsonDecimal>,
    usd_24h_change: Option<JsonDecimal>,
}

/// `simple/price` response keyed by coin id.
type SimplePriceResponse = HashMap<String, SimplePrice>;

/// CoinGecko quote source.
pub struct CoinGeckoSource {
    /// Display name (provenance label).
    name: String,
    /// API base URLs in priority order.
    endpoints: Vec<String>,
    /// Credential requirement from config.
    credential: CredentialRequirement,
    /// Resolved API key, when one is configured.
    api_key: Option<String>,
    /// Shared HTTP client.
    client: QuoteHttpClient,
}

impl CoinGeckoSource {
    pub fn new(config: &ProviderConfig, client: QuoteHttpClient) -> Self {
        Self {
            name: config.name.clone(),
            endpoints: config.endpoints.clone(),
            credential: config.credential,
            api_key: config.api_key.clone(),
            client,
        }
    }
}

/// `simple/price` URL for the given coin ids.
fn simple_price_url(endpoint: &str, ids: &[&str]) -> String {
    format!(
        "{}/simple/price?ids={}&vs_currencies=usd&include_24hr_change=true",
        endpoint.trim_end_matches('/'),
        ids.join(",")
    )
}

/// Map a `simple/price` response back onto the tracked symbols.
fn parse_prices(
    symbols: &[SymbolSpec],
    response: &SimplePriceResponse,
) -> Result<QuoteBatch, ProviderError> {
    let kind = ProviderKind::Coingecko.as_str();
    symbols
        .iter()
        .map(|spec| {
            let id = spec.id_for(kind).ok_or_else(|| {
                ProviderError::SchemaViolation(format!("no coingecko id for {}", spec.symbol))
            })?;
            let entry = response
                .get(id)
                .ok_or_else(|| ProviderError::SchemaViolation(format!("{id} missing")))?;
            let price = entry
                .usd
                .as_ref()
                .and_then(JsonDecimal::to_decimal)
                .ok_or_else(|| ProviderError::SchemaViolation(format!("{id}.usd missing")))?;

            Ok((
                spec.symbol.clone(),
                Quote {
                    price,
                    change_24h_pct: entry.usd_24h_change.as_ref().and_then(JsonDecimal::to_decimal),
                },
            ))
        })
        .collect()
}

#[async_trait]
impl QuoteSource for CoinGeckoSource {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn credential(&self) -> CredentialRequirement {
        self.credential
    }

    fn has_credential(&self) -> bool {
        self.credential == CredentialRequirement::None || self.api_key.is_some()
    }

    fn endpoints(&self) -> Vec<String> {
        self.endpoints.clone()
    }

    #[instrument(skip(self, symbols), fields(provider = %self.name))]
    async fn fetch_quotes(&self, endpoint: &str, symbols: &[SymbolSpec]) -> ProviderResult {
        if !self.has_credential() {
            return Err(ProviderError::CredentialMissing {
                provider: self.name.clone(),
            });
        }

        let kind = ProviderKind::Coingecko.as_str();
        let ids: Vec<&str> = symbols.iter().filter_map(|s| s.id_for(kind)).collect();
        let url = simple_price_url(endpoint, &ids);

        let mut headers = Vec::new();
        if let Some(key) = self.api_key.as_deref() {
            headers.push(("x-cg-demo-api-key", key));
        }

        let response: SimplePriceResponse = self.client.get_json(&url, &headers).await?;
        let batch = parse_prices(symbols, &response)?;
        debug!(quotes = batch.len(), "CoinGecko quotes parsed");
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::symbol::Symbol;
    use crate::domain::synthetic::SyntheticProfile;

    fn spec(symbol: &str, id: &str) -> SymbolSpec {
        let mut ids = BTreeMap::new();
        ids.insert("coingecko".to_string(), id.to_string());
        SymbolSpec {
            symbol: Symbol::new(symbol),
            ids,
            synthetic: SyntheticProfile {
                base: dec!(1),
                min: dec!(0.00000001),
                max: dec!(1000),
                max_step: dec!(0.1),
                amplitude: Decimal::ZERO,
                frequency: 0.2,
                noise: Decimal::ZERO,
                decimals: 8,
            },
        }
    }

    #[test]
    fn test_url_shape() {
        assert_eq!(
            simple_price_url("https://api.coingecko.com/api/v3/", &["solana", "bonk"]),
            "https://api.coingecko.com/api/v3/simple/price?ids=solana,bonk&vs_currencies=usd&include_24hr_change=true"
        );
    }

    #[test]
    fn test_parse_reference_response() {
        let response: SimplePriceResponse = serde_json::from_str(
            r#"{"solana":{"usd":150.5,"usd_24h_change":2.1},"bonk":{"usd":0.00002,"usd_24h_change":-1.3}}"#,
        )
        .unwrap();
        let batch = parse_prices(&[spec("SOL", "solana"), spec("BONK", "bonk")], &response).unwrap();

        assert_eq!(batch[&Symbol::new("SOL")].price, dec!(150.5));
        assert_eq!(batch[&Symbol::new("SOL")].change_24h_pct, Some(dec!(2.1)));
        assert_eq!(batch[&Symbol::new("BONK")].price, dec!(0.00002));
        assert_eq!(batch[&Symbol::new("BONK")].change_24h_pct, Some(dec!(-1.3)));
    }

    #[test]
    fn test_missing_coin_is_schema_violation() {
        let response: SimplePriceResponse =
            serde_json::from_str(r#"{"solana":{"usd":150.5}}"#).unwrap();
        let err = parse_prices(&[spec("SOL", "solana"), spec("BONK", "bonk")], &response)
            .unwrap_err();
        assert_eq!(err, ProviderError::SchemaViolation("bonk missing".into()));
    }

    #[test]
    fn test_missing_usd_is_schema_violation() {
        let response: SimplePriceResponse =
            serde_json::from_str(r#"{"solana":{"usd_24h_change":1.0}}"#).unwrap();
        assert!(parse_prices(&[spec("SOL", "solana")], &response).is_err());
    }
}
