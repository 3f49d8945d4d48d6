//! Birdeye Quote Source - Primary per-token price API
//!
//! One request per tracked token, issued concurrently against a single
//! endpoint candidate. Requires an `X-API-KEY`; endpoints under
//! `/public/` additionally need the `x-chain` header.

use async_trait::async_trait;
use futures_util::future::join_all;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::JsonDecimal;
use super::http::QuoteHttpClient;
use crate::config::{ProviderConfig, ProviderKind};
use crate::domain::symbol::{Symbol, SymbolSpec};
use crate::ports::quote_source::{
    CredentialRequirement, ProviderError, ProviderResult, Quote, QuoteBatch, QuoteSource,
};

/// Birdeye price response envelope.
#[derive(Debug, Deserialize)]
struct PriceResponse {
    #[serde(default)]
    success: bool,
    data: Option<PriceData>,
}

/// Birdeye price payload.
#[derive(Debug, Deserialize)]
struct PriceData {
    value: Option<JsonDecimal>,
    #[serde(rename = "priceChange24hPercent")]
    price_change_24h_percent: Option<JsonDecimal>,
}

/// Birdeye quote source.
pub struct BirdeyeSource {
    /// Display name (provenance label).
    name: String,
    /// Endpoint candidates in priority order.
    endpoints: Vec<String>,
    /// Credential requirement from config.
    credential: CredentialRequirement,
    /// Resolved API key.
    api_key: Option<String>,
    /// Value for the `x-chain` header.
    chain: String,
    /// Shared HTTP client.
    client: QuoteHttpClient,
}

impl BirdeyeSource {
    pub fn new(config: &ProviderConfig, client: QuoteHttpClient) -> Self {
        Self {
            name: config.name.clone(),
            endpoints: config.endpoints.clone(),
            credential: config.credential,
            api_key: config.api_key.clone(),
            chain: config.chain.clone(),
            client,
        }
    }

    /// Fetch a single token's quote.
    async fn fetch_one(
        &self,
        endpoint: &str,
        spec: &SymbolSpec,
        api_key: Option<&str>,
    ) -> Result<(Symbol, Quote), ProviderError> {
        let address = spec.id_for(ProviderKind::Birdeye.as_str()).ok_or_else(|| {
            ProviderError::SchemaViolation(format!("no birdeye address for {}", spec.symbol))
        })?;

        let url = format!("{endpoint}?address={address}");
        let mut headers: Vec<(&str, &str)> = Vec::with_capacity(2);
        if let Some(key) = api_key {
            headers.push(("X-API-KEY", key));
        }
        if endpoint.contains("/public/") {
            headers.push(("x-chain", self.chain.as_str()));
        }

        let response: PriceResponse = self.client.get_json(&url, &headers).await?;
        let quote = parse_price(&spec.symbol, response)?;
        Ok((spec.symbol.clone(), quote))
    }
}

/// Turn one Birdeye response into a quote.
fn parse_price(symbol: &Symbol, response: PriceResponse) -> Result<Quote, ProviderError> {
    if !response.success {
        return Err(ProviderError::SchemaViolation(format!(
            "success=false for {symbol}"
        )));
    }

    let data = response
        .data
        .ok_or_else(|| ProviderError::SchemaViolation(format!("data missing for {symbol}")))?;

    let price = data
        .value
        .as_ref()
        .ok_or_else(|| ProviderError::SchemaViolation(format!("data.value missing for {symbol}")))?
        .to_decimal()
        .ok_or_else(|| {
            ProviderError::SchemaViolation(format!("data.value not numeric for {symbol}"))
        })?;

    Ok(Quote {
        price,
        change_24h_pct: data
            .price_change_24h_percent
            .as_ref()
            .and_then(JsonDecimal::to_decimal),
    })
}

#[async_trait]
impl QuoteSource for BirdeyeSource {
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

        let api_key = self.api_key.as_deref();
        let results = join_all(
            symbols
                .iter()
                .map(|spec| self.fetch_one(endpoint, spec, api_key)),
        )
        .await;

        let batch = results.into_iter().collect::<Result<QuoteBatch, _>>()?;
        debug!(quotes = batch.len(), "Birdeye quotes parsed");
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn parse(json: &str) -> Result<Quote, ProviderError> {
        let response: PriceResponse = serde_json::from_str(json).unwrap();
        parse_price(&Symbol::new("SOL"), response)
    }

    #[test]
    fn test_parse_full_response() {
        let quote = parse(r#"{"success":true,"data":{"value":150.5,"priceChange24hPercent":2.1}}"#)
            .unwrap();
        assert_eq!(quote.price, dec!(150.5));
        assert_eq!(quote.change_24h_pct, Some(dec!(2.1)));
    }

    #[test]
    fn test_parse_value_as_string_without_change() {
        let quote = parse(r#"{"success":true,"data":{"value":"0.00002"}}"#).unwrap();
        assert_eq!(quote.price, dec!(0.00002));
        assert_eq!(quote.change_24h_pct, None);
    }

    #[test]
    fn test_success_false_is_schema_violation() {
        let err = parse(r#"{"success":false,"data":{"value":150.5}}"#).unwrap_err();
        assert_eq!(err.kind(), "schema");
    }

    #[test]
    fn test_missing_value_is_schema_violation() {
        let err = parse(r#"{"success":true,"data":{"priceChange24hPercent":1.0}}"#).unwrap_err();
        assert!(err.to_string().contains("data.value missing"));
    }

    #[test]
    fn test_missing_data_is_schema_violation() {
        let err = parse(r#"{"success":true}"#).unwrap_err();
        assert_eq!(err.kind(), "schema");
    }
}
