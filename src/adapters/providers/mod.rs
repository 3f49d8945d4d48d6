//! Price Provider Adapters - HTTP Quote Sources
//!
//! Provides `QuoteSource` implementations for:
//! - Birdeye: per-token quotes, API key required (primary)
//! - CoinGecko: batched simple-price quotes, public (fallback)
//! - `QuoteHttpClient`: shared timeout + concurrency-limited client

pub mod birdeye;
pub mod coingecko;
pub mod http;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Deserialize;

pub use birdeye::BirdeyeSource;
pub use coingecko::CoinGeckoSource;
pub use http::{QuoteHttpClient, QuoteHttpConfig};

use crate::config::{AppConfig, ProviderKind};
use crate::ports::quote_source::QuoteSource;

/// Build the configured provider chain, in priority order.
pub fn build_sources(config: &AppConfig) -> Result<Vec<Arc<dyn QuoteSource>>> {
    let client = QuoteHttpClient::new(&QuoteHttpConfig {
        timeout: Duration::from_millis(config.feed.request_timeout_ms),
        ..QuoteHttpConfig::default()
    })?;

    let sources = config
        .providers
        .iter()
        .map(|provider| -> Arc<dyn QuoteSource> {
            match provider.kind {
                ProviderKind::Birdeye => Arc::new(BirdeyeSource::new(provider, client.clone())),
                ProviderKind::Coingecko => Arc::new(CoinGeckoSource::new(provider, client.clone())),
            }
        })
        .collect();

    Ok(sources)
}

/// A JSON price field that may arrive as a number or a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum JsonDecimal {
    Number(serde_json::Number),
    Text(String),
}

impl JsonDecimal {
    /// Exact decimal value, or `None` if the field is not numeric.
    ///
    /// Goes through the number's text form so small prices like
    /// `0.00002` do not pick up binary float noise.
    pub(crate) fn to_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Number(n) => parse_decimal(&n.to_string()),
            Self::Text(s) => parse_decimal(s.trim()),
        }
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    if text.contains(['e', 'E']) {
        Decimal::from_scientific(text).ok()
    } else {
        Decimal::from_str(text).ok()
    }
}
