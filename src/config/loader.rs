//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, resolving provider API keys from the
//! environment, validating all parameters, and providing clear error
//! messages for misconfiguration.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use tracing::{info, warn};

use super::{AppConfig, MAX_SEED_SPACING_SECS};
use crate::ports::quote_source::CredentialRequirement;

/// Load, resolve credentials for, and validate a TOML config file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let mut config = parse_config(&content)?;
  resolve_credentials(&mut config, |var| std::env::var(var).ok());
  validate_config(&config)?;

  info!(
    providers = config.providers.len(),
    symbols = config.symbols.len(),
    capacity = config.feed.history_capacity,
    poll_ms = config.feed.poll_interval_ms,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse configuration text without touching the environment.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  toml::from_str(content).with_context(|| "Failed to parse config.toml")
}

/// Fill each provider's `api_key` from the variable it names.
///
/// Empty values count as missing. A provider that needs a key but has
/// none is kept: the feed skips it at refresh time.
pub fn resolve_credentials<F>(config: &mut AppConfig, lookup: F)
where
  F: Fn(&str) -> Option<String>,
{
  for provider in &mut config.providers {
    provider.api_key = provider
      .api_key_env
      .as_deref()
      .and_then(&lookup)
      .filter(|key| !key.trim().is_empty());

    if provider.credential == CredentialRequirement::ApiKey && provider.api_key.is_none() {
      warn!(
        provider = %provider.name,
        env = provider.api_key_env.as_deref().unwrap_or(""),
        "No API key configured, provider will be skipped"
      );
    }
  }
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Positive cadences and history bounds
/// - Non-empty, unique provider and symbol definitions
/// - Every symbol mapped for every provider kind in use
/// - Sane synthetic bands (strictly positive, ordered)
pub fn validate_config(config: &AppConfig) -> Result<()> {
  // Feed validation
  anyhow::ensure!(
    config.feed.poll_interval_ms > 0,
    "poll_interval_ms must be positive"
  );
  anyhow::ensure!(
    config.feed.synthetic_interval_ms > 0,
    "synthetic_interval_ms must be positive"
  );
  anyhow::ensure!(
    config.feed.history_capacity > 0,
    "history_capacity must be positive"
  );
  anyhow::ensure!(
    config.feed.seed_history <= config.feed.history_capacity,
    "seed_history ({}) must not exceed history_capacity ({})",
    config.feed.seed_history,
    config.feed.history_capacity
  );
  anyhow::ensure!(
    (1..=MAX_SEED_SPACING_SECS).contains(&config.feed.seed_spacing_secs),
    "seed_spacing_secs must be in [1, {}], got {}",
    MAX_SEED_SPACING_SECS,
    config.feed.seed_spacing_secs
  );
  anyhow::ensure!(
    config.feed.request_timeout_ms > 0,
    "request_timeout_ms must be positive"
  );

  // Provider validation
  anyhow::ensure!(
    !config.providers.is_empty(),
    "At least one provider must be configured"
  );

  for (i, provider) in config.providers.iter().enumerate() {
    anyhow::ensure!(
      !provider.name.trim().is_empty(),
      "Provider {} has an empty name",
      i
    );
    anyhow::ensure!(
      !provider.endpoints.is_empty(),
      "Provider {} ({}) has no endpoints",
      i,
      provider.name
    );
    anyhow::ensure!(
      provider.credential == CredentialRequirement::None || provider.api_key_env.is_some(),
      "Provider {} ({}) requires an API key but names no api_key_env",
      i,
      provider.name
    );
  }

  // Symbol validation
  anyhow::ensure!(
    !config.symbols.is_empty(),
    "At least one symbol must be configured"
  );

  let mut seen = HashSet::new();
  for spec in &config.symbols {
    anyhow::ensure!(
      !spec.symbol.as_str().is_empty(),
      "Symbol ticker must not be empty"
    );
    anyhow::ensure!(
      seen.insert(spec.symbol.clone()),
      "Symbol {} configured twice",
      spec.symbol
    );

    for provider in &config.providers {
      let kind = provider.kind.as_str();
      anyhow::ensure!(
        spec.id_for(kind).is_some_and(|id| !id.is_empty()),
        "Symbol {} has no {} id (needed by provider {})",
        spec.symbol,
        kind,
        provider.name
      );
    }

    let band = &spec.synthetic;
    anyhow::ensure!(
      band.min > Decimal::ZERO,
      "Symbol {} synthetic min must be positive, got {}",
      spec.symbol,
      band.min
    );
    anyhow::ensure!(
      band.contains(band.base),
      "Symbol {} synthetic base {} must lie in [{}, {}]",
      spec.symbol,
      band.base,
      band.min,
      band.max
    );
    anyhow::ensure!(
      band.max_step > Decimal::ZERO,
      "Symbol {} synthetic max_step must be positive",
      spec.symbol
    );
    anyhow::ensure!(
      band.decimals <= 18,
      "Symbol {} synthetic decimals must be <= 18, got {}",
      spec.symbol,
      band.decimals
    );
  }

  Ok(())
}
