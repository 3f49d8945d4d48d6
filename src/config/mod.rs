//! Configuration Module - TOML-based Feed Configuration
//!
//! Loads and validates configuration from `config.toml`. API keys are
//! never stored in the file: each provider names the environment
//! variable its key is read from. Provider endpoints, symbol ids and
//! synthetic bands are all externalized here.

pub mod loader;

use serde::Deserialize;

use crate::domain::symbol::SymbolSpec;
use crate::ports::quote_source::CredentialRequirement;

/// Largest accepted spacing between seed samples (one day).
pub const MAX_SEED_SPACING_SECS: u64 = 86_400;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Process identity and logging.
  pub app: AppSection,
  /// Polling cadence and history bounds.
  #[serde(default)]
  pub feed: FeedConfig,
  /// Snapshot / health / metrics server.
  #[serde(default)]
  pub server: ServerConfig,
  /// Initial wallet-session state.
  #[serde(default)]
  pub session: SessionConfig,
  /// Providers, in priority order.
  pub providers: Vec<ProviderConfig>,
  /// Tracked symbols.
  pub symbols: Vec<SymbolSpec>,
}

/// Process identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
  /// Human-readable instance name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

/// Feed cadence and history configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
  /// Real-data refresh cadence.
  #[serde(default = "default_poll_interval")]
  pub poll_interval_ms: u64,
  /// Synthetic animation cadence when no live provider is expected.
  #[serde(default = "default_synthetic_interval")]
  pub synthetic_interval_ms: u64,
  /// Rolling series bound.
  #[serde(default = "default_history_capacity")]
  pub history_capacity: usize,
  /// Number of synthetic samples seeded at session start.
  #[serde(default = "default_history_capacity")]
  pub seed_history: usize,
  /// Spacing between seed samples.
  #[serde(default = "default_seed_spacing")]
  pub seed_spacing_secs: u64,
  /// Per-request HTTP timeout.
  #[serde(default = "default_request_timeout")]
  pub request_timeout_ms: u64,
  /// Fixed RNG seed for reproducible synthetic data.
  #[serde(default)]
  pub rng_seed: Option<u64>,
}

impl Default for FeedConfig {
  fn default() -> Self {
    Self {
      poll_interval_ms: default_poll_interval(),
      synthetic_interval_ms: default_synthetic_interval(),
      history_capacity: default_history_capacity(),
      seed_history: default_history_capacity(),
      seed_spacing_secs: default_seed_spacing(),
      request_timeout_ms: default_request_timeout(),
      rng_seed: None,
    }
  }
}

/// Which adapter implements a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
  /// Per-token quote API with API-key header.
  Birdeye,
  /// Batched public simple-price API.
  Coingecko,
}

impl ProviderKind {
  /// Key used in `[symbols.ids]`.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Birdeye => "birdeye",
      Self::Coingecko => "coingecko",
    }
  }
}

/// One provider descriptor.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
  /// Adapter to use.
  pub kind: ProviderKind,
  /// Display name, recorded as provenance.
  pub name: String,
  /// Endpoint candidates, tried in order.
  pub endpoints: Vec<String>,
  /// Credential requirement.
  #[serde(default = "default_credential")]
  pub credential: CredentialRequirement,
  /// Environment variable holding the API key.
  #[serde(default)]
  pub api_key_env: Option<String>,
  /// Chain header value for endpoints that need one.
  #[serde(default = "default_chain")]
  pub chain: String,
  /// Resolved API key. Filled by the loader, never read from the file.
  #[serde(skip)]
  pub api_key: Option<String>,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  /// Serve snapshot / health / metrics.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Bind address.
  #[serde(default = "default_bind_address")]
  pub bind_address: String,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      bind_address: default_bind_address(),
    }
  }
}

/// Wallet-session configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
  /// Whether the wallet starts connected.
  #[serde(default = "default_true")]
  pub connected: bool,
}

impl Default for SessionConfig {
  fn default() -> Self {
    Self { connected: true }
  }
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_true() -> bool {
  true
}

fn default_poll_interval() -> u64 {
  10_000
}

fn default_synthetic_interval() -> u64 {
  5_000
}

fn default_history_capacity() -> usize {
  24
}

fn default_seed_spacing() -> u64 {
  3_600
}

fn default_request_timeout() -> u64 {
  8_000
}

fn default_credential() -> CredentialRequirement {
  CredentialRequirement::None
}

fn default_chain() -> String {
  "solana".to_string()
}

fn default_bind_address() -> String {
  "0.0.0.0:9090".to_string()
}
