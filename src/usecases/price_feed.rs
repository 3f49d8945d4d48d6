//! Price Feed - Provider Fallback Chain and Rolling History
//!
//! One refresh walks the provider chain in priority order:
//! 1. Providers with an unmet credential requirement are skipped (no request)
//! 2. Each endpoint candidate is tried in order; the first validated batch wins
//! 3. If every attempt fails, the last sample is continued synthetically
//! 4. Exactly one sample is appended to the rolling series
//!
//! Nothing here returns an error to the caller: every provider failure
//! is absorbed by the fallback chain and shows up only as provenance.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::adapters::metrics::FeedMetrics;
use crate::config::{FeedConfig, MAX_SEED_SPACING_SECS};
use crate::domain::sample::PriceSample;
use crate::domain::state::{FeedSnapshot, FeedState, Provenance};
use crate::domain::symbol::{Symbol, SymbolSpec};
use crate::domain::synthetic::SyntheticGenerator;
use crate::ports::quote_source::{
  CredentialRequirement, ProviderResult, QuoteBatch, QuoteSource, validate_batch,
};

/// History and synthetic-data settings for a feed.
#[derive(Debug, Clone)]
pub struct FeedSettings {
  /// Rolling series bound.
  pub history_capacity: usize,
  /// Seed samples generated at construction.
  pub seed_history: usize,
  /// Spacing between seed samples.
  pub seed_spacing: Duration,
  /// Fixed RNG seed, for reproducible synthetic data.
  pub rng_seed: Option<u64>,
}

impl FeedSettings {
  pub fn from_config(config: &FeedConfig) -> Self {
    Self {
      history_capacity: config.history_capacity,
      seed_history: config.seed_history,
      seed_spacing: Duration::try_seconds(
        i64::try_from(config.seed_spacing_secs.min(MAX_SEED_SPACING_SECS)).unwrap_or(3_600),
      )
      .unwrap_or_else(|| Duration::hours(1)),
      rng_seed: config.rng_seed,
    }
  }
}

impl Default for FeedSettings {
  fn default() -> Self {
    Self {
      history_capacity: 24,
      seed_history: 24,
      seed_spacing: Duration::hours(1),
      rng_seed: None,
    }
  }
}

/// What a refresh call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RefreshReport {
  /// A sample was appended.
  Recorded {
    /// Provider name, or `synthetic`.
    provenance: String,
    /// Endpoint attempts made before recording.
    attempts: usize,
  },
  /// Another refresh was already in flight; this tick did nothing.
  Skipped,
  /// The feed was torn down; the result was dropped.
  Discarded,
}

impl RefreshReport {
  pub fn provenance(&self) -> Option<&str> {
    match self {
      Self::Recorded { provenance, .. } => Some(provenance),
      _ => None,
    }
  }
}

/// A validated batch and the provider that produced it.
struct ProviderHit {
  provider: String,
  batch: QuoteBatch,
}

/// Holds the refreshing flag up until dropped, including when the
/// refresh future is cancelled mid-fetch.
struct RefreshingGuard<'a>(&'a AtomicBool);

impl<'a> RefreshingGuard<'a> {
  fn raise(flag: &'a AtomicBool) -> Self {
    flag.store(true, Ordering::Release);
    Self(flag)
  }
}

impl Drop for RefreshingGuard<'_> {
  fn drop(&mut self) {
    self.0.store(false, Ordering::Release);
  }
}

/// Multi-provider price feed with bounded rolling history.
pub struct PriceFeed {
  /// Tracked symbols.
  symbols: Vec<SymbolSpec>,
  /// Provider chain, highest priority first.
  sources: Vec<Arc<dyn QuoteSource>>,
  /// Session state. Only this feed writes it.
  state: RwLock<FeedState>,
  /// Synthetic sample source.
  synthetic: Mutex<SyntheticGenerator>,
  /// Serializes refreshes so appends never interleave.
  refresh_lock: Mutex<()>,
  /// Set while a provider refresh is in flight.
  refreshing: AtomicBool,
  /// Prometheus metrics.
  metrics: Arc<FeedMetrics>,
}

impl PriceFeed {
  /// Create a feed seeded with synthetic history.
  pub fn new(
    symbols: Vec<SymbolSpec>,
    sources: Vec<Arc<dyn QuoteSource>>,
    settings: FeedSettings,
    metrics: Arc<FeedMetrics>,
  ) -> Self {
    let mut generator = SyntheticGenerator::new(settings.rng_seed);
    let now = Utc::now();
    let seed_len = settings.seed_history.min(settings.history_capacity);
    let seed = generator.seed_history(&symbols, seed_len, now, settings.seed_spacing);
    let state = FeedState::seeded(settings.history_capacity, seed, now);

    if let Some(latest) = state.latest() {
      metrics.observe_prices(latest.values());
    }

    info!(
      symbols = symbols.len(),
      providers = sources.len(),
      capacity = settings.history_capacity,
      seeded = state.series().len(),
      "Price feed initialized with synthetic history"
    );

    Self {
      symbols,
      sources,
      state: RwLock::new(state),
      synthetic: Mutex::new(generator),
      refresh_lock: Mutex::new(()),
      refreshing: AtomicBool::new(false),
      metrics,
    }
  }

  /// Whether some provider needs an API key and has one.
  ///
  /// Decides between synthetic animation and pausing while the wallet
  /// is disconnected.
  pub fn has_live_credentials(&self) -> bool {
    self
      .sources
      .iter()
      .any(|s| s.credential() == CredentialRequirement::ApiKey && s.has_credential())
  }

  /// Read-only copy of the current state.
  pub async fn snapshot(&self) -> FeedSnapshot {
    let state = self.state.read().await;
    state.snapshot(self.refreshing.load(Ordering::Acquire))
  }

  /// Whether `teardown` has run.
  pub async fn is_torn_down(&self) -> bool {
    self.state.read().await.is_torn_down()
  }

  /// Discard the session state. Results that land afterwards are dropped.
  pub async fn teardown(&self) {
    self.state.write().await.tear_down();
    info!("Price feed torn down");
  }

  /// Refresh now, waiting for any in-flight refresh to finish first.
  pub async fn refresh(&self) -> RefreshReport {
    let _guard = self.refresh_lock.lock().await;
    self.refresh_locked().await
  }

  /// Refresh unless one is already in flight.
  pub async fn try_refresh(&self) -> RefreshReport {
    let Ok(_guard) = self.refresh_lock.try_lock() else {
      self.metrics.overlapping_ticks.inc();
      debug!("Refresh already in flight, skipping tick");
      return RefreshReport::Skipped;
    };
    self.refresh_locked().await
  }

  /// Append a synthetic continuation without contacting any provider.
  pub async fn advance_synthetic(&self) -> RefreshReport {
    let _guard = self.refresh_lock.lock().await;
    self.record_synthetic(0).await
  }

  /// `advance_synthetic` unless a refresh is already in flight.
  pub async fn try_advance_synthetic(&self) -> RefreshReport {
    let Ok(_guard) = self.refresh_lock.try_lock() else {
      self.metrics.overlapping_ticks.inc();
      return RefreshReport::Skipped;
    };
    self.record_synthetic(0).await
  }

  /// One provider attempt against one endpoint, validated.
  ///
  /// Never touches feed state.
  async fn attempt(&self, source: &dyn QuoteSource, endpoint: &str) -> ProviderResult {
    let batch = source.fetch_quotes(endpoint, &self.symbols).await?;
    validate_batch(&batch, &self.symbols)?;
    Ok(batch)
  }

  #[instrument(skip(self), name = "feed_refresh")]
  async fn refresh_locked(&self) -> RefreshReport {
    if self.state.read().await.is_torn_down() {
      return RefreshReport::Discarded;
    }
    let _refreshing = RefreshingGuard::raise(&self.refreshing);

    let timer = self.metrics.refresh_duration.start_timer();
    let (hit, attempts) = self.walk_providers().await;
    let report = match hit {
      Some(hit) => self.record_quotes(hit, attempts).await,
      None => {
        warn!(attempts, "All providers failed, continuing with synthetic data");
        self.record_synthetic(attempts).await
      }
    };
    timer.observe_duration();
    report
  }

  /// Try every usable provider and endpoint in order.
  async fn walk_providers(&self) -> (Option<ProviderHit>, usize) {
    let mut attempts = 0;

    for source in &self.sources {
      let provider = source.name();
      if !source.has_credential() {
        debug!(provider = %provider, "Credential missing, skipping provider");
        self.metrics.credential_skips.with_label_values(&[provider.as_str()]).inc();
        continue;
      }

      for endpoint in source.endpoints() {
        attempts += 1;
        match self.attempt(source.as_ref(), &endpoint).await {
          Ok(batch) => {
            debug!(provider = %provider, endpoint = %endpoint, "Provider attempt succeeded");
            return (Some(ProviderHit { provider, batch }), attempts);
          }
          Err(e) => {
            warn!(
              provider = %provider,
              endpoint = %endpoint,
              kind = e.kind(),
              error = %e,
              "Provider attempt failed"
            );
            self
              .metrics
              .provider_failures
              .with_label_values(&[provider.as_str(), e.kind()])
              .inc();
          }
        }
      }
    }

    (None, attempts)
  }

  /// Append a validated provider batch.
  async fn record_quotes(&self, hit: ProviderHit, attempts: usize) -> RefreshReport {
    let mut values = BTreeMap::new();
    let mut changes = BTreeMap::new();
    for spec in &self.symbols {
      if let Some(quote) = hit.batch.get(&spec.symbol) {
        values.insert(spec.symbol.clone(), quote.price);
        changes.insert(
          spec.symbol.clone(),
          quote.change_24h_pct.unwrap_or(Decimal::ZERO),
        );
      }
    }

    let sample = PriceSample::new(Utc::now(), values);
    let provenance = Provenance::Provider(hit.provider);
    self.commit(sample, changes, provenance, attempts).await
  }

  /// Append a synthetic continuation of the latest sample.
  async fn record_synthetic(&self, attempts: usize) -> RefreshReport {
    let sample = {
      let state = self.state.read().await;
      if state.is_torn_down() {
        drop(state);
        return self.discard();
      }
      let mut generator = self.synthetic.lock().await;
      generator.continue_from(&self.symbols, state.latest(), Utc::now())
    };
    self
      .commit(sample, BTreeMap::new(), Provenance::Synthetic, attempts)
      .await
  }

  /// Write a sample into state unless the feed has been torn down.
  async fn commit(
    &self,
    sample: PriceSample,
    changes: BTreeMap<Symbol, Decimal>,
    provenance: Provenance,
    attempts: usize,
  ) -> RefreshReport {
    let mut state = self.state.write().await;
    if state.is_torn_down() {
      drop(state);
      return self.discard();
    }

    self.metrics.observe_prices(sample.values());
    let label = provenance.label().to_string();
    state.record(sample, changes, provenance);
    drop(state);

    self.metrics.refreshes.with_label_values(&[label.as_str()]).inc();
    info!(provenance = %label, attempts, "Price sample recorded");
    RefreshReport::Recorded {
      provenance: label,
      attempts,
    }
  }

  fn discard(&self) -> RefreshReport {
    self.metrics.discarded.inc();
    debug!("Feed torn down, discarding refresh result");
    RefreshReport::Discarded
  }
}
