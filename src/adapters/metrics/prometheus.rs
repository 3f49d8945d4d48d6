//! Prometheus Metrics Registry - Feed Observability
//!
//! Registers the feed's counters, gauges and histograms on a private
//! registry. All metrics follow the naming convention
//! `dashboard_feed_*`.

use prometheus::{
    Encoder, GaugeVec, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::domain::symbol::Symbol;

/// Centralized Prometheus metrics for the price feed.
pub struct FeedMetrics {
    /// Prometheus registry.
    registry: Registry,
    /// Recorded samples by provenance label.
    pub refreshes: IntCounterVec,
    /// Failed provider attempts by provider and error kind.
    pub provider_failures: IntCounterVec,
    /// Providers skipped for missing credentials.
    pub credential_skips: IntCounterVec,
    /// Results dropped because the session was torn down.
    pub discarded: IntCounter,
    /// Scheduled ticks skipped because a refresh was in flight.
    pub overlapping_ticks: IntCounter,
    /// Current price per symbol.
    pub price: GaugeVec,
    /// End-to-end refresh latency (seconds).
    pub refresh_duration: Histogram,
}

impl FeedMetrics {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let refreshes = IntCounterVec::new(
            Opts::new(
                "dashboard_feed_refreshes_total",
                "Samples recorded, by provenance",
            ),
            &["provenance"],
        )?;

        let provider_failures = IntCounterVec::new(
            Opts::new(
                "dashboard_feed_provider_failures_total",
                "Failed provider attempts",
            ),
            &["provider", "kind"],
        )?;

        let credential_skips = IntCounterVec::new(
            Opts::new(
                "dashboard_feed_credential_skips_total",
                "Providers skipped for a missing credential",
            ),
            &["provider"],
        )?;

        let discarded = IntCounter::new(
            "dashboard_feed_discarded_total",
            "Refresh results discarded after teardown",
        )?;

        let overlapping_ticks = IntCounter::new(
            "dashboard_feed_overlapping_ticks_total",
            "Scheduled ticks skipped while a refresh was in flight",
        )?;

        let price = GaugeVec::new(
            Opts::new("dashboard_feed_price_usd", "Current price in USD"),
            &["symbol"],
        )?;

        let refresh_duration = Histogram::with_opts(
            HistogramOpts::new(
                "dashboard_feed_refresh_duration_seconds",
                "Refresh latency including all fallback attempts",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(refreshes.clone()))?;
        registry.register(Box::new(provider_failures.clone()))?;
        registry.register(Box::new(credential_skips.clone()))?;
        registry.register(Box::new(discarded.clone()))?;
        registry.register(Box::new(overlapping_ticks.clone()))?;
        registry.register(Box::new(price.clone()))?;
        registry.register(Box::new(refresh_duration.clone()))?;

        Ok(Self {
            registry,
            refreshes,
            provider_failures,
            credential_skips,
            discarded,
            overlapping_ticks,
            price,
            refresh_duration,
        })
    }

    /// Update the per-symbol price gauges.
    pub fn observe_prices<'a>(&self, prices: impl IntoIterator<Item = (&'a Symbol, &'a Decimal)>) {
        for (symbol, price) in prices {
            if let Some(value) = price.to_f64() {
                self.price.with_label_values(&[symbol.as_str()]).set(value);
            }
        }
    }

    /// Render all metrics in the Prometheus text format.
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
