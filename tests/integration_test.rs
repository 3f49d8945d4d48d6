//! Integration Tests - End-to-end Feed Component Testing
//!
//! Tests the interaction between the price feed, the session task and
//! mock quote sources. Uses mockall for trait mocking and tokio::test
//! for async tests.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockall::mock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::{Notify, watch};

use dashboard_feed::adapters::metrics::FeedMetrics;
use dashboard_feed::domain::symbol::{Symbol, SymbolSpec};
use dashboard_feed::domain::synthetic::SyntheticProfile;
use dashboard_feed::ports::quote_source::{
    CredentialRequirement, ProviderError, ProviderResult, Quote, QuoteBatch, QuoteSource,
};
use dashboard_feed::usecases::{
    FeedSession, FeedSettings, PriceFeed, RefreshReport, ScheduleConfig,
};

// ---- Mock Definitions ----

mock! {
    pub Source {}

    #[async_trait::async_trait]
    impl QuoteSource for Source {
        fn name(&self) -> String;
        fn credential(&self) -> CredentialRequirement;
        fn has_credential(&self) -> bool;
        fn endpoints(&self) -> Vec<String>;
        async fn fetch_quotes(&self, endpoint: &str, symbols: &[SymbolSpec]) -> ProviderResult;
    }
}

// ---- Fixtures ----

fn symbols() -> Vec<SymbolSpec> {
    vec![
        SymbolSpec {
            symbol: Symbol::new("SOL"),
            ids: BTreeMap::new(),
            synthetic: SyntheticProfile {
                base: dec!(200),
                min: dec!(195),
                max: dec!(205),
                max_step: dec!(1.5),
                amplitude: dec!(3),
                frequency: 0.2,
                noise: dec!(2),
                decimals: 2,
            },
        },
        SymbolSpec {
            symbol: Symbol::new("BONK"),
            ids: BTreeMap::new(),
            synthetic: SyntheticProfile {
                base: dec!(0.00003),
                min: dec!(0.00001),
                max: dec!(0.00005),
                max_step: dec!(0.000001),
                amplitude: dec!(0.000005),
                frequency: 0.3,
                noise: dec!(0.000001),
                decimals: 8,
            },
        },
    ]
}

fn batch(sol: Decimal, bonk: Decimal) -> QuoteBatch {
    let mut batch = BTreeMap::new();
    batch.insert(
        Symbol::new("SOL"),
        Quote {
            price: sol,
            change_24h_pct: Some(dec!(2.1)),
        },
    );
    batch.insert(
        Symbol::new("BONK"),
        Quote {
            price: bonk,
            change_24h_pct: None,
        },
    );
    batch
}

fn settings(capacity: usize, seed: usize) -> FeedSettings {
    FeedSettings {
        history_capacity: capacity,
        seed_history: seed,
        rng_seed: Some(7),
        ..FeedSettings::default()
    }
}

/// Mock source with fixed identity. `fetch_quotes` expectations are
/// left to the caller.
fn source(name: &str, endpoints: &[&str], credential: CredentialRequirement, has_key: bool) -> MockSource {
    let mut mock = MockSource::new();
    let name = name.to_string();
    let endpoints: Vec<String> = endpoints.iter().map(|e| (*e).to_string()).collect();
    mock.expect_name().returning(move || name.clone());
    mock.expect_credential().returning(move || credential);
    mock.expect_has_credential().returning(move || has_key);
    mock.expect_endpoints().returning(move || endpoints.clone());
    mock
}

fn feed(sources: Vec<Arc<dyn QuoteSource>>, settings: FeedSettings) -> Arc<PriceFeed> {
    let metrics = Arc::new(FeedMetrics::new().unwrap());
    Arc::new(PriceFeed::new(symbols(), sources, settings, metrics))
}

fn sol(snapshot: &dashboard_feed::domain::state::FeedSnapshot) -> Decimal {
    snapshot.current[&Symbol::new("SOL")]
}

// ---- Fallback Chain ----

#[tokio::test]
async fn test_primary_success_records_primary_provenance() {
    let mut a = source("Provider A", &["a1"], CredentialRequirement::ApiKey, true);
    a.expect_fetch_quotes()
        .times(1)
        .returning(|_, _| Ok(batch(dec!(150.5), dec!(0.00002))));
    let b = source("Provider B", &["b1"], CredentialRequirement::None, true);

    let feed = feed(vec![Arc::new(a), Arc::new(b)], settings(24, 24));
    let report = feed.refresh().await;

    assert_eq!(
        report,
        RefreshReport::Recorded {
            provenance: "Provider A".to_string(),
            attempts: 1,
        }
    );
    let snapshot = feed.snapshot().await;
    assert_eq!(snapshot.provenance, "Provider A");
    assert_eq!(sol(&snapshot), dec!(150.5));
    assert_eq!(snapshot.change_percent[&Symbol::new("SOL")], dec!(2.1));
    // Missing change on real data reads as zero.
    assert_eq!(snapshot.change_percent[&Symbol::new("BONK")], Decimal::ZERO);
    assert!(!snapshot.is_refreshing);
}

#[tokio::test]
async fn test_falls_back_through_endpoints_then_providers() {
    let mut a = source("Provider A", &["a1", "a2"], CredentialRequirement::ApiKey, true);
    a.expect_fetch_quotes()
        .times(2)
        .returning(|_, _| Err(ProviderError::Transport("connection refused".to_string())));
    let mut b = source("Provider B", &["b1"], CredentialRequirement::None, true);
    b.expect_fetch_quotes()
        .times(1)
        .returning(|_, _| Ok(batch(dec!(201.25), dec!(0.00003))));

    let feed = feed(vec![Arc::new(a), Arc::new(b)], settings(24, 24));
    let report = feed.refresh().await;

    assert_eq!(
        report,
        RefreshReport::Recorded {
            provenance: "Provider B".to_string(),
            attempts: 3,
        }
    );
    assert_eq!(sol(&feed.snapshot().await), dec!(201.25));
}

#[tokio::test]
async fn test_non_positive_price_falls_through_to_next_provider() {
    let mut a = source("Provider A", &["a1"], CredentialRequirement::ApiKey, true);
    a.expect_fetch_quotes()
        .times(1)
        .returning(|_, _| Ok(batch(Decimal::ZERO, dec!(0.00002))));
    let mut b = source("Provider B", &["b1"], CredentialRequirement::None, true);
    b.expect_fetch_quotes()
        .times(1)
        .returning(|_, _| Ok(batch(dec!(199), dec!(0.00002))));

    let feed = feed(vec![Arc::new(a), Arc::new(b)], settings(24, 24));
    let report = feed.refresh().await;

    assert_eq!(report.provenance(), Some("Provider B"));
    assert_eq!(sol(&feed.snapshot().await), dec!(199));
}

#[tokio::test]
async fn test_schema_violation_falls_through_before_synthetic() {
    let mut a = source("Provider A", &["a1"], CredentialRequirement::ApiKey, true);
    a.expect_fetch_quotes().times(1).returning(|_, _| {
        Err(ProviderError::SchemaViolation("success=false for SOL".to_string()))
    });
    let mut b = source("Provider B", &["b1"], CredentialRequirement::None, true);
    b.expect_fetch_quotes()
        .times(1)
        .returning(|_, _| Err(ProviderError::Transport("HTTP 429".to_string())));

    let feed = feed(vec![Arc::new(a), Arc::new(b)], settings(24, 24));
    let report = feed.refresh().await;

    assert_eq!(
        report,
        RefreshReport::Recorded {
            provenance: "synthetic".to_string(),
            attempts: 2,
        }
    );
}

#[tokio::test]
async fn test_missing_credential_skips_provider_without_request() {
    let mut a = source("Provider A", &["a1", "a2"], CredentialRequirement::ApiKey, false);
    a.expect_fetch_quotes().never();
    let mut b = source("Provider B", &["b1"], CredentialRequirement::None, true);
    b.expect_fetch_quotes()
        .times(1)
        .returning(|_, _| Ok(batch(dec!(200.5), dec!(0.00003))));

    let feed = feed(vec![Arc::new(a), Arc::new(b)], settings(24, 24));
    let report = feed.refresh().await;

    assert_eq!(
        report,
        RefreshReport::Recorded {
            provenance: "Provider B".to_string(),
            attempts: 1,
        }
    );
    assert!(!feed.has_live_credentials());
}

#[tokio::test]
async fn test_all_providers_failing_yields_in_band_synthetic() {
    let mut a = source("Provider A", &["a1"], CredentialRequirement::ApiKey, true);
    a.expect_fetch_quotes()
        .returning(|_, _| Err(ProviderError::Transport("timeout".to_string())));
    let mut b = source("Provider B", &["b1"], CredentialRequirement::None, true);
    b.expect_fetch_quotes()
        .returning(|_, _| Err(ProviderError::Transport("timeout".to_string())));

    let feed = feed(vec![Arc::new(a), Arc::new(b)], settings(24, 24));
    for _ in 0..20 {
        feed.refresh().await;
        let snapshot = feed.snapshot().await;
        assert_eq!(snapshot.provenance, "synthetic");
        let price = sol(&snapshot);
        assert!(price >= dec!(195) && price <= dec!(205), "SOL {price} out of band");
        let bonk = snapshot.current[&Symbol::new("BONK")];
        assert!(bonk >= dec!(0.00001) && bonk <= dec!(0.00005), "BONK {bonk} out of band");
    }
}

#[tokio::test]
async fn test_synthetic_after_out_of_band_real_price_reenters_band() {
    let mut a = source("Provider A", &["a1"], CredentialRequirement::ApiKey, true);
    let mut calls = 0;
    a.expect_fetch_quotes().times(2).returning(move |_, _| {
        calls += 1;
        if calls == 1 {
            Ok(batch(dec!(150.5), dec!(0.00002)))
        } else {
            Err(ProviderError::Transport("timeout".to_string()))
        }
    });

    let feed = feed(vec![Arc::new(a)], settings(24, 24));
    assert_eq!(feed.refresh().await.provenance(), Some("Provider A"));
    assert_eq!(feed.refresh().await.provenance(), Some("synthetic"));

    let snapshot = feed.snapshot().await;
    let price = sol(&snapshot);
    assert!(price >= dec!(195) && price <= dec!(198), "SOL {price} did not re-enter at min");
    // Synthetic samples keep the last reported change.
    assert_eq!(snapshot.change_percent[&Symbol::new("SOL")], dec!(2.1));
}

#[tokio::test]
async fn test_cancelled_refresh_clears_refreshing_flag() {
    let slow = SlowSource {
        entered: Arc::new(Notify::new()),
        release: Arc::new(Notify::new()),
    };
    let feed = feed(vec![Arc::new(slow)], settings(24, 24));
    let before = feed.snapshot().await;

    // The slow source is never released, so the refresh is dropped mid-fetch.
    let result = tokio::time::timeout(Duration::from_millis(50), feed.refresh()).await;
    assert!(result.is_err());

    let after = feed.snapshot().await;
    assert!(!after.is_refreshing);
    assert_eq!(after.series, before.series);
    assert_eq!(after.provenance, "synthetic");

    // The refresh lock was released as well.
    assert_eq!(
        feed.try_advance_synthetic().await,
        RefreshReport::Recorded {
            provenance: "synthetic".to_string(),
            attempts: 0,
        }
    );
}

// ---- Rolling Series ----

#[tokio::test]
async fn test_series_length_is_bounded_by_capacity() {
    let mut b = source("Provider B", &["b1"], CredentialRequirement::None, true);
    b.expect_fetch_quotes()
        .returning(|_, _| Ok(batch(dec!(200), dec!(0.00003))));

    let feed = feed(vec![Arc::new(b)], settings(5, 3));
    assert_eq!(feed.snapshot().await.series.len(), 3);

    for n in 1..=6 {
        feed.refresh().await;
        let series = feed.snapshot().await.series;
        assert_eq!(series.len(), (n + 3).min(5));
        assert!(
            series
                .windows(2)
                .all(|w| w[0].timestamp() <= w[1].timestamp()),
            "timestamps out of order"
        );
    }
}

#[tokio::test]
async fn test_seed_history_is_trimmed_to_capacity() {
    let feed = feed(vec![], settings(5, 10_000));
    assert_eq!(feed.snapshot().await.series.len(), 5);
}

#[tokio::test]
async fn test_seed_history_is_synthetic_and_ordered() {
    let feed = feed(vec![], settings(24, 24));
    let snapshot = feed.snapshot().await;

    assert_eq!(snapshot.series.len(), 24);
    assert_eq!(snapshot.provenance, "synthetic");
    assert!(
        snapshot
            .series
            .windows(2)
            .all(|w| w[0].timestamp() < w[1].timestamp())
    );
    assert_eq!(
        snapshot.series.last().map(|s| s.values().clone()),
        Some(snapshot.current.clone())
    );
}

// ---- Teardown ----

/// Source that blocks inside `fetch_quotes` until released.
struct SlowSource {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl QuoteSource for SlowSource {
    fn name(&self) -> String {
        "Slow".to_string()
    }

    fn credential(&self) -> CredentialRequirement {
        CredentialRequirement::None
    }

    fn has_credential(&self) -> bool {
        true
    }

    fn endpoints(&self) -> Vec<String> {
        vec!["slow".to_string()]
    }

    async fn fetch_quotes(&self, _endpoint: &str, _symbols: &[SymbolSpec]) -> ProviderResult {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(batch(dec!(150), dec!(0.00002)))
    }
}

#[tokio::test]
async fn test_result_after_teardown_is_discarded() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let slow = SlowSource {
        entered: Arc::clone(&entered),
        release: Arc::clone(&release),
    };

    let feed = feed(vec![Arc::new(slow)], settings(24, 24));
    let before = feed.snapshot().await;

    let task = tokio::spawn({
        let feed = Arc::clone(&feed);
        async move { feed.refresh().await }
    });

    entered.notified().await;
    feed.teardown().await;
    release.notify_one();

    let report = task.await.unwrap();
    assert_eq!(report, RefreshReport::Discarded);

    let after = feed.snapshot().await;
    assert_eq!(after.series, before.series);
    assert_eq!(after.provenance, "synthetic");
    assert!(!after.is_refreshing);
    assert_eq!(feed.refresh().await, RefreshReport::Discarded);
    assert_eq!(feed.advance_synthetic().await, RefreshReport::Discarded);
}

#[tokio::test]
async fn test_overlapping_tick_is_skipped() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let slow = SlowSource {
        entered: Arc::clone(&entered),
        release: Arc::clone(&release),
    };

    let feed = feed(vec![Arc::new(slow)], settings(24, 24));
    let task = tokio::spawn({
        let feed = Arc::clone(&feed);
        async move { feed.refresh().await }
    });

    entered.notified().await;
    assert!(feed.snapshot().await.is_refreshing);
    assert_eq!(feed.try_refresh().await, RefreshReport::Skipped);
    assert_eq!(feed.try_advance_synthetic().await, RefreshReport::Skipped);

    release.notify_one();
    assert_eq!(task.await.unwrap().provenance(), Some("Slow"));
}

// ---- Session Lifecycle ----

fn fast_schedule() -> ScheduleConfig {
    ScheduleConfig {
        poll_interval: Duration::from_millis(20),
        synthetic_interval: Duration::from_millis(20),
    }
}

#[tokio::test]
async fn test_session_polls_while_connected() {
    let mut a = source("Provider A", &["a1"], CredentialRequirement::ApiKey, true);
    a.expect_fetch_quotes()
        .returning(|_, _| Ok(batch(dec!(200), dec!(0.00003))));

    let feed = feed(vec![Arc::new(a)], settings(50, 2));
    let (_connected_tx, connected_rx) = watch::channel(true);
    let session = FeedSession::start(Arc::clone(&feed), fast_schedule(), connected_rx);
    let trigger = session.trigger();

    tokio::time::sleep(Duration::from_millis(150)).await;
    session.stop().await;

    let snapshot = feed.snapshot().await;
    assert!(snapshot.series.len() >= 3, "no polls recorded");
    assert_eq!(snapshot.provenance, "Provider A");
    assert!(feed.is_torn_down().await);
    assert!(trigger.refresh().await.is_err());
}

#[tokio::test]
async fn test_session_animates_synthetic_without_credentials() {
    let mut b = source("Provider B", &["b1"], CredentialRequirement::None, true);
    b.expect_fetch_quotes().never();

    let feed = feed(vec![Arc::new(b)], settings(50, 2));
    let (_connected_tx, connected_rx) = watch::channel(false);
    let session = FeedSession::start(Arc::clone(&feed), fast_schedule(), connected_rx);

    tokio::time::sleep(Duration::from_millis(150)).await;
    session.stop().await;

    let snapshot = feed.snapshot().await;
    assert!(snapshot.series.len() >= 3, "no synthetic ticks recorded");
    assert_eq!(snapshot.provenance, "synthetic");
}

#[tokio::test]
async fn test_session_pauses_then_resumes_on_connect() {
    let mut a = source("Provider A", &["a1"], CredentialRequirement::ApiKey, true);
    a.expect_fetch_quotes()
        .returning(|_, _| Ok(batch(dec!(202), dec!(0.00003))));

    let feed = feed(vec![Arc::new(a)], settings(50, 2));
    let (connected_tx, connected_rx) = watch::channel(false);
    let session = FeedSession::start(Arc::clone(&feed), fast_schedule(), connected_rx);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(feed.snapshot().await.series.len(), 2, "paused session ticked");

    connected_tx.send_replace(true);
    tokio::time::sleep(Duration::from_millis(100)).await;
    session.stop().await;

    let snapshot = feed.snapshot().await;
    assert!(snapshot.series.len() > 2);
    assert_eq!(snapshot.provenance, "Provider A");
}

#[tokio::test]
async fn test_manual_refresh_through_trigger() {
    let mut a = source("Provider A", &["a1"], CredentialRequirement::ApiKey, true);
    a.expect_fetch_quotes()
        .returning(|_, _| Err(ProviderError::Transport("HTTP 503".to_string())));
    let mut b = source("Provider B", &["b1"], CredentialRequirement::None, true);
    b.expect_fetch_quotes()
        .returning(|_, _| Ok(batch(dec!(203), dec!(0.00003))));

    let feed = feed(vec![Arc::new(a), Arc::new(b)], settings(24, 24));
    // Disconnected with a live key: paused, so only the manual refresh runs.
    let (_connected_tx, connected_rx) = watch::channel(false);
    let session = FeedSession::start(Arc::clone(&feed), fast_schedule(), connected_rx);

    let report = session.trigger().refresh().await.unwrap();
    assert_eq!(
        report,
        RefreshReport::Recorded {
            provenance: "Provider B".to_string(),
            attempts: 2,
        }
    );
    assert_eq!(sol(&feed.snapshot().await), dec!(203));

    session.stop().await;
}
