//! Feed state owned by a single dashboard session.
//!
//! `FeedState` is mutated only by the feed's refresh cycle. Readers get a
//! `FeedSnapshot`, an owned copy that never aliases the live state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::sample::PriceSample;
use super::series::RollingSeries;
use super::symbol::Symbol;

/// Which source produced the current sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    /// A named external provider.
    Provider(String),
    /// Synthetic continuation or seed data.
    Synthetic,
}

impl Provenance {
    pub fn label(&self) -> &str {
        match self {
            Self::Provider(name) => name,
            Self::Synthetic => "synthetic",
        }
    }
}

/// Mutable per-session feed state.
#[derive(Debug)]
pub struct FeedState {
    series: RollingSeries,
    current: BTreeMap<Symbol, Decimal>,
    change_percent: BTreeMap<Symbol, Decimal>,
    provenance: Provenance,
    last_updated: DateTime<Utc>,
    torn_down: bool,
}

impl FeedState {
    /// Build the initial state from seed history.
    ///
    /// Current prices come from the newest seed sample, change percents
    /// start at zero and provenance is synthetic.
    pub fn seeded(capacity: usize, seed: Vec<PriceSample>, now: DateTime<Utc>) -> Self {
        let mut series = RollingSeries::new(capacity);
        for sample in seed {
            series.push(sample);
        }

        let current = series
            .latest()
            .map(|s| s.values().clone())
            .unwrap_or_default();
        let change_percent = current.keys().map(|k| (k.clone(), Decimal::ZERO)).collect();

        Self {
            series,
            current,
            change_percent,
            provenance: Provenance::Synthetic,
            last_updated: now,
            torn_down: false,
        }
    }

    /// Record a new sample and its provenance.
    ///
    /// Change percents are replaced only for the symbols in `changes`;
    /// the others keep their prior value. `last_updated` follows the
    /// series tail, so a re-stamped sample never moves it backwards.
    pub fn record(
        &mut self,
        sample: PriceSample,
        changes: BTreeMap<Symbol, Decimal>,
        provenance: Provenance,
    ) {
        self.current = sample.values().clone();
        self.change_percent.extend(changes);
        self.provenance = provenance;
        self.series.push(sample);
        if let Some(tail) = self.series.latest() {
            self.last_updated = tail.timestamp();
        }
    }

    pub fn series(&self) -> &RollingSeries {
        &self.series
    }

    pub fn latest(&self) -> Option<&PriceSample> {
        self.series.latest()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Mark the state as discarded. Irreversible.
    pub fn tear_down(&mut self) {
        self.torn_down = true;
    }

    /// Owned read-only copy for the rendering layer.
    ///
    /// Whether a refresh is in flight is tracked by the feed, not here.
    pub fn snapshot(&self, is_refreshing: bool) -> FeedSnapshot {
        FeedSnapshot {
            series: self.series.to_vec(),
            current: self.current.clone(),
            change_percent: self.change_percent.clone(),
            provenance: self.provenance.label().to_string(),
            last_updated: self.last_updated,
            is_refreshing,
        }
    }
}

/// Read-only view handed to consumers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSnapshot {
    pub series: Vec<PriceSample>,
    pub current: BTreeMap<Symbol, Decimal>,
    pub change_percent: BTreeMap<Symbol, Decimal>,
    pub provenance: String,
    pub last_updated: DateTime<Utc>,
    pub is_refreshing: bool,
}
