//! Fixed-capacity rolling price history.
//!
//! Append-only at the tail, FIFO eviction at the head. Because samples
//! only ever enter at the tail, insertion order is chronological order.

use std::collections::VecDeque;

use serde::{Serialize, Serializer};

use super::sample::PriceSample;

/// Bounded FIFO of price samples, oldest first.
#[derive(Debug, Clone)]
pub struct RollingSeries {
    samples: VecDeque<PriceSample>,
    capacity: usize,
}

impl RollingSeries {
    /// Create an empty series holding at most `capacity` samples.
    ///
    /// A zero capacity is raised to 1 so the latest sample is always kept.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest one when full.
    ///
    /// A sample stamped earlier than the current tail is re-stamped with
    /// the tail's timestamp, keeping the series non-decreasing in time.
    /// Returns the evicted sample, if any.
    pub fn push(&mut self, sample: PriceSample) -> Option<PriceSample> {
        let sample = match self.samples.back() {
            Some(last) if sample.timestamp() < last.timestamp() => {
                let ts = last.timestamp();
                sample.with_timestamp(ts)
            }
            _ => sample,
        };

        let evicted = if self.samples.len() >= self.capacity {
            self.samples.pop_front()
        } else {
            None
        };
        self.samples.push_back(sample);
        evicted
    }

    /// Most recent sample.
    pub fn latest(&self) -> Option<&PriceSample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Owned copy of the samples for snapshots.
    pub fn to_vec(&self) -> Vec<PriceSample> {
        self.samples.iter().cloned().collect()
    }
}

impl Serialize for RollingSeries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.samples.iter())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::symbol::Symbol;

    fn sample_at(secs: i64, sol: rust_decimal::Decimal) -> PriceSample {
        let mut values = BTreeMap::new();
        values.insert(Symbol::new("SOL"), sol);
        PriceSample::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs), values)
    }

    #[test]
    fn test_push_below_capacity_keeps_everything() {
        let mut series = RollingSeries::new(3);
        assert!(series.push(sample_at(0, dec!(1))).is_none());
        assert!(series.push(sample_at(1, dec!(2))).is_none());
        assert_eq!(series.len(), 2);
        assert_eq!(series.latest().unwrap().price(&Symbol::new("SOL")), Some(dec!(2)));
    }

    #[test]
    fn test_push_at_capacity_evicts_oldest() {
        let mut series = RollingSeries::new(2);
        series.push(sample_at(0, dec!(1)));
        series.push(sample_at(1, dec!(2)));
        let evicted = series.push(sample_at(2, dec!(3))).unwrap();

        assert_eq!(evicted.price(&Symbol::new("SOL")), Some(dec!(1)));
        assert_eq!(series.len(), 2);
        let sol = Symbol::new("SOL");
        let history: Vec<_> = series.to_vec().iter().filter_map(|s| s.price(&sol)).collect();
        assert_eq!(history, vec![dec!(2), dec!(3)]);
    }

    #[test]
    fn test_clock_step_back_is_clamped_to_tail() {
        let mut series = RollingSeries::new(4);
        series.push(sample_at(10, dec!(1)));
        series.push(sample_at(5, dec!(2)));

        let stamps: Vec<_> = series.to_vec().iter().map(PriceSample::timestamp).collect();
        assert_eq!(stamps[0], stamps[1]);
    }

    #[test]
    fn test_zero_capacity_keeps_latest() {
        let mut series = RollingSeries::new(0);
        series.push(sample_at(0, dec!(1)));
        series.push(sample_at(1, dec!(2)));
        assert_eq!(series.len(), 1);
        assert_eq!(series.latest().unwrap().price(&Symbol::new("SOL")), Some(dec!(2)));
    }
}
