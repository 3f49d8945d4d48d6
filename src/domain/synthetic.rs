//! Synthetic price generation.
//!
//! Used to seed the rolling history at session start and to continue
//! it when no provider is usable. Values follow a bounded random walk
//! that is clamped into a per-symbol band and rounded to the symbol's
//! display precision, so they are always plausible and strictly positive.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::Deserialize;

use super::sample::PriceSample;
use super::symbol::SymbolSpec;

/// Band and wave shape for one symbol's synthetic prices.
#[derive(Debug, Clone, Deserialize)]
pub struct SyntheticProfile {
    /// Center of the seed wave.
    pub base: Decimal,
    /// Lowest price ever produced. Must be strictly positive.
    pub min: Decimal,
    /// Highest price ever produced.
    pub max: Decimal,
    /// Largest per-tick move in either direction.
    pub max_step: Decimal,
    /// Seed wave amplitude.
    #[serde(default)]
    pub amplitude: Decimal,
    /// Seed wave angular step per sample.
    #[serde(default = "default_frequency")]
    pub frequency: f64,
    /// Seed noise half-width.
    #[serde(default)]
    pub noise: Decimal,
    /// Decimal places kept on every synthetic price.
    #[serde(default = "default_decimals")]
    pub decimals: u32,
}

fn default_frequency() -> f64 {
    0.2
}

fn default_decimals() -> u32 {
    2
}

impl SyntheticProfile {
    /// Seed value for the `i`-th sample counted back from now.
    fn seed_value(&self, i: usize, rng: &mut StdRng) -> Decimal {
        let base = to_f64(self.base);
        let amplitude = to_f64(self.amplitude);
        let noise = to_f64(self.noise);

        #[allow(clippy::cast_precision_loss)]
        let wave = (i as f64 * self.frequency).sin() * amplitude;
        let jitter = rng.gen_range(-1.0..=1.0) * noise;

        self.settle(base + wave + jitter)
    }

    /// Next value of the bounded walk starting at `prev`.
    ///
    /// A step that leaves the band re-enters it from the crossed edge,
    /// at most two steps deep.
    fn next_value(&self, prev: Decimal, rng: &mut StdRng) -> Decimal {
        let max_step = to_f64(self.max_step);
        let min = to_f64(self.min);
        let max = to_f64(self.max);

        let mut value = to_f64(prev) + rng.gen_range(-1.0..=1.0) * max_step;
        if value < min {
            value = min + rng.gen_range(0.0..=1.0) * 2.0 * max_step;
        } else if value > max {
            value = max - rng.gen_range(0.0..=1.0) * 2.0 * max_step;
        }

        self.settle(value)
    }

    /// Round to the display precision and clamp into `[min, max]`.
    fn settle(&self, value: f64) -> Decimal {
        let value = Decimal::from_f64(value).unwrap_or(self.base);
        value.round_dp(self.decimals).max(self.min).min(self.max)
    }

    /// Whether `price` lies inside the band.
    pub fn contains(&self, price: Decimal) -> bool {
        price >= self.min && price <= self.max
    }
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

/// Pseudo-random source of synthetic samples.
///
/// A fixed seed makes the output reproducible.
#[derive(Debug)]
pub struct SyntheticGenerator {
    rng: StdRng,
}

impl SyntheticGenerator {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    /// Generate `len` samples spaced `spacing` apart, the last one at `end`.
    ///
    /// Samples whose timestamp would fall outside chrono's range are
    /// left out, so the result may be shorter than `len`.
    pub fn seed_history(
        &mut self,
        specs: &[SymbolSpec],
        len: usize,
        end: DateTime<Utc>,
        spacing: Duration,
    ) -> Vec<PriceSample> {
        (0..len)
            .rev()
            .filter_map(|i| {
                let offset = i32::try_from(i).ok()?;
                let timestamp = end.checked_sub_signed(spacing.checked_mul(offset)?)?;
                let values = specs
                    .iter()
                    .map(|spec| (spec.symbol.clone(), spec.synthetic.seed_value(i, &mut self.rng)))
                    .collect();
                Some(PriceSample::new(timestamp, values))
            })
            .collect()
    }

    /// Continue from `last`, perturbing each symbol within its band.
    ///
    /// Symbols absent from `last` restart from their profile's base.
    pub fn continue_from(
        &mut self,
        specs: &[SymbolSpec],
        last: Option<&PriceSample>,
        timestamp: DateTime<Utc>,
    ) -> PriceSample {
        let values: BTreeMap<_, _> = specs
            .iter()
            .map(|spec| {
                let prev = last
                    .and_then(|s| s.price(&spec.symbol))
                    .unwrap_or(spec.synthetic.base);
                (spec.symbol.clone(), spec.synthetic.next_value(prev, &mut self.rng))
            })
            .collect();
        PriceSample::new(timestamp, values)
    }
}
