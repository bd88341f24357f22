// =============================================================================
// Order-Flow Toxicity Estimator — volume-synchronized informed-trading proxy
// =============================================================================
//
// Streams (price, volume) pairs and estimates how one-sided recent order flow
// has been.  Volume is attributed to the buy/sell side probabilistically via
// bulk volume classification:
//
//   z          = Δprice / σ(Δprice)
//   buy_volume = volume · Φ(z)          (Φ = standard normal CDF)
//
// Classified volume accumulates into fixed-size buckets; when the running
// total reaches `bucket_volume` the bucket is closed proportionally so that
// every closed bucket holds exactly `bucket_volume` and overshoot carries
// into the next bucket.  The toxicity value over the sliding window of the
// last `n_buckets` closed buckets is
//
//   Σ|sell − buy| / Σ(buy + sell)   ∈ [0, 1]
//
// Cold start returns 0.0 ("no signal") until the window is full.

use std::collections::VecDeque;

use tracing::debug;

use crate::types::ToxicityLevel;

/// Rolling window of price changes used for the σ estimate.
const PRICE_STD_WINDOW: usize = 100;
/// Observations required before the σ estimate is trusted.
const MIN_STD_OBSERVATIONS: usize = 10;
/// σ used before the estimate is trusted, and when it degenerates to zero.
const STD_FALLBACK: f64 = 0.01;

/// Standard normal CDF approximation (Abramowitz-Stegun), ~4dp accuracy.
fn normal_cdf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let z = x.abs() / std::f64::consts::SQRT_2;

    let t = 1.0 / (1.0 + p * z);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-z * z).exp();

    0.5 * (1.0 + sign * y)
}

/// Streaming order-flow toxicity estimator for a single instrument.
pub struct OrderFlowToxicity {
    bucket_volume: f64,
    n_buckets: usize,

    current_buy: f64,
    current_sell: f64,
    current_total: f64,
    /// Closed (buy_volume, sell_volume) buckets, oldest first.
    buckets: VecDeque<(f64, f64)>,

    price_changes: VecDeque<f64>,
    price_std: f64,
    last_price: Option<f64>,
}

impl OrderFlowToxicity {
    pub fn new(bucket_volume: f64, n_buckets: usize) -> Self {
        Self {
            bucket_volume,
            n_buckets,
            current_buy: 0.0,
            current_sell: 0.0,
            current_total: 0.0,
            buckets: VecDeque::with_capacity(n_buckets + 1),
            price_changes: VecDeque::with_capacity(PRICE_STD_WINDOW),
            price_std: STD_FALLBACK,
            last_price: None,
        }
    }

    /// Feed one (price, volume) observation.
    ///
    /// The very first call only records the price — there is no prior price
    /// to diff against, so no volume is classified.
    pub fn update(&mut self, price: f64, volume: f64) {
        let last = match self.last_price {
            Some(p) => p,
            None => {
                self.last_price = Some(price);
                return;
            }
        };

        let price_change = price - last;
        self.update_price_std(price_change);

        let (buy_vol, sell_vol) = self.classify_volume(price_change, volume);

        self.current_buy += buy_vol;
        self.current_sell += sell_vol;
        self.current_total += volume;

        // Close buckets while the accumulated total covers one.  Overshoot is
        // split proportionally so every closed bucket holds exactly
        // `bucket_volume` and the remainder seeds the next bucket.
        while self.current_total >= self.bucket_volume {
            let ratio = if self.current_total > 0.0 {
                self.bucket_volume / self.current_total
            } else {
                1.0
            };

            let finalized_buy = self.current_buy * ratio;
            let finalized_sell = self.current_sell * ratio;

            self.buckets.push_back((finalized_buy, finalized_sell));
            if self.buckets.len() > self.n_buckets {
                self.buckets.pop_front();
            }

            debug!(
                buy = format!("{finalized_buy:.2}"),
                sell = format!("{finalized_sell:.2}"),
                closed = self.buckets.len(),
                "toxicity bucket closed"
            );

            self.current_buy *= 1.0 - ratio;
            self.current_sell *= 1.0 - ratio;
            self.current_total -= self.bucket_volume;
        }

        self.last_price = Some(price);
    }

    /// Probabilistic buy/sell attribution of `volume` for one price change.
    fn classify_volume(&self, price_change: f64, volume: f64) -> (f64, f64) {
        if self.price_std <= 0.0 {
            return (volume * 0.5, volume * 0.5);
        }

        let z = price_change / self.price_std;
        let buy_fraction = normal_cdf(z);
        let buy_vol = volume * buy_fraction;
        (buy_vol, volume - buy_vol)
    }

    /// Maintain the rolling σ of price changes.
    fn update_price_std(&mut self, price_change: f64) {
        self.price_changes.push_back(price_change);
        while self.price_changes.len() > PRICE_STD_WINDOW {
            self.price_changes.pop_front();
        }

        if self.price_changes.len() < MIN_STD_OBSERVATIONS {
            return;
        }

        let n = self.price_changes.len() as f64;
        let mean = self.price_changes.iter().sum::<f64>() / n;
        let var = self
            .price_changes
            .iter()
            .map(|c| (c - mean).powi(2))
            .sum::<f64>()
            / n;
        let std = var.sqrt();

        self.price_std = if std > 0.0 { std } else { STD_FALLBACK };
    }

    /// Current toxicity value in [0, 1].
    ///
    /// Returns 0.0 until the sliding window holds `n_buckets` closed buckets.
    pub fn calculate(&self) -> f64 {
        if self.buckets.len() < self.n_buckets {
            return 0.0;
        }

        let imbalance: f64 = self
            .buckets
            .iter()
            .map(|(buy, sell)| (sell - buy).abs())
            .sum();
        let total: f64 = self.buckets.iter().map(|(buy, sell)| buy + sell).sum();

        if total > 0.0 {
            imbalance / total
        } else {
            0.0
        }
    }

    /// Band the current value: HIGH at `threshold`, MEDIUM at 0.6·threshold.
    pub fn toxicity_signal(&self, threshold: f64) -> ToxicityLevel {
        let value = self.calculate();
        if value >= threshold {
            ToxicityLevel::High
        } else if value >= threshold * 0.6 {
            ToxicityLevel::Medium
        } else {
            ToxicityLevel::Low
        }
    }

    /// Number of closed buckets currently in the window.
    pub fn closed_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Classified volume sitting in the open (unclosed) bucket.
    pub fn open_volume(&self) -> (f64, f64) {
        (self.current_buy, self.current_sell)
    }

    /// Clear all buckets, the open accumulation, the price-change buffer, and
    /// the last price.  Used when switching instruments or sessions.
    pub fn reset(&mut self) {
        self.buckets.clear();
        self.current_buy = 0.0;
        self.current_sell = 0.0;
        self.current_total = 0.0;
        self.price_changes.clear();
        self.price_std = STD_FALLBACK;
        self.last_price = None;
    }
}
