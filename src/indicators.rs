// =============================================================================
// Technical indicator helpers
// =============================================================================
//
// Pure, side-effect-free latest-value calculations used by the mean-reversion
// overlay and the feature extractor.  Every public function returns
// `Option<T>` so callers are forced to handle insufficient-data and numerical
// edge cases.
//
// RSI uses Wilder's smoothing:
//   avg_gain = (prev_avg_gain * (period - 1) + current_gain) / period
//   RS  = avg_gain / avg_loss
//   RSI = 100 - 100 / (1 + RS)
//
// Bollinger: middle = SMA(period), upper/lower = middle ± num_std * σ.

/// Simple moving average over the last `period` values.
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Latest RSI value for `closes` using Wilder's smoothing.
///
/// # Edge cases
/// - Fewer than `period + 1` closes => `None`.
/// - Flat market (no gains, no losses) => 50.0.
/// - Only gains => 100.0; only losses => 0.0.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let period_f = period as f64;

    // Seed averages with the SMA of the first `period` deltas.
    let (mut avg_gain, mut avg_loss) =
        deltas[..period].iter().fold((0.0_f64, 0.0_f64), |(g, l), &d| {
            if d > 0.0 {
                (g + d, l)
            } else {
                (g, l + d.abs())
            }
        });
    avg_gain /= period_f;
    avg_loss /= period_f;

    // Wilder's smoothing over the remaining deltas.
    for &delta in &deltas[period..] {
        let gain = if delta > 0.0 { delta } else { 0.0 };
        let loss = if delta < 0.0 { delta.abs() } else { 0.0 };
        avg_gain = (avg_gain * (period_f - 1.0) + gain) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss) / period_f;
    }

    let value = if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    };

    value.is_finite().then_some(value)
}

/// Bollinger Band snapshot for the most recent `period` closes.
#[derive(Debug, Clone)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Latest Bollinger Bands (`middle = SMA`, `upper/lower = middle ± num_std·σ`).
///
/// Returns `None` when there are fewer than `period` closes or the middle
/// band is degenerate (zero).
pub fn bollinger(closes: &[f64], period: usize, num_std: f64) -> Option<BollingerBands> {
    if period == 0 || closes.len() < period {
        return None;
    }

    let window = &closes[closes.len() - period..];
    let middle = window.iter().sum::<f64>() / period as f64;
    if middle == 0.0 {
        return None;
    }

    let variance = window.iter().map(|x| (x - middle).powi(2)).sum::<f64>() / period as f64;
    let std_dev = variance.sqrt();

    let bands = BollingerBands {
        upper: middle + num_std * std_dev,
        middle,
        lower: middle - num_std * std_dev,
    };

    bands.upper.is_finite().then_some(bands)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_basic() {
        let values = vec![1.0, 2.0, 3.0, 4.0];
        assert!((sma(&values, 2).unwrap() - 3.5).abs() < 1e-10);
        assert!((sma(&values, 4).unwrap() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn sma_insufficient_data() {
        assert!(sma(&[1.0], 2).is_none());
        assert!(sma(&[1.0, 2.0], 0).is_none());
    }

    #[test]
    fn rsi_all_gains_is_100() {
        let closes: Vec<f64> = (1..=30).map(|x| x as f64).collect();
        let value = rsi(&closes, 14).unwrap();
        assert!((value - 100.0).abs() < 1e-10, "expected 100.0, got {value}");
    }

    #[test]
    fn rsi_all_losses_is_0() {
        let closes: Vec<f64> = (1..=30).rev().map(|x| x as f64).collect();
        let value = rsi(&closes, 14).unwrap();
        assert!(value.abs() < 1e-10, "expected 0.0, got {value}");
    }

    #[test]
    fn rsi_flat_market_is_neutral() {
        let closes = vec![100.0; 30];
        let value = rsi(&closes, 14).unwrap();
        assert!((value - 50.0).abs() < 1e-10);
    }

    #[test]
    fn rsi_insufficient_data() {
        let closes: Vec<f64> = (1..=14).map(|x| x as f64).collect();
        assert!(rsi(&closes, 14).is_none());
        assert!(rsi(&[], 14).is_none());
    }

    #[test]
    fn rsi_range_check() {
        let closes = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08, 45.89, 46.03,
            44.18, 44.22, 44.57, 43.42, 42.66, 43.13,
        ];
        let value = rsi(&closes, 14).unwrap();
        assert!((0.0..=100.0).contains(&value), "RSI {value} out of range");
    }

    #[test]
    fn bollinger_basic() {
        let closes: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        let bands = bollinger(&closes, 20, 2.0).unwrap();
        assert!(bands.upper > bands.middle);
        assert!(bands.lower < bands.middle);
        assert!((bands.middle - 10.5).abs() < 1e-10);
    }

    #[test]
    fn bollinger_flat_collapses_to_middle() {
        let closes = vec![100.0; 20];
        let bands = bollinger(&closes, 20, 2.0).unwrap();
        assert!((bands.upper - 100.0).abs() < 1e-10);
        assert!((bands.lower - 100.0).abs() < 1e-10);
    }

    #[test]
    fn bollinger_insufficient_data() {
        assert!(bollinger(&[1.0, 2.0, 3.0], 20, 2.0).is_none());
    }
}
