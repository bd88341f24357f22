// =============================================================================
// Feature extraction — log return, Garman-Klass volatility, formulaic alpha
// =============================================================================
//
// Garman-Klass single-bar variance:
//   σ² = 0.5 · ln(H/L)² − (2·ln2 − 1) · ln(C/O)²
// smoothed by a rolling mean over `GK_WINDOW` bars, then square-rooted.
//
// Formulaic alpha is the relative deviation from the SMA, optionally scaled
// by a log-compressed sentiment factor: sign(s) · ln(1 + |s|).
//
// The 5-dim state vector fed to decision policies is
//   [log_return, gk_volatility, alpha, sentiment, inventory]
// with a zero-vector fallback while the bar history is still warming up.

use crate::indicators::sma;
use crate::types::Bar;

/// Dimensionality of the per-bar state vector.
pub const STATE_DIM: usize = 5;
/// Bars required before the state vector carries real values.
pub const MIN_FEATURE_BARS: usize = 25;
/// Length of the model input sequence.
pub const SEQ_LEN: usize = 20;
/// Features per sequence step.
pub const SEQ_FEATURES: usize = 5;

/// Rolling window for Garman-Klass smoothing.
const GK_WINDOW: usize = 20;
/// SMA window for the formulaic alpha.
const ALPHA_SMA_WINDOW: usize = 20;
/// Volatility used until a real estimate exists, and floor for degenerate ones.
pub const VOLATILITY_FALLBACK: f64 = 0.01;

/// Replace NaN/±inf with 0.0.
fn scrub(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Per-bar log returns, oldest-first.  The first entry is 0.0 (no prior bar).
pub fn log_return_series(closes: &[f64]) -> Vec<f64> {
    let mut series = Vec::with_capacity(closes.len());
    for (i, &close) in closes.iter().enumerate() {
        if i == 0 {
            series.push(0.0);
        } else {
            let prev = closes[i - 1];
            let r = if prev > 0.0 && close > 0.0 {
                (close / prev).ln()
            } else {
                0.0
            };
            series.push(scrub(r));
        }
    }
    series
}

/// Per-bar Garman-Klass volatility, rolling-mean smoothed.
///
/// Entries before a full smoothing window use `VOLATILITY_FALLBACK`.
pub fn garman_klass_series(bars: &[Bar], window: usize) -> Vec<f64> {
    let two_ln2_minus_1 = 2.0 * std::f64::consts::LN_2 - 1.0;

    let variances: Vec<f64> = bars
        .iter()
        .map(|b| {
            if b.low <= 0.0 || b.open <= 0.0 {
                return 0.0;
            }
            let log_hl = (b.high / b.low).ln();
            let log_co = (b.close / b.open).ln();
            scrub(0.5 * log_hl * log_hl - two_ln2_minus_1 * log_co * log_co)
        })
        .collect();

    let mut series = Vec::with_capacity(bars.len());
    for i in 0..variances.len() {
        if window == 0 || i + 1 < window {
            series.push(VOLATILITY_FALLBACK);
            continue;
        }
        let mean = variances[i + 1 - window..=i].iter().sum::<f64>() / window as f64;
        series.push(if mean > 0.0 { mean.sqrt() } else { 0.0 });
    }
    series
}

/// Latest smoothed Garman-Klass volatility, `None` until a full window exists.
pub fn latest_volatility(bars: &[Bar]) -> Option<f64> {
    if bars.len() < GK_WINDOW {
        return None;
    }
    garman_klass_series(bars, GK_WINDOW).last().copied()
}

/// Per-bar formulaic alpha: (close − SMA) / SMA.  Entries before a full SMA
/// window are 0.0.
pub fn alpha_series(closes: &[f64]) -> Vec<f64> {
    let mut series = Vec::with_capacity(closes.len());
    for i in 0..closes.len() {
        if i + 1 < ALPHA_SMA_WINDOW {
            series.push(0.0);
            continue;
        }
        match sma(&closes[..=i], ALPHA_SMA_WINDOW) {
            Some(mean) if mean != 0.0 => series.push(scrub((closes[i] - mean) / mean)),
            _ => series.push(0.0),
        }
    }
    series
}

/// Alpha scaled by a log-compressed sentiment factor:
/// `alpha · sign(s) · ln(1 + |s|)`.
pub fn sentiment_alpha(alpha: f64, sentiment: f64) -> f64 {
    scrub(alpha * sentiment.signum() * sentiment.abs().ln_1p())
}

/// Build the 5-dim state vector for the latest bar.
///
/// Returns all zeros while the history holds fewer than `MIN_FEATURE_BARS`
/// bars (cold-start convention: no signal rather than a noisy one).
pub fn state_vector(bars: &[Bar], sentiment: f64, inventory: f64) -> [f64; STATE_DIM] {
    if bars.len() < MIN_FEATURE_BARS {
        return [0.0; STATE_DIM];
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

    let log_ret = log_return_series(&closes).last().copied().unwrap_or(0.0);
    let gk_vol = garman_klass_series(bars, GK_WINDOW)
        .last()
        .copied()
        .unwrap_or(VOLATILITY_FALLBACK);
    let alpha = alpha_series(&closes).last().copied().unwrap_or(0.0);

    [
        scrub(log_ret),
        scrub(gk_vol),
        scrub(alpha),
        scrub(sentiment),
        scrub(inventory),
    ]
}

/// Build the `[SEQ_LEN][SEQ_FEATURES]` model input sequence from the most
/// recent bars: `[log_return, gk_volatility, alpha, price_z, volume_z]`.
///
/// Price and volume columns are z-normalized over the window (ε = 1e-8 guards
/// zero variance).  Returns `None` when fewer than `SEQ_LEN` bars exist.
pub fn build_sequence(bars: &[Bar]) -> Option<Vec<[f64; SEQ_FEATURES]>> {
    if bars.len() < SEQ_LEN {
        return None;
    }

    let recent = &bars[bars.len() - SEQ_LEN..];
    let closes: Vec<f64> = recent.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = recent.iter().map(|b| b.volume).collect();

    let log_returns = log_return_series(&closes);
    let gk_vols = garman_klass_series(recent, GK_WINDOW);
    let alphas = alpha_series(&closes);

    let z_normalize = |values: &[f64]| -> Vec<f64> {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt() + 1e-8;
        values.iter().map(|v| scrub((v - mean) / std)).collect()
    };

    let price_z = z_normalize(&closes);
    let volume_z = z_normalize(&volumes);

    let sequence = (0..SEQ_LEN)
        .map(|i| {
            [
                scrub(log_returns[i]),
                scrub(gk_vols[i]),
                scrub(alphas[i]),
                price_z[i],
                volume_z[i],
            ]
        })
        .collect();

    Some(sequence)
}
