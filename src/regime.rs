// =============================================================================
// Market Regime Classification
// =============================================================================
//
// Classifies each bar into one of three coarse regimes from volatility,
// sentiment magnitude, and order-flow toxicity.  The label is recomputed on
// every bar and never persisted.
//
// Rule order (first match wins):
//
//   1. HIGH_VOL — volatility > 3 %
//   2. TREND    — |sentiment| > 0.5 (strong conviction either way)
//   3. RANGE    — toxicity > 0.3 (informed flow, adverse-selection risk)
//   4. default  — TREND

use serde::{Deserialize, Serialize};

/// Coarse market-condition label gating which decision policy applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Regime {
    Trend,
    Range,
    HighVol,
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trend => write!(f, "trend"),
            Self::Range => write!(f, "range"),
            Self::HighVol => write!(f, "high_vol"),
        }
    }
}

/// Volatility above which the market counts as high-vol (3 %).
const HIGH_VOL_THRESHOLD: f64 = 0.03;
/// Sentiment magnitude above which conviction implies a trend.
const SENTIMENT_TREND_THRESHOLD: f64 = 0.5;
/// Toxicity above which informed flow implies ranging conditions.
const TOXICITY_RANGE_THRESHOLD: f64 = 0.3;

/// Classify the current bar's regime.
pub fn classify(volatility: f64, sentiment: f64, toxicity: f64) -> Regime {
    if volatility > HIGH_VOL_THRESHOLD {
        return Regime::HighVol;
    }
    if sentiment.abs() > SENTIMENT_TREND_THRESHOLD {
        return Regime::Trend;
    }
    if toxicity > TOXICITY_RANGE_THRESHOLD {
        return Regime::Range;
    }
    Regime::Trend
}
