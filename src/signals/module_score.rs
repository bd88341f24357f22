// =============================================================================
// Module-score contract — the uniform opinion record every producer emits
// =============================================================================
//
// Pattern detectors, technical modules, risk filters, and model adapters all
// speak the same shape: a direction in {-1, 0, +1}, a confidence in [0, 1],
// and a human-readable reason.  A signal of 0 means the module abstains; it
// must never be used to force a direction.

use serde::{Deserialize, Serialize};

use crate::types::Bar;

/// Directional opinion of a single module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    Sell,
    Neutral,
    Buy,
}

impl Signal {
    /// Numeric signal value: BUY = +1, NEUTRAL = 0, SELL = -1.
    pub fn value(self) -> i32 {
        match self {
            Self::Sell => -1,
            Self::Neutral => 0,
            Self::Buy => 1,
        }
    }

    pub fn from_value(value: i32) -> Self {
        match value {
            v if v > 0 => Self::Buy,
            v if v < 0 => Self::Sell,
            _ => Self::Neutral,
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sell => write!(f, "SELL"),
            Self::Neutral => write!(f, "NEUTRAL"),
            Self::Buy => write!(f, "BUY"),
        }
    }
}

/// The opinion record emitted by any module-score producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleScore {
    pub signal: Signal,
    /// Confidence in the opinion, [0, 1].
    pub confidence: f64,
    /// Human-readable explanation of the opinion.
    pub reason: String,
}

impl ModuleScore {
    pub fn new(signal: Signal, confidence: f64, reason: impl Into<String>) -> Self {
        Self {
            signal,
            confidence: confidence.clamp(0.0, 1.0),
            reason: reason.into(),
        }
    }

    /// An abstaining opinion.
    pub fn neutral(reason: impl Into<String>) -> Self {
        Self::new(Signal::Neutral, 0.0, reason)
    }
}

/// Closed interface for opinion producers.
///
/// Producers are stateless across calls (or manage their own history
/// internally); the orchestrator invokes them fresh on every bar.
pub trait ScoreProducer: Send {
    /// Stable module name used to look up the preset weight.
    fn name(&self) -> &str;

    /// Produce an opinion for the current bar history (oldest-first).
    fn analyze(&self, bars: &[Bar]) -> ModuleScore;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_values() {
        assert_eq!(Signal::Buy.value(), 1);
        assert_eq!(Signal::Sell.value(), -1);
        assert_eq!(Signal::Neutral.value(), 0);
    }

    #[test]
    fn signal_from_value_saturates() {
        assert_eq!(Signal::from_value(5), Signal::Buy);
        assert_eq!(Signal::from_value(-3), Signal::Sell);
        assert_eq!(Signal::from_value(0), Signal::Neutral);
    }

    #[test]
    fn confidence_is_clamped() {
        let score = ModuleScore::new(Signal::Buy, 1.7, "over-eager");
        assert!((score.confidence - 1.0).abs() < f64::EPSILON);
        let score = ModuleScore::new(Signal::Sell, -0.2, "under-eager");
        assert!(score.confidence.abs() < f64::EPSILON);
    }

    #[test]
    fn neutral_helper_abstains() {
        let score = ModuleScore::neutral("nothing detected");
        assert_eq!(score.signal, Signal::Neutral);
        assert!(score.confidence.abs() < f64::EPSILON);
    }
}
