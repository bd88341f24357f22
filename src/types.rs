// =============================================================================
// Shared types used across the Borealis signal-fusion engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// A single OHLCV bar for the instrument being traded.
///
/// Bars are immutable once produced; the orchestrator appends them to a
/// bounded history and never mutates them afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// ISO 8601 timestamp, when the feed provides one.
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl Bar {
    pub fn new(open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            open,
            high,
            low,
            close,
            volume,
            timestamp: None,
        }
    }
}

/// The trade action produced once per bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Hold,
    Buy,
    Sell,
}

impl Action {
    /// Numeric action code: 0 = HOLD, 1 = BUY, 2 = SELL.
    pub fn code(self) -> u8 {
        match self {
            Self::Hold => 0,
            Self::Buy => 1,
            Self::Sell => 2,
        }
    }

    /// Signed position delta the action requests (before limit checks).
    pub fn position_delta(self) -> i32 {
        match self {
            Self::Hold => 0,
            Self::Buy => 1,
            Self::Sell => -1,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hold => write!(f, "HOLD"),
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Coarse toxicity band derived from the order-flow estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToxicityLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for ToxicityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_codes_match_wire_convention() {
        assert_eq!(Action::Hold.code(), 0);
        assert_eq!(Action::Buy.code(), 1);
        assert_eq!(Action::Sell.code(), 2);
    }

    #[test]
    fn action_position_deltas() {
        assert_eq!(Action::Hold.position_delta(), 0);
        assert_eq!(Action::Buy.position_delta(), 1);
        assert_eq!(Action::Sell.position_delta(), -1);
    }

    #[test]
    fn toxicity_display() {
        assert_eq!(format!("{}", ToxicityLevel::Low), "LOW");
        assert_eq!(format!("{}", ToxicityLevel::High), "HIGH");
    }

    #[test]
    fn bar_deserializes_without_timestamp() {
        let bar: Bar = serde_json::from_str(
            r#"{"open":1.0,"high":2.0,"low":0.5,"close":1.5,"volume":100.0}"#,
        )
        .unwrap();
        assert!(bar.timestamp.is_none());
        assert!((bar.close - 1.5).abs() < f64::EPSILON);
    }
}
