// =============================================================================
// Sentiment adapter contract
// =============================================================================
//
// News text goes out to an external scoring service; a score in [-1, 1] comes
// back.  Any failure is mapped to neutral (0.0) at the call site — sentiment
// is an enrichment, never a hard dependency.

use anyhow::Result;

/// Contract for external news-sentiment scoring.
pub trait SentimentAnalyzer: Send {
    /// Score `news` from -1.0 (very bearish) to 1.0 (very bullish).
    fn analyze_news(&self, news: &str) -> Result<f64>;
}

/// Default analyzer used when no external service is wired in: everything is
/// neutral.
pub struct NeutralSentiment;

impl SentimentAnalyzer for NeutralSentiment {
    fn analyze_news(&self, _news: &str) -> Result<f64> {
        Ok(0.0)
    }
}

/// Map an analyzer result to the safe scoring contract: clamp to [-1, 1],
/// failures and non-finite scores become 0.0.
pub fn safe_score(result: Result<f64>) -> f64 {
    match result {
        Ok(score) if score.is_finite() => score.clamp(-1.0, 1.0),
        Ok(_) => 0.0,
        Err(e) => {
            tracing::warn!(error = %e, "sentiment scoring failed, using neutral");
            0.0
        }
    }
}
