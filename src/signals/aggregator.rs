// =============================================================================
// Weighted Aggregator — multi-module signal fusion under switchable presets
// =============================================================================
//
// For every module present in both the score map and the active preset:
//
//   contribution = signal · confidence · weight
//
// The weighted score is Σcontribution / Σweight, where the denominator only
// counts modules actually present — an absent module never dilutes the score.
// The final signal is cut at ±entry_threshold; confidence is min(1, |score|).
//
// The filtered variant damps the weighted score by ×0.5 when a filter value
// (toxicity) crosses the danger threshold, after normal aggregation, and
// appends a synthetic warning reason.  Filters never touch individual module
// contributions.
//
// Switching presets is a metadata swap behind an RwLock; module state is
// untouched because producers are stateless and invoked fresh each step.

use std::collections::HashMap;

use anyhow::{bail, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::signals::module_score::{ModuleScore, Signal};
use crate::signals::presets::{PresetBook, WeightPreset};

/// Only modules at least this confident contribute a reason line.
const REASON_CONFIDENCE_FLOOR: f64 = 0.3;
/// Damping applied to the weighted score past the toxicity danger threshold.
const TOXICITY_DAMPING: f64 = 0.5;
/// Filter-map key carrying the current toxicity value.
pub const TOXICITY_FILTER: &str = "toxicity";

/// Result of one aggregation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedDecision {
    pub signal: Signal,
    /// min(1, |weighted_score|), in [0, 1].
    pub confidence: f64,
    /// Normalized fused score in [-1, 1].
    pub weighted_score: f64,
    /// Contributing explanations, ordered by descending preset weight.
    pub reasons: Vec<String>,
    /// Every module score that entered the aggregation.
    pub breakdown: HashMap<String, ModuleScore>,
}

impl AggregatedDecision {
    fn neutral() -> Self {
        Self {
            signal: Signal::Neutral,
            confidence: 0.0,
            weighted_score: 0.0,
            reasons: Vec::new(),
            breakdown: HashMap::new(),
        }
    }
}

/// The fusion engine.  Holds the preset book and the active preset name;
/// aggregation itself is a pure function of its inputs.
pub struct WeightedAggregator {
    book: PresetBook,
    active: RwLock<String>,
    entry_threshold: f64,
    danger_threshold: f64,
}

impl WeightedAggregator {
    /// Create an aggregator with the given book and active preset.
    ///
    /// Fails when `active` is not in the book — malformed configuration is
    /// rejected at the boundary, before it can reach the core.
    pub fn new(
        book: PresetBook,
        active: &str,
        entry_threshold: f64,
        danger_threshold: f64,
    ) -> Result<Self> {
        if !book.contains(active) {
            bail!("unknown weight preset: {active}");
        }
        Ok(Self {
            book,
            active: RwLock::new(active.to_string()),
            entry_threshold,
            danger_threshold,
        })
    }

    pub fn active_preset(&self) -> String {
        self.active.read().clone()
    }

    /// Switch the active preset.  Unknown names are rejected and the previous
    /// preset is retained.
    pub fn set_active_preset(&self, name: &str) -> Result<()> {
        if !self.book.contains(name) {
            bail!("unknown weight preset: {name}");
        }
        *self.active.write() = name.to_string();
        debug!(preset = name, "active weight preset switched");
        Ok(())
    }

    /// Aggregate `scores` under the active preset.
    pub fn aggregate(&self, scores: &HashMap<String, ModuleScore>) -> AggregatedDecision {
        let active = self.active.read();
        let preset = match self.book.get(&active) {
            Some(p) => p,
            // Unreachable in practice: the active name is validated on entry.
            None => return AggregatedDecision::neutral(),
        };
        self.aggregate_with(scores, preset)
    }

    /// Aggregate `scores` under an explicit preset.  Pure function of its
    /// arguments.
    pub fn aggregate_with(
        &self,
        scores: &HashMap<String, ModuleScore>,
        preset: &WeightPreset,
    ) -> AggregatedDecision {
        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;
        let mut reasons = Vec::new();

        // Modules present in both maps, heaviest weight first so that reason
        // ordering reads most-important-first.
        let mut present: Vec<(&String, f64)> = preset
            .weights
            .iter()
            .filter(|(module, _)| scores.contains_key(*module))
            .map(|(module, &weight)| (module, weight))
            .collect();
        present.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });

        for (module, weight) in &present {
            let score = &scores[*module];
            let contribution = score.signal.value() as f64 * score.confidence * weight;
            weighted_sum += contribution;
            total_weight += weight;

            if score.confidence > REASON_CONFIDENCE_FLOOR {
                reasons.push(format!(
                    "[{module}] {} {:.2}: {}",
                    score.signal, score.confidence, score.reason
                ));
            }
        }

        let weighted_score = if total_weight > 0.0 {
            weighted_sum / total_weight
        } else {
            0.0
        };

        let decision = self.finalize(weighted_score, reasons, scores.clone());

        debug!(
            preset = %preset.name,
            modules = present.len(),
            weighted_score = format!("{:.4}", decision.weighted_score),
            signal = %decision.signal,
            "scores aggregated"
        );

        decision
    }

    /// Aggregate under the active preset, then apply filter damping.
    ///
    /// When `filters[TOXICITY_FILTER]` is at or above the danger threshold,
    /// the weighted score is halved after normalization and a warning reason
    /// appended.  The signal cut is re-evaluated on the damped score.
    pub fn aggregate_filtered(
        &self,
        scores: &HashMap<String, ModuleScore>,
        filters: &HashMap<String, f64>,
    ) -> AggregatedDecision {
        let mut decision = self.aggregate(scores);

        if let Some(&toxicity) = filters.get(TOXICITY_FILTER) {
            if toxicity >= self.danger_threshold {
                let damped = decision.weighted_score * TOXICITY_DAMPING;
                let mut reasons = decision.reasons;
                reasons.push(format!(
                    "[{TOXICITY_FILTER}] WARNING: toxic order flow detected ({toxicity:.2}), score damped"
                ));
                decision = self.finalize(damped, reasons, decision.breakdown);
            }
        }

        decision
    }

    /// Turn a weighted score into the final decision record.
    fn finalize(
        &self,
        weighted_score: f64,
        reasons: Vec<String>,
        breakdown: HashMap<String, ModuleScore>,
    ) -> AggregatedDecision {
        let signal = if weighted_score >= self.entry_threshold {
            Signal::Buy
        } else if weighted_score <= -self.entry_threshold {
            Signal::Sell
        } else {
            Signal::Neutral
        };

        AggregatedDecision {
            signal,
            confidence: weighted_score.abs().min(1.0),
            weighted_score,
            reasons,
            breakdown,
        }
    }

    /// Render a human-readable per-module breakdown of a decision.
    pub fn explain(&self, decision: &AggregatedDecision) -> String {
        let active = self.active.read();
        let preset = self.book.get(&active);

        let mut lines = Vec::new();
        lines.push(format!("=== aggregation result [{}] ===", *active));
        lines.push(format!("signal: {}", decision.signal));
        lines.push(format!("confidence: {:.2}", decision.confidence));
        lines.push(format!("weighted score: {:+.3}", decision.weighted_score));
        lines.push(String::new());

        let mut modules: Vec<(&String, &ModuleScore)> = decision.breakdown.iter().collect();
        modules.sort_by(|a, b| {
            let wa = preset.and_then(|p| p.weight(a.0)).unwrap_or(0.0);
            let wb = preset.and_then(|p| p.weight(b.0)).unwrap_or(0.0);
            wb.partial_cmp(&wa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });

        for (module, score) in modules {
            let weight = preset.and_then(|p| p.weight(module)).unwrap_or(0.0);
            let contribution = score.signal.value() as f64 * score.confidence * weight;
            lines.push(format!(
                "  {module:<18} (weight {weight:.0}%): signal={:+}, confidence={:.2}, contribution={contribution:+.3}",
                score.signal.value(),
                score.confidence,
                weight = weight * 100.0,
            ));
        }

        lines.push(String::new());
        for reason in &decision.reasons {
            lines.push(format!("  - {reason}"));
        }

        lines.join("\n")
    }
}
