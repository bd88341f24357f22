// =============================================================================
// Weight presets — named, immutable module→weight tables
// =============================================================================
//
// A preset maps module names to non-negative aggregation weights.  Weights
// need not sum to 1: the aggregator normalizes by the sum of weights of the
// modules actually present in a given score map.  Presets are configuration
// data and switchable at runtime without touching any module state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A named, immutable weight table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightPreset {
    pub name: String,
    pub weights: HashMap<String, f64>,
}

impl WeightPreset {
    pub fn new(name: impl Into<String>, entries: &[(&str, f64)]) -> Self {
        Self {
            name: name.into(),
            weights: entries
                .iter()
                .map(|(module, weight)| (module.to_string(), weight.max(0.0)))
                .collect(),
        }
    }

    pub fn weight(&self, module: &str) -> Option<f64> {
        self.weights.get(module).copied()
    }
}

/// The built-in preset book.
///
/// - `balanced`   — rule-based modules with technical/trend emphasis (default)
/// - `model_led`  — forecasting model dominant, rule modules as filters
/// - `hybrid`     — model and rule modules split evenly
/// - `legacy`     — pattern-detector-heavy weighting
#[derive(Debug, Clone)]
pub struct PresetBook {
    presets: HashMap<String, WeightPreset>,
}

impl PresetBook {
    pub fn builtin() -> Self {
        let mut presets = HashMap::new();

        for preset in [
            WeightPreset::new(
                "balanced",
                &[
                    ("technical", 0.25),
                    ("trend", 0.20),
                    ("wave_structure", 0.15),
                    ("chart_patterns", 0.15),
                    ("false_breakout", 0.15),
                    ("candle_patterns", 0.05),
                    ("structural", 0.05),
                ],
            ),
            WeightPreset::new(
                "model_led",
                &[
                    ("model_core", 0.45),
                    ("volatility", 0.10),
                    ("toxicity", 0.05),
                    ("technical", 0.15),
                    ("trend", 0.10),
                    ("pullback", 0.10),
                    ("chart_patterns", 0.02),
                    ("false_breakout", 0.02),
                    ("candle_patterns", 0.01),
                ],
            ),
            WeightPreset::new(
                "hybrid",
                &[
                    ("model_core", 0.30),
                    ("volatility", 0.05),
                    ("toxicity", 0.05),
                    ("technical", 0.15),
                    ("trend", 0.15),
                    ("pullback", 0.15),
                    ("chart_patterns", 0.05),
                    ("false_breakout", 0.05),
                    ("candle_patterns", 0.05),
                ],
            ),
            WeightPreset::new(
                "legacy",
                &[
                    ("chart_patterns", 0.20),
                    ("false_breakout", 0.15),
                    ("technical", 0.15),
                    ("trend", 0.15),
                    ("pullback", 0.15),
                    ("candle_patterns", 0.10),
                    ("wave_structure", 0.05),
                    ("structural", 0.05),
                ],
            ),
        ] {
            presets.insert(preset.name.clone(), preset);
        }

        Self { presets }
    }

    pub fn get(&self, name: &str) -> Option<&WeightPreset> {
        self.presets.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.presets.contains_key(name)
    }

    /// Register (or replace) a custom preset.
    pub fn insert(&mut self, preset: WeightPreset) {
        self.presets.insert(preset.name.clone(), preset);
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.presets.keys().cloned().collect();
        names.sort();
        names
    }
}
