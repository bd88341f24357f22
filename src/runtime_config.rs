// =============================================================================
// Runtime Configuration — engine settings with atomic save
// =============================================================================
//
// Every tunable parameter consumed by the core lives here: reward model
// coefficients, order-flow bucket sizing, toxicity threshold, position limit,
// the active weight preset, and the aggregator entry threshold.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_transaction_cost() -> f64 {
    0.001
}

fn default_inventory_penalty() -> f64 {
    0.01
}

fn default_market_impact() -> f64 {
    0.01
}

fn default_bucket_volume() -> f64 {
    1000.0
}

fn default_n_buckets() -> usize {
    50
}

fn default_toxicity_danger_threshold() -> f64 {
    0.5
}

fn default_max_position() -> i32 {
    1
}

fn default_active_preset() -> String {
    "balanced".to_string()
}

fn default_entry_threshold() -> f64 {
    0.3
}

// =============================================================================
// EngineConfig
// =============================================================================

/// Top-level configuration for the Borealis engine.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    // --- Reward model --------------------------------------------------------

    /// Cost charged per unit of position change.
    #[serde(default = "default_transaction_cost")]
    pub transaction_cost: f64,

    /// Penalty coefficient on volatility² × inventory².
    #[serde(default = "default_inventory_penalty")]
    pub inventory_penalty: f64,

    /// Coefficient of the terminal liquidation penalty (−impact × inventory²).
    #[serde(default = "default_market_impact")]
    pub market_impact: f64,

    // --- Order-flow toxicity -------------------------------------------------

    /// Total volume that closes one classification bucket.
    #[serde(default = "default_bucket_volume")]
    pub bucket_volume: f64,

    /// Number of closed buckets in the sliding toxicity window.
    #[serde(default = "default_n_buckets")]
    pub n_buckets: usize,

    /// Toxicity value at which the engine routes to the conservative policy
    /// and the aggregator damps its score.
    #[serde(default = "default_toxicity_danger_threshold")]
    pub toxicity_danger_threshold: f64,

    // --- Inventory -----------------------------------------------------------

    /// Maximum absolute inventory the engine may hold.
    #[serde(default = "default_max_position")]
    pub max_position: i32,

    // --- Signal aggregation --------------------------------------------------

    /// Name of the active weight preset (must exist in the preset book).
    #[serde(default = "default_active_preset")]
    pub active_preset: String,

    /// Minimum |weighted_score| for the aggregator to emit a directional
    /// signal.
    #[serde(default = "default_entry_threshold")]
    pub entry_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            transaction_cost: default_transaction_cost(),
            inventory_penalty: default_inventory_penalty(),
            market_impact: default_market_impact(),
            bucket_volume: default_bucket_volume(),
            n_buckets: default_n_buckets(),
            toxicity_danger_threshold: default_toxicity_danger_threshold(),
            max_position: default_max_position(),
            active_preset: default_active_preset(),
            entry_threshold: default_entry_threshold(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse engine config from {}", path.display()))?;

        info!(
            path = %path.display(),
            preset = %config.active_preset,
            max_position = config.max_position,
            "engine config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise engine config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "engine config saved (atomic)");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = EngineConfig::default();
        assert!((cfg.transaction_cost - 0.001).abs() < f64::EPSILON);
        assert!((cfg.inventory_penalty - 0.01).abs() < f64::EPSILON);
        assert!((cfg.market_impact - 0.01).abs() < f64::EPSILON);
        assert!((cfg.bucket_volume - 1000.0).abs() < f64::EPSILON);
        assert_eq!(cfg.n_buckets, 50);
        assert!((cfg.toxicity_danger_threshold - 0.5).abs() < f64::EPSILON);
        assert_eq!(cfg.max_position, 1);
        assert_eq!(cfg.active_preset, "balanced");
        assert!((cfg.entry_threshold - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.n_buckets, 50);
        assert_eq!(cfg.active_preset, "balanced");
        assert_eq!(cfg.max_position, 1);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "max_position": 3, "active_preset": "legacy" }"#;
        let cfg: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.max_position, 3);
        assert_eq!(cfg.active_preset, "legacy");
        assert!((cfg.bucket_volume - 1000.0).abs() < f64::EPSILON);
        assert!((cfg.entry_threshold - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn roundtrip_serialisation() {
        let cfg = EngineConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let cfg2: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.n_buckets, cfg2.n_buckets);
        assert_eq!(cfg.active_preset, cfg2.active_preset);
        assert!((cfg.transaction_cost - cfg2.transaction_cost).abs() < f64::EPSILON);
    }
}
