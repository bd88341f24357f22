// =============================================================================
// Signal layer — module opinions, weight presets, fusion, order-flow toxicity
// =============================================================================

pub mod aggregator;
pub mod module_score;
pub mod presets;
pub mod toxicity;

pub use aggregator::{AggregatedDecision, WeightedAggregator, TOXICITY_FILTER};
pub use module_score::{ModuleScore, ScoreProducer, Signal};
pub use presets::{PresetBook, WeightPreset};
pub use toxicity::OrderFlowToxicity;
