// =============================================================================
// Policy layer — candidate decision policies, selection, reward shaping
// =============================================================================

pub mod reward;
pub mod selector;

pub use reward::RewardCalculator;
pub use selector::{DefensivePolicy, MomentumPolicy, PolicySelector, TradePolicy};
