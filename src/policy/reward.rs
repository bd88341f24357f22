// =============================================================================
// Reward model — per-step trading reward with cost and inventory shaping
// =============================================================================
//
// Per-step reward:
//
//   reward = pnl_delta
//          − transaction_cost · |Δposition|
//          − inventory_penalty · σ² · inventory²
//
// Transaction cost is charged on position changes only; holding is free.  The
// inventory term scales quadratically in both volatility and inventory so that
// large positions in turbulent markets are punished disproportionately.
//
// At end of episode a separate terminal penalty of −market_impact · inventory²
// charges the cost of unwinding whatever is still held.

use serde::{Deserialize, Serialize};

/// Stateless reward calculator; parameters come from engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardCalculator {
    pub transaction_cost: f64,
    pub inventory_penalty: f64,
    pub market_impact: f64,
}

impl RewardCalculator {
    pub fn new(transaction_cost: f64, inventory_penalty: f64, market_impact: f64) -> Self {
        Self {
            transaction_cost,
            inventory_penalty,
            market_impact,
        }
    }

    /// Per-step reward for one bar transition.
    ///
    /// `pnl_delta` is the mark-to-market change of the position over the bar,
    /// `position_change` the signed units traded this step, `volatility` the
    /// current σ estimate, and `inventory` the position held after the trade.
    pub fn calculate(
        &self,
        pnl_delta: f64,
        position_change: i32,
        volatility: f64,
        inventory: i32,
    ) -> f64 {
        let trade_cost = self.transaction_cost * position_change.abs() as f64;
        let inv = inventory as f64;
        let inventory_cost = self.inventory_penalty * volatility.powi(2) * inv * inv;
        pnl_delta - trade_cost - inventory_cost
    }

    /// One-off end-of-episode charge for unwinding the remaining inventory.
    pub fn terminal_penalty(&self, inventory: i32) -> f64 {
        let inv = inventory as f64;
        -self.market_impact * inv * inv
    }
}
