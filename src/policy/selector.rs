// =============================================================================
// Policy selection — regime- and toxicity-gated choice of decision policy
// =============================================================================
//
// Two candidate policies read the same state vector and disagree on style:
// the momentum policy trades the trend aggressively, the defensive policy
// only manages exits and otherwise waits.  The selector routes each step to
// exactly one of them: a toxicity reading at or above the danger threshold
// vetoes everything and forces the defensive policy; otherwise the regime
// decides (trend gets the aggressive policy, everything else the defensive
// one — fail-safe default).

use tracing::debug;

use crate::features::STATE_DIM;
use crate::regime::Regime;
use crate::types::Action;

/// A decision policy over the engine state vector
/// `[log_return, volatility, alpha, sentiment, inventory]`.
pub trait TradePolicy: Send {
    fn name(&self) -> &str;

    fn act(&self, state: &[f64; STATE_DIM]) -> Action;
}

/// Aggressive trend-following policy.
///
/// Momentum blends the bar log return with the alpha term.  Holds winners,
/// closes a position when momentum flips against it, and opens fresh
/// positions whenever momentum clears the threshold.
pub struct MomentumPolicy {
    momentum_threshold: f64,
}

impl MomentumPolicy {
    pub fn new(momentum_threshold: f64) -> Self {
        Self { momentum_threshold }
    }
}

impl Default for MomentumPolicy {
    fn default() -> Self {
        Self::new(0.0005)
    }
}

impl TradePolicy for MomentumPolicy {
    fn name(&self) -> &str {
        "momentum"
    }

    fn act(&self, state: &[f64; STATE_DIM]) -> Action {
        let log_return = state[0];
        let alpha = state[2];
        let inventory = state[4];

        let momentum = log_return + alpha * 0.3;

        if inventory >= 1.0 {
            if momentum < -self.momentum_threshold {
                Action::Sell
            } else {
                Action::Hold
            }
        } else if inventory <= -1.0 {
            if momentum > self.momentum_threshold {
                Action::Buy
            } else {
                Action::Hold
            }
        } else if momentum > self.momentum_threshold {
            Action::Buy
        } else if momentum < -self.momentum_threshold {
            Action::Sell
        } else {
            Action::Hold
        }
    }
}

/// Defensive policy.
///
/// Never opens a position on its own; it only unwinds an existing one when
/// the bar return turns against it.  Flat inventory always holds.
pub struct DefensivePolicy;

impl TradePolicy for DefensivePolicy {
    fn name(&self) -> &str {
        "defensive"
    }

    fn act(&self, state: &[f64; STATE_DIM]) -> Action {
        let momentum = state[0];
        let inventory = state[4];

        if inventory >= 1.0 {
            if momentum < 0.0 {
                Action::Sell
            } else {
                Action::Hold
            }
        } else if inventory <= -1.0 {
            if momentum > 0.0 {
                Action::Buy
            } else {
                Action::Hold
            }
        } else {
            Action::Hold
        }
    }
}

/// Routes each step to the aggressive or defensive policy.
pub struct PolicySelector {
    aggressive: MomentumPolicy,
    defensive: DefensivePolicy,
    danger_threshold: f64,
}

impl PolicySelector {
    pub fn new(danger_threshold: f64) -> Self {
        Self {
            aggressive: MomentumPolicy::default(),
            defensive: DefensivePolicy,
            danger_threshold,
        }
    }

    /// Pick a policy for the current conditions and return its action.
    ///
    /// The toxicity veto has the highest precedence: at or above the danger
    /// threshold the defensive policy runs regardless of regime.
    pub fn select_action(
        &self,
        state: &[f64; STATE_DIM],
        regime: Regime,
        toxicity: f64,
    ) -> Action {
        let policy: &dyn TradePolicy = if toxicity >= self.danger_threshold {
            &self.defensive
        } else {
            match regime {
                Regime::Trend => &self.aggressive,
                _ => &self.defensive,
            }
        };

        let action = policy.act(state);
        debug!(policy = policy.name(), %regime, toxicity = format!("{toxicity:.3}"), %action, "policy selected");
        action
    }

    /// Which policy `select_action` would route to, for logging and records.
    pub fn selected_policy_name(&self, regime: Regime, toxicity: f64) -> &'static str {
        if toxicity >= self.danger_threshold {
            "defensive (toxicity veto)"
        } else {
            match regime {
                Regime::Trend => "momentum (trend)",
                Regime::Range => "defensive (range)",
                Regime::HighVol => "defensive (high volatility)",
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn state(log_return: f64, alpha: f64, inventory: f64) -> [f64; STATE_DIM] {
        [log_return, 0.01, alpha, 0.0, inventory]
    }

    #[test]
    fn momentum_policy_opens_with_the_trend() {
        let policy = MomentumPolicy::default();
        assert_eq!(policy.act(&state(0.01, 0.02, 0.0)), Action::Buy);
        assert_eq!(policy.act(&state(-0.01, -0.02, 0.0)), Action::Sell);
        assert_eq!(policy.act(&state(0.0, 0.0, 0.0)), Action::Hold);
    }

    #[test]
    fn momentum_policy_manages_open_positions() {
        let policy = MomentumPolicy::default();
        // Long position rides positive momentum, exits on a flip.
        assert_eq!(policy.act(&state(0.01, 0.0, 1.0)), Action::Hold);
        assert_eq!(policy.act(&state(-0.01, 0.0, 1.0)), Action::Sell);
        // Symmetric for shorts.
        assert_eq!(policy.act(&state(-0.01, 0.0, -1.0)), Action::Hold);
        assert_eq!(policy.act(&state(0.01, 0.0, -1.0)), Action::Buy);
    }

    #[test]
    fn defensive_policy_never_opens() {
        let policy = DefensivePolicy;
        assert_eq!(policy.act(&state(0.05, 0.1, 0.0)), Action::Hold);
        assert_eq!(policy.act(&state(-0.05, -0.1, 0.0)), Action::Hold);
    }

    #[test]
    fn defensive_policy_unwinds_losing_positions() {
        let policy = DefensivePolicy;
        assert_eq!(policy.act(&state(-0.01, 0.0, 1.0)), Action::Sell);
        assert_eq!(policy.act(&state(0.01, 0.0, 1.0)), Action::Hold);
        assert_eq!(policy.act(&state(0.01, 0.0, -1.0)), Action::Buy);
        assert_eq!(policy.act(&state(-0.01, 0.0, -1.0)), Action::Hold);
    }

    #[test]
    fn trend_regime_routes_to_aggressive_when_flow_is_clean() {
        let selector = PolicySelector::new(0.4);
        // Strong positive momentum, flat book: aggressive buys, defensive
        // would hold, so a BUY proves the routing.
        let s = state(0.01, 0.02, 0.0);
        assert_eq!(selector.select_action(&s, Regime::Trend, 0.1), Action::Buy);
        assert_eq!(
            selector.selected_policy_name(Regime::Trend, 0.1),
            "momentum (trend)"
        );
    }

    #[test]
    fn toxicity_veto_overrides_regime() {
        let selector = PolicySelector::new(0.4);
        let s = state(0.01, 0.02, 0.0);
        // Same trend regime and momentum, but toxic flow: defensive holds.
        assert_eq!(selector.select_action(&s, Regime::Trend, 0.6), Action::Hold);
        assert_eq!(
            selector.selected_policy_name(Regime::Trend, 0.6),
            "defensive (toxicity veto)"
        );
        // Veto is inclusive at the threshold.
        assert_eq!(selector.select_action(&s, Regime::Trend, 0.4), Action::Hold);
    }

    #[test]
    fn non_trend_regimes_route_defensively() {
        let selector = PolicySelector::new(0.4);
        let s = state(0.01, 0.02, 0.0);
        assert_eq!(selector.select_action(&s, Regime::Range, 0.0), Action::Hold);
        assert_eq!(selector.select_action(&s, Regime::HighVol, 0.0), Action::Hold);
    }
}
