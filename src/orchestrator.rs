// =============================================================================
// Orchestrator — the per-bar decision pipeline
// =============================================================================
//
// Owns the bar history, the inventory state, and cumulative PnL.  One call to
// `process_bar` runs the full pipeline:
//
//   append bar → update toxicity → sentiment → features → model direction
//   → regime → pnl delta → candidate resolution → inventory update → reward
//
// Action resolution walks an ordered list of candidate policies; the first
// candidate returning an action wins:
//
//   1. mean-reversion overlay — fires only when the daily volatility signal
//      and the intraday RSI/Bollinger signal trigger together
//   2. model direction       — non-FLAT prediction, if the limit allows
//   3. regime/toxicity-gated policy selector (always yields an action)
//
// `process_bar` never fails: every external collaborator error degrades to
// its safe default (FLAT direction, neutral sentiment, fallback volatility)
// and every call returns a complete decision record.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::features::{
    self, build_sequence, state_vector, MIN_FEATURE_BARS, STATE_DIM, VOLATILITY_FALLBACK,
};
use crate::forecasting::{Direction, DirectionModel};
use crate::history::BarHistory;
use crate::indicators::{bollinger, rsi};
use crate::policy::{PolicySelector, RewardCalculator};
use crate::regime::{self, Regime};
use crate::runtime_config::EngineConfig;
use crate::sentiment::{safe_score, NeutralSentiment, SentimentAnalyzer};
use crate::signals::{
    ModuleScore, OrderFlowToxicity, ScoreProducer, WeightedAggregator, TOXICITY_FILTER,
};
use crate::types::{Action, Bar, ToxicityLevel};

/// RSI period for the intraday overbought/oversold check.
const OVERLAY_RSI_PERIOD: usize = 14;
/// Bollinger parameters for the intraday band check.
const OVERLAY_BB_PERIOD: usize = 20;
const OVERLAY_BB_STD: f64 = 2.0;

/// Net position, last seen price, and running PnL for one instrument.
///
/// Owned exclusively by the orchestrator and mutated only by its own
/// action-application step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryState {
    pub current_inventory: i32,
    pub last_price: Option<f64>,
    pub cumulative_pnl: f64,
}

/// Everything one `process_bar` call decided, for downstream serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub id: String,
    pub timestamp: String,
    pub action: Action,
    /// True when the action was rejected by the position limit.
    pub was_limited: bool,
    pub position_change: i32,
    pub inventory: i32,
    pub reward: f64,
    pub pnl_delta: f64,
    pub cumulative_pnl: f64,
    pub regime: Regime,
    pub toxicity: f64,
    pub toxicity_level: ToxicityLevel,
    pub sentiment: f64,
    pub volatility: f64,
    pub direction: Direction,
    /// Which candidate produced the action.
    pub policy: String,
    /// Aggregated module-fusion confidence, [0, 1].
    pub confidence: f64,
    pub weighted_score: f64,
    pub reasons: Vec<String>,
}

/// The per-instrument decision engine.
///
/// Single-threaded and synchronous: bars must arrive in timestamp order, one
/// at a time.  Multiple instruments each get their own orchestrator; no state
/// is shared between instances.
pub struct Orchestrator {
    config: EngineConfig,
    history: BarHistory,
    toxicity: OrderFlowToxicity,
    aggregator: WeightedAggregator,
    selector: PolicySelector,
    reward: RewardCalculator,
    producers: Vec<Box<dyn ScoreProducer>>,
    model: Option<Box<dyn DirectionModel>>,
    sentiment: Box<dyn SentimentAnalyzer>,
    /// Daily volatility-premium signal (-1, 0, +1) set by an external daily
    /// model; gates the mean-reversion overlay.
    daily_signal: i32,
    current_volatility: f64,
    inventory: InventoryState,
}

impl Orchestrator {
    pub fn new(config: EngineConfig) -> anyhow::Result<Self> {
        let aggregator = WeightedAggregator::new(
            crate::signals::PresetBook::builtin(),
            &config.active_preset,
            config.entry_threshold,
            config.toxicity_danger_threshold,
        )?;

        Ok(Self {
            toxicity: OrderFlowToxicity::new(config.bucket_volume, config.n_buckets),
            selector: PolicySelector::new(config.toxicity_danger_threshold),
            reward: RewardCalculator::new(
                config.transaction_cost,
                config.inventory_penalty,
                config.market_impact,
            ),
            aggregator,
            history: BarHistory::default(),
            producers: Vec::new(),
            model: None,
            sentiment: Box::new(NeutralSentiment),
            daily_signal: 0,
            current_volatility: VOLATILITY_FALLBACK,
            inventory: InventoryState::default(),
            config,
        })
    }

    pub fn register_producer(&mut self, producer: Box<dyn ScoreProducer>) {
        debug!(module = producer.name(), "score producer registered");
        self.producers.push(producer);
    }

    pub fn set_model(&mut self, model: Box<dyn DirectionModel>) {
        self.model = Some(model);
    }

    pub fn set_sentiment_analyzer(&mut self, analyzer: Box<dyn SentimentAnalyzer>) {
        self.sentiment = analyzer;
    }

    /// Feed the external daily volatility signal gating the mean-reversion
    /// overlay.  Clamped to {-1, 0, +1}.
    pub fn set_daily_signal(&mut self, signal: i32) {
        self.daily_signal = signal.clamp(-1, 1);
    }

    /// Switch the active weight preset.  Unknown names are rejected and the
    /// previous preset is retained; no module state is touched.
    pub fn set_active_preset(&mut self, name: &str) -> anyhow::Result<()> {
        self.aggregator.set_active_preset(name)
    }

    pub fn inventory(&self) -> i32 {
        self.inventory.current_inventory
    }

    pub fn cumulative_pnl(&self) -> f64 {
        self.inventory.cumulative_pnl
    }

    /// Run the full pipeline for one bar.  Never fails; every error from an
    /// external collaborator degrades to its documented safe default.
    pub fn process_bar(&mut self, bar: Bar, news: &str) -> DecisionRecord {
        let current_price = bar.close;
        let bar_volume = bar.volume;
        let timestamp = bar
            .timestamp
            .clone()
            .unwrap_or_else(|| chrono::Utc::now().to_rfc3339());

        self.history.push(bar);
        self.toxicity.update(current_price, bar_volume);

        let sentiment = if news.is_empty() {
            0.0
        } else {
            safe_score(self.sentiment.analyze_news(news))
        };

        let toxicity_value = self.toxicity.calculate();
        let toxicity_level = self
            .toxicity
            .toxicity_signal(self.config.toxicity_danger_threshold);

        let bars = self.history.bars();
        if let Some(vol) = features::latest_volatility(&bars) {
            self.current_volatility = if vol > 0.0 { vol } else { VOLATILITY_FALLBACK };
        }

        let state = state_vector(&bars, sentiment, self.inventory.current_inventory as f64);
        let direction = self.predict_direction(&bars);
        let market_regime = regime::classify(self.current_volatility, sentiment, toxicity_value);
        let pnl_delta = self.pnl_delta(current_price);

        // Module fusion runs alongside the action chain; its confidence and
        // reasons enrich the record, the action comes from the chain below.
        let fused = self.aggregate_modules(&bars, toxicity_value);

        let (action, policy) =
            self.resolve_action(&bars, current_price, direction, &state, market_regime, toxicity_value);

        let (position_change, was_limited) = self.apply_inventory(action);

        let reward = self.reward.calculate(
            pnl_delta,
            position_change,
            self.current_volatility,
            self.inventory.current_inventory,
        );

        self.inventory.cumulative_pnl += pnl_delta;
        self.inventory.last_price = Some(current_price);

        info!(
            %action,
            limited = was_limited,
            inventory = self.inventory.current_inventory,
            regime = %market_regime,
            toxicity = format!("{toxicity_value:.4}"),
            reward = format!("{reward:.4}"),
            cumulative_pnl = format!("{:.4}", self.inventory.cumulative_pnl),
            "bar processed"
        );

        DecisionRecord {
            id: Uuid::new_v4().to_string(),
            timestamp,
            action,
            was_limited,
            position_change,
            inventory: self.inventory.current_inventory,
            reward,
            pnl_delta,
            cumulative_pnl: self.inventory.cumulative_pnl,
            regime: market_regime,
            toxicity: toxicity_value,
            toxicity_level,
            sentiment,
            volatility: self.current_volatility,
            direction,
            policy,
            confidence: fused.confidence,
            weighted_score: fused.weighted_score,
            reasons: fused.reasons,
        }
    }

    /// End-of-session liquidation charge for whatever is still held.
    pub fn terminal_reward(&self) -> f64 {
        self.reward.terminal_penalty(self.inventory.current_inventory)
    }

    /// Clear history, inventory, PnL, and the toxicity estimator.  Preset and
    /// producer state is deliberately left alone.
    pub fn reset(&mut self) {
        self.history.clear();
        self.inventory = InventoryState::default();
        self.current_volatility = VOLATILITY_FALLBACK;
        self.toxicity.reset();
        info!("orchestrator reset");
    }

    // -------------------------------------------------------------------------
    // Pipeline internals
    // -------------------------------------------------------------------------

    fn predict_direction(&self, bars: &[Bar]) -> Direction {
        let model = match &self.model {
            Some(m) => m,
            None => return Direction::Flat,
        };
        let sequence = match build_sequence(bars) {
            Some(s) => s,
            None => return Direction::Flat,
        };
        match model.predict_direction(&sequence) {
            Ok(direction) => direction,
            Err(e) => {
                warn!(error = %e, "direction model failed, treating as FLAT");
                Direction::Flat
            }
        }
    }

    fn aggregate_modules(
        &self,
        bars: &[Bar],
        toxicity_value: f64,
    ) -> crate::signals::AggregatedDecision {
        let mut scores: HashMap<String, ModuleScore> = HashMap::new();
        for producer in &self.producers {
            scores.insert(producer.name().to_string(), producer.analyze(bars));
        }

        let mut filters = HashMap::new();
        filters.insert(TOXICITY_FILTER.to_string(), toxicity_value);

        self.aggregator.aggregate_filtered(&scores, &filters)
    }

    /// Walk the ordered candidate list; the first candidate that yields an
    /// action wins.  The selector always yields, so the chain never falls
    /// through empty.
    fn resolve_action(
        &self,
        bars: &[Bar],
        current_price: f64,
        direction: Direction,
        state: &[f64; STATE_DIM],
        market_regime: Regime,
        toxicity_value: f64,
    ) -> (Action, String) {
        let candidates: [(&str, Option<Action>); 3] = [
            (
                "mean_reversion",
                self.mean_reversion_candidate(bars, current_price),
            ),
            ("model", self.model_candidate(direction)),
            (
                self.selector
                    .selected_policy_name(market_regime, toxicity_value),
                Some(self.selector.select_action(state, market_regime, toxicity_value)),
            ),
        ];

        for (name, candidate) in candidates {
            if let Some(action) = candidate {
                return (action, name.to_string());
            }
        }
        (Action::Hold, "none".to_string())
    }

    /// Mean-reversion overlay: the daily volatility-premium signal and the
    /// intraday RSI/Bollinger signal must trigger together.
    ///
    ///   daily +1 (rich vol) × intraday +1 (overbought) → SELL
    ///   daily −1 (cheap vol) × intraday −1 (oversold)  → BUY
    fn mean_reversion_candidate(&self, bars: &[Bar], current_price: f64) -> Option<Action> {
        let intraday = self.intraday_signal(bars, current_price);

        let action = match (self.daily_signal, intraday) {
            (1, 1) => Action::Sell,
            (-1, -1) => Action::Buy,
            _ => return None,
        };

        if !self.can_take_action(action) {
            return None;
        }
        debug!(%action, "mean-reversion overlay triggered");
        Some(action)
    }

    /// Intraday overbought/oversold signal: +1 when RSI > 70 and price above
    /// the upper band, -1 when RSI < 30 and price below the lower band.
    fn intraday_signal(&self, bars: &[Bar], current_price: f64) -> i32 {
        if bars.len() < MIN_FEATURE_BARS {
            return 0;
        }
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

        let rsi_value = match rsi(&closes, OVERLAY_RSI_PERIOD) {
            Some(v) => v,
            None => return 0,
        };
        let bands = match bollinger(&closes, OVERLAY_BB_PERIOD, OVERLAY_BB_STD) {
            Some(b) => b,
            None => return 0,
        };

        if rsi_value > 70.0 && current_price > bands.upper {
            1
        } else if rsi_value < 30.0 && current_price < bands.lower {
            -1
        } else {
            0
        }
    }

    /// A non-FLAT model prediction, when the position limit allows it.
    fn model_candidate(&self, direction: Direction) -> Option<Action> {
        match direction {
            Direction::Up if self.inventory.current_inventory < self.config.max_position => {
                Some(Action::Buy)
            }
            Direction::Down if self.inventory.current_inventory > -self.config.max_position => {
                Some(Action::Sell)
            }
            _ => None,
        }
    }

    fn can_take_action(&self, action: Action) -> bool {
        match action {
            Action::Buy => self.inventory.current_inventory < self.config.max_position,
            Action::Sell => self.inventory.current_inventory > -self.config.max_position,
            Action::Hold => true,
        }
    }

    fn pnl_delta(&self, current_price: f64) -> f64 {
        match self.inventory.last_price {
            Some(last) => self.inventory.current_inventory as f64 * (current_price - last),
            None => 0.0,
        }
    }

    /// Apply the action against the position limit.
    ///
    /// A rejected action yields zero position change and the limited flag;
    /// it is never partially applied.
    fn apply_inventory(&mut self, action: Action) -> (i32, bool) {
        let (position_change, was_limited) = match action {
            Action::Buy => {
                if self.inventory.current_inventory >= self.config.max_position {
                    (0, true)
                } else {
                    (1, false)
                }
            }
            Action::Sell => {
                if self.inventory.current_inventory <= -self.config.max_position {
                    (0, true)
                } else {
                    (-1, false)
                }
            }
            Action::Hold => (0, false),
        };

        self.inventory.current_inventory += position_change;
        (position_change, was_limited)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::SEQ_FEATURES;
    use crate::signals::Signal;

    struct FixedDirection(Direction);

    impl DirectionModel for FixedDirection {
        fn predict_direction(
            &self,
            _sequence: &[[f64; SEQ_FEATURES]],
        ) -> anyhow::Result<Direction> {
            Ok(self.0)
        }
    }

    struct FailingModel;

    impl DirectionModel for FailingModel {
        fn predict_direction(
            &self,
            _sequence: &[[f64; SEQ_FEATURES]],
        ) -> anyhow::Result<Direction> {
            Err(anyhow::anyhow!("inference backend down"))
        }
    }

    struct FixedScore {
        name: &'static str,
        score: ModuleScore,
    }

    impl ScoreProducer for FixedScore {
        fn name(&self) -> &str {
            self.name
        }
        fn analyze(&self, _bars: &[Bar]) -> ModuleScore {
            self.score.clone()
        }
    }

    fn engine() -> Orchestrator {
        Orchestrator::new(EngineConfig::default()).unwrap()
    }

    fn bar(close: f64) -> Bar {
        Bar::new(close, close * 1.001, close * 0.999, close, 1000.0)
    }

    #[test]
    fn first_bar_yields_complete_record() {
        let mut orch = engine();
        let record = orch.process_bar(bar(100.0), "");
        assert_eq!(record.inventory, 0);
        assert!(record.pnl_delta.abs() < f64::EPSILON);
        assert!(record.cumulative_pnl.abs() < f64::EPSILON);
        assert!(!record.was_limited);
        assert!(!record.id.is_empty());
    }

    #[test]
    fn position_limit_never_exceeded() {
        let mut orch = engine();
        orch.set_model(Box::new(FixedDirection(Direction::Up)));
        for i in 0..40 {
            let record = orch.process_bar(bar(100.0 + i as f64 * 0.1), "");
            assert!(
                record.inventory.abs() <= orch.config.max_position,
                "inventory {} exceeded limit at step {i}",
                record.inventory
            );
        }
        assert_eq!(orch.inventory(), 1);
    }

    #[test]
    fn limited_action_applies_nothing() {
        let mut orch = engine();
        orch.inventory.current_inventory = orch.config.max_position;
        let (change, limited) = orch.apply_inventory(Action::Buy);
        assert_eq!(change, 0);
        assert!(limited);
        assert_eq!(orch.inventory(), orch.config.max_position);

        orch.inventory.current_inventory = -orch.config.max_position;
        let (change, limited) = orch.apply_inventory(Action::Sell);
        assert_eq!(change, 0);
        assert!(limited);
    }

    #[test]
    fn hold_is_never_limited() {
        let mut orch = engine();
        orch.inventory.current_inventory = orch.config.max_position;
        let (change, limited) = orch.apply_inventory(Action::Hold);
        assert_eq!(change, 0);
        assert!(!limited);
    }

    #[test]
    fn model_direction_drives_entry() {
        let mut orch = engine();
        orch.set_model(Box::new(FixedDirection(Direction::Up)));
        // Warm up past the sequence length; the final step must be a BUY
        // attributed to the model once the sequence becomes available.
        let mut last = None;
        for i in 0..25 {
            last = Some(orch.process_bar(bar(100.0 + i as f64 * 0.01), ""));
        }
        let record = last.unwrap();
        // Inventory filled on the first model step, later steps delegate.
        assert_eq!(orch.inventory(), 1);
        assert!(record.policy == "model" || record.action == Action::Hold);
    }

    #[test]
    fn model_failure_degrades_to_flat() {
        let mut orch = engine();
        orch.set_model(Box::new(FailingModel));
        for i in 0..25 {
            let record = orch.process_bar(bar(100.0 + i as f64 * 0.01), "");
            assert_eq!(record.direction, Direction::Flat);
        }
        assert_eq!(orch.inventory(), 0);
    }

    #[test]
    fn overlay_overrides_model_direction() {
        let mut orch = engine();
        orch.set_model(Box::new(FixedDirection(Direction::Up)));
        orch.set_daily_signal(1);

        // Flat tape, then a violent spike: RSI pins at 100 and the close
        // finishes far above the upper band, so the intraday signal is
        // overbought and the overlay shorts into it, beating the model's BUY.
        for _ in 0..29 {
            orch.process_bar(bar(100.0), "");
        }
        let record = orch.process_bar(bar(110.0), "");
        assert_eq!(record.action, Action::Sell);
        assert_eq!(record.policy, "mean_reversion");
    }

    #[test]
    fn overlay_needs_both_signals() {
        let mut orch = engine();
        // Same overbought tape but no daily signal: overlay must stay quiet.
        orch.set_daily_signal(0);
        for _ in 0..29 {
            orch.process_bar(bar(100.0), "");
        }
        let record = orch.process_bar(bar(110.0), "");
        assert_ne!(record.policy, "mean_reversion");
    }

    #[test]
    fn pnl_accrues_with_held_inventory() {
        let mut orch = engine();
        orch.set_model(Box::new(FixedDirection(Direction::Up)));
        // 20 warm-up bars at 100, the model then buys one unit.
        for _ in 0..20 {
            orch.process_bar(bar(100.0), "");
        }
        assert_eq!(orch.inventory(), 1);
        let before = orch.cumulative_pnl();
        let record = orch.process_bar(bar(101.0), "");
        // One unit held over a +1.0 move.
        assert!((record.pnl_delta - 1.0).abs() < 1e-9);
        assert!((orch.cumulative_pnl() - before - 1.0).abs() < 1e-9);
    }

    #[test]
    fn producers_feed_record_confidence() {
        let mut orch = engine();
        orch.register_producer(Box::new(FixedScore {
            name: "technical",
            score: ModuleScore::new(Signal::Buy, 0.9, "strong momentum"),
        }));
        orch.register_producer(Box::new(FixedScore {
            name: "trend",
            score: ModuleScore::new(Signal::Buy, 0.9, "clean uptrend"),
        }));

        let record = orch.process_bar(bar(100.0), "");
        assert!(record.confidence > 0.0);
        assert!(record.weighted_score > 0.0);
        assert!(!record.reasons.is_empty());
    }

    #[test]
    fn unknown_preset_switch_is_rejected() {
        let mut orch = engine();
        assert!(orch.set_active_preset("nope").is_err());
        // Known presets still switch cleanly.
        assert!(orch.set_active_preset("model_led").is_ok());
    }

    #[test]
    fn terminal_reward_charges_open_inventory() {
        let mut orch = engine();
        assert!(orch.terminal_reward().abs() < f64::EPSILON);
        orch.inventory.current_inventory = 1;
        assert!((orch.terminal_reward() + 0.01).abs() < 1e-12);
    }

    #[test]
    fn reset_clears_state_but_not_presets() {
        let mut orch = engine();
        orch.set_active_preset("legacy").unwrap();
        orch.set_model(Box::new(FixedDirection(Direction::Up)));
        for i in 0..25 {
            orch.process_bar(bar(100.0 + i as f64), "");
        }
        orch.reset();
        assert_eq!(orch.inventory(), 0);
        assert!(orch.cumulative_pnl().abs() < f64::EPSILON);
        assert!(orch.history.is_empty());
        // Preset survives the reset.
        assert_eq!(orch.aggregator.active_preset(), "legacy");
        // The next bar is treated as a cold start.
        let record = orch.process_bar(bar(50.0), "");
        assert!(record.toxicity.abs() < f64::EPSILON);
    }
}
