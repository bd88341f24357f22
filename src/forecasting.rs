// =============================================================================
// Directional forecasting contract
// =============================================================================
//
// The engine consumes external prediction models only through the
// `DirectionModel` trait: a sequence of feature steps in, one of three
// direction classes out.  Model internals (architecture, training, loading)
// live outside this crate.
//
// Failures are expected: the orchestrator maps any model error, and any
// missing model, to `Direction::Flat`.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::features::SEQ_FEATURES;

/// Predicted price direction class: 0 = DOWN, 1 = FLAT, 2 = UP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Down,
    Flat,
    Up,
}

impl Direction {
    /// Class index used by the model wire convention.
    pub fn index(self) -> usize {
        match self {
            Self::Down => 0,
            Self::Flat => 1,
            Self::Up => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Down),
            1 => Some(Self::Flat),
            2 => Some(Self::Up),
            _ => None,
        }
    }

    /// Direction as a signal value: DOWN = -1, FLAT = 0, UP = +1.
    pub fn signal(self) -> i32 {
        self.index() as i32 - 1
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Down => write!(f, "DOWN"),
            Self::Flat => write!(f, "FLAT"),
            Self::Up => write!(f, "UP"),
        }
    }
}

/// Contract every directional forecaster must implement.
///
/// `sequence` is `[seq_len][SEQ_FEATURES]`, oldest step first.
pub trait DirectionModel: Send {
    fn predict_direction(&self, sequence: &[[f64; SEQ_FEATURES]]) -> Result<Direction>;
}

/// Weighted-vote ensemble over several direction models.
///
/// Each member model casts its predicted class weighted by its configured
/// weight; the class with the highest tally wins.  A member that fails simply
/// contributes no vote; an empty tally maps to FLAT.
pub struct EnsembleModel {
    members: Vec<(Box<dyn DirectionModel>, f64)>,
}

impl EnsembleModel {
    pub fn new(members: Vec<(Box<dyn DirectionModel>, f64)>) -> Self {
        Self { members }
    }
}

impl DirectionModel for EnsembleModel {
    fn predict_direction(&self, sequence: &[[f64; SEQ_FEATURES]]) -> Result<Direction> {
        let mut scores = [0.0_f64; 3];
        let mut any_vote = false;

        for (model, weight) in &self.members {
            match model.predict_direction(sequence) {
                Ok(direction) => {
                    scores[direction.index()] += weight;
                    any_vote = true;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "ensemble member failed, skipping vote");
                }
            }
        }

        if !any_vote {
            return Ok(Direction::Flat);
        }

        let best = scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i)
            .unwrap_or(1);

        Ok(Direction::from_index(best).unwrap_or(Direction::Flat))
    }
}
