// =============================================================================
// BarHistory — bounded ring of the most recent bars
// =============================================================================
//
// The orchestrator appends one bar per step; once the ring holds
// `max_bars` entries the oldest bar is evicted.  Bars are never mutated after
// insertion.  This bounds memory regardless of stream length.

use std::collections::VecDeque;

use crate::types::Bar;

/// Number of bars retained by default.
pub const DEFAULT_MAX_BARS: usize = 200;

/// Bounded FIFO of recent bars, newest at the tail.
#[derive(Debug)]
pub struct BarHistory {
    bars: VecDeque<Bar>,
    max_bars: usize,
}

impl BarHistory {
    pub fn new(max_bars: usize) -> Self {
        Self {
            bars: VecDeque::with_capacity(max_bars + 1),
            max_bars,
        }
    }

    /// Append a bar, evicting the oldest when over capacity.
    pub fn push(&mut self, bar: Bar) {
        self.bars.push_back(bar);
        while self.bars.len() > self.max_bars {
            self.bars.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// The most recently appended bar.
    pub fn latest(&self) -> Option<&Bar> {
        self.bars.back()
    }

    /// Snapshot of all retained bars, oldest-first.
    pub fn bars(&self) -> Vec<Bar> {
        self.bars.iter().cloned().collect()
    }

    /// The most recent `count` bars, oldest-first.
    pub fn tail(&self, count: usize) -> Vec<Bar> {
        let start = self.bars.len().saturating_sub(count);
        self.bars.iter().skip(start).cloned().collect()
    }

    /// Close prices of all retained bars, oldest-first.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn clear(&mut self) {
        self.bars.clear();
    }
}

impl Default for BarHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BARS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(close: f64) -> Bar {
        Bar::new(close, close + 0.5, close - 0.5, close, 100.0)
    }

    #[test]
    fn push_within_capacity() {
        let mut history = BarHistory::new(5);
        for i in 0..3 {
            history.push(bar(i as f64));
        }
        assert_eq!(history.len(), 3);
        assert!((history.latest().unwrap().close - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn oldest_evicted_beyond_capacity() {
        let mut history = BarHistory::new(5);
        for i in 0..8 {
            history.push(bar(i as f64));
        }
        assert_eq!(history.len(), 5);
        // Bars 0..=2 were dropped; the head is bar 3.
        assert!((history.closes()[0] - 3.0).abs() < f64::EPSILON);
        assert!((history.latest().unwrap().close - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn tail_returns_most_recent_in_order() {
        let mut history = BarHistory::new(10);
        for i in 0..6 {
            history.push(bar(i as f64));
        }
        let tail = history.tail(3);
        assert_eq!(tail.len(), 3);
        assert!((tail[0].close - 3.0).abs() < f64::EPSILON);
        assert!((tail[2].close - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn tail_shorter_than_requested() {
        let mut history = BarHistory::new(10);
        history.push(bar(1.0));
        assert_eq!(history.tail(5).len(), 1);
    }

    #[test]
    fn clear_empties_history() {
        let mut history = BarHistory::default();
        history.push(bar(1.0));
        history.clear();
        assert!(history.is_empty());
        assert!(history.latest().is_none());
    }
}
