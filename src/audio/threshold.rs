//! Adaptive silence threshold: a bounded sliding history of keyword-stage
//! bucket means, collapsed to a single threshold via a median-scaled floor.

use std::collections::VecDeque;

const HISTORY_CAPACITY: usize = 100;

pub struct AdaptiveThreshold {
    history: VecDeque<i64>,
    min_silence_threshold: i64,
    ambiance_level_factor: f64,
}

impl AdaptiveThreshold {
    pub fn new(min_silence_threshold: i64, ambiance_level_factor: f64) -> Self {
        Self {
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
            min_silence_threshold,
            ambiance_level_factor,
        }
    }

    /// Appends a keyword-stage `mean_abs` observation, evicting the oldest
    /// entry once the history reaches `HISTORY_CAPACITY`. The instruction
    /// predicate never calls this (spec §4.3.3).
    pub fn record(&mut self, mean_abs: i64) {
        if self.history.len() >= HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(mean_abs);
    }

    /// `max(min_silence_threshold, round(median(history) * ambiance_level_factor))`.
    /// An empty history has median 0, so the floor always applies.
    pub fn current(&self) -> i64 {
        let median = median(&self.history);
        let scaled = (median * self.ambiance_level_factor).round() as i64;
        self.min_silence_threshold.max(scaled)
    }
}

fn median(values: &VecDeque<i64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<i64> = values.iter().copied().collect();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
    } else {
        sorted[mid] as f64
    }
}
