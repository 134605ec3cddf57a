//! Per-manager performance counters
//!
//! Regression-testing signal, not a correctness contract: counts of instant
//! vs. animated vs. snapped operations, a bounded window of operation-time
//! samples, and a blended 0..1 score.

use std::collections::VecDeque;
use std::time::Duration;

/// Rolling operation-time samples kept per manager.
const SAMPLE_WINDOW: usize = 128;

/// Operation counters and timing samples for one manager.
#[derive(Debug, Default)]
pub struct ManagerMetrics {
    instant_ops: u64,
    animated_ops: u64,
    snapped_ops: u64,
    op_times: VecDeque<Duration>,
}

impl ManagerMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_instant(&mut self) {
        self.instant_ops += 1;
    }

    pub fn record_animated(&mut self) {
        self.animated_ops += 1;
    }

    pub fn record_snapped(&mut self) {
        self.snapped_ops += 1;
    }

    /// Record how long one operation took, discarding the oldest sample
    /// once the window is full.
    pub fn record_op_time(&mut self, elapsed: Duration) {
        if self.op_times.len() == SAMPLE_WINDOW {
            self.op_times.pop_front();
        }
        self.op_times.push_back(elapsed);
    }

    #[must_use]
    pub fn instant_ops(&self) -> u64 {
        self.instant_ops
    }

    #[must_use]
    pub fn animated_ops(&self) -> u64 {
        self.animated_ops
    }

    #[must_use]
    pub fn snapped_ops(&self) -> u64 {
        self.snapped_ops
    }

    #[must_use]
    pub fn average_op_time(&self) -> Option<Duration> {
        if self.op_times.is_empty() {
            return None;
        }
        let total: Duration = self.op_times.iter().sum();
        Some(total / self.op_times.len() as u32)
    }

    /// Blend of cache hit rate and instant/animated balance, in `[0, 1]`.
    ///
    /// Rough debugging signal only; tests may assert the range but never an
    /// exact value.
    #[must_use]
    pub fn overall_score(&self, cache_hit_rate: f64) -> f64 {
        let hit = cache_hit_rate.clamp(0.0, 1.0);
        let total = self.instant_ops + self.animated_ops;
        let balance = if total == 0 {
            1.0
        } else {
            let diff = self.instant_ops.abs_diff(self.animated_ops) as f64;
            1.0 - diff / total as f64
        };
        0.6 * hit + 0.4 * balance
    }
}
