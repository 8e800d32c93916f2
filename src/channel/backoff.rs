//! Reconnect delay schedule: exponential growth with a cap and jitter.
//!
//! Formula: `min(base * multiplier^attempt, max) ± jitter`, where jitter is
//! a deterministic spread of `jitter_fraction` around the computed delay.

use std::time::Duration;

/// Delay schedule parameters for reconnect attempts.
#[derive(Debug, Clone)]
pub struct BackoffSchedule {
    /// Delay before the first retry, in milliseconds.
    pub base_ms: u64,
    /// Ceiling on any single delay, in milliseconds.
    pub max_ms: u64,
    /// Growth factor per attempt.
    pub multiplier: f64,
    /// Jitter as a fraction of the computed delay (0.0–1.0).
    pub jitter_fraction: f64,
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self {
            base_ms: 1_000,
            max_ms: 30_000,
            multiplier: 2.0,
            jitter_fraction: 0.25,
        }
    }
}

impl BackoffSchedule {
    /// Delay before reconnect attempt `attempt` (0-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let raw = self.base_ms as f64 * self.multiplier.powi(attempt as i32);
        let capped = raw.min(self.max_ms as f64);
        let spread = capped * self.jitter_fraction * jitter_unit(attempt);
        Duration::from_millis((capped + spread).max(0.0) as u64)
    }
}

/// Deterministic value in [-0.5, 0.5) seeded by the attempt number — enough
/// spread to stagger reconnecting clients without a rand dependency.
fn jitter_unit(attempt: u32) -> f64 {
    // LCG step (Numerical Recipes constants).
    const A: u64 = 1_664_525;
    const C: u64 = 1_013_904_223;
    const M: u64 = 1u64 << 32;
    let state = A.wrapping_mul(attempt as u64 + 1).wrapping_add(C) % M;
    (state as f64 / M as f64) - 0.5
}
