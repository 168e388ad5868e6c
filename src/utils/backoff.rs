//! Retry backoff policy.
//!
//! One abstraction for the exponential-backoff-with-jitter schedule used by
//! both the session client and the analysis stage, parameterized per call
//! site from config.

use std::time::Duration;

use rand::Rng;

use crate::models::{AnalysisConfig, RetryConfig};

/// Exponential backoff schedule with uniform random jitter.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Total attempts, first try included
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    /// Upper bound of the uniform jitter added to every delay
    pub jitter: Duration,
}

impl BackoffPolicy {
    /// Delay to sleep after a failed `attempt` (1-based). Returns `None`
    /// once the attempt budget is spent.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let exp = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let base = self.base_delay.mul_f64(exp);
        Some(base + self.jitter())
    }

    fn jitter(&self) -> Duration {
        if self.jitter.is_zero() {
            return Duration::ZERO;
        }
        let max_ms = self.jitter.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}

impl From<&RetryConfig> for BackoffPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
            multiplier: config.multiplier,
            jitter: Duration::from_millis(config.jitter_ms),
        }
    }
}

impl From<&AnalysisConfig> for BackoffPolicy {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
            multiplier: 2.0,
            jitter: Duration::from_millis(config.base_delay_ms / 4),
        }
    }
}
