//! Exponential backoff with jitter, used by the worker while the queue
//! store is unreachable.

use std::time::Duration;

use rand::Rng;

use crate::config::RedisConfig;

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Fraction of the delay randomly added or removed (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

impl From<&RedisConfig> for BackoffConfig {
    fn from(config: &RedisConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.backoff_initial_delay_ms),
            max_delay: Duration::from_millis(config.backoff_max_delay_ms),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    config: BackoffConfig,
    attempt: u32,
}

impl ExponentialBackoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Delay before the next attempt: `initial * multiplier^attempt`,
    /// capped at `max_delay`, then jittered.
    pub fn next_delay(&mut self) -> Duration {
        let exponent = self.attempt.min(32) as i32;
        self.attempt = self.attempt.saturating_add(1);

        let initial_ms = self.config.initial_delay.as_millis() as f64;
        let max_ms = self.config.max_delay.as_millis() as f64;
        let base_ms = (initial_ms * self.config.multiplier.powi(exponent)).min(max_ms);

        let jitter = self.config.jitter.clamp(0.0, 1.0);
        let delay_ms = if jitter > 0.0 && base_ms > 0.0 {
            let spread = base_ms * jitter;
            base_ms + rand::rng().random_range(-spread..=spread)
        } else {
            base_ms
        };

        Duration::from_millis(delay_ms.max(1.0) as u64)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}
