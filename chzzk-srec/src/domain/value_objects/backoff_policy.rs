//! Backoff policy value object.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Shape of the delay curve between retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// Always wait `base`.
    Fixed,
    /// Wait `base * (attempt + 1)`.
    Linear,
    /// Wait `base * multiplier^attempt`.
    #[default]
    Exponential,
}

impl BackoffStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Linear => "linear",
            Self::Exponential => "exponential",
        }
    }
}

impl FromStr for BackoffStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "linear" => Ok(Self::Linear),
            "exponential" | "exp" => Ok(Self::Exponential),
            other => Err(format!(
                "unknown backoff strategy '{other}' (expected fixed, linear or exponential)"
            )),
        }
    }
}

impl std::fmt::Display for BackoffStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delay policy applied once consecutive capture failures reach the retry count.
///
/// Attempt `0` is the first backed-off delay. Every delay, jitter included, is
/// capped at `max_delay_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    #[serde(default)]
    pub strategy: BackoffStrategy,
    /// Base delay in milliseconds (the poll interval by default).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Ceiling in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Growth factor for [`BackoffStrategy::Exponential`].
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Add up to 25% random jitter.
    #[serde(default)]
    pub use_jitter: bool,
}

fn default_base_delay_ms() -> u64 {
    60_000
}

fn default_max_delay_ms() -> u64 {
    30 * 60_000
}

fn default_multiplier() -> f64 {
    2.0
}

/// Maximum exponent to prevent overflow.
const MAX_EXPONENT: i32 = 30;

impl BackoffPolicy {
    pub fn new(strategy: BackoffStrategy, base: Duration, max: Duration) -> Self {
        Self {
            strategy,
            base_delay_ms: base.as_millis() as u64,
            max_delay_ms: max.as_millis() as u64,
            ..Default::default()
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, use_jitter: bool) -> Self {
        self.use_jitter = use_jitter;
        self
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Calculate the delay for a given backoff attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay_ms as f64;
        let raw = match self.strategy {
            BackoffStrategy::Fixed => base,
            BackoffStrategy::Linear => base * (attempt as f64 + 1.0),
            BackoffStrategy::Exponential => {
                let exponent = (attempt as i32).min(MAX_EXPONENT);
                base * self.multiplier.max(1.0).powi(exponent)
            }
        };

        let delay_ms = raw.min(self.max_delay_ms as f64) as u64;

        if self.use_jitter {
            let jitter = (delay_ms as f64 * 0.25 * rand::random::<f64>()) as u64;
            Duration::from_millis(delay_ms.saturating_add(jitter).min(self.max_delay_ms))
        } else {
            Duration::from_millis(delay_ms)
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::default(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            use_jitter: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(strategy: BackoffStrategy) -> BackoffPolicy {
        BackoffPolicy::new(strategy, Duration::from_secs(10), Duration::from_secs(60))
    }

    #[test]
    fn test_default_policy() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.strategy, BackoffStrategy::Exponential);
        assert_eq!(policy.max_delay(), Duration::from_secs(1800));
        assert!(!policy.use_jitter);
    }

    #[test]
    fn test_fixed_delay() {
        let policy = policy(BackoffStrategy::Fixed);
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(10));
        assert_eq!(policy.delay_for_attempt(7), Duration::from_secs(10));
    }

    #[test]
    fn test_linear_delay() {
        let policy = policy(BackoffStrategy::Linear);
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(10));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(20));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(50));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(60));
        assert_eq!(policy.delay_for_attempt(50), Duration::from_secs(60));
    }

    #[test]
    fn test_exponential_delay_capped_at_max() {
        let policy = policy(BackoffStrategy::Exponential);
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(10));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(20));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(40));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(60));
        assert_eq!(policy.delay_for_attempt(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn test_jitter_never_exceeds_max() {
        let policy = policy(BackoffStrategy::Exponential).with_jitter(true);
        for attempt in 0..10 {
            let delay = policy.delay_for_attempt(attempt);
            assert!(delay <= Duration::from_secs(60));
            assert!(delay >= Duration::from_secs(10));
        }
    }

    #[test]
    fn test_multiplier_below_one_does_not_shrink() {
        let policy = policy(BackoffStrategy::Exponential).with_multiplier(0.5);
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(10));
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("fixed".parse(), Ok(BackoffStrategy::Fixed));
        assert_eq!(" Linear ".parse(), Ok(BackoffStrategy::Linear));
        assert_eq!("exp".parse(), Ok(BackoffStrategy::Exponential));
        assert!("fibonacci".parse::<BackoffStrategy>().is_err());
    }
}
