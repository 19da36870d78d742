//! Backoff calculator for connection retry
//!
//! Supports a fixed interval and exponential growth with a cap and
//! optional jitter.

use rand::Rng;
use std::time::Duration;

/// Backoff strategy for connection retries.
///
/// # Example
///
/// ```
/// use qdigest_connection::reconnect::BackoffStrategy;
/// use rand::Rng;
/// use std::time::Duration;
///
/// let fixed = BackoffStrategy::fixed(15_000);
/// assert_eq!(fixed.calculate_delay(0), Duration::from_secs(15));
/// assert_eq!(fixed.calculate_delay(9), Duration::from_secs(15));
///
/// let backoff = BackoffStrategy::new(100, 30_000);
/// assert_eq!(backoff.calculate_delay(1), Duration::from_millis(200));
/// assert!(backoff.calculate_delay(20) <= Duration::from_millis(30_000));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffStrategy {
    /// Initial delay in milliseconds for the first retry
    initial_ms: u64,
    /// Maximum delay in milliseconds (cap for exponential growth)
    max_ms: u64,
    /// Multiplier for exponential growth (1.0 = fixed)
    multiplier: f64,
    /// Whether to add jitter to delays
    jitter: bool,
}

impl BackoffStrategy {
    /// Create an exponential backoff with the given initial and maximum delays.
    pub fn new(initial_ms: u64, max_ms: u64) -> Self {
        Self {
            initial_ms: initial_ms.max(1),
            max_ms: max_ms.max(initial_ms),
            multiplier: 2.0,
            jitter: false,
        }
    }

    /// Create a backoff that waits the same interval before every retry.
    pub fn fixed(interval_ms: u64) -> Self {
        Self::new(interval_ms, interval_ms).with_multiplier(1.0)
    }

    /// Set the multiplier for exponential growth.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    /// Enable jitter (up to ±25% of the delay).
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Calculate the delay before retry number `attempt` (0 = first retry).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay_ms = (self.initial_ms as f64) * self.multiplier.powi(attempt as i32);
        let capped_ms = delay_ms.min(self.max_ms as f64) as u64;

        let final_ms = if self.jitter {
            let jitter_range = capped_ms / 4;
            let jitter = rand::thread_rng().gen_range(0..=jitter_range.saturating_mul(2));
            capped_ms
                .saturating_sub(jitter_range)
                .saturating_add(jitter)
        } else {
            capped_ms
        };

        Duration::from_millis(final_ms)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }

    /// Whether every retry waits the same interval
    pub fn is_fixed(&self) -> bool {
        self.multiplier <= 1.0 || self.initial_ms == self.max_ms
    }
}

impl Default for BackoffStrategy {
    /// Fixed 15 second interval
    fn default() -> Self {
        Self::fixed(15_000)
    }
}
