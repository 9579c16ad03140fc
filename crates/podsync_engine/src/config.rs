//! Configuration for the sync engine.

use podsync_protocol::{DeviceId, DeviceType};
use std::time::Duration;

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// This device's identifier on the service.
    pub device: DeviceId,
    /// This device's kind, announced to the service on registration.
    pub device_type: DeviceType,
    /// Server URL.
    pub server_url: String,
    /// How many times one session may loop back to fetching after an
    /// ambiguous send failure before the round fails.
    pub refetch_budget: u32,
    /// Retry configuration for whole-round retries and commit retries.
    pub retry: RetryConfig,
    /// Per-request timeout, handed to the HTTP client with every request.
    /// A timeout is a transient, retryable failure.
    pub timeout: Duration,
}

impl SyncConfig {
    /// Creates a configuration with defaults.
    pub fn new(device: DeviceId, server_url: impl Into<String>) -> Self {
        Self {
            device,
            device_type: DeviceType::Other,
            server_url: server_url.into(),
            refetch_budget: 3,
            retry: RetryConfig::default(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the device type.
    #[must_use]
    pub fn with_device_type(mut self, device_type: DeviceType) -> Self {
        self.device_type = device_type;
        self
    }

    /// Sets the ambiguous-send refetch budget.
    #[must_use]
    pub fn with_refetch_budget(mut self, budget: u32) -> Self {
        self.refetch_budget = budget;
        self
    }

    /// Sets the retry configuration.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the network step timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts.
    pub max_attempts: u32,
    /// Initial delay between attempts.
    pub initial_delay: Duration,
    /// Maximum delay between attempts.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a new retry configuration.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Creates a configuration with no retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the initial delay.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Calculates the delay for a given attempt (0-indexed).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);

        let delay_secs = base_delay.min(self.max_delay.as_secs_f64());

        if self.add_jitter {
            // Up to 25% jitter
            let jitter = delay_secs * 0.25 * pseudo_jitter();
            Duration::from_secs_f64(delay_secs + jitter)
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Simple deterministic "jitter" (no external RNG dependency).
fn pseudo_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    f64::from(nanos % 1000) / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder() {
        let config = SyncConfig::new(DeviceId::new("laptop-1"), "https://sync.example.com")
            .with_device_type(DeviceType::Laptop)
            .with_refetch_budget(5)
            .with_timeout(Duration::from_secs(60));

        assert_eq!(config.device.as_str(), "laptop-1");
        assert_eq!(config.device_type, DeviceType::Laptop);
        assert_eq!(config.refetch_budget, 5);
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn retry_delay_grows_and_respects_max() {
        let config = RetryConfig::new(10)
            .with_initial_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_secs(5));

        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);

        let d1 = config.delay_for_attempt(1);
        assert!(d1 >= Duration::from_millis(100));
        assert!(d1 <= Duration::from_millis(150));

        // High attempts never exceed max + jitter.
        let d9 = config.delay_for_attempt(9);
        assert!(d9 <= Duration::from_millis(6250));
    }

    #[test]
    fn no_retry_config() {
        let config = RetryConfig::no_retry();
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.delay_for_attempt(1), Duration::ZERO);
    }
}
