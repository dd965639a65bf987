//! Configuration for the operation coordinator.

use std::time::Duration;

/// Configuration for the coordinator and its components.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Retry behavior for live and queued operations.
    pub retry: RetryConfig,
    /// Slow-operation thresholds.
    pub performance: PerformanceConfig,
    /// How often a spawned reachability probe checks the store.
    pub probe_interval: Duration,
}

impl CoordinatorConfig {
    /// Creates a configuration with default settings.
    pub fn new() -> Self {
        Self {
            retry: RetryConfig::default(),
            performance: PerformanceConfig::default(),
            probe_interval: Duration::from_secs(5),
        }
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the performance thresholds.
    pub fn with_performance(mut self, performance: PerformanceConfig) -> Self {
        self.performance = performance;
        self
    }

    /// Sets the probe interval.
    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl RetryConfig {
    /// Creates a retry configuration with the default delays.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Sets the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay to wait after a failed attempt (0-indexed).
    ///
    /// `min(base_delay * 2^attempt, max_delay)`, with no jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Thresholds used to classify completed operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformanceConfig {
    /// Operations strictly slower than this count as slow.
    pub slow_threshold: Duration,
    /// Operations strictly slower than this are logged at warn level.
    pub very_slow_threshold: Duration,
}

impl PerformanceConfig {
    /// Sets the slow threshold.
    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = threshold;
        self
    }

    /// Sets the very-slow threshold.
    pub fn with_very_slow_threshold(mut self, threshold: Duration) -> Self {
        self.very_slow_threshold = threshold;
        self
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            slow_threshold: Duration::from_millis(2000),
            very_slow_threshold: Duration::from_millis(5000),
        }
    }
}
