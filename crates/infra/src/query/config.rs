//! Per-query and per-mutation options

use std::time::Duration;

use mintflow_common::cache::EntryLifetime;
use mintflow_common::resilience::{BackoffStrategy, RetryConfig};
use mintflow_domain::constants::MAX_MUTATION_RETRIES;
use mintflow_domain::QueryDefaults;

/// Options for a cached read.
///
/// | option | default |
/// |--------|---------|
/// | `stale_time` | 30 s |
/// | `cache_time` | 5 min |
/// | `max_retries` | 3 |
/// | `retry_delay` | exponential, 1 s base, 30 s cap |
/// | `refetch_on_focus` | true |
#[derive(Debug, Clone, PartialEq)]
pub struct QueryConfig {
    /// Age after which cached data is served but revalidated in the background.
    pub stale_time: Duration,
    /// Age after which cached data is evicted.
    pub cache_time: Duration,
    /// Retries after the first attempt, for retryable failures only.
    pub max_retries: u32,
    pub retry_delay: BackoffStrategy,
    /// Refetch live handles when the host reports the app regained focus.
    pub refetch_on_focus: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self::from(&QueryDefaults::default())
    }
}

impl From<&QueryDefaults> for QueryConfig {
    fn from(defaults: &QueryDefaults) -> Self {
        Self {
            stale_time: Duration::from_millis(defaults.stale_time_ms),
            cache_time: Duration::from_millis(defaults.cache_time_ms),
            max_retries: defaults.max_retries,
            retry_delay: BackoffStrategy::exponential(
                Duration::from_millis(defaults.retry_base_delay_ms),
                Duration::from_millis(defaults.retry_max_delay_ms),
            ),
            refetch_on_focus: defaults.refetch_on_focus,
        }
    }
}

impl QueryConfig {
    pub fn builder() -> QueryConfigBuilder {
        QueryConfigBuilder::default()
    }

    /// Retry settings for the fetch loop.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig { max_retries: self.max_retries, backoff: self.retry_delay, ..RetryConfig::default() }
    }

    pub fn lifetime(&self) -> EntryLifetime {
        EntryLifetime::new(self.stale_time, self.cache_time)
    }
}

#[derive(Debug, Default)]
pub struct QueryConfigBuilder {
    config: QueryConfig,
}

impl QueryConfigBuilder {
    #[must_use]
    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.config.stale_time = stale_time;
        self
    }

    #[must_use]
    pub fn cache_time(mut self, cache_time: Duration) -> Self {
        self.config.cache_time = cache_time;
        self
    }

    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn retry_delay(mut self, retry_delay: BackoffStrategy) -> Self {
        self.config.retry_delay = retry_delay;
        self
    }

    #[must_use]
    pub fn refetch_on_focus(mut self, enabled: bool) -> Self {
        self.config.refetch_on_focus = enabled;
        self
    }

    pub fn build(self) -> QueryConfig {
        self.config
    }
}

/// Options for a state-changing call.
///
/// Re-sending a write after an ambiguous failure can apply it twice, so
/// `max_retries` never exceeds one however the config is built.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationConfig {
    max_retries: u32,
    retry_delay: BackoffStrategy,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self::from(&QueryDefaults::default())
    }
}

impl From<&QueryDefaults> for MutationConfig {
    fn from(defaults: &QueryDefaults) -> Self {
        Self::new(defaults.effective_mutation_retries()).with_retry_delay(
            BackoffStrategy::exponential(
                Duration::from_millis(defaults.retry_base_delay_ms),
                Duration::from_millis(defaults.retry_max_delay_ms),
            ),
        )
    }
}

impl MutationConfig {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries: max_retries.min(MAX_MUTATION_RETRIES),
            retry_delay: BackoffStrategy::default(),
        }
    }

    #[must_use]
    pub fn with_retry_delay(mut self, retry_delay: BackoffStrategy) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Retry settings for the fetch loop.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig { max_retries: self.max_retries, backoff: self.retry_delay, ..RetryConfig::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_client_defaults() {
        let config = QueryConfig::default();
        assert_eq!(config.stale_time, Duration::from_secs(30));
        assert_eq!(config.cache_time, Duration::from_secs(300));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay.calculate_delay(0), Duration::from_secs(1));
        assert_eq!(config.retry_delay.calculate_delay(10), Duration::from_secs(30));
        assert!(config.refetch_on_focus);
    }

    #[test]
    fn mutation_retries_are_clamped() {
        assert_eq!(MutationConfig::new(5).max_retries(), 1);
        assert_eq!(MutationConfig::new(0).max_retries(), 0);
        assert_eq!(MutationConfig::default().retry_config().max_attempts(), 2);
    }

    #[test]
    fn builder_overrides_fields() {
        let config = QueryConfig::builder()
            .stale_time(Duration::ZERO)
            .max_retries(0)
            .refetch_on_focus(false)
            .build();
        assert_eq!(config.stale_time, Duration::ZERO);
        assert_eq!(config.retry_config().max_attempts(), 1);
        assert!(!config.refetch_on_focus);
    }
}
