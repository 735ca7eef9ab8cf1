//! Sync configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sync engine and scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Attempts before an action is marked failed
    pub max_attempts: u32,
    /// Per-attempt timeout
    pub request_timeout_ms: u64,
    /// Health tick interval
    pub health_check_interval_ms: u64,
    /// Lower bound of the drain delay
    pub jitter_min_ms: u64,
    /// Upper bound of the drain delay
    pub jitter_max_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            request_timeout_ms: 10_000,
            health_check_interval_ms: 30_000,
            jitter_min_ms: 1_000,
            jitter_max_ms: 5_000,
        }
    }
}

impl SyncConfig {
    /// Create new config with defaults
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With attempt bound
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// With per-attempt timeout
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = millis(timeout);
        self
    }

    /// With health tick interval
    #[inline]
    #[must_use]
    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval_ms = millis(interval);
        self
    }

    /// With drain delay window
    #[inline]
    #[must_use]
    pub fn with_jitter(mut self, min: Duration, max: Duration) -> Self {
        self.jitter_min_ms = millis(min);
        self.jitter_max_ms = millis(max);
        self
    }

    /// Per-attempt timeout
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Health tick interval, at least one millisecond
    #[inline]
    #[must_use]
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms.max(1))
    }

    /// Drain delay bounds, ordered
    #[must_use]
    pub fn jitter_bounds(&self) -> (u64, u64) {
        let (a, b) = (self.jitter_min_ms, self.jitter_max_ms);
        (a.min(b), a.max(b))
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_client_policy() {
        let config = SyncConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.health_check_interval(), Duration::from_secs(30));
        assert_eq!(config.jitter_bounds(), (1_000, 5_000));
    }

    #[test]
    fn inverted_jitter_is_normalized() {
        let config = SyncConfig::new().with_jitter(Duration::from_secs(3), Duration::from_secs(1));
        assert_eq!(config.jitter_bounds(), (1_000, 3_000));
    }
}
