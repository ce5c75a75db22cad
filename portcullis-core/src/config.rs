//! Account guard configuration

use chrono::Duration;

/// Default number of consecutive failed attempts before an account is locked.
pub const DEFAULT_MAX_FAILED_ATTEMPTS: u32 = 5;

/// Default lockout duration in minutes.
pub const DEFAULT_LOCKOUT_MINUTES: i64 = 15;

/// Longest lockout accepted from operator configuration: one year, in minutes.
pub const MAX_LOCKOUT_MINUTES: i64 = 365 * 24 * 60;

/// Default bound on each credential store lookup or write.
pub const DEFAULT_STORE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Configuration for lockout behavior and store access.
///
/// # Example
///
/// ```rust
/// use chrono::Duration;
/// use portcullis_core::AccountGuardConfig;
///
/// let config = AccountGuardConfig::default()
///     .with_max_failed_attempts(3)
///     .with_lockout_period(Duration::minutes(30));
/// assert_eq!(config.max_failed_attempts, 3);
/// ```
#[derive(Debug, Clone)]
pub struct AccountGuardConfig {
    /// Consecutive failed attempts that trigger a lockout. Values below 1 are treated as 1.
    pub max_failed_attempts: u32,
    /// How long a lockout lasts once triggered.
    pub lockout_period: Duration,
    /// Upper bound on each credential store lookup or write.
    pub store_timeout: std::time::Duration,
}

impl Default for AccountGuardConfig {
    fn default() -> Self {
        Self {
            max_failed_attempts: DEFAULT_MAX_FAILED_ATTEMPTS,
            lockout_period: Duration::minutes(DEFAULT_LOCKOUT_MINUTES),
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

impl AccountGuardConfig {
    pub fn with_max_failed_attempts(mut self, max_failed_attempts: u32) -> Self {
        self.max_failed_attempts = max_failed_attempts;
        self
    }

    pub fn with_lockout_period(mut self, lockout_period: Duration) -> Self {
        self.lockout_period = lockout_period;
        self
    }

    pub fn with_store_timeout(mut self, store_timeout: std::time::Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    /// The effective lockout threshold.
    pub fn threshold(&self) -> u32 {
        self.max_failed_attempts.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AccountGuardConfig::default();
        assert_eq!(config.max_failed_attempts, 5);
        assert_eq!(config.lockout_period, Duration::minutes(15));
        assert_eq!(config.store_timeout, std::time::Duration::from_secs(5));
    }

    #[test]
    fn test_threshold_is_at_least_one() {
        let config = AccountGuardConfig::default().with_max_failed_attempts(0);
        assert_eq!(config.threshold(), 1);
    }
}
