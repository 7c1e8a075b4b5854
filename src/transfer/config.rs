use std::time::Duration;

use dotenvy::dotenv;

use crate::error::{Result, VaaError};

pub const ENV_MAX_ATTEMPTS: &str = "VAA_RS_POLL_MAX_ATTEMPTS";
pub const ENV_POLL_INTERVAL_SECS: &str = "VAA_RS_POLL_INTERVAL_SECS";
pub const ENV_BACKOFF_MULTIPLIER: &str = "VAA_RS_POLL_BACKOFF_MULTIPLIER";
pub const ENV_MAX_INTERVAL_SECS: &str = "VAA_RS_POLL_MAX_INTERVAL_SECS";

/// Configuration for attestation polling behavior.
///
/// Attempts are bounded; between two attempts the poller sleeps
/// [`delay_for_attempt`](Self::delay_for_attempt), which grows geometrically
/// from `poll_interval_secs` by `backoff_multiplier` and is capped at
/// `max_interval_secs`.
///
/// # Examples
///
/// ```rust
/// use vaa_rs::PollingConfig;
///
/// // 5 attempts, sleeping 2, 4, 8 and 16 seconds in between
/// let config = PollingConfig::default();
/// assert_eq!(config.total_timeout_secs(), 30);
///
/// let config = PollingConfig::default()
///     .with_max_attempts(10)
///     .with_backoff_multiplier(1);
/// assert_eq!(config.total_timeout_secs(), 18);
///
/// // Circle attestations take minutes; poll every minute for half an hour
/// let config = PollingConfig::circle_attestation();
/// assert_eq!(config.max_attempts, 30);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    /// Maximum number of polling attempts before giving up.
    pub max_attempts: u32,
    /// Seconds to wait after the first failed attempt.
    pub poll_interval_secs: u64,
    /// Factor applied to the wait after every further attempt; `1` disables backoff.
    pub backoff_multiplier: u32,
    /// Upper bound on a single wait.
    pub max_interval_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            poll_interval_secs: 2,
            backoff_multiplier: 2,
            max_interval_secs: 60,
        }
    }
}

impl PollingConfig {
    /// Preset for Circle's attestation service: 30 attempts one minute apart.
    pub fn circle_attestation() -> Self {
        Self {
            max_attempts: 30,
            poll_interval_secs: 60,
            backoff_multiplier: 1,
            max_interval_secs: 60,
        }
    }

    /// Reads overrides from the environment (and a `.env` file, if present),
    /// falling back to the defaults for unset variables.
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            max_attempts: parse_var(&lookup, ENV_MAX_ATTEMPTS)?.unwrap_or(defaults.max_attempts),
            poll_interval_secs: parse_var(&lookup, ENV_POLL_INTERVAL_SECS)?
                .unwrap_or(defaults.poll_interval_secs),
            backoff_multiplier: parse_var(&lookup, ENV_BACKOFF_MULTIPLIER)?
                .unwrap_or(defaults.backoff_multiplier),
            max_interval_secs: parse_var(&lookup, ENV_MAX_INTERVAL_SECS)?
                .unwrap_or(defaults.max_interval_secs),
        }
        .validated()?)
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_poll_interval_secs(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: u32) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_max_interval_secs(mut self, secs: u64) -> Self {
        self.max_interval_secs = secs;
        self
    }

    /// Rejects configurations that would never poll.
    pub fn validated(self) -> Result<Self> {
        if self.max_attempts == 0 {
            return Err(VaaError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.backoff_multiplier == 0 {
            return Err(VaaError::InvalidConfig(
                "backoff_multiplier must be at least 1".to_string(),
            ));
        }
        Ok(self)
    }

    /// Wait after the zero-based `attempt` failed.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = u64::from(self.backoff_multiplier.max(1)).saturating_pow(attempt);
        let secs = self
            .poll_interval_secs
            .saturating_mul(factor)
            .min(self.max_interval_secs.max(self.poll_interval_secs));
        Duration::from_secs(secs)
    }

    /// Total time slept between attempts when every attempt comes back empty.
    pub fn total_timeout_secs(&self) -> u64 {
        (0..self.max_attempts.saturating_sub(1))
            .map(|attempt| self.delay_for_attempt(attempt).as_secs())
            .sum()
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| VaaError::InvalidConfig(format!("{key}={raw:?} is not a number")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = PollingConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.poll_interval_secs, 2);
        assert_eq!(config.total_timeout_secs(), 2 + 4 + 8 + 16);
    }

    #[rstest]
    #[case(0, 2)]
    #[case(1, 4)]
    #[case(4, 32)]
    #[case(5, 60)]
    #[case(40, 60)]
    fn test_backoff_is_capped(#[case] attempt: u32, #[case] secs: u64) {
        assert_eq!(
            PollingConfig::default().delay_for_attempt(attempt),
            Duration::from_secs(secs)
        );
    }

    #[test]
    fn test_circle_preset_has_no_backoff() {
        let config = PollingConfig::circle_attestation();
        assert_eq!(config.delay_for_attempt(0), config.delay_for_attempt(20));
        assert_eq!(config.total_timeout_secs(), 29 * 60);
    }

    #[test]
    fn test_builder_methods() {
        let config = PollingConfig::default()
            .with_max_attempts(3)
            .with_poll_interval_secs(10)
            .with_backoff_multiplier(3)
            .with_max_interval_secs(20);
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(10));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(20));
        assert_eq!(config.total_timeout_secs(), 30);
    }

    #[test]
    fn test_from_lookup() {
        let vars = HashMap::from([
            (ENV_MAX_ATTEMPTS, "12"),
            (ENV_BACKOFF_MULTIPLIER, " 1 "),
        ]);
        let config =
            PollingConfig::from_lookup(|key| vars.get(key).map(ToString::to_string)).unwrap();
        assert_eq!(config.max_attempts, 12);
        assert_eq!(config.backoff_multiplier, 1);
        assert_eq!(config.poll_interval_secs, 2);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = PollingConfig::from_lookup(|key| {
            (key == ENV_POLL_INTERVAL_SECS).then(|| "soon".to_string())
        })
        .unwrap_err();
        insta::assert_snapshot!(err, @r#"Invalid configuration: VAA_RS_POLL_INTERVAL_SECS="soon" is not a number"#);

        assert!(matches!(
            PollingConfig::from_lookup(|key| (key == ENV_MAX_ATTEMPTS).then(|| "0".to_string())),
            Err(VaaError::InvalidConfig(_))
        ));
    }
}
