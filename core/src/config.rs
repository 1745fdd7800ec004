use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5173";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    pub base_url: String,
    pub navigation_timeout_ms: u64,
    pub interaction_timeout_ms: u64,
    pub assert_timeout_ms: u64,
    pub poll_interval_ms: u64,
    /// How long an absent glyph must stay hidden.
    pub absence_hold_ms: u64,
    /// Quiet window without DOM mutations that counts as "settled".
    pub settle_quiet_ms: u64,
    pub headless: bool,
    pub concurrency: usize,
    pub chrome_path: Option<PathBuf>,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            navigation_timeout_ms: 30_000,
            interaction_timeout_ms: 10_000,
            assert_timeout_ms: 5_000,
            poll_interval_ms: 100,
            absence_hold_ms: 500,
            settle_quiet_ms: 150,
            headless: true,
            concurrency: 1,
            chrome_path: None,
            window_width: 1280,
            window_height: 900,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("base_url must be an http(s) url, got {0:?}")]
    InvalidBaseUrl(String),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("poll_interval_ms ({interval}) must not exceed assert_timeout_ms ({timeout})")]
    IntervalExceedsTimeout { interval: u64, timeout: u64 },
    #[error("settle_quiet_ms ({quiet}) must be shorter than interaction_timeout_ms ({timeout})")]
    QuietExceedsTimeout { quiet: u64, timeout: u64 },
}

impl HarnessConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(self.base_url.clone()));
        }
        let positive = [
            ("navigation_timeout_ms", self.navigation_timeout_ms),
            ("interaction_timeout_ms", self.interaction_timeout_ms),
            ("assert_timeout_ms", self.assert_timeout_ms),
            ("poll_interval_ms", self.poll_interval_ms),
            ("concurrency", self.concurrency as u64),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Zero(name));
        }
        if self.poll_interval_ms > self.assert_timeout_ms {
            return Err(ConfigError::IntervalExceedsTimeout {
                interval: self.poll_interval_ms,
                timeout: self.assert_timeout_ms,
            });
        }
        if self.settle_quiet_ms >= self.interaction_timeout_ms {
            return Err(ConfigError::QuietExceedsTimeout {
                quiet: self.settle_quiet_ms,
                timeout: self.interaction_timeout_ms,
            });
        }
        Ok(())
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn interaction_timeout(&self) -> Duration {
        Duration::from_millis(self.interaction_timeout_ms)
    }

    pub fn assert_timeout(&self) -> Duration {
        Duration::from_millis(self.assert_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn absence_hold(&self) -> Duration {
        Duration::from_millis(self.absence_hold_ms)
    }

    pub fn settle_quiet(&self) -> Duration {
        Duration::from_millis(self.settle_quiet_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(HarnessConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_zero_timeouts_and_bad_urls() {
        let config = HarnessConfig {
            assert_timeout_ms: 0,
            ..HarnessConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::Zero("assert_timeout_ms")));

        let config = HarnessConfig {
            base_url: "localhost:5173".to_string(),
            ..HarnessConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn interval_longer_than_timeout_is_rejected() {
        let config = HarnessConfig {
            poll_interval_ms: 6_000,
            ..HarnessConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::IntervalExceedsTimeout { .. })
        ));
    }

    #[test]
    fn settle_window_must_fit_inside_interaction_timeout() {
        let config = HarnessConfig {
            settle_quiet_ms: 10_000,
            ..HarnessConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::QuietExceedsTimeout {
                quiet: 10_000,
                timeout: 10_000,
            })
        );

        let config = HarnessConfig {
            settle_quiet_ms: 9_999,
            ..HarnessConfig::default()
        };
        assert_eq!(config.validate(), Ok(()));
    }
}
