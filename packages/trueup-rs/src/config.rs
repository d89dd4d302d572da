//! Engine configuration loaded from environment variables.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;

/// Tunables for a reconciliation session.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long one dispatch may wait on the reconciliation service before
    /// it is abandoned as a transport failure. Timeout is the only way an
    /// in-flight dispatch is cancelled.
    pub dispatch_timeout: Duration,
    /// Activity window used by the engagement-rate statistic, in days.
    pub engagement_window_days: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dispatch_timeout: Duration::from_secs(30),
            engagement_window_days: 30,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset variables fall back to the defaults above.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let defaults = Self::default();

        let dispatch_timeout = match env::var("TRUEUP_DISPATCH_TIMEOUT_SECS") {
            Ok(raw) => Duration::from_secs(
                raw.parse()
                    .context("TRUEUP_DISPATCH_TIMEOUT_SECS must be a number of seconds")?,
            ),
            Err(_) => defaults.dispatch_timeout,
        };

        let engagement_window_days = match env::var("TRUEUP_ENGAGEMENT_WINDOW_DAYS") {
            Ok(raw) => raw
                .parse()
                .context("TRUEUP_ENGAGEMENT_WINDOW_DAYS must be a number of days")?,
            Err(_) => defaults.engagement_window_days,
        };

        Ok(Self {
            dispatch_timeout,
            engagement_window_days,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.dispatch_timeout, Duration::from_secs(30));
        assert_eq!(config.engagement_window_days, 30);
    }

    #[test]
    fn test_from_env_uses_defaults_when_unset() {
        // Scoped to variables nothing else in the suite touches.
        env::remove_var("TRUEUP_DISPATCH_TIMEOUT_SECS");
        env::remove_var("TRUEUP_ENGAGEMENT_WINDOW_DAYS");
        let config = EngineConfig::from_env().unwrap();
        assert_eq!(config.dispatch_timeout, Duration::from_secs(30));
    }
}
