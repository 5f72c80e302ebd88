//! Runtime settings for the scraping pipeline.
//!
//! Populated from environment variables with documented defaults; nothing
//! here is read from a config file format of its own.

use std::time::Duration;

/// Process-wide settings, read once at startup via [`Settings::from_env`].
#[derive(Debug, Clone)]
pub struct Settings {
    pub(crate) database_url: String,
    pub(crate) default_min_delay_secs: f64,
    pub(crate) default_max_delay_secs: f64,
    pub(crate) default_user_agent: String,
    pub(crate) request_timeout_secs: u64,
    pub(crate) max_retries: u32,
    pub(crate) backoff_factor: f64,
    pub(crate) config_cache_ttl_secs: u64,
    pub(crate) robots_cache_ttl_secs: u64,
    pub(crate) progress_poll_interval_ms: u64,
    pub(crate) db_pool_max_connections: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/realty_scrape".to_string(),
            default_min_delay_secs: 2.0,
            default_max_delay_secs: 5.0,
            default_user_agent: "RealEstateResearchBot/1.0 (+contact: you@example.com)"
                .to_string(),
            request_timeout_secs: 120,
            max_retries: 3,
            backoff_factor: 2.0,
            config_cache_ttl_secs: 300,
            robots_cache_ttl_secs: 3600,
            progress_poll_interval_ms: 1000,
            db_pool_max_connections: 10,
        }
    }
}

impl Settings {
    /// Build settings from environment variables, falling back to
    /// [`Settings::default`] for anything unset or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database_url: std::env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            default_min_delay_secs: env_f64("DEFAULT_MIN_DELAY", defaults.default_min_delay_secs),
            default_max_delay_secs: env_f64("DEFAULT_MAX_DELAY", defaults.default_max_delay_secs),
            default_user_agent: std::env::var("DEFAULT_USER_AGENT")
                .unwrap_or(defaults.default_user_agent),
            request_timeout_secs: env_u64(
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            ),
            max_retries: env_u64("MAX_RETRIES", u64::from(defaults.max_retries)) as u32,
            backoff_factor: env_f64("BACKOFF_FACTOR", defaults.backoff_factor),
            config_cache_ttl_secs: env_u64(
                "CONFIG_CACHE_TTL_SECS",
                defaults.config_cache_ttl_secs,
            ),
            robots_cache_ttl_secs: env_u64(
                "ROBOTS_CACHE_TTL_SECS",
                defaults.robots_cache_ttl_secs,
            ),
            progress_poll_interval_ms: env_u64(
                "PROGRESS_POLL_INTERVAL_MS",
                defaults.progress_poll_interval_ms,
            ),
            db_pool_max_connections: env_u64(
                "DB_POOL_MAX_CONNECTIONS",
                u64::from(defaults.db_pool_max_connections),
            ) as u32,
        }
    }

    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    #[must_use]
    pub fn default_delay_range(&self) -> (Duration, Duration) {
        (
            Duration::from_secs_f64(self.default_min_delay_secs),
            Duration::from_secs_f64(self.default_max_delay_secs),
        )
    }

    #[must_use]
    pub fn default_user_agent(&self) -> &str {
        &self.default_user_agent
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    #[must_use]
    pub fn backoff_factor(&self) -> f64 {
        self.backoff_factor
    }

    #[must_use]
    pub fn config_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.config_cache_ttl_secs)
    }

    #[must_use]
    pub fn robots_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.robots_cache_ttl_secs)
    }

    #[must_use]
    pub fn progress_poll_interval(&self) -> Duration {
        Duration::from_millis(self.progress_poll_interval_ms)
    }

    #[must_use]
    pub fn db_pool_max_connections(&self) -> u32 {
        self.db_pool_max_connections
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let s = Settings::default();
        assert_eq!(s.default_min_delay_secs, 2.0);
        assert_eq!(s.default_max_delay_secs, 5.0);
        assert_eq!(s.max_retries, 3);
        assert_eq!(s.config_cache_ttl_secs, 300);
        assert_eq!(s.robots_cache_ttl_secs, 3600);
    }
}
