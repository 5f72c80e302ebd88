//! Error types shared across the scraping pipeline.
//!
//! Each layer gets its own tagged enum; [`ScrapeError`] unifies them at the
//! boundaries (the job engine, the control surface) via `#[from]`.

use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Result type alias used throughout the crate.
pub type ScrapeResult<T> = Result<T, ScrapeError>;

/// Errors from [`crate::fetcher`].
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("blocked by robots.txt: {0}")]
    RobotsBlocked(String),

    #[error("already visited in this job: {0}")]
    AlreadyVisited(String),

    #[error("request timed out after {0:?}: {1}")]
    Timeout(Duration, String),

    #[error("request to {0} failed after exhausting retries: {1}")]
    RetriesExhausted(String, String),

    #[error("non-retriable HTTP status {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("failed to load robots.txt for {0}: {1}")]
    RobotsUnavailable(String, String),
}

impl FetchError {
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::Timeout(..) | FetchError::Network(_) | FetchError::RetriesExhausted(..)
        )
    }
}

/// Errors from [`crate::extractor`].
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("HTML input too large: {0} bytes (maximum {1} bytes)")]
    InputTooLarge(usize, usize),

    #[error("invalid selector '{selector}' even after stripping pseudo-classes: {reason}")]
    InvalidSelector { selector: String, reason: String },
}

/// Errors from [`crate::normalizer`].
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("no normalizer registered for partner: '{0}'")]
    UnknownPartner(String),
}

/// Errors from [`crate::persistence`].
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Errors from [`crate::engine`] and [`crate::control`].
#[derive(Debug, Error)]
pub enum JobError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate: {0}")]
    Duplicate(String),

    #[error("a job is already running (job {0})")]
    JobConflict(Uuid),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Top-level error uniting every layer.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ScrapeError {
    /// Whether retrying the operation that produced this error is worthwhile.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            ScrapeError::Fetch(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<sqlx::Error> for ScrapeError {
    fn from(e: sqlx::Error) -> Self {
        ScrapeError::Persist(PersistError::Database(e))
    }
}

/// Exponential backoff with a cap, mirroring the retry-config pattern used
/// elsewhere in this codebase for transient operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = self.backoff_multiplier.powi(attempt as i32);
        let delay_ms = (self.initial_delay.as_millis() as f64 * multiplier) as u64;
        Duration::from_millis(delay_ms).min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_capped() {
        let cfg = RetryConfig::default();
        let d = cfg.delay_for_attempt(10);
        assert_eq!(d, cfg.max_delay);
    }

    #[test]
    fn backoff_grows_exponentially() {
        let cfg = RetryConfig::default();
        assert!(cfg.delay_for_attempt(1) > cfg.delay_for_attempt(0));
        assert!(cfg.delay_for_attempt(2) > cfg.delay_for_attempt(1));
    }
}
