use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// `Pending -> Running -> {Completed, Failed, Cancelled}`. A terminal
/// status is never overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// Running counters for a job, updated after each page and each listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    pub pages_visited: u32,
    pub listings_found: u32,
    pub listings_scraped: u32,
    pub errors: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobLogs {
    pub errors: Vec<LogEntry>,
    pub warnings: Vec<LogEntry>,
    pub info: Vec<LogEntry>,
}

impl JobLogs {
    pub fn push(&mut self, level: LogLevel, message: impl Into<String>, url: Option<String>) {
        let entry = LogEntry {
            timestamp: Utc::now(),
            message: message.into(),
            url,
        };
        match level {
            LogLevel::Error => self.errors.push(entry),
            LogLevel::Warning => self.warnings.push(entry),
            LogLevel::Info => self.info.push(entry),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum LogLevel {
    Error,
    Warning,
    Info,
}

/// Discovered/scraped/failed URL tracking for a job, deduplicated per
/// bucket (adding the same URL to the same bucket twice is a no-op).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobUrls {
    pub found: Vec<String>,
    pub scraped: Vec<String>,
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub enum UrlBucket {
    Found,
    Scraped,
    Failed,
}

impl JobUrls {
    pub fn track(&mut self, bucket: UrlBucket, url: impl Into<String>) {
        let url = url.into();
        let list = match bucket {
            UrlBucket::Found => &mut self.found,
            UrlBucket::Scraped => &mut self.scraped,
            UrlBucket::Failed => &mut self.failed,
        };
        if !list.iter().any(|existing| existing == &url) {
            list.push(url);
        }
    }
}

/// One paginated crawl of a single site, from `start_url` up to
/// `max_pages`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeJob {
    pub id: Uuid,
    pub site_key: String,
    pub base_url: Option<String>,
    pub start_url: String,
    pub max_pages: i32,
    pub status: JobStatus,
    pub progress: JobProgress,
    /// Runtime overrides: `min_delay`, `max_delay`, `user_agent`.
    pub config: Option<JsonValue>,
    pub logs: JobLogs,
    pub urls: JobUrls,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ScrapeJob {
    pub fn mark_running(&mut self) {
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
        self.progress = JobProgress::default();
        self.logs = JobLogs::default();
        self.urls = JobUrls::default();
    }

    /// Terminal transitions only apply from `Running` — a job already
    /// moved to a terminal state by a concurrent actor is left alone.
    pub fn mark_completed(&mut self) {
        if self.status == JobStatus::Running {
            self.status = JobStatus::Completed;
            self.completed_at = Some(Utc::now());
        }
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        if self.status == JobStatus::Running {
            self.status = JobStatus::Failed;
            self.completed_at = Some(Utc::now());
            self.error_message = Some(error.into());
        }
    }

    pub fn mark_cancelled(&mut self) -> bool {
        if matches!(self.status, JobStatus::Pending | JobStatus::Running) {
            self.status = JobStatus::Cancelled;
            self.completed_at = Some(Utc::now());
            true
        } else {
            false
        }
    }

    /// Config override, falling back to the given default when the job
    /// carries no override or the key is absent/unparsable.
    #[must_use]
    pub fn config_f64(&self, key: &str, default: f64) -> f64 {
        self.config
            .as_ref()
            .and_then(|c| c.get(key))
            .and_then(JsonValue::as_f64)
            .unwrap_or(default)
    }

    #[must_use]
    pub fn config_str<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.config
            .as_ref()
            .and_then(|c| c.get(key))
            .and_then(JsonValue::as_str)
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_status_is_sticky() {
        let mut job = sample_job();
        job.mark_running();
        job.mark_completed();
        assert_eq!(job.status, JobStatus::Completed);
        // a late failure after completion must not clobber it
        job.mark_failed("too late");
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[test]
    fn cancel_is_idempotent_and_only_from_non_terminal() {
        let mut job = sample_job();
        job.mark_running();
        assert!(job.mark_cancelled());
        assert_eq!(job.status, JobStatus::Cancelled);
        // cancelling an already-cancelled job is a no-op, not an error
        assert!(!job.mark_cancelled());
        assert_eq!(job.status, JobStatus::Cancelled);
    }

    #[test]
    fn url_tracking_deduplicates_within_bucket() {
        let mut urls = JobUrls::default();
        urls.track(UrlBucket::Found, "https://example.com/a");
        urls.track(UrlBucket::Found, "https://example.com/a");
        assert_eq!(urls.found.len(), 1);
    }

    fn sample_job() -> ScrapeJob {
        ScrapeJob {
            id: Uuid::new_v4(),
            site_key: "pearls".into(),
            base_url: None,
            start_url: "https://example.com".into(),
            max_pages: 10,
            status: JobStatus::Pending,
            progress: JobProgress::default(),
            config: None,
            logs: JobLogs::default(),
            urls: JobUrls::default(),
            error_message: None,
            started_at: None,
            completed_at: None,
            created_at: Utc::now(),
        }
    }
}
