use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{JobLogs, JobProgress, JobStatus, JobUrls, ScrapeJob};
use crate::error::PersistError;

/// Optional filter for [`ScrapeJobStore::list`].
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub site_key: Option<String>,
    pub status: Option<JobStatus>,
}

#[derive(Clone)]
pub struct ScrapeJobStore {
    pool: PgPool,
}

impl ScrapeJobStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, job: &ScrapeJob) -> Result<(), PersistError> {
        sqlx::query(
            r"INSERT INTO scrape_jobs
                (id, site_key, base_url, start_url, max_pages, status, progress, config,
                 logs, urls, error_message, started_at, completed_at, created_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(job.id)
        .bind(&job.site_key)
        .bind(&job.base_url)
        .bind(&job.start_url)
        .bind(job.max_pages)
        .bind(job.status)
        .bind(serde_json::to_value(&job.progress).unwrap_or_default())
        .bind(&job.config)
        .bind(serde_json::to_value(&job.logs).unwrap_or_default())
        .bind(serde_json::to_value(&job.urls).unwrap_or_default())
        .bind(&job.error_message)
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(job.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Persist the mutable parts of a job: status, progress, logs, urls,
    /// error message, timestamps. Called by the job engine after every
    /// meaningful state transition.
    pub async fn save_state(&self, job: &ScrapeJob) -> Result<(), PersistError> {
        sqlx::query(
            r"UPDATE scrape_jobs
              SET status = $2, progress = $3, logs = $4, urls = $5,
                  error_message = $6, started_at = $7, completed_at = $8
              WHERE id = $1",
        )
        .bind(job.id)
        .bind(job.status)
        .bind(serde_json::to_value(&job.progress).unwrap_or_default())
        .bind(serde_json::to_value(&job.logs).unwrap_or_default())
        .bind(serde_json::to_value(&job.urls).unwrap_or_default())
        .bind(&job.error_message)
        .bind(job.started_at)
        .bind(job.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<ScrapeJob>, PersistError> {
        let row = sqlx::query_as::<_, ScrapeJobRow>(
            r"SELECT id, site_key, base_url, start_url, max_pages, status, progress, config,
                     logs, urls, error_message, started_at, completed_at, created_at
              FROM scrape_jobs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ScrapeJobRow::into_domain))
    }

    /// Just the `status` column — the cheap poll used by the job engine's
    /// cooperative-cancellation checks and by the progress channel.
    pub async fn get_status(&self, id: Uuid) -> Result<Option<JobStatus>, PersistError> {
        let row: Option<(JobStatus,)> = sqlx::query_as("SELECT status FROM scrape_jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(status,)| status))
    }

    /// Any job running anywhere, regardless of site — used to enforce
    /// the single-running-job invariant at creation time: at most one
    /// job may have `status = running` across the whole system.
    pub async fn find_any_running(&self) -> Result<Option<ScrapeJob>, PersistError> {
        let row = sqlx::query_as::<_, ScrapeJobRow>(
            r"SELECT id, site_key, base_url, start_url, max_pages, status, progress, config,
                     logs, urls, error_message, started_at, completed_at, created_at
              FROM scrape_jobs WHERE status = 'running'
              LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ScrapeJobRow::into_domain))
    }

    pub async fn list(&self, filter: &JobFilter) -> Result<Vec<ScrapeJob>, PersistError> {
        let rows = sqlx::query_as::<_, ScrapeJobRow>(
            r"SELECT id, site_key, base_url, start_url, max_pages, status, progress, config,
                     logs, urls, error_message, started_at, completed_at, created_at
              FROM scrape_jobs
              WHERE ($1::text IS NULL OR site_key = $1)
                AND ($2::text IS NULL OR status = $2)
              ORDER BY created_at DESC",
        )
        .bind(filter.site_key.as_deref())
        .bind(filter.status.map(|s| match s {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ScrapeJobRow::into_domain).collect())
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), PersistError> {
        sqlx::query("DELETE FROM scrape_jobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct ScrapeJobRow {
    id: Uuid,
    site_key: String,
    base_url: Option<String>,
    start_url: String,
    max_pages: i32,
    status: JobStatus,
    progress: serde_json::Value,
    config: Option<serde_json::Value>,
    logs: serde_json::Value,
    urls: serde_json::Value,
    error_message: Option<String>,
    started_at: Option<chrono::DateTime<chrono::Utc>>,
    completed_at: Option<chrono::DateTime<chrono::Utc>>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl ScrapeJobRow {
    fn into_domain(self) -> ScrapeJob {
        ScrapeJob {
            id: self.id,
            site_key: self.site_key,
            base_url: self.base_url,
            start_url: self.start_url,
            max_pages: self.max_pages,
            status: self.status,
            progress: serde_json::from_value(self.progress).unwrap_or_default(),
            config: self.config,
            logs: serde_json::from_value(self.logs).unwrap_or_default(),
            urls: serde_json::from_value(self.urls).unwrap_or_default(),
            error_message: self.error_message,
            started_at: self.started_at,
            completed_at: self.completed_at,
            created_at: self.created_at,
        }
    }
}
