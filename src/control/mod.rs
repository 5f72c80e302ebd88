//! Job control: plain async operations over `ScrapeJob` and
//! `SiteConfig`. A domain-logic surface, not a transport — the HTTP
//! routing/auth envelope that would front this in production is out
//! of scope here.

use uuid::Uuid;

use crate::domain::{JobLogs, JobProgress, JobStatus, JobUrls, ScrapeJob, SiteConfig};
use crate::engine::{self, EngineContext};
use crate::error::JobError;
use crate::persistence::JobFilter;

/// Everything job control needs: the stores `EngineContext` already
/// wraps, plus the config cache it invalidates on every site-config
/// write.
#[derive(Clone)]
pub struct ControlSurface {
    ctx: EngineContext,
}

impl ControlSurface {
    #[must_use]
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    /// Validates the site exists and is active, refuses to start a job
    /// while any job anywhere is still running, inserts a `Pending` job,
    /// and spawns the engine to run it in the background. Returns
    /// immediately — the caller does not block for the crawl to finish.
    pub async fn create_job(
        &self,
        site_key: &str,
        start_url: String,
        max_pages: Option<i32>,
        config_overrides: Option<serde_json::Value>,
    ) -> Result<ScrapeJob, JobError> {
        let site_config = self
            .ctx
            .site_configs
            .get_by_key(site_key)
            .await?
            .ok_or_else(|| JobError::NotFound(format!("site config '{site_key}'")))?;
        if !site_config.is_active {
            return Err(JobError::Validation(format!("site '{site_key}' is not active")));
        }

        if let Some(running) = self.ctx.jobs.find_any_running().await? {
            return Err(JobError::JobConflict(running.id));
        }

        let now = chrono::Utc::now();
        let job = ScrapeJob {
            id: Uuid::new_v4(),
            site_key: site_key.to_string(),
            base_url: Some(site_config.base_url.clone()),
            start_url,
            max_pages: max_pages.unwrap_or(10),
            status: JobStatus::Pending,
            progress: JobProgress::default(),
            config: config_overrides,
            logs: JobLogs::default(),
            urls: JobUrls::default(),
            error_message: None,
            started_at: None,
            completed_at: None,
            created_at: now,
        };
        self.ctx.jobs.insert(&job).await?;

        let ctx = self.ctx.clone();
        let job_id = job.id;
        tokio::spawn(async move {
            if let Err(error) = engine::run_job(&ctx, job_id).await {
                tracing::error!(%job_id, %error, "job engine failed to start");
            }
        });

        Ok(job)
    }

    pub async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<ScrapeJob>, JobError> {
        Ok(self.ctx.jobs.list(filter).await?)
    }

    pub async fn get_job(&self, id: Uuid) -> Result<ScrapeJob, JobError> {
        self.ctx
            .jobs
            .get(id)
            .await?
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    /// Cancelling an already-terminal job is a no-op that returns the
    /// current state, not an error — idempotent by design.
    pub async fn cancel_job(&self, id: Uuid) -> Result<ScrapeJob, JobError> {
        let mut job = self.get_job(id).await?;
        job.mark_cancelled();
        self.ctx.jobs.save_state(&job).await?;
        Ok(job)
    }

    /// Refuses to delete a `Running` job — it must be cancelled first.
    pub async fn delete_job(&self, id: Uuid) -> Result<(), JobError> {
        let job = self.get_job(id).await?;
        if job.status == JobStatus::Running {
            return Err(JobError::Validation("cannot delete a running job, cancel it first".to_string()));
        }
        self.ctx.jobs.delete(id).await?;
        Ok(())
    }

    pub async fn create_site_config(&self, config: SiteConfig) -> Result<SiteConfig, JobError> {
        if self.ctx.site_configs.get_by_key(&config.key).await?.is_some() {
            return Err(JobError::Duplicate(config.key.clone()));
        }
        self.ctx.site_configs.create(&config).await?;
        self.ctx.config_cache.invalidate().await;
        Ok(config)
    }

    pub async fn update_site_config(&self, config: SiteConfig) -> Result<SiteConfig, JobError> {
        self.ctx
            .site_configs
            .get(config.id)
            .await?
            .ok_or_else(|| JobError::NotFound(config.id.to_string()))?;
        self.ctx.site_configs.update(&config).await?;
        self.ctx.config_cache.invalidate().await;
        Ok(config)
    }

    pub async fn get_site_config(&self, id: Uuid) -> Result<SiteConfig, JobError> {
        self.ctx
            .site_configs
            .get(id)
            .await?
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    pub async fn list_site_configs(&self) -> Result<Vec<SiteConfig>, JobError> {
        Ok(self.ctx.site_configs.list().await?)
    }

    pub async fn deactivate_site_config(&self, id: Uuid) -> Result<(), JobError> {
        self.ctx.site_configs.deactivate(id).await?;
        self.ctx.config_cache.invalidate().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_idempotent_on_already_terminal_job() {
        let mut job = sample_job(JobStatus::Completed);
        assert!(!job.mark_cancelled());
        assert_eq!(job.status, JobStatus::Completed);
    }

    fn sample_job(status: JobStatus) -> ScrapeJob {
        ScrapeJob {
            id: Uuid::new_v4(),
            site_key: "pearls".into(),
            base_url: None,
            start_url: "https://example.com".into(),
            max_pages: 10,
            status,
            progress: JobProgress::default(),
            config: None,
            logs: JobLogs::default(),
            urls: JobUrls::default(),
            error_message: None,
            started_at: None,
            completed_at: None,
            created_at: chrono::Utc::now(),
        }
    }
}
