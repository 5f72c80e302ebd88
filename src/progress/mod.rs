//! Progress channel: poll-based live snapshots of a running
//! [`ScrapeJob`]. The `scrape_jobs` row is the only durable state; this
//! module just polls it and fans changes out to subscribers over a
//! `broadcast` channel.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::{JobProgress, JobStatus, ScrapeJob};
use crate::persistence::ScrapeJobStore;

const CHANNEL_CAPACITY: usize = 32;
const RECENT_LIMIT: usize = 5;

/// A point-in-time view of a job, emitted whenever an observable field
/// changes and always once more when the job reaches a terminal status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub progress: JobProgress,
    pub recent_errors: Vec<String>,
    pub recent_scraped: Vec<String>,
    pub error_message: Option<String>,
}

impl ProgressSnapshot {
    fn from_job(job: &ScrapeJob) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            progress: job.progress,
            recent_errors: job
                .logs
                .errors
                .iter()
                .rev()
                .take(RECENT_LIMIT)
                .map(|entry| entry.message.clone())
                .collect(),
            recent_scraped: job.urls.scraped.iter().rev().take(RECENT_LIMIT).cloned().collect(),
            error_message: job.error_message.clone(),
        }
    }
}

/// Shares one poller per `job_id` across however many callers ask to
/// watch it; the poller tears itself down once its last subscriber
/// disconnects or the job reaches a terminal status.
#[derive(Clone)]
pub struct ProgressChannel {
    jobs: ScrapeJobStore,
    poll_interval: Duration,
    pollers: Arc<DashMap<Uuid, broadcast::Sender<ProgressSnapshot>>>,
}

impl ProgressChannel {
    #[must_use]
    pub fn new(jobs: ScrapeJobStore, poll_interval: Duration) -> Self {
        Self {
            jobs,
            poll_interval,
            pollers: Arc::new(DashMap::new()),
        }
    }

    /// Subscribes to snapshots for `job_id`, starting a poller task if
    /// none is already running for it.
    pub fn subscribe(&self, job_id: Uuid) -> broadcast::Receiver<ProgressSnapshot> {
        match self.pollers.entry(job_id) {
            dashmap::mapref::entry::Entry::Occupied(entry) => entry.get().subscribe(),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let (tx, rx) = broadcast::channel(CHANNEL_CAPACITY);
                entry.insert(tx.clone());

                tokio::spawn(run_poller(
                    self.jobs.clone(),
                    self.pollers.clone(),
                    job_id,
                    tx,
                    self.poll_interval,
                ));
                rx
            }
        }
    }
}

async fn run_poller(
    jobs: ScrapeJobStore,
    pollers: Arc<DashMap<Uuid, broadcast::Sender<ProgressSnapshot>>>,
    job_id: Uuid,
    tx: broadcast::Sender<ProgressSnapshot>,
    interval: Duration,
) {
    let mut last: Option<ProgressSnapshot> = None;

    loop {
        tokio::time::sleep(interval).await;

        if tx.receiver_count() == 0 {
            break;
        }

        let job = match jobs.get(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => break,
            Err(error) => {
                tracing::warn!(%job_id, %error, "progress poll failed, retrying next tick");
                continue;
            }
        };

        let snapshot = ProgressSnapshot::from_job(&job);
        let terminal = job.status.is_terminal();
        let changed = last.as_ref() != Some(&snapshot);

        if changed || terminal {
            let _ = tx.send(snapshot.clone());
        }
        last = Some(snapshot);

        if terminal {
            break;
        }
    }

    pollers.remove_if(&job_id, |_, sender| sender.same_channel(&tx));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobLogs, JobUrls, LogLevel};
    use chrono::Utc;

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
            created_at: Utc::now(),
        }
    }

    #[test]
    fn snapshot_carries_recent_logs_and_urls_most_recent_first() {
        let mut job = sample_job(JobStatus::Running);
        job.logs.push(LogLevel::Error, "first", None);
        job.logs.push(LogLevel::Error, "second", None);
        job.urls.track(crate::domain::UrlBucket::Scraped, "https://example.com/a");
        job.urls.track(crate::domain::UrlBucket::Scraped, "https://example.com/b");

        let snapshot = ProgressSnapshot::from_job(&job);
        assert_eq!(snapshot.recent_errors, vec!["second", "first"]);
        assert_eq!(
            snapshot.recent_scraped,
            vec!["https://example.com/b", "https://example.com/a"]
        );
    }

    #[test]
    fn snapshots_with_same_status_and_progress_are_equal() {
        let a = ProgressSnapshot::from_job(&sample_job(JobStatus::Running));
        let b = ProgressSnapshot::from_job(&sample_job(JobStatus::Running));
        assert_eq!(a.status, b.status);
        assert_eq!(a.progress, b.progress);
    }

    #[test]
    fn terminal_status_is_detected() {
        assert!(sample_job(JobStatus::Completed).status.is_terminal());
        assert!(!sample_job(JobStatus::Running).status.is_terminal());
    }
}
