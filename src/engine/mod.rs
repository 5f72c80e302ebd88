//! Job engine: orchestrates one [`ScrapeJob`] end to end, from the
//! first search page through every listing to completion.

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::config::Settings;
use crate::config_cache::SharedConfigCache;
use crate::domain::{JobStatus, LogLevel, PaginationType, ScrapeJob, SiteConfig, UrlBucket};
use crate::error::{JobError, ScrapeResult};
use crate::extractor::{extract_detail_page, extract_search_page, incremental_path_page_url, query_param_page_url};
use crate::fetcher::{EthicalFetcher, FetcherOptions, FetchOutcome, RobotsCache};
use crate::normalizer::{self, NormalizerMaps};
use crate::persistence::{ListingStore, ScrapeJobStore, SiteConfigStore};

/// Everything the engine needs to run a job, handed in by the control
/// surface so the engine itself stays free of wiring concerns.
#[derive(Clone)]
pub struct EngineContext {
    pub jobs: ScrapeJobStore,
    pub site_configs: SiteConfigStore,
    pub listings: ListingStore,
    pub config_cache: SharedConfigCache,
    pub robots: Arc<RobotsCache>,
    pub settings: Settings,
}

/// Runs `job_id` to completion, persisting every state transition as it
/// happens. Never returns an `Err` for an in-crawl failure — those are
/// recorded on the job itself; an `Err` here means the job couldn't even
/// be loaded or started.
pub async fn run_job(ctx: &EngineContext, job_id: uuid::Uuid) -> ScrapeResult<()> {
    let mut job = ctx
        .jobs
        .get(job_id)
        .await?
        .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

    let Some(site_config) = ctx.site_configs.get_by_key(&job.site_key).await? else {
        job.mark_failed(format!("no site config registered for '{}'", job.site_key));
        ctx.jobs.save_state(&job).await?;
        return Ok(());
    };
    if !site_config.is_active {
        job.mark_failed(format!("site config '{}' is not active", job.site_key));
        ctx.jobs.save_state(&job).await?;
        return Ok(());
    }

    job.mark_running();
    ctx.jobs.save_state(&job).await?;

    let (default_min, default_max) = ctx.settings.default_delay_range();
    let fetcher = match EthicalFetcher::new(
        ctx.robots.clone(),
        FetcherOptions {
            min_delay: Duration::from_secs_f64(job.config_f64("min_delay", default_min.as_secs_f64())),
            max_delay: Duration::from_secs_f64(job.config_f64("max_delay", default_max.as_secs_f64())),
            user_agent: job.config_str("user_agent", ctx.settings.default_user_agent()).to_string(),
            timeout: ctx.settings.request_timeout(),
            max_retries: ctx.settings.max_retries(),
            backoff_factor: ctx.settings.backoff_factor(),
        },
    ) {
        Ok(fetcher) => fetcher,
        Err(error) => {
            job.mark_failed(format!("failed to construct fetcher: {error}"));
            ctx.jobs.save_state(&job).await?;
            return Ok(());
        }
    };

    let field_map = ctx.config_cache.field_map(Some(&site_config.key)).await;
    let feature_map = ctx.config_cache.feature_map(Some(&site_config.key)).await;
    let currency_map = ctx.config_cache.currency_map().await;
    let maps = NormalizerMaps {
        field_map: &field_map,
        feature_map: &feature_map,
        currency_map: &currency_map,
    };

    let mut current_url = job.start_url.clone();
    let mut page_count = 0i32;
    let mut fatal_error: Option<String> = None;

    'crawl: loop {
        if page_count >= job.max_pages {
            break;
        }

        if is_cancelled(ctx, job_id).await {
            job.status = JobStatus::Cancelled;
            break;
        }

        let page_url = match Url::parse(&current_url) {
            Ok(url) => url,
            Err(error) => {
                fatal_error = Some(format!("invalid page URL '{current_url}': {error}"));
                break;
            }
        };

        let page_body = match fetcher.get(&current_url).await {
            FetchOutcome::Ok { body, .. } => body,
            FetchOutcome::Blocked(url) => {
                job.logs.push(LogLevel::Error, "blocked by robots.txt", Some(url));
                job.progress.errors += 1;
                break;
            }
            FetchOutcome::AlreadyVisited(_) => break,
            FetchOutcome::Err(error) => {
                job.logs.push(LogLevel::Error, error.to_string(), Some(current_url.clone()));
                job.progress.errors += 1;
                break;
            }
        };

        page_count += 1;
        job.progress.pages_visited += 1;

        let (listing_links, next_page) = match extract_search_page(&page_body, &page_url, &site_config) {
            Ok(result) => result,
            Err(error) => {
                job.logs.push(LogLevel::Error, error.to_string(), Some(current_url.clone()));
                job.progress.errors += 1;
                break;
            }
        };

        for link in &listing_links {
            job.urls.track(UrlBucket::Found, link.clone());
        }
        job.progress.listings_found += listing_links.len() as u32;
        ctx.jobs.save_state(&job).await?;

        for link in &listing_links {
            if is_cancelled(ctx, job_id).await {
                job.status = JobStatus::Cancelled;
                break 'crawl;
            }

            if let Err(error) = process_listing(ctx, &fetcher, &site_config, &maps, job_id, link).await {
                job.logs.push(LogLevel::Warning, error.to_string(), Some(link.clone()));
                job.urls.track(UrlBucket::Failed, link.clone());
                job.progress.errors += 1;
            } else {
                job.urls.track(UrlBucket::Scraped, link.clone());
                job.progress.listings_scraped += 1;
            }
            ctx.jobs.save_state(&job).await?;
        }

        match next_page_url(&site_config, &job.start_url, page_count, next_page) {
            Ok(Some(next)) => current_url = next,
            Ok(None) => break,
            Err(message) => {
                fatal_error = Some(message);
                break;
            }
        }
    }

    // mark_completed/mark_failed only transition out of `Running`, so a
    // status already flipped to `Cancelled` above is never clobbered.
    match fatal_error {
        Some(message) => job.mark_failed(message),
        None => job.mark_completed(),
    }
    ctx.jobs.save_state(&job).await?;

    Ok(())
}

async fn is_cancelled(ctx: &EngineContext, job_id: uuid::Uuid) -> bool {
    matches!(ctx.jobs.get_status(job_id).await, Ok(Some(JobStatus::Cancelled)))
}

/// Derives the next search-page URL per `site_config.pagination_type`.
/// `page_count` is the 1-indexed number of the page just processed;
/// `html_next_candidate` is whatever `extract_search_page` found in the
/// DOM (only meaningful for `html_next`). `Ok(None)` stops the crawl;
/// `Err` is a fatal misconfiguration (e.g. a `query_param` site with no
/// `pagination_param` set).
fn next_page_url(
    site_config: &SiteConfig,
    start_url: &str,
    page_count: i32,
    html_next_candidate: Option<String>,
) -> Result<Option<String>, String> {
    match site_config.pagination_type {
        PaginationType::HtmlNext => Ok(html_next_candidate),
        PaginationType::IncrementalPath => Ok(Some(incremental_path_page_url(start_url, page_count + 1))),
        PaginationType::QueryParam => {
            let param = site_config
                .pagination_param
                .as_deref()
                .ok_or_else(|| format!("site '{}' uses query_param pagination with no pagination_param set", site_config.key))?;
            query_param_page_url(start_url, param, page_count + 1)
                .map(Some)
                .map_err(|error| format!("could not build next page URL from '{start_url}': {error}"))
        }
    }
}

async fn process_listing(
    ctx: &EngineContext,
    fetcher: &EthicalFetcher,
    site_config: &crate::domain::SiteConfig,
    maps: &NormalizerMaps<'_>,
    job_id: uuid::Uuid,
    link: &str,
) -> Result<(), crate::error::ScrapeError> {
    let body = match fetcher.get(link).await {
        FetchOutcome::Ok { body, .. } => body,
        FetchOutcome::Blocked(url) => return Err(crate::error::FetchError::RobotsBlocked(url).into()),
        FetchOutcome::AlreadyVisited(url) => return Err(crate::error::FetchError::AlreadyVisited(url).into()),
        FetchOutcome::Err(error) => return Err(error.into()),
    };

    let page_url = Url::parse(link).map_err(|e| crate::error::ScrapeError::Internal(e.to_string()))?;
    let extraction = extract_detail_page(&body, &page_url, site_config, maps.field_map, maps.feature_map)?;
    let schema = normalizer::normalize(&site_config.key, &extraction, link, maps)?;
    ctx.listings.upsert(&schema, job_id).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ExtractionMode;

    fn site_config(pagination_type: PaginationType, pagination_param: Option<&str>) -> SiteConfig {
        SiteConfig {
            id: uuid::Uuid::new_v4(),
            key: "testsite".into(),
            name: "Test Site".into(),
            base_url: "https://x.test".into(),
            selectors: serde_json::json!({}),
            extraction_mode: ExtractionMode::Direct,
            pagination_type,
            pagination_param: pagination_param.map(str::to_string),
            link_pattern: None,
            image_filter: None,
            is_active: true,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn html_next_uses_the_discovered_candidate_verbatim() {
        let config = site_config(PaginationType::HtmlNext, None);
        let result = next_page_url(&config, "https://x.test/search", 1, Some("https://x.test/search?p=2".into()));
        assert_eq!(result, Ok(Some("https://x.test/search?p=2".to_string())));
    }

    #[test]
    fn html_next_stops_when_no_candidate_found() {
        let config = site_config(PaginationType::HtmlNext, None);
        let result = next_page_url(&config, "https://x.test/search", 1, None);
        assert_eq!(result, Ok(None));
    }

    #[test]
    fn incremental_path_appends_the_next_page_number() {
        let config = site_config(PaginationType::IncrementalPath, None);
        let result = next_page_url(&config, "https://x.test/search", 2, None);
        assert_eq!(result, Ok(Some("https://x.test/search/3".to_string())));
    }

    #[test]
    fn query_param_appends_the_configured_param() {
        let config = site_config(PaginationType::QueryParam, Some("page"));
        let result = next_page_url(&config, "https://x.test/search", 4, None);
        assert_eq!(result, Ok(Some("https://x.test/search?page=5".to_string())));
    }

    #[test]
    fn query_param_without_pagination_param_is_a_fatal_error() {
        let config = site_config(PaginationType::QueryParam, None);
        assert!(next_page_url(&config, "https://x.test/search", 1, None).is_err());
    }
}
