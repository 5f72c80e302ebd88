//! C1 — Ethical Fetcher: robots.txt-gated, rate-limited, retrying HTTP
//! client scoped to a single running job.

mod robots;

pub use robots::RobotsCache;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use regex::Regex;
use tokio::sync::Mutex;

use crate::error::FetchError;

static USER_AGENT_PATTERN: once_cell::sync::Lazy<Regex> =
    once_cell::sync::Lazy::new(|| Regex::new(r".+/.+\s*\(\+.+\)").expect("static regex"));

/// Outcome of a fetch attempt — callers branch on all four variants,
/// only `Ok` carries a body forward to the extractor.
pub enum FetchOutcome {
    Ok { url: String, body: String },
    Blocked(String),
    AlreadyVisited(String),
    Err(FetchError),
}

#[derive(Debug, Clone)]
pub struct FetcherOptions {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub user_agent: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff_factor: f64,
}

/// One fetcher per running job: owns its own visited-URL set (I-VISITED)
/// and shares the robots cache across jobs on the same origin set.
pub struct EthicalFetcher {
    client: reqwest::Client,
    robots: Arc<RobotsCache>,
    options: FetcherOptions,
    visited: Mutex<HashSet<String>>,
}

impl EthicalFetcher {
    pub fn new(robots: Arc<RobotsCache>, options: FetcherOptions) -> Result<Self, FetchError> {
        if !USER_AGENT_PATTERN.is_match(&options.user_agent) {
            tracing::warn!(
                user_agent = %options.user_agent,
                "User-Agent does not follow identifiable bot format, \
                 recommended: 'BotName/Version (+contact: email@example.com)'"
            );
        }

        let client = reqwest::Client::builder()
            .user_agent(options.user_agent.clone())
            .timeout(options.timeout)
            .build()?;

        Ok(Self {
            client,
            robots,
            options,
            visited: Mutex::new(HashSet::new()),
        })
    }

    /// Fetch `url`, honoring robots.txt, rate limiting, retries, and
    /// per-job deduplication.
    pub async fn get(&self, url: &str) -> FetchOutcome {
        {
            let mut visited = self.visited.lock().await;
            if visited.contains(url) {
                return FetchOutcome::AlreadyVisited(url.to_string());
            }
            visited.insert(url.to_string());
        }

        let parsed = match url::Url::parse(url) {
            Ok(u) => u,
            Err(e) => return FetchOutcome::Err(FetchError::RobotsUnavailable(url.to_string(), e.to_string())),
        };

        if !self.robots.is_allowed(&parsed, &self.options.user_agent).await {
            return FetchOutcome::Blocked(url.to_string());
        }

        self.sleep_for_rate_limit().await;

        match self.fetch_with_retries(url).await {
            Ok(body) => FetchOutcome::Ok {
                url: url.to_string(),
                body,
            },
            Err(e) => FetchOutcome::Err(e),
        }
    }

    async fn sleep_for_rate_limit(&self) {
        let delay = {
            let mut rng = rand::rng();
            let min = self.options.min_delay.as_secs_f64();
            let max = self.options.max_delay.as_secs_f64();
            if max > min {
                rng.random_range(min..max)
            } else {
                min
            }
        };
        tokio::time::sleep(Duration::from_secs_f64(delay)).await;
    }

    async fn fetch_with_retries(&self, url: &str) -> Result<String, FetchError> {
        let mut attempt = 0;
        loop {
            let result = self.client.get(url).send().await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.text().await.map_err(FetchError::Network);
                    }
                    if status.as_u16() == 429 || status.is_server_error() {
                        if attempt >= self.options.max_retries {
                            return Err(FetchError::RetriesExhausted(
                                url.to_string(),
                                format!("HTTP {status}"),
                            ));
                        }
                        let backoff = self.options.backoff_factor.powi(attempt as i32);
                        tokio::time::sleep(Duration::from_secs_f64(backoff)).await;
                        attempt += 1;
                        continue;
                    }
                    // Non-429 4xx is terminal, no retry.
                    return Err(FetchError::HttpStatus {
                        status: status.as_u16(),
                        url: url.to_string(),
                    });
                }
                Err(e) if e.is_timeout() => {
                    return Err(FetchError::Timeout(self.options.timeout, url.to_string()));
                }
                Err(e) => {
                    if attempt >= self.options.max_retries {
                        return Err(FetchError::Network(e));
                    }
                    let backoff = self.options.backoff_factor.powi(attempt as i32);
                    tokio::time::sleep(Duration::from_secs_f64(backoff)).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_pattern_accepts_identifiable_bots() {
        assert!(USER_AGENT_PATTERN.is_match("RealEstateResearchBot/1.0 (+contact: you@example.com)"));
        assert!(!USER_AGENT_PATTERN.is_match("Mozilla/5.0"));
    }
}
