//! Per-origin robots.txt cache. Fail-closed: an origin whose robots.txt
//! couldn't be loaded blocks every request until the next refresh — it
//! is never treated as "allow all".

use std::time::{Duration, Instant};

use dashmap::DashMap;
use texting_robots::Robot;

struct CachedRobots {
    robot: Option<Robot>,
    cached_at: Instant,
}

pub struct RobotsCache {
    ttl: Duration,
    client: reqwest::Client,
    // `texting_robots::Robot` bakes the requesting user-agent's group
    // selection in at parse time, so the cache key must include it —
    // two jobs with different user agents hitting the same origin must
    // not share a parse keyed to only one of them.
    entries: DashMap<(String, String), CachedRobots>,
}

impl RobotsCache {
    #[must_use]
    pub fn new(client: reqwest::Client, ttl: Duration) -> Self {
        Self {
            ttl,
            client,
            entries: DashMap::new(),
        }
    }

    /// `true` if `url` is fetchable by `user_agent` under this origin's
    /// robots.txt. Loads and caches robots.txt on first use per
    /// `(origin, user_agent)` pair.
    pub async fn is_allowed(&self, url: &url::Url, user_agent: &str) -> bool {
        let origin = origin_of(url);
        let key = (origin.clone(), user_agent.to_string());

        if let Some(entry) = self.entries.get(&key) {
            if entry.cached_at.elapsed() < self.ttl {
                return Self::check(entry.robot.as_ref(), url.as_str());
            }
        }

        let robots_url = format!("{origin}/robots.txt");
        let robot = match self.fetch(&robots_url, user_agent).await {
            Ok(robot) => {
                tracing::info!(%robots_url, "loaded robots.txt");
                Some(robot)
            }
            Err(error) => {
                tracing::warn!(%robots_url, %error, "failed to load robots.txt — blocking all requests (fail-closed)");
                None
            }
        };

        let allowed = Self::check(robot.as_ref(), url.as_str());
        self.entries.insert(
            key,
            CachedRobots {
                robot,
                cached_at: Instant::now(),
            },
        );
        allowed
    }

    async fn fetch(&self, robots_url: &str, user_agent: &str) -> Result<Robot, anyhow::Error> {
        let body = self
            .client
            .get(robots_url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Robot::new(user_agent, &body).map_err(|e| anyhow::anyhow!("{e}"))
    }

    fn check(robot: Option<&Robot>, url: &str) -> bool {
        match robot {
            Some(robot) => robot.allowed(url),
            None => false,
        }
    }
}

fn origin_of(url: &url::Url) -> String {
    let scheme = url.scheme();
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{scheme}://{host}:{port}"),
        None => format!("{scheme}://{host}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_strips_path() {
        let url = url::Url::parse("https://example.com/a/b?c=1").unwrap();
        assert_eq!(origin_of(&url), "https://example.com");
    }

    #[test]
    fn origin_keeps_nondefault_port() {
        let url = url::Url::parse("http://example.com:8080/x").unwrap();
        assert_eq!(origin_of(&url), "http://example.com:8080");
    }
}
