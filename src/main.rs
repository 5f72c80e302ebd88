//! Process entry point: wires up the Postgres pool and every component,
//! and exits. There is no HTTP transport here — `ControlSurface` is a
//! domain-logic surface a future wire layer would front.

use std::sync::Arc;

use realty_scrape::config::Settings;
use realty_scrape::config_cache::ConfigCache;
use realty_scrape::control::ControlSurface;
use realty_scrape::engine::EngineContext;
use realty_scrape::fetcher::RobotsCache;
use realty_scrape::persistence::{self, FieldMappingStore, ListingStore, ScrapeJobStore, SiteConfigStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let settings = Settings::from_env();
    let pool = persistence::connect(settings.database_url(), settings.db_pool_max_connections()).await?;

    let jobs = ScrapeJobStore::new(pool.clone());
    let site_configs = SiteConfigStore::new(pool.clone());
    let listings = ListingStore::new(pool.clone());
    let field_mappings = FieldMappingStore::new(pool.clone());

    let config_cache = Arc::new(ConfigCache::new(field_mappings, settings.config_cache_ttl()));
    let robots = Arc::new(RobotsCache::new(reqwest::Client::new(), settings.robots_cache_ttl()));

    let ctx = EngineContext {
        jobs,
        site_configs,
        listings,
        config_cache,
        robots,
        settings,
    };
    let control = ControlSurface::new(ctx);

    tracing::info!("realty_scrape wired up, site_configs = {}", control.list_site_configs().await?.len());

    Ok(())
}
