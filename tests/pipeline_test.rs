//! Multi-component flow: fetcher -> extractor -> normalizer against a
//! mocked site, exercising the seam the job engine orchestrates without
//! needing a live Postgres instance (persistence has its own unit tests
//! around the pure upsert-decision helpers).

use std::sync::Arc;
use std::time::Duration;

use realty_scrape::config_cache::{default_currency_map, default_feature_map, default_field_map};
use realty_scrape::domain::{ExtractionMode, SiteConfig};
use realty_scrape::extractor::{extract_detail_page, extract_search_page};
use realty_scrape::fetcher::{EthicalFetcher, FetchOutcome, FetcherOptions, RobotsCache};
use realty_scrape::normalizer::{self, NormalizerMaps};
use url::Url;
use uuid::Uuid;

fn site_config(base_url: &str) -> SiteConfig {
    SiteConfig {
        id: Uuid::new_v4(),
        key: "pearls".into(),
        name: "Test Partner".into(),
        base_url: base_url.to_string(),
        selectors: serde_json::json!({
            "listing_link_selector": "a.listing",
            "title_selector": "h1.title",
            "price_selector": ".price",
            "useful_area_selector": ".area",
            "typology_selector": ".typology",
            "district_selector": ".district",
        }),
        extraction_mode: ExtractionMode::Direct,
        pagination_type: realty_scrape::domain::PaginationType::HtmlNext,
        pagination_param: None,
        link_pattern: None,
        image_filter: None,
        is_active: true,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    }
}

async fn fetcher_with_fresh_robots_cache() -> EthicalFetcher {
    let robots = Arc::new(RobotsCache::new(reqwest::Client::new(), Duration::from_secs(3600)));
    EthicalFetcher::new(
        robots,
        FetcherOptions {
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            user_agent: "RealEstateResearchBot/1.0 (+contact: you@example.com)".to_string(),
            timeout: Duration::from_secs(5),
            max_retries: 1,
            backoff_factor: 2.0,
        },
    )
    .unwrap()
}

#[tokio::test]
async fn search_page_to_normalized_listing_roundtrip() {
    let mut server = mockito::Server::new_async().await;
    let _robots_mock = server
        .mock("GET", "/robots.txt")
        .with_status(200)
        .with_body("User-agent: *\nAllow: /")
        .create_async()
        .await;

    let search_html = format!(
        r#"<html><body>
            <a class="listing" href="{base}/listing/1">Listing 1</a>
        </body></html>"#,
        base = server.url()
    );
    let _search_mock = server
        .mock("GET", "/search")
        .with_status(200)
        .with_body(&search_html)
        .create_async()
        .await;

    let detail_html = r#"<html><body>
        <h1 class="title">Charming T2 in Lisbon</h1>
        <span class="price">250.000,00 &euro;</span>
        <span class="area">85,5 m&sup2;</span>
        <span class="typology">T2</span>
        <span class="district">Lisboa</span>
    </body></html>"#;
    let _detail_mock = server
        .mock("GET", "/listing/1")
        .with_status(200)
        .with_body(detail_html)
        .create_async()
        .await;

    let config = site_config(&server.url());
    let fetcher = fetcher_with_fresh_robots_cache().await;

    let search_url = format!("{}/search", server.url());
    let search_body = match fetcher.get(&search_url).await {
        FetchOutcome::Ok { body, .. } => body,
        other => panic!("expected search page fetch to succeed, got {other:?}", other = describe(&other)),
    };
    let page_url = Url::parse(&search_url).unwrap();
    let (links, next_page) = extract_search_page(&search_body, &page_url, &config).unwrap();
    assert_eq!(links.len(), 1);
    assert!(next_page.is_none());

    let detail_body = match fetcher.get(&links[0]).await {
        FetchOutcome::Ok { body, .. } => body,
        other => panic!("expected detail page fetch to succeed, got {other:?}", other = describe(&other)),
    };
    let detail_url = Url::parse(&links[0]).unwrap();
    let field_map = default_field_map();
    let feature_map = default_feature_map();
    let extraction = extract_detail_page(&detail_body, &detail_url, &config, &field_map, &feature_map).unwrap();

    let currency_map = default_currency_map();
    let maps = NormalizerMaps {
        field_map: &field_map,
        feature_map: &feature_map,
        currency_map: &currency_map,
    };
    let listing = normalizer::normalize("pearls", &extraction, &links[0], &maps).unwrap();

    assert_eq!(listing.title.as_deref(), Some("Charming T2 in Lisbon"));
    assert_eq!(listing.price.amount, Some(250_000.0));
    assert_eq!(listing.price.currency.as_deref(), Some("EUR"));
    assert_eq!(listing.area_useful_m2, Some(85.5));
    assert_eq!(listing.bedrooms, Some(2));
    assert_eq!(listing.address.region.as_deref(), Some("Lisboa"));
}

#[tokio::test]
async fn blocked_robots_txt_prevents_every_fetch() {
    let mut server = mockito::Server::new_async().await;
    let _robots_mock = server
        .mock("GET", "/robots.txt")
        .with_status(200)
        .with_body("User-agent: *\nDisallow: /")
        .create_async()
        .await;

    let fetcher = fetcher_with_fresh_robots_cache().await;
    let url = format!("{}/listing/1", server.url());
    match fetcher.get(&url).await {
        FetchOutcome::Blocked(blocked_url) => assert_eq!(blocked_url, url),
        other => panic!("expected Blocked, got {other:?}", other = describe(&other)),
    }
}

#[tokio::test]
async fn missing_robots_txt_fails_closed() {
    let mut server = mockito::Server::new_async().await;
    let _robots_mock = server.mock("GET", "/robots.txt").with_status(404).create_async().await;

    let fetcher = fetcher_with_fresh_robots_cache().await;
    let url = format!("{}/listing/1", server.url());
    assert!(matches!(fetcher.get(&url).await, FetchOutcome::Blocked(_)));
}

#[tokio::test]
async fn unregistered_partner_key_is_an_error() {
    let field_map = default_field_map();
    let feature_map = default_feature_map();
    let currency_map = default_currency_map();
    let maps = NormalizerMaps {
        field_map: &field_map,
        feature_map: &feature_map,
        currency_map: &currency_map,
    };
    let extraction = realty_scrape::extractor::extract_detail_page(
        "<html></html>",
        &Url::parse("https://example.com/listing/1").unwrap(),
        &site_config("https://example.com"),
        &field_map,
        &feature_map,
    )
    .unwrap();

    let result = normalizer::normalize("not-a-real-partner", &extraction, "https://example.com/listing/1", &maps);
    assert!(result.is_err());
}

fn describe(outcome: &FetchOutcome) -> String {
    match outcome {
        FetchOutcome::Ok { url, .. } => format!("Ok({url})"),
        FetchOutcome::Blocked(url) => format!("Blocked({url})"),
        FetchOutcome::AlreadyVisited(url) => format!("AlreadyVisited({url})"),
        FetchOutcome::Err(error) => format!("Err({error})"),
    }
}
