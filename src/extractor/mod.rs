//! C3 — HTML Extractor: two extraction modes for listing detail pages,
//! plus listing-link and pagination discovery for search-results pages.

mod common;
mod direct;
mod section;
mod selectors;

use scraper::Html;
use serde_json::{Map, Value as JsonValue};
use url::Url;

use crate::domain::{ExtractionMode, SiteConfig};
use crate::error::ExtractError;

pub use common::{incremental_path_page_url, query_param_page_url, MAX_HTML_SIZE};

/// Everything pulled off a single listing detail page: mode-specific
/// fields merged with the common images/SEO extraction.
#[derive(Debug, Clone)]
pub struct DetailExtraction {
    pub fields: Map<String, JsonValue>,
    pub images: Vec<String>,
    pub alt_texts: Vec<String>,
}

/// Extract a listing detail page. `field_map`/`feature_map` come from
/// the C2 config cache, scoped to `config.key`.
pub fn extract_detail_page(
    html: &str,
    page_url: &Url,
    config: &SiteConfig,
    field_map: &[(String, String)],
    feature_map: &[(String, String)],
) -> Result<DetailExtraction, ExtractError> {
    common::check_size(html)?;
    let document = Html::parse_document(html);

    let mut fields = match config.extraction_mode {
        ExtractionMode::Direct => direct::extract(&document, config, page_url, feature_map),
        ExtractionMode::Section => section::extract(&document, config, page_url, field_map, feature_map),
    };

    let seo = common::extract_seo(&document);
    if let JsonValue::Object(seo_fields) = seo {
        for (key, value) in seo_fields {
            fields.entry(key).or_insert(value);
        }
    }

    let image_selector = common::compiled(&config.selectors, "image_selector");
    let image_filter = resolve_image_filter(config);
    let images = common::extract_images(&document, page_url, image_selector.as_ref(), image_filter.as_ref());

    Ok(DetailExtraction {
        fields,
        images: images.urls,
        alt_texts: images.alt_texts,
    })
}

/// Listing links and the next-page URL from a search-results page.
pub fn extract_search_page(
    html: &str,
    page_url: &Url,
    config: &SiteConfig,
) -> Result<(Vec<String>, Option<String>), ExtractError> {
    common::check_size(html)?;
    let document = Html::parse_document(html);

    let Some(link_selector) = config
        .selector("listing_link_selector")
        .and_then(selectors::parse_lenient)
    else {
        return Ok((Vec::new(), None));
    };

    let link_pattern = config
        .link_pattern
        .as_deref()
        .and_then(|p| regex::Regex::new(p).ok());
    let links = common::discover_listing_links(&document, page_url, &link_selector, link_pattern.as_ref());

    let next_page_selector = config
        .selector("next_page_selector")
        .and_then(selectors::parse_lenient);
    let next_page = common::discover_next_page(&document, page_url, next_page_selector.as_ref());

    Ok((links, next_page))
}

fn resolve_image_filter(config: &SiteConfig) -> Option<regex::Regex> {
    let pattern = config
        .image_filter
        .as_deref()
        .or_else(|| config.selector("image_filter"))?;
    regex::Regex::new(pattern).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn site_config(mode: ExtractionMode, selectors: JsonValue) -> SiteConfig {
        SiteConfig {
            id: Uuid::new_v4(),
            key: "testsite".into(),
            name: "Test Site".into(),
            base_url: "https://example.com".into(),
            selectors,
            extraction_mode: mode,
            pagination_type: crate::domain::PaginationType::HtmlNext,
            pagination_param: None,
            link_pattern: None,
            image_filter: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn detail_extraction_merges_direct_fields_and_seo() {
        let html = r#"<html><head><title>Nice T2</title></head>
            <body><h1 class="title">Nice T2 Apartment</h1></body></html>"#;
        let config = site_config(ExtractionMode::Direct, serde_json::json!({ "title_selector": "h1.title" }));
        let url = Url::parse("https://example.com/l/1").unwrap();
        let result = extract_detail_page(html, &url, &config, &[], &[]).unwrap();
        assert_eq!(result.fields["title"], "Nice T2 Apartment");
        assert_eq!(result.fields["page_title"], "Nice T2");
    }

    #[test]
    fn oversized_html_is_rejected() {
        let huge = "a".repeat(MAX_HTML_SIZE + 1);
        let config = site_config(ExtractionMode::Direct, serde_json::json!({}));
        let url = Url::parse("https://example.com/l/1").unwrap();
        assert!(extract_detail_page(&huge, &url, &config, &[], &[]).is_err());
    }

    #[test]
    fn search_page_with_no_link_selector_returns_empty() {
        let html = "<html><body></body></html>";
        let config = site_config(ExtractionMode::Direct, serde_json::json!({}));
        let url = Url::parse("https://example.com/search").unwrap();
        let (links, next) = extract_search_page(html, &url, &config).unwrap();
        assert!(links.is_empty());
        assert!(next.is_none());
    }
}
