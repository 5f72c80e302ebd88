//! Extraction steps common to both extraction modes: images, SEO
//! metadata, listing-link discovery, and pagination.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Value as JsonValue};
use std::sync::LazyLock;
use url::Url;

use crate::error::ExtractError;

/// Mirrors the size guard already used for content extraction elsewhere
/// in this codebase (10 MB).
pub const MAX_HTML_SIZE: usize = 10 * 1024 * 1024;

static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("BUG: hardcoded selector 'title' is invalid"));
static META_DESCRIPTION_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[name="description"]"#)
        .expect("BUG: hardcoded selector for meta description is invalid")
});
static HEADER_SELECTORS: LazyLock<[Selector; 6]> = LazyLock::new(|| {
    ["h1", "h2", "h3", "h4", "h5", "h6"].map(|tag| {
        Selector::parse(tag).unwrap_or_else(|_| panic!("BUG: hardcoded selector '{tag}' is invalid"))
    })
});
static DEFAULT_IMAGE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img").expect("BUG: hardcoded selector 'img' is invalid"));

pub fn check_size(html: &str) -> Result<(), ExtractError> {
    if html.len() > MAX_HTML_SIZE {
        return Err(ExtractError::InputTooLarge(html.len(), MAX_HTML_SIZE));
    }
    Ok(())
}

/// First element matching `selector`, trimmed text content.
pub fn extract_text(document: &Html, selector: &Selector) -> Option<String> {
    let text = document
        .select(selector)
        .next()?
        .text()
        .collect::<String>()
        .trim()
        .to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Presence-only boolean feature selector: `true` when the selector
/// matches anything, absent otherwise (direct and section mode feature
/// checkboxes).
pub fn extract_presence_bool(document: &Html, selector: &Selector) -> Option<bool> {
    if document.select(selector).next().is_some() {
        Some(true)
    } else {
        None
    }
}

/// Bulk feature extraction: every matched element's lower-cased text,
/// for the caller to match against the feature map.
pub fn extract_bulk_text(document: &Html, selector: &Selector) -> Vec<String> {
    document
        .select(selector)
        .map(|el| el.text().collect::<String>().trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// For image-like fields (advertiser logo): prefer `src`, fall back to
/// the element's text content.
pub fn extract_image_or_text(document: &Html, selector: &Selector, base_url: &Url) -> Option<String> {
    let el = document.select(selector).next()?;
    if let Some(src) = el.value().attr("src") {
        return base_url.join(src).ok().map(|u| u.to_string());
    }
    let text = el.text().collect::<String>().trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Look up `selectors[key]` on a [`crate::domain::SiteConfig`] and parse
/// it leniently, logging and returning `None` on a hopeless selector.
pub fn compiled(site_selectors: &JsonValue, key: &str) -> Option<Selector> {
    site_selectors
        .get(key)
        .and_then(JsonValue::as_str)
        .and_then(super::selectors::parse_lenient)
}

/// Extracted images and their alt text, in document order.
pub struct Images {
    pub urls: Vec<String>,
    pub alt_texts: Vec<String>,
}

/// `image_selector` (default `"img"`), `src` falling back to
/// `data-src`/`data-lazy-src`, resolved against `base_url`, optionally
/// filtered by `image_filter` regex.
pub fn extract_images(
    document: &Html,
    base_url: &Url,
    image_selector: Option<&Selector>,
    image_filter: Option<&Regex>,
) -> Images {
    let mut urls = Vec::new();
    let mut alt_texts = Vec::new();

    let selected: Vec<ElementRef> = match image_selector {
        Some(sel) => document.select(sel).collect(),
        None => document.select(&DEFAULT_IMAGE_SELECTOR).collect(),
    };

    for img in selected {
        let Some(src) = img
            .value()
            .attr("src")
            .or_else(|| img.value().attr("data-src"))
            .or_else(|| img.value().attr("data-lazy-src"))
        else {
            continue;
        };

        let Ok(absolute) = base_url.join(src) else {
            continue;
        };
        let absolute = absolute.to_string();

        if let Some(filter) = image_filter {
            if !filter.is_match(&absolute) {
                continue;
            }
        }

        urls.push(absolute);
        alt_texts.push(img.value().attr("alt").unwrap_or_default().to_string());
    }

    Images { urls, alt_texts }
}

/// `<title>`, `<meta name="description">`, and every `<h1>`..`<h6>` in
/// document order, as `{level, text}` pairs.
pub fn extract_seo(document: &Html) -> JsonValue {
    let mut data = serde_json::Map::new();

    if let Some(title) = document.select(&TITLE_SELECTOR).next() {
        data.insert("page_title".into(), json!(title.text().collect::<String>()));
    }

    if let Some(meta) = document.select(&META_DESCRIPTION_SELECTOR).next() {
        if let Some(content) = meta.value().attr("content") {
            data.insert("meta_description".into(), json!(content));
        }
    }

    let mut headers = Vec::new();
    for (level, selector) in ["h1", "h2", "h3", "h4", "h5", "h6"]
        .iter()
        .zip(HEADER_SELECTORS.iter())
    {
        for el in document.select(selector) {
            let text = el.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                headers.push(json!({ "level": level, "text": text }));
            }
        }
    }
    if !headers.is_empty() {
        data.insert("headers".into(), JsonValue::Array(headers));
    }

    JsonValue::Object(data)
}

/// Select `listing_link_selector`, read `href`, resolve against
/// `base_url`, optionally filter by `link_pattern`, dedup preserving
/// first-seen order.
pub fn discover_listing_links(
    document: &Html,
    base_url: &Url,
    link_selector: &Selector,
    link_pattern: Option<&Regex>,
) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut links = Vec::new();

    for el in document.select(link_selector) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let Ok(absolute) = base_url.join(href) else {
            continue;
        };
        let absolute = absolute.to_string();

        if let Some(pattern) = link_pattern {
            if !pattern.is_match(&absolute) {
                continue;
            }
        }

        if seen.insert(absolute.clone()) {
            links.push(absolute);
        }
    }

    tracing::info!(count = links.len(), "found listing links on page");
    links
}

/// Select `next_page_selector`; `None` if absent or the matched element
/// has no `href` — both mean "no next page, stop the crawl".
pub fn discover_next_page(
    document: &Html,
    base_url: &Url,
    next_page_selector: Option<&Selector>,
) -> Option<String> {
    let selector = next_page_selector?;
    let element = document.select(selector).next()?;
    let href = element.value().attr("href")?;
    base_url.join(href).ok().map(|u| u.to_string())
}

/// `{start_url}/{page}`, e.g. page 3 of `https://x.test/search` is
/// `https://x.test/search/3`.
pub fn incremental_path_page_url(start_url: &str, page: i32) -> String {
    format!("{}/{page}", start_url.trim_end_matches('/'))
}

/// `start_url` with `{param}={page}` appended (or replaced) as a query
/// parameter.
pub fn query_param_page_url(start_url: &str, param: &str, page: i32) -> Result<String, url::ParseError> {
    let mut url = Url::parse(start_url)?;
    url.query_pairs_mut().append_pair(param, &page.to_string());
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::selectors::parse_lenient;

    #[test]
    fn extracts_images_with_fallback_src_attrs() {
        let html = Html::parse_document(
            r#"<html><body>
                <img src="a.jpg" alt="A">
                <img data-src="b.jpg">
                <img data-lazy-src="c.jpg">
            </body></html>"#,
        );
        let base = Url::parse("https://example.com/listing").unwrap();
        let images = extract_images(&html, &base, None, None);
        assert_eq!(images.urls, vec![
            "https://example.com/a.jpg",
            "https://example.com/b.jpg",
            "https://example.com/c.jpg",
        ]);
        assert_eq!(images.alt_texts, vec!["A", "", ""]);
    }

    #[test]
    fn seo_extracts_title_meta_and_headers_in_order() {
        let html = Html::parse_document(
            r#"<html><head><title>Flat for sale</title>
                <meta name="description" content="Nice flat"></head>
                <body><h1>Main</h1><h2>Sub</h2></body></html>"#,
        );
        let seo = extract_seo(&html);
        assert_eq!(seo["page_title"], "Flat for sale");
        assert_eq!(seo["meta_description"], "Nice flat");
        assert_eq!(seo["headers"][0]["level"], "h1");
        assert_eq!(seo["headers"][1]["level"], "h2");
    }

    #[test]
    fn listing_links_are_deduped_preserving_order() {
        let html = Html::parse_document(
            r#"<html><body>
                <a class="card" href="/l/1">One</a>
                <a class="card" href="/l/2">Two</a>
                <a class="card" href="/l/1">One again</a>
            </body></html>"#,
        );
        let base = Url::parse("https://example.com/search").unwrap();
        let selector = parse_lenient("a.card").unwrap();
        let links = discover_listing_links(&html, &base, &selector, None);
        assert_eq!(links, vec![
            "https://example.com/l/1",
            "https://example.com/l/2",
        ]);
    }

    #[test]
    fn no_next_page_when_href_missing() {
        let html = Html::parse_document(r#"<html><body><a class="next">Next</a></body></html>"#);
        let base = Url::parse("https://example.com/search").unwrap();
        let selector = parse_lenient("a.next").unwrap();
        assert!(discover_next_page(&html, &base, Some(&selector)).is_none());
    }

    #[test]
    fn size_guard_rejects_oversized_input() {
        let huge = "a".repeat(MAX_HTML_SIZE + 1);
        assert!(check_size(&huge).is_err());
    }
}
