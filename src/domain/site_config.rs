use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// How a site's listing detail page is parsed. See the extractor module
/// for what each mode actually does with `selectors`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    /// Structured name/value section extraction (`.details`, `.areas`, ...).
    Section,
    /// One CSS selector per output field.
    Direct,
}

impl Default for ExtractionMode {
    fn default() -> Self {
        ExtractionMode::Direct
    }
}

/// How the next search page's URL is derived once the current page's
/// listings have been collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaginationType {
    /// Follow the "next page" link discovered in the DOM. Stops when
    /// the selector finds nothing.
    HtmlNext,
    /// `{start_url}/{page + 1}`.
    IncrementalPath,
    /// Append `{pagination_param}={page + 1}` to the current URL.
    QueryParam,
}

impl Default for PaginationType {
    fn default() -> Self {
        PaginationType::HtmlNext
    }
}

/// A site's scraping behaviour, stored as data so a new site can be
/// onboarded without a code change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub id: Uuid,
    pub key: String,
    pub name: String,
    pub base_url: String,
    /// All CSS selectors for parsing: `listing_link_selector`,
    /// `title_selector`, `price_selector`, etc. See the extractor module
    /// for the full key list per extraction mode.
    pub selectors: JsonValue,
    pub extraction_mode: ExtractionMode,
    pub pagination_type: PaginationType,
    /// Query parameter name used when `pagination_type = query_param`.
    pub pagination_param: Option<String>,
    /// Regex filtering which discovered links are treated as listings.
    pub link_pattern: Option<String>,
    /// Regex filtering which `<img>` sources are kept.
    pub image_filter: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SiteConfig {
    /// Selector lookup helper — `selectors` is an arbitrary JSON object,
    /// this just threads `.get(key).and_then(as_str)` so call sites don't
    /// repeat it.
    #[must_use]
    pub fn selector(&self, key: &str) -> Option<&str> {
        self.selectors.get(key).and_then(JsonValue::as_str)
    }
}
