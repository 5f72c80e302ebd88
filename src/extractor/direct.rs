//! Direct extraction mode: one CSS selector per output field.

use scraper::Html;
use serde_json::{Map, Value as JsonValue};
use url::Url;

use super::common::{compiled, extract_bulk_text, extract_image_or_text, extract_presence_bool, extract_text};
use crate::domain::SiteConfig;

/// `(selectors key, output field name)` — text fields shared by both
/// extraction modes for everything except `description` (section mode
/// allows a comma-separated fallback list there) and `advertiser_logo`
/// (image-like).
const TEXT_FIELDS: &[(&str, &str)] = &[
    ("title_selector", "title"),
    ("price_selector", "price"),
    ("description_selector", "description"),
    ("typology_selector", "typology"),
    ("useful_area_selector", "useful_area"),
    ("gross_area_selector", "gross_area"),
    ("area_selector", "area"),
    ("bedrooms_selector", "bedrooms"),
    ("bathrooms_selector", "bathrooms"),
    ("floor_selector", "floor"),
    ("construction_year_selector", "construction_year"),
    ("district_selector", "district"),
    ("county_selector", "county"),
    ("parish_selector", "parish"),
    ("energy_certificate_selector", "energy_certificate"),
    ("condition_selector", "condition"),
    ("location_selector", "location"),
    ("property_type_selector", "property_type"),
    ("property_id_selector", "property_id"),
    ("business_type_selector", "business_type"),
    ("price_per_m2_selector", "price_per_m2"),
    ("publication_date_selector", "publication_date"),
    ("advertiser_selector", "advertiser"),
    ("advertiser_phone_selector", "advertiser_phone"),
    ("advertiser_email_selector", "advertiser_email"),
    ("meta_description_selector", "meta_description"),
    ("page_title_selector", "page_title"),
];

/// `(selectors key, canonical feature name)` — presence-only booleans.
/// `ac_selector` is an alias for `air_conditioning_selector`; whichever
/// is present wins (first match in this list order).
pub const BOOL_FEATURE_FIELDS: &[(&str, &str)] = &[
    ("garage_selector", "garage"),
    ("elevator_selector", "elevator"),
    ("balcony_selector", "balcony"),
    ("air_conditioning_selector", "air_conditioning"),
    ("ac_selector", "air_conditioning"),
    ("pool_selector", "swimming_pool"),
    ("garden_selector", "garden"),
];

/// Extract every direct-mode field into a flat JSON object. Missing or
/// unparseable selectors simply leave the field absent from the map —
/// normalization treats an absent field as `None`, not an error.
pub fn extract(document: &Html, config: &SiteConfig, base_url: &Url, feature_map: &[(String, String)]) -> Map<String, JsonValue> {
    let mut fields = Map::new();

    for (key, field) in TEXT_FIELDS {
        if let Some(selector) = compiled(&config.selectors, key) {
            if let Some(text) = extract_text(document, &selector) {
                fields.insert((*field).to_string(), JsonValue::String(text));
            }
        }
    }

    if let Some(selector) = compiled(&config.selectors, "advertiser_logo_selector") {
        if let Some(logo) = extract_image_or_text(document, &selector, base_url) {
            fields.insert("advertiser_logo".to_string(), JsonValue::String(logo));
        }
    }

    for (key, feature) in BOOL_FEATURE_FIELDS {
        if fields.contains_key(*feature) {
            continue;
        }
        if let Some(selector) = compiled(&config.selectors, key) {
            if extract_presence_bool(document, &selector) == Some(true) {
                fields.insert((*feature).to_string(), JsonValue::Bool(true));
            }
        }
    }

    if let Some(selector) = compiled(&config.selectors, "features_selector") {
        let detected: Vec<String> = extract_bulk_text(document, &selector)
            .into_iter()
            .filter_map(|text| {
                feature_map
                    .iter()
                    .find(|(keyword, _)| text.contains(keyword.as_str()))
                    .map(|(_, canonical)| canonical.clone())
            })
            .collect();
        for feature in detected {
            fields.insert(feature, JsonValue::Bool(true));
        }
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_cache::default_feature_map;
    use chrono::Utc;
    use uuid::Uuid;

    fn site_config(selectors: JsonValue) -> SiteConfig {
        SiteConfig {
            id: Uuid::new_v4(),
            key: "testsite".into(),
            name: "Test Site".into(),
            base_url: "https://example.com".into(),
            selectors,
            extraction_mode: crate::domain::ExtractionMode::Direct,
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
    fn extracts_text_and_boolean_fields() {
        let html = Html::parse_document(
            r#"<html><body>
                <h1 class="title">T2 Apartment</h1>
                <span class="price">250 000 €</span>
                <div class="garage">Yes, private garage</div>
            </body></html>"#,
        );
        let config = site_config(serde_json::json!({
            "title_selector": "h1.title",
            "price_selector": "span.price",
            "garage_selector": ".garage",
        }));
        let base = Url::parse("https://example.com/l/1").unwrap();
        let fields = extract(&html, &config, &base, &default_feature_map());

        assert_eq!(fields["title"], "T2 Apartment");
        assert_eq!(fields["price"], "250 000 €");
        assert_eq!(fields["garage"], true);
    }

    #[test]
    fn ac_selector_is_alias_for_air_conditioning() {
        let html = Html::parse_document(r#"<html><body><div class="ac">Central AC</div></body></html>"#);
        let config = site_config(serde_json::json!({ "ac_selector": ".ac" }));
        let base = Url::parse("https://example.com/l/1").unwrap();
        let fields = extract(&html, &config, &base, &default_feature_map());
        assert_eq!(fields["air_conditioning"], true);
    }

    #[test]
    fn missing_selector_leaves_field_absent() {
        let html = Html::parse_document("<html><body></body></html>");
        let config = site_config(serde_json::json!({}));
        let base = Url::parse("https://example.com/l/1").unwrap();
        let fields = extract(&html, &config, &base, &default_feature_map());
        assert!(!fields.contains_key("title"));
    }
}
