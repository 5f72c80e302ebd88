//! Section extraction mode: structured name/value sections instead of
//! one selector per field.

use regex::{Regex, RegexBuilder};
use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value as JsonValue};
use url::Url;

use super::common::{compiled, extract_bulk_text, extract_image_or_text, extract_presence_bool, extract_text};
use super::direct::BOOL_FEATURE_FIELDS;
use super::selectors::parse_lenient;
use crate::domain::SiteConfig;

/// Selector keys identical across both modes (advertiser/contact,
/// publication date, price per m2, business type).
const SHARED_TEXT_FIELDS: &[(&str, &str)] = &[
    ("title_selector", "title"),
    ("location_selector", "location"),
    ("condition_selector", "condition"),
    ("publication_date_selector", "publication_date"),
    ("price_per_m2_selector", "price_per_m2"),
    ("business_type_selector", "business_type"),
    ("advertiser_selector", "advertiser"),
    ("advertiser_phone_selector", "advertiser_phone"),
    ("advertiser_email_selector", "advertiser_email"),
];

pub fn extract(
    document: &Html,
    config: &SiteConfig,
    base_url: &Url,
    field_map: &[(String, String)],
    feature_map: &[(String, String)],
) -> Map<String, JsonValue> {
    let mut fields = Map::new();

    for (key, field) in SHARED_TEXT_FIELDS {
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

    extract_description(document, config, &mut fields);
    extract_text_patterns(document, config, &mut fields);
    extract_details_section(document, config, field_map, &mut fields);
    extract_areas_section(document, config, &mut fields);
    extract_characteristics_section(document, config, feature_map, &mut fields);
    extract_nearby_section(document, config, &mut fields);

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

/// `description_selector` holds a comma-separated list of selectors
/// tried in order; the first whose matched text exceeds 50 chars wins.
fn extract_description(document: &Html, config: &SiteConfig, fields: &mut Map<String, JsonValue>) {
    let Some(raw) = config.selector("description_selector") else {
        return;
    };
    for candidate in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let Some(selector) = parse_lenient(candidate) else {
            continue;
        };
        if let Some(text) = extract_text(document, &selector) {
            if text.len() > 50 {
                fields.insert("description".to_string(), JsonValue::String(text));
                return;
            }
        }
    }
}

/// `text_patterns`: `{field_name: regex}`, applied to both the page's
/// visible text and its raw HTML, first capture group wins. Existing
/// keys are never overwritten by later steps (they run first).
fn extract_text_patterns(document: &Html, config: &SiteConfig, fields: &mut Map<String, JsonValue>) {
    let Some(patterns) = config.selectors.get("text_patterns").and_then(JsonValue::as_object) else {
        return;
    };

    let visible_text = document.root_element().text().collect::<String>();
    let raw_html = document.html();

    for (field, pattern) in patterns {
        let Some(pattern) = pattern.as_str() else { continue };
        let Ok(regex) = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()
        else {
            tracing::warn!(%field, %pattern, "invalid text_patterns regex, skipping");
            continue;
        };

        let captured = regex
            .captures(&visible_text)
            .or_else(|| regex.captures(&raw_html))
            .and_then(|caps| caps.get(1).or_else(|| caps.get(0)))
            .map(|m| m.as_str().trim().to_string());

        if let Some(value) = captured {
            if !value.is_empty() {
                fields.insert(field.clone(), JsonValue::String(value));
            }
        }
    }
}

/// `details_section`: name/value pairs matched (substring, lower-cased,
/// first match wins) against the field map. Never overwrites a field
/// already populated by `text_patterns`.
fn extract_details_section(
    document: &Html,
    config: &SiteConfig,
    field_map: &[(String, String)],
    fields: &mut Map<String, JsonValue>,
) {
    let Some(section) = config.selectors.get("details_section") else {
        return;
    };

    let item_selector = section
        .get("detail_item_selector")
        .and_then(JsonValue::as_str)
        .unwrap_or(".detail");
    let name_selector = section
        .get("detail_name_selector")
        .and_then(JsonValue::as_str)
        .unwrap_or(".name");
    let value_selector = section
        .get("detail_value_selector")
        .and_then(JsonValue::as_str)
        .unwrap_or(".value");

    let Some(item_sel) = parse_lenient(item_selector) else { return };
    let Some(name_sel) = parse_lenient(name_selector) else { return };
    let Some(value_sel) = parse_lenient(value_selector) else { return };
    let img_sel = parse_lenient("img");

    for item in document.select(&item_sel) {
        let Some(name_el) = item.select(&name_sel).next() else { continue };
        let name = name_el.text().collect::<String>().trim().to_lowercase();
        if name.is_empty() {
            continue;
        }

        let value = item
            .select(&value_sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|v| !v.is_empty())
            .or_else(|| img_sel.as_ref().and_then(|sel| energy_letter_from_icon(item, sel)));

        let Some(value) = value else { continue };

        let matched_field = field_map
            .iter()
            .find(|(keyword, _)| name.contains(keyword.as_str()))
            .map(|(_, field)| field.clone());

        if let Some(field) = matched_field {
            if !fields.contains_key(&field) {
                fields.insert(field, JsonValue::String(value));
            }
        }
    }
}

/// Falls back to an energy-certificate letter when a detail item has no
/// (or an empty) value element: the item's `<img>` `alt`, if it's a bare
/// A–G letter, else its `src` matched against `energy[-_]([a-g])`.
fn energy_letter_from_icon(item: ElementRef, img_sel: &Selector) -> Option<String> {
    let img = item.select(img_sel).next()?;

    if let Some(alt) = img.value().attr("alt") {
        let trimmed = alt.trim();
        if let Some(letter) = trimmed.chars().next() {
            let upper = letter.to_ascii_uppercase();
            if trimmed.chars().count() == 1 && ('A'..='G').contains(&upper) {
                return Some(upper.to_string());
            }
        }
    }

    let src = img.value().attr("src")?;
    let pattern = Regex::new(r"(?i)energy[-_]([a-g])").ok()?;
    pattern.captures(src).map(|caps| caps[1].to_uppercase())
}

/// `areas_section`: name/value pairs routed to `useful_area` /
/// `gross_area` / `land_area` by keyword matching the lower-cased name.
fn extract_areas_section(document: &Html, config: &SiteConfig, fields: &mut Map<String, JsonValue>) {
    let Some(section) = config.selectors.get("areas_section") else {
        return;
    };

    let item_selector = section
        .get("area_item_selector")
        .and_then(JsonValue::as_str)
        .unwrap_or(".area");
    let name_selector = section
        .get("area_name_selector")
        .and_then(JsonValue::as_str)
        .unwrap_or(".name");
    let value_selector = section
        .get("area_value_selector")
        .and_then(JsonValue::as_str)
        .unwrap_or(".value");

    let Some(item_sel) = parse_lenient(item_selector) else { return };
    let Some(name_sel) = parse_lenient(name_selector) else { return };
    let Some(value_sel) = parse_lenient(value_selector) else { return };

    for item in document.select(&item_sel) {
        let Some(name_el) = item.select(&name_sel).next() else { continue };
        let Some(value_el) = item.select(&value_sel).next() else { continue };

        let name = name_el.text().collect::<String>().trim().to_lowercase();
        let value = value_el.text().collect::<String>().trim().to_string();
        if name.is_empty() || value.is_empty() {
            continue;
        }

        let field = if name.contains("useful") || name.contains("útil") || name.contains("util") {
            Some("useful_area")
        } else if name.contains("gross") || name.contains("bruta") {
            Some("gross_area")
        } else if name.contains("land") || name.contains("terreno") {
            Some("land_area")
        } else {
            None
        };

        if let Some(field) = field {
            fields.insert(field.to_string(), JsonValue::String(value));
        }
    }
}

/// `characteristics_section`: a flat list of feature names matched
/// against the feature map, default item selector `.name`.
fn extract_characteristics_section(
    document: &Html,
    config: &SiteConfig,
    feature_map: &[(String, String)],
    fields: &mut Map<String, JsonValue>,
) {
    let Some(section) = config.selectors.get("characteristics_section") else {
        return;
    };
    let item_selector = section
        .get("char_item_selector")
        .and_then(JsonValue::as_str)
        .unwrap_or(".name");
    let Some(item_sel) = parse_lenient(item_selector) else { return };

    for text in extract_bulk_text(document, &item_sel) {
        if let Some((_, canonical)) = feature_map.iter().find(|(keyword, _)| text.contains(keyword.as_str())) {
            fields.insert(canonical.clone(), JsonValue::Bool(true));
        }
    }
}

/// `nearby_section`: collects a plain list of strings, default item
/// selector `.name`.
fn extract_nearby_section(document: &Html, config: &SiteConfig, fields: &mut Map<String, JsonValue>) {
    let Some(section) = config.selectors.get("nearby_section") else {
        return;
    };
    let item_selector = section
        .get("nearby_item_selector")
        .and_then(JsonValue::as_str)
        .unwrap_or(".name");
    let Some(item_sel) = parse_lenient(item_selector) else { return };

    let items: Vec<JsonValue> = document
        .select(&item_sel)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
        .map(JsonValue::String)
        .collect();

    if !items.is_empty() {
        fields.insert("nearby".to_string(), JsonValue::Array(items));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_cache::{default_feature_map, default_field_map};
    use chrono::Utc;
    use uuid::Uuid;

    fn site_config(selectors: JsonValue) -> SiteConfig {
        SiteConfig {
            id: Uuid::new_v4(),
            key: "testsite".into(),
            name: "Test Site".into(),
            base_url: "https://example.com".into(),
            selectors,
            extraction_mode: crate::domain::ExtractionMode::Section,
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
    fn description_picks_first_candidate_over_fifty_chars() {
        let html = Html::parse_document(
            r#"<html><body>
                <p class="short">Too short</p>
                <p class="long">This description is definitely longer than fifty characters total.</p>
            </body></html>"#,
        );
        let config = site_config(serde_json::json!({
            "description_selector": ".short, .long",
        }));
        let base = Url::parse("https://example.com/l/1").unwrap();
        let fields = extract(&html, &config, &base, &default_field_map(), &default_feature_map());
        assert_eq!(
            fields["description"],
            "This description is definitely longer than fifty characters total."
        );
    }

    #[test]
    fn details_section_routes_by_field_map_keyword() {
        let html = Html::parse_document(
            r#"<html><body>
                <div class="detail"><span class="name">Quartos</span><span class="value">3</span></div>
            </body></html>"#,
        );
        let config = site_config(serde_json::json!({
            "details_section": {},
        }));
        let base = Url::parse("https://example.com/l/1").unwrap();
        let fields = extract(&html, &config, &base, &default_field_map(), &default_feature_map());
        assert_eq!(fields["bedrooms"], "3");
    }

    #[test]
    fn details_section_keyword_match_is_deterministic_by_priority() {
        let html = Html::parse_document(
            r#"<html><body>
                <div class="detail"><span class="name">Preço de referência</span><span class="value">250000</span></div>
            </body></html>"#,
        );
        let config = site_config(serde_json::json!({ "details_section": {} }));
        let base = Url::parse("https://example.com/l/1").unwrap();
        let field_map = default_field_map();
        // "preço" is listed ahead of "referência" in the default map, so a
        // name containing both keywords must always route to "price".
        assert!(field_map.iter().position(|(k, _)| k == "preço") < field_map.iter().position(|(k, _)| k == "referência"));
        let fields = extract(&html, &config, &base, &field_map, &default_feature_map());
        assert_eq!(fields["price"], "250000");
    }

    #[test]
    fn areas_section_routes_by_keyword() {
        let html = Html::parse_document(
            r#"<html><body>
                <div class="area"><span class="name">Área útil</span><span class="value">85 m2</span></div>
                <div class="area"><span class="name">Área bruta</span><span class="value">95 m2</span></div>
            </body></html>"#,
        );
        let config = site_config(serde_json::json!({ "areas_section": {} }));
        let base = Url::parse("https://example.com/l/1").unwrap();
        let fields = extract(&html, &config, &base, &default_field_map(), &default_feature_map());
        assert_eq!(fields["useful_area"], "85 m2");
        assert_eq!(fields["gross_area"], "95 m2");
    }

    #[test]
    fn energy_certificate_falls_back_to_icon_alt() {
        let html = Html::parse_document(
            r#"<html><body>
                <div class="detail">
                    <span class="name">Certificado energético</span>
                    <span class="value"></span>
                    <img alt="C" src="/icons/energy.png">
                </div>
            </body></html>"#,
        );
        let config = site_config(serde_json::json!({ "details_section": {} }));
        let base = Url::parse("https://example.com/l/1").unwrap();
        let fields = extract(&html, &config, &base, &default_field_map(), &default_feature_map());
        assert_eq!(fields["energy_certificate"], "C");
    }

    #[test]
    fn energy_certificate_falls_back_to_icon_src_pattern() {
        let html = Html::parse_document(
            r#"<html><body>
                <div class="detail">
                    <span class="name">Certificado energético</span>
                    <img src="/icons/energy-d.svg">
                </div>
            </body></html>"#,
        );
        let config = site_config(serde_json::json!({ "details_section": {} }));
        let base = Url::parse("https://example.com/l/1").unwrap();
        let fields = extract(&html, &config, &base, &default_field_map(), &default_feature_map());
        assert_eq!(fields["energy_certificate"], "D");
    }

    #[test]
    fn text_patterns_take_priority_over_details_section() {
        let html = Html::parse_document(
            r#"<html><body>
                Reference: ABC-123
                <div class="detail"><span class="name">Referência</span><span class="value">XYZ-999</span></div>
            </body></html>"#,
        );
        let config = site_config(serde_json::json!({
            "text_patterns": { "property_id": "Reference:\\s*(\\S+)" },
            "details_section": {},
        }));
        let base = Url::parse("https://example.com/l/1").unwrap();
        let fields = extract(&html, &config, &base, &default_field_map(), &default_feature_map());
        assert_eq!(fields["property_id"], "ABC-123");
    }
}
