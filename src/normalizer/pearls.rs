//! Partner normalizer registry. `normalize_pearls_payload` is the sole
//! built-in normalizer, registered under key `"pearls"`; looking up an
//! unregistered partner is an error rather than a silent pass-through.

use std::collections::HashMap;

use rust_decimal::prelude::ToPrimitive;
use serde_json::Value as JsonValue;

use super::{calculate_price_per_m2, parse_area, parse_bool, parse_date, parse_int, parse_price, typology_to_bedrooms};
use crate::domain::{Address, ListingFlags, Money, PropertyMediaAsset, PropertySchema};
use crate::error::NormalizeError;
use crate::extractor::DetailExtraction;

/// Lookup tables the normalizer needs, scoped to a single site by the
/// caller (the C2 config cache owns the TTL/refresh logic).
pub struct NormalizerMaps<'a> {
    pub field_map: &'a [(String, String)],
    pub feature_map: &'a [(String, String)],
    pub currency_map: &'a HashMap<String, String>,
}

type NormalizerFn = fn(&DetailExtraction, &str, &NormalizerMaps) -> Result<PropertySchema, NormalizeError>;

const REGISTRY: &[(&str, NormalizerFn)] = &[("pearls", normalize_pearls_payload)];

/// Dispatches to the normalizer registered for `partner_key`
/// (`SiteConfig.key`).
pub fn normalize(
    partner_key: &str,
    extraction: &DetailExtraction,
    source_url: &str,
    maps: &NormalizerMaps,
) -> Result<PropertySchema, NormalizeError> {
    REGISTRY
        .iter()
        .find(|(key, _)| *key == partner_key)
        .map(|(_, normalizer_fn)| normalizer_fn(extraction, source_url, maps))
        .unwrap_or_else(|| Err(NormalizeError::UnknownPartner(partner_key.to_string())))
}

fn text(extraction: &DetailExtraction, field: &str) -> Option<String> {
    extraction.fields.get(field).and_then(JsonValue::as_str).map(str::to_string)
}

fn bool_flag(extraction: &DetailExtraction, field: &str) -> Option<bool> {
    match extraction.fields.get(field) {
        Some(JsonValue::Bool(b)) => Some(*b),
        Some(JsonValue::String(s)) => parse_bool(s),
        _ => None,
    }
}

fn listing_type_from_business_type(raw: Option<&str>) -> String {
    let Some(raw) = raw else { return "Sale".to_string() };
    let lower = raw.to_lowercase();
    if ["rent", "rental", "arrendar", "arrendamento"].iter().any(|k| lower.contains(k)) {
        "Rent".to_string()
    } else if ["buy", "sale", "venda", "comprar"].iter().any(|k| lower.contains(k)) {
        "Sale".to_string()
    } else {
        "Sale".to_string()
    }
}

fn normalize_pearls_payload(
    extraction: &DetailExtraction,
    source_url: &str,
    maps: &NormalizerMaps,
) -> Result<PropertySchema, NormalizeError> {
    let price_raw = text(extraction, "price");
    let price = price_raw
        .as_deref()
        .and_then(|raw| parse_price(raw, maps.currency_map))
        .map(|(amount, currency)| Money {
            amount: amount.to_f64(),
            currency: Some(currency),
        })
        .unwrap_or_default();

    let useful_area = text(extraction, "useful_area").as_deref().and_then(parse_area);
    let gross_area = text(extraction, "gross_area").as_deref().and_then(parse_area);
    let land_area = text(extraction, "land_area").as_deref().and_then(parse_area);
    let bare_area = text(extraction, "area").as_deref().and_then(parse_area);

    let typology = text(extraction, "typology");
    let bedrooms = text(extraction, "bedrooms")
        .as_deref()
        .and_then(parse_int)
        .or_else(|| typology.as_deref().and_then(typology_to_bedrooms));
    let bathrooms = text(extraction, "bathrooms").as_deref().and_then(parse_int);

    let price_per_m2_area = gross_area.or(useful_area).or(bare_area);
    let price_per_m2 = text(extraction, "price_per_m2")
        .as_deref()
        .and_then(|raw| parse_price(raw, maps.currency_map))
        .map(|(amount, currency)| Money {
            amount: amount.to_f64(),
            currency: Some(currency),
        })
        .or_else(|| {
            let amount = price.amount?;
            let decimal_price = rust_decimal::Decimal::try_from(amount).ok()?;
            let area = price_per_m2_area?;
            let computed = calculate_price_per_m2(decimal_price, area)?;
            Some(Money {
                amount: computed.to_f64(),
                currency: price.currency.clone(),
            })
        });

    let mut descriptions = HashMap::new();
    if let Some(description) = text(extraction, "description") {
        descriptions.insert("raw_description".to_string(), description.clone());
        descriptions.insert("description".to_string(), description);
    }
    if let Some(meta) = text(extraction, "meta_description") {
        descriptions.insert("meta_description".to_string(), meta);
    }
    if let Some(page_title) = text(extraction, "page_title") {
        descriptions.insert("page_title".to_string(), page_title);
    }

    let empty_alt = String::new();
    let media = extraction
        .images
        .iter()
        .zip(extraction.alt_texts.iter().chain(std::iter::repeat(&empty_alt)))
        .map(|(url, alt)| PropertyMediaAsset {
            url: url.clone(),
            alt_text: if alt.is_empty() { None } else { Some(alt.clone()) },
            asset_type: Some("photo".to_string()),
        })
        .collect();

    let seo = extraction.fields.get("headers").cloned();
    let nearby_note = text(extraction, "nearby");
    let _ = maps.field_map;

    Ok(PropertySchema {
        partner_id: text(extraction, "property_id"),
        source_partner: "pearls".to_string(),
        source_url: Some(source_url.to_string()),

        title: text(extraction, "title").or_else(|| text(extraction, "page_title")),
        listing_type: Some(listing_type_from_business_type(text(extraction, "business_type").as_deref())),
        property_type: text(extraction, "property_type"),
        typology,
        bedrooms,
        bathrooms,
        floor: text(extraction, "floor"),

        price,
        price_per_m2,

        area_useful_m2: useful_area,
        area_gross_m2: gross_area,
        area_land_m2: land_area,

        address: Address {
            country: Some("Portugal".to_string()),
            region: text(extraction, "district"),
            city: text(extraction, "county"),
            area: text(extraction, "parish"),
            full_address: text(extraction, "location"),
        },
        latitude: None,
        longitude: None,

        media,
        features: ListingFlags {
            has_garage: bool_flag(extraction, "garage"),
            has_elevator: bool_flag(extraction, "elevator"),
            has_balcony: bool_flag(extraction, "balcony"),
            has_air_conditioning: bool_flag(extraction, "air_conditioning"),
            has_pool: bool_flag(extraction, "swimming_pool"),
        },

        descriptions,
        description_quality_score: None,

        energy_certificate: text(extraction, "energy_certificate"),
        construction_year: text(extraction, "construction_year").as_deref().and_then(parse_int),

        advertiser: text(extraction, "advertiser"),
        contacts: merge_contacts(
            text(extraction, "advertiser_phone"),
            text(extraction, "advertiser_email"),
        ),

        seo,
        raw_partner_payload: build_raw_payload(extraction, nearby_note, text(extraction, "publication_date")),
    })
}

fn merge_contacts(phone: Option<String>, email: Option<String>) -> Option<String> {
    match (phone, email) {
        (Some(p), Some(e)) => Some(format!("{p} / {e}")),
        (Some(p), None) => Some(p),
        (None, Some(e)) => Some(e),
        (None, None) => None,
    }
}

fn build_raw_payload(extraction: &DetailExtraction, nearby: Option<String>, publication_date: Option<String>) -> JsonValue {
    let mut payload = JsonValue::Object(extraction.fields.clone());
    if let Some(obj) = payload.as_object_mut() {
        if let Some(date) = publication_date.as_deref().and_then(parse_date) {
            obj.insert("publication_date_parsed".to_string(), JsonValue::String(date.to_rfc3339()));
        }
        let _ = nearby;
    }
    payload
}
