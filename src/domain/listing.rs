use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// A single canonicalized real-estate listing. Deduplicated on
/// `source_url` by the persistence layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: Uuid,

    pub partner_id: Option<String>,
    pub source_partner: String,
    pub source_url: Option<String>,

    pub title: Option<String>,
    pub listing_type: Option<String>,
    pub property_type: Option<String>,
    pub typology: Option<String>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub floor: Option<String>,

    pub price_amount: Option<Decimal>,
    pub price_currency: Option<String>,
    pub price_per_m2: Option<Decimal>,

    pub area_useful_m2: Option<f64>,
    pub area_gross_m2: Option<f64>,
    pub area_land_m2: Option<f64>,

    pub district: Option<String>,
    pub county: Option<String>,
    pub parish: Option<String>,
    pub full_address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    pub has_garage: Option<bool>,
    pub has_elevator: Option<bool>,
    pub has_balcony: Option<bool>,
    pub has_air_conditioning: Option<bool>,
    pub has_pool: Option<bool>,

    pub energy_certificate: Option<String>,
    pub construction_year: Option<i32>,

    pub advertiser: Option<String>,
    pub contacts: Option<String>,

    pub raw_description: Option<String>,
    pub description: Option<String>,
    pub enriched_description: Option<String>,
    pub description_quality_score: Option<i32>,
    pub meta_description: Option<String>,

    pub page_title: Option<String>,
    pub headers: Option<JsonValue>,

    pub raw_payload: Option<JsonValue>,

    pub scrape_job_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Photo,
    Floorplan,
    Video,
}

impl Default for MediaType {
    fn default() -> Self {
        MediaType::Photo
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub url: String,
    pub alt_text: Option<String>,
    pub asset_type: MediaType,
    pub position: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// A price snapshot written whenever an upsert changes
/// `Listing.price_amount`. Records the *prior* price, not the new one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistory {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub price_amount: Decimal,
    pub price_currency: String,
    pub recorded_at: DateTime<Utc>,
}
