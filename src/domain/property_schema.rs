//! The canonical, partner-agnostic shape [`crate::normalizer`] produces and
//! [`crate::persistence`] writes from. Distinct from [`super::Listing`]
//! (the persisted row) because a normalizer shouldn't need to know about
//! storage concerns like `id`/`scrape_job_id`/timestamps.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Money {
    pub amount: Option<f64>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Address {
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub area: Option<String>,
    pub full_address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingFlags {
    pub has_garage: Option<bool>,
    pub has_elevator: Option<bool>,
    pub has_balcony: Option<bool>,
    pub has_air_conditioning: Option<bool>,
    pub has_pool: Option<bool>,
}

/// The normalizer's view of a media attachment — no `id`/`listing_id`
/// yet, those are assigned when [`crate::persistence`] inserts the row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyMediaAsset {
    pub url: String,
    pub alt_text: Option<String>,
    pub asset_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertySchema {
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

    pub price: Money,
    pub price_per_m2: Option<Money>,

    pub area_useful_m2: Option<f64>,
    pub area_gross_m2: Option<f64>,
    pub area_land_m2: Option<f64>,

    pub address: Address,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    pub media: Vec<PropertyMediaAsset>,
    pub features: ListingFlags,

    pub descriptions: HashMap<String, String>,
    pub description_quality_score: Option<i32>,

    pub energy_certificate: Option<String>,
    pub construction_year: Option<i32>,

    pub advertiser: Option<String>,
    pub contacts: Option<String>,

    pub seo: Option<JsonValue>,

    pub raw_partner_payload: JsonValue,
}
