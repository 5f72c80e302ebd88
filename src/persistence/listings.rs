//! The upsert-with-price-history transaction.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{MediaType, PropertySchema};
use crate::error::PersistError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

#[derive(Clone)]
pub struct ListingStore {
    pool: PgPool,
}

impl ListingStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new listing, or update an existing one matched by
    /// `source_url`, recording a [`crate::domain::PriceHistory`] row when
    /// the price changes. A `None` field in `schema` never clobbers a
    /// previously stored value.
    pub async fn upsert(
        &self,
        schema: &PropertySchema,
        scrape_job_id: Uuid,
    ) -> Result<(Uuid, UpsertOutcome), PersistError> {
        let mut tx = self.pool.begin().await?;

        let existing = match &schema.source_url {
            Some(url) => {
                sqlx::query_as::<_, ExistingRow>(
                    r"SELECT id, price_amount FROM listings WHERE source_url = $1 FOR UPDATE",
                )
                .bind(url)
                .fetch_optional(&mut *tx)
                .await?
            }
            None => None,
        };

        let new_price = schema.price.amount.and_then(price_to_decimal);

        let (listing_id, outcome) = if let Some(existing) = existing {
            if let (Some(new_price), Some(old_price)) = (new_price, existing.price_amount) {
                if new_price != old_price {
                    sqlx::query(
                        r"INSERT INTO price_history (id, listing_id, price_amount, price_currency, recorded_at)
                          VALUES ($1, $2, $3, $4, $5)",
                    )
                    .bind(Uuid::new_v4())
                    .bind(existing.id)
                    .bind(old_price)
                    .bind(schema.price.currency.as_deref().unwrap_or("EUR"))
                    .bind(Utc::now())
                    .execute(&mut *tx)
                    .await?;
                }
            }

            apply_update(&mut tx, existing.id, schema, new_price, scrape_job_id).await?;
            insert_new_media(&mut tx, existing.id, schema).await?;
            (existing.id, UpsertOutcome::Updated)
        } else {
            let id = Uuid::new_v4();
            insert_new(&mut tx, id, schema, new_price, scrape_job_id).await?;
            insert_new_media(&mut tx, id, schema).await?;

            (id, UpsertOutcome::Inserted)
        };

        tx.commit().await?;
        Ok((listing_id, outcome))
    }
}

#[derive(sqlx::FromRow)]
struct ExistingRow {
    id: Uuid,
    price_amount: Option<Decimal>,
}

fn price_to_decimal(amount: f64) -> Option<Decimal> {
    Decimal::try_from(amount).ok().map(|d| d.round_dp(2))
}

/// Inserts any `schema.media` entry whose URL isn't already attached to
/// `listing_id`. Existing rows are never touched or deleted; new rows are
/// appended after the current highest position.
async fn insert_new_media(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    listing_id: Uuid,
    schema: &PropertySchema,
) -> Result<(), PersistError> {
    if schema.media.is_empty() {
        return Ok(());
    }

    let existing_urls: Vec<String> = sqlx::query_scalar(r"SELECT url FROM media_assets WHERE listing_id = $1")
        .bind(listing_id)
        .fetch_all(&mut **tx)
        .await?;

    let mut next_position = existing_urls.len() as i32;
    for media in &schema.media {
        if existing_urls.iter().any(|url| url == &media.url) {
            continue;
        }

        let asset_type = match media.asset_type.as_deref() {
            Some("floorplan") => MediaType::Floorplan,
            Some("video") => MediaType::Video,
            _ => MediaType::Photo,
        };
        sqlx::query(
            r"INSERT INTO media_assets (id, listing_id, url, alt_text, asset_type, position, created_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(Uuid::new_v4())
        .bind(listing_id)
        .bind(&media.url)
        .bind(&media.alt_text)
        .bind(asset_type)
        .bind(next_position)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;
        next_position += 1;
    }

    Ok(())
}

async fn insert_new(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
    schema: &PropertySchema,
    price_amount: Option<Decimal>,
    scrape_job_id: Uuid,
) -> Result<(), PersistError> {
    let now = Utc::now();
    sqlx::query(
        r"INSERT INTO listings
            (id, partner_id, source_partner, source_url, title, listing_type, property_type,
             typology, bedrooms, bathrooms, floor, price_amount, price_currency, price_per_m2,
             area_useful_m2, area_gross_m2, area_land_m2, district, county, parish, full_address,
             latitude, longitude, has_garage, has_elevator, has_balcony, has_air_conditioning,
             has_pool, energy_certificate, construction_year, advertiser, contacts,
             raw_description, description, enriched_description, description_quality_score,
             meta_description, page_title, headers, raw_payload, scrape_job_id,
             created_at, updated_at)
          VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21,
                  $22,$23,$24,$25,$26,$27,$28,$29,$30,$31,$32,$33,$34,$35,$36,$37,$38,$39,$40,
                  $41,$42)",
    )
    .bind(id)
    .bind(&schema.partner_id)
    .bind(&schema.source_partner)
    .bind(&schema.source_url)
    .bind(&schema.title)
    .bind(&schema.listing_type)
    .bind(&schema.property_type)
    .bind(&schema.typology)
    .bind(schema.bedrooms)
    .bind(schema.bathrooms)
    .bind(&schema.floor)
    .bind(price_amount)
    .bind(schema.price.currency.as_deref().unwrap_or("EUR"))
    .bind(schema.price_per_m2.as_ref().and_then(|m| m.amount).and_then(price_to_decimal))
    .bind(schema.area_useful_m2)
    .bind(schema.area_gross_m2)
    .bind(schema.area_land_m2)
    .bind(&schema.address.region)
    .bind(&schema.address.city)
    .bind(&schema.address.area)
    .bind(&schema.address.full_address)
    .bind(schema.latitude)
    .bind(schema.longitude)
    .bind(schema.features.has_garage)
    .bind(schema.features.has_elevator)
    .bind(schema.features.has_balcony)
    .bind(schema.features.has_air_conditioning)
    .bind(schema.features.has_pool)
    .bind(&schema.energy_certificate)
    .bind(schema.construction_year)
    .bind(&schema.advertiser)
    .bind(&schema.contacts)
    .bind(schema.descriptions.get("raw_description"))
    .bind(schema.descriptions.get("description"))
    .bind(schema.descriptions.get("enriched_description"))
    .bind(schema.description_quality_score)
    .bind(schema.descriptions.get("meta_description"))
    .bind(schema.descriptions.get("page_title"))
    .bind(&schema.seo)
    .bind(&schema.raw_partner_payload)
    .bind(scrape_job_id)
    .bind(now)
    .bind(now)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Applies every *present* field from `schema` onto the existing row;
/// fields absent from `schema` keep their stored value (`COALESCE`).
async fn apply_update(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
    schema: &PropertySchema,
    price_amount: Option<Decimal>,
    scrape_job_id: Uuid,
) -> Result<(), PersistError> {
    sqlx::query(
        r"UPDATE listings SET
            partner_id = COALESCE($2, partner_id),
            title = COALESCE($3, title),
            listing_type = COALESCE($4, listing_type),
            property_type = COALESCE($5, property_type),
            typology = COALESCE($6, typology),
            bedrooms = COALESCE($7, bedrooms),
            bathrooms = COALESCE($8, bathrooms),
            floor = COALESCE($9, floor),
            price_amount = COALESCE($10, price_amount),
            price_currency = COALESCE($11, price_currency),
            price_per_m2 = COALESCE($12, price_per_m2),
            area_useful_m2 = COALESCE($13, area_useful_m2),
            area_gross_m2 = COALESCE($14, area_gross_m2),
            area_land_m2 = COALESCE($15, area_land_m2),
            district = COALESCE($16, district),
            county = COALESCE($17, county),
            parish = COALESCE($18, parish),
            full_address = COALESCE($19, full_address),
            latitude = COALESCE($20, latitude),
            longitude = COALESCE($21, longitude),
            has_garage = COALESCE($22, has_garage),
            has_elevator = COALESCE($23, has_elevator),
            has_balcony = COALESCE($24, has_balcony),
            has_air_conditioning = COALESCE($25, has_air_conditioning),
            has_pool = COALESCE($26, has_pool),
            energy_certificate = COALESCE($27, energy_certificate),
            construction_year = COALESCE($28, construction_year),
            advertiser = COALESCE($29, advertiser),
            contacts = COALESCE($30, contacts),
            raw_description = COALESCE($31, raw_description),
            description = COALESCE($32, description),
            enriched_description = COALESCE($33, enriched_description),
            description_quality_score = COALESCE($34, description_quality_score),
            meta_description = COALESCE($35, meta_description),
            page_title = COALESCE($36, page_title),
            headers = COALESCE($37, headers),
            raw_payload = COALESCE($38, raw_payload),
            scrape_job_id = $39,
            updated_at = $40
          WHERE id = $1",
    )
    .bind(id)
    .bind(&schema.partner_id)
    .bind(&schema.title)
    .bind(&schema.listing_type)
    .bind(&schema.property_type)
    .bind(&schema.typology)
    .bind(schema.bedrooms)
    .bind(schema.bathrooms)
    .bind(&schema.floor)
    .bind(price_amount)
    .bind(schema.price.currency.as_deref())
    .bind(schema.price_per_m2.as_ref().and_then(|m| m.amount).and_then(price_to_decimal))
    .bind(schema.area_useful_m2)
    .bind(schema.area_gross_m2)
    .bind(schema.area_land_m2)
    .bind(&schema.address.region)
    .bind(&schema.address.city)
    .bind(&schema.address.area)
    .bind(&schema.address.full_address)
    .bind(schema.latitude)
    .bind(schema.longitude)
    .bind(schema.features.has_garage)
    .bind(schema.features.has_elevator)
    .bind(schema.features.has_balcony)
    .bind(schema.features.has_air_conditioning)
    .bind(schema.features.has_pool)
    .bind(&schema.energy_certificate)
    .bind(schema.construction_year)
    .bind(&schema.advertiser)
    .bind(&schema.contacts)
    .bind(schema.descriptions.get("raw_description"))
    .bind(schema.descriptions.get("description"))
    .bind(schema.descriptions.get("enriched_description"))
    .bind(schema.description_quality_score)
    .bind(schema.descriptions.get("meta_description"))
    .bind(schema.descriptions.get("page_title"))
    .bind(&schema.seo)
    .bind(&schema.raw_partner_payload)
    .bind(scrape_job_id)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;
    Ok(())
}
