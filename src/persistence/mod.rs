//! PostgreSQL-backed persistence for the scraping pipeline.
//!
//! Upserts are implemented as explicit read-then-write transactions rather
//! than a single `INSERT ... ON CONFLICT` because the price-history
//! side-effect needs the pre-image of the row being overwritten, which a
//! conflict clause alone can't express.

mod field_mappings;
mod listings;
mod scrape_jobs;
mod site_configs;

pub use field_mappings::FieldMappingStore;
pub use listings::{ListingStore, UpsertOutcome};
pub use scrape_jobs::{JobFilter, ScrapeJobStore};
pub use site_configs::SiteConfigStore;

use sqlx::postgres::{PgPoolOptions, PgPool};

use crate::error::PersistError;

/// Schema for every table this crate owns. Idempotent (`IF NOT EXISTS`)
/// so it can be run on every startup, mirroring the migration-at-boot
/// pattern used elsewhere in this codebase for the link index.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS site_configs (
    id UUID PRIMARY KEY,
    key TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    base_url TEXT NOT NULL,
    selectors JSONB NOT NULL DEFAULT '{}',
    extraction_mode TEXT NOT NULL DEFAULT 'direct',
    pagination_type TEXT NOT NULL DEFAULT 'html_next',
    pagination_param TEXT,
    link_pattern TEXT,
    image_filter TEXT,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS scrape_jobs (
    id UUID PRIMARY KEY,
    site_key TEXT NOT NULL,
    base_url TEXT,
    start_url TEXT NOT NULL,
    max_pages INTEGER NOT NULL DEFAULT 10,
    status TEXT NOT NULL DEFAULT 'pending',
    progress JSONB NOT NULL DEFAULT '{"pages_visited":0,"listings_found":0,"listings_scraped":0,"errors":0}',
    config JSONB,
    logs JSONB NOT NULL DEFAULT '{"errors":[],"warnings":[],"info":[]}',
    urls JSONB NOT NULL DEFAULT '{"found":[],"scraped":[],"failed":[]}',
    error_message TEXT,
    started_at TIMESTAMPTZ,
    completed_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS ix_scrape_jobs_site_key ON scrape_jobs(site_key);
CREATE INDEX IF NOT EXISTS ix_scrape_jobs_status ON scrape_jobs(status);

CREATE TABLE IF NOT EXISTS listings (
    id UUID PRIMARY KEY,
    partner_id TEXT,
    source_partner TEXT NOT NULL,
    source_url TEXT UNIQUE,
    title TEXT,
    listing_type TEXT,
    property_type TEXT,
    typology TEXT,
    bedrooms INTEGER,
    bathrooms INTEGER,
    floor TEXT,
    price_amount NUMERIC(12, 2),
    price_currency TEXT DEFAULT 'EUR',
    price_per_m2 NUMERIC(10, 2),
    area_useful_m2 DOUBLE PRECISION,
    area_gross_m2 DOUBLE PRECISION,
    area_land_m2 DOUBLE PRECISION,
    district TEXT,
    county TEXT,
    parish TEXT,
    full_address TEXT,
    latitude DOUBLE PRECISION,
    longitude DOUBLE PRECISION,
    has_garage BOOLEAN,
    has_elevator BOOLEAN,
    has_balcony BOOLEAN,
    has_air_conditioning BOOLEAN,
    has_pool BOOLEAN,
    energy_certificate TEXT,
    construction_year INTEGER,
    advertiser TEXT,
    contacts TEXT,
    raw_description TEXT,
    description TEXT,
    enriched_description TEXT,
    description_quality_score INTEGER,
    meta_description TEXT,
    page_title TEXT,
    headers JSONB,
    raw_payload JSONB,
    scrape_job_id UUID,
    search_vector TSVECTOR,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS ix_listings_property_type ON listings(property_type);
CREATE INDEX IF NOT EXISTS ix_listings_typology ON listings(typology);
CREATE INDEX IF NOT EXISTS ix_listings_price_amount ON listings(price_amount);
CREATE INDEX IF NOT EXISTS ix_listings_area_useful_m2 ON listings(area_useful_m2);
CREATE INDEX IF NOT EXISTS ix_listings_source_partner_partner_id ON listings(source_partner, partner_id);
CREATE INDEX IF NOT EXISTS ix_listings_created_at ON listings(created_at);
CREATE INDEX IF NOT EXISTS ix_listings_district ON listings(district);
CREATE INDEX IF NOT EXISTS ix_listings_county ON listings(county);
CREATE INDEX IF NOT EXISTS ix_listings_search_vector ON listings USING GIN(search_vector);

CREATE OR REPLACE FUNCTION listings_search_vector_trigger() RETURNS trigger AS $$
BEGIN
    NEW.search_vector :=
        setweight(to_tsvector('simple', coalesce(NEW.title, '')), 'A') ||
        setweight(to_tsvector('simple', coalesce(NEW.description, '')), 'B') ||
        setweight(to_tsvector('simple', coalesce(NEW.district, '') || ' ' || coalesce(NEW.county, '')), 'C');
    RETURN NEW;
END
$$ LANGUAGE plpgsql;

DROP TRIGGER IF EXISTS tsvectorupdate ON listings;
CREATE TRIGGER tsvectorupdate BEFORE INSERT OR UPDATE
    ON listings FOR EACH ROW EXECUTE FUNCTION listings_search_vector_trigger();

CREATE TABLE IF NOT EXISTS media_assets (
    id UUID PRIMARY KEY,
    listing_id UUID NOT NULL REFERENCES listings(id) ON DELETE CASCADE,
    url TEXT NOT NULL,
    alt_text TEXT,
    asset_type TEXT DEFAULT 'photo',
    position INTEGER,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS ix_media_assets_listing_id ON media_assets(listing_id);

CREATE TABLE IF NOT EXISTS price_history (
    id UUID PRIMARY KEY,
    listing_id UUID NOT NULL REFERENCES listings(id) ON DELETE CASCADE,
    price_amount NUMERIC(12, 2) NOT NULL,
    price_currency TEXT NOT NULL DEFAULT 'EUR',
    recorded_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS ix_price_history_listing_id ON price_history(listing_id);

CREATE TABLE IF NOT EXISTS field_mappings (
    id UUID PRIMARY KEY,
    source_name TEXT NOT NULL,
    target_field TEXT NOT NULL,
    mapping_type TEXT NOT NULL DEFAULT 'field',
    language TEXT NOT NULL DEFAULT 'pt',
    site_key TEXT,
    priority INTEGER NOT NULL DEFAULT 0,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS ix_field_mappings_source_name ON field_mappings(source_name);
CREATE INDEX IF NOT EXISTS ix_field_mappings_target_field ON field_mappings(target_field);
CREATE INDEX IF NOT EXISTS ix_field_mappings_site_key ON field_mappings(site_key);

CREATE TABLE IF NOT EXISTS character_mappings (
    id UUID PRIMARY KEY,
    source_chars TEXT NOT NULL UNIQUE,
    target_chars TEXT NOT NULL,
    category TEXT NOT NULL DEFAULT 'mojibake',
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
"#;

/// Open a connection pool and apply [`SCHEMA_SQL`].
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, PersistError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    sqlx::query(SCHEMA_SQL).execute(&pool).await?;

    Ok(pool)
}
