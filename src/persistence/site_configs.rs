use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{ExtractionMode, PaginationType, SiteConfig};
use crate::error::PersistError;

/// CRUD over `site_configs`: creating, updating, listing, and
/// deactivating the per-partner scrape configuration.
#[derive(Clone)]
pub struct SiteConfigStore {
    pool: PgPool,
}

impl SiteConfigStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, config: &SiteConfig) -> Result<(), PersistError> {
        sqlx::query(
            r"INSERT INTO site_configs
                (id, key, name, base_url, selectors, extraction_mode, pagination_type,
                 pagination_param, link_pattern, image_filter, is_active, created_at, updated_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(config.id)
        .bind(&config.key)
        .bind(&config.name)
        .bind(&config.base_url)
        .bind(&config.selectors)
        .bind(config.extraction_mode)
        .bind(config.pagination_type)
        .bind(&config.pagination_param)
        .bind(&config.link_pattern)
        .bind(&config.image_filter)
        .bind(config.is_active)
        .bind(config.created_at)
        .bind(config.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update(&self, config: &SiteConfig) -> Result<(), PersistError> {
        sqlx::query(
            r"UPDATE site_configs
              SET name = $2, base_url = $3, selectors = $4, extraction_mode = $5,
                  pagination_type = $6, pagination_param = $7, link_pattern = $8,
                  image_filter = $9, is_active = $10, updated_at = $11
              WHERE id = $1",
        )
        .bind(config.id)
        .bind(&config.name)
        .bind(&config.base_url)
        .bind(&config.selectors)
        .bind(config.extraction_mode)
        .bind(config.pagination_type)
        .bind(&config.pagination_param)
        .bind(&config.link_pattern)
        .bind(&config.image_filter)
        .bind(config.is_active)
        .bind(config.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<SiteConfig>, PersistError> {
        let row = sqlx::query_as::<_, SiteConfigRow>(
            r"SELECT id, key, name, base_url, selectors, extraction_mode, pagination_type,
                     pagination_param, link_pattern, image_filter, is_active, created_at, updated_at
              FROM site_configs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(SiteConfigRow::into_domain))
    }

    pub async fn get_by_key(&self, key: &str) -> Result<Option<SiteConfig>, PersistError> {
        let row = sqlx::query_as::<_, SiteConfigRow>(
            r"SELECT id, key, name, base_url, selectors, extraction_mode, pagination_type,
                     pagination_param, link_pattern, image_filter, is_active, created_at, updated_at
              FROM site_configs WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(SiteConfigRow::into_domain))
    }

    pub async fn list(&self) -> Result<Vec<SiteConfig>, PersistError> {
        let rows = sqlx::query_as::<_, SiteConfigRow>(
            r"SELECT id, key, name, base_url, selectors, extraction_mode, pagination_type,
                     pagination_param, link_pattern, image_filter, is_active, created_at, updated_at
              FROM site_configs ORDER BY key",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(SiteConfigRow::into_domain).collect())
    }

    pub async fn deactivate(&self, id: Uuid) -> Result<(), PersistError> {
        sqlx::query("UPDATE site_configs SET is_active = FALSE, updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct SiteConfigRow {
    id: Uuid,
    key: String,
    name: String,
    base_url: String,
    selectors: serde_json::Value,
    extraction_mode: ExtractionMode,
    pagination_type: PaginationType,
    pagination_param: Option<String>,
    link_pattern: Option<String>,
    image_filter: Option<String>,
    is_active: bool,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl SiteConfigRow {
    fn into_domain(self) -> SiteConfig {
        SiteConfig {
            id: self.id,
            key: self.key,
            name: self.name,
            base_url: self.base_url,
            selectors: self.selectors,
            extraction_mode: self.extraction_mode,
            pagination_type: self.pagination_type,
            pagination_param: self.pagination_param,
            link_pattern: self.link_pattern,
            image_filter: self.image_filter,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
