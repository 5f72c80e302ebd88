use sqlx::PgPool;

use crate::domain::{CharacterMapping, CharacterMappingCategory, FieldMapping, MappingType};
use crate::error::PersistError;

/// Thin query layer over `field_mappings`/`character_mappings`, used by
/// the config cache to refresh its in-memory maps.
#[derive(Clone)]
pub struct FieldMappingStore {
    pool: PgPool,
}

impl FieldMappingStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn load_active(
        &self,
        mapping_type: MappingType,
        site_key: Option<&str>,
    ) -> Result<Vec<FieldMapping>, PersistError> {
        let rows = sqlx::query_as::<_, FieldMappingRow>(
            r"SELECT id, source_name, target_field, mapping_type, language, site_key,
                     priority, is_active, created_at, updated_at
              FROM field_mappings
              WHERE mapping_type = $1 AND is_active = TRUE
                AND (site_key IS NULL OR site_key = $2)
              ORDER BY priority DESC",
        )
        .bind(mapping_type)
        .bind(site_key)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FieldMappingRow::into_domain).collect())
    }

    pub async fn load_active_currency(&self) -> Result<Vec<CharacterMapping>, PersistError> {
        let rows = sqlx::query_as::<_, CharacterMappingRow>(
            r"SELECT id, source_chars, target_chars, category, is_active, created_at, updated_at
              FROM character_mappings
              WHERE category = 'currency' AND is_active = TRUE",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(CharacterMappingRow::into_domain)
            .collect())
    }
}

#[derive(sqlx::FromRow)]
struct FieldMappingRow {
    id: uuid::Uuid,
    source_name: String,
    target_field: String,
    mapping_type: MappingType,
    language: String,
    site_key: Option<String>,
    priority: i32,
    is_active: bool,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl FieldMappingRow {
    fn into_domain(self) -> FieldMapping {
        FieldMapping {
            id: self.id,
            source_name: self.source_name,
            target_field: self.target_field,
            mapping_type: self.mapping_type,
            language: self.language,
            site_key: self.site_key,
            priority: self.priority,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CharacterMappingRow {
    id: uuid::Uuid,
    source_chars: String,
    target_chars: String,
    category: CharacterMappingCategory,
    is_active: bool,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl CharacterMappingRow {
    fn into_domain(self) -> CharacterMapping {
        CharacterMapping {
            id: self.id,
            source_chars: self.source_chars,
            target_chars: self.target_chars,
            category: self.category,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
