use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MappingType {
    Field,
    Feature,
}

/// Maps a raw field label as it appears in a site's HTML (e.g. "preço")
/// to a canonical field name (e.g. "price"), or a raw feature keyword
/// (e.g. "garagem") to the boolean flag it sets (e.g. "garage"). Backs
/// the C2 config cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMapping {
    pub id: Uuid,
    pub source_name: String,
    pub target_field: String,
    pub mapping_type: MappingType,
    pub language: String,
    /// `None` = applies globally across sites.
    pub site_key: Option<String>,
    pub priority: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CharacterMappingCategory {
    Mojibake,
    Currency,
    Symbol,
}

/// Maps corrupted characters or currency symbols to their canonical
/// form; the `Currency` category backs C4's price-parsing currency
/// lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterMapping {
    pub id: Uuid,
    pub source_chars: String,
    pub target_chars: String,
    pub category: CharacterMappingCategory,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
