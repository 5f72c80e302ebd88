//! DB-backed field/feature/currency mapping cache with TTL and a
//! fail-safe default, so a slow or down database never blocks a parse.
//!
//! On refresh failure, falls back to the built-in defaults *and still
//! advances the refresh timestamp* — otherwise every single extraction
//! call during an outage would retry the DB round-trip.

mod defaults;

pub use defaults::{default_currency_map, default_feature_map, default_field_map};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::domain::MappingType;
use crate::persistence::FieldMappingStore;

struct CachedMap<T> {
    map: T,
    refreshed_at: Option<Instant>,
}

impl<T> CachedMap<T> {
    fn fresh(defaults: T) -> Self {
        Self {
            map: defaults,
            refreshed_at: None,
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.refreshed_at
            .is_some_and(|t| t.elapsed() < ttl)
    }
}

/// Shared, TTL-refreshed lookup tables for C3 (field/feature maps) and
/// C4 (currency map). One instance is shared across every concurrently
/// running job.
pub struct ConfigCache {
    store: FieldMappingStore,
    ttl: Duration,
    field_map: RwLock<CachedMap<Vec<(String, String)>>>,
    feature_map: RwLock<CachedMap<Vec<(String, String)>>>,
    currency_map: RwLock<CachedMap<HashMap<String, String>>>,
}

impl ConfigCache {
    #[must_use]
    pub fn new(store: FieldMappingStore, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            field_map: RwLock::new(CachedMap::fresh(default_field_map())),
            feature_map: RwLock::new(CachedMap::fresh(default_feature_map())),
            currency_map: RwLock::new(CachedMap::fresh(default_currency_map())),
        }
    }

    /// Ordered highest-priority-first: lookup is "first substring match
    /// wins", so callers must scan this in order rather than re-sort it.
    pub async fn field_map(&self, site_key: Option<&str>) -> Vec<(String, String)> {
        self.get_or_refresh(&self.field_map, MappingType::Field, site_key)
            .await
    }

    /// See [`Self::field_map`] — same ordering contract.
    pub async fn feature_map(&self, site_key: Option<&str>) -> Vec<(String, String)> {
        self.get_or_refresh(&self.feature_map, MappingType::Feature, site_key)
            .await
    }

    pub async fn currency_map(&self) -> HashMap<String, String> {
        // currency mappings have no mapping_type/site_key dimension; reuse
        // the same double-checked-locking refresh path with a dedicated loader.
        {
            let cached = self.currency_map.read().await;
            if cached.is_fresh(self.ttl) {
                return cached.map.clone();
            }
        }

        let mut cached = self.currency_map.write().await;
        // re-check: another task may have refreshed while we waited for the write lock
        if cached.is_fresh(self.ttl) {
            return cached.map.clone();
        }

        match self.store.load_active_currency().await {
            Ok(rows) if !rows.is_empty() => {
                let mut map = HashMap::new();
                for row in rows {
                    map.insert(row.source_chars.clone(), row.target_chars.clone());
                    map.insert(row.source_chars.to_lowercase(), row.target_chars);
                }
                cached.map = map;
            }
            Ok(_) => {
                tracing::debug!("no active currency mappings in DB, keeping current map");
            }
            Err(error) => {
                tracing::warn!(%error, "could not load currency map from DB, using defaults");
                cached.map = default_currency_map();
            }
        }
        // Advance the timestamp regardless of outcome.
        cached.refreshed_at = Some(Instant::now());
        cached.map.clone()
    }

    async fn get_or_refresh(
        &self,
        slot: &RwLock<CachedMap<Vec<(String, String)>>>,
        mapping_type: MappingType,
        site_key: Option<&str>,
    ) -> Vec<(String, String)> {
        {
            let cached = slot.read().await;
            if cached.is_fresh(self.ttl) {
                return cached.map.clone();
            }
        }

        let mut cached = slot.write().await;
        if cached.is_fresh(self.ttl) {
            return cached.map.clone();
        }

        match self.store.load_active(mapping_type, site_key).await {
            Ok(rows) if !rows.is_empty() => {
                // rows arrive `ORDER BY priority DESC`; preserve that order
                // so the highest-priority substring match always wins.
                let map = rows
                    .into_iter()
                    .map(|m| (m.source_name.to_lowercase(), m.target_field))
                    .collect();
                cached.map = map;
            }
            Ok(_) => {
                tracing::debug!(?mapping_type, "no active mappings in DB, keeping current map");
            }
            Err(error) => {
                tracing::warn!(%error, ?mapping_type, "could not load mappings from DB, using defaults");
                cached.map = match mapping_type {
                    MappingType::Field => default_field_map(),
                    MappingType::Feature => default_feature_map(),
                };
            }
        }
        cached.refreshed_at = Some(Instant::now());
        cached.map.clone()
    }

    /// Force the next lookup of every map to reload from the database.
    /// Called after a `SiteConfig`/`FieldMapping` create or update so the
    /// edit takes effect immediately rather than waiting out the TTL.
    pub async fn invalidate(&self) {
        self.field_map.write().await.refreshed_at = None;
        self.feature_map.write().await.refreshed_at = None;
        self.currency_map.write().await.refreshed_at = None;
    }
}

pub type SharedConfigCache = Arc<ConfigCache>;

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(map: &'a [(String, String)], key: &str) -> Option<&'a str> {
        map.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn defaults_cover_core_keywords() {
        let field_map = default_field_map();
        assert_eq!(lookup(&field_map, "preço"), Some("price"));
        assert_eq!(lookup(&field_map, "quartos"), Some("bedrooms"));

        let feature_map = default_feature_map();
        assert_eq!(lookup(&feature_map, "garagem"), Some("garage"));

        let currency_map = default_currency_map();
        assert_eq!(currency_map.get("€").map(String::as_str), Some("EUR"));
    }

    #[test]
    fn defaults_preserve_declaration_order_for_priority_lookup() {
        let field_map = default_field_map();
        let price_index = field_map.iter().position(|(k, _)| k == "price").unwrap();
        let bedrooms_index = field_map.iter().position(|(k, _)| k == "bedrooms").unwrap();
        assert!(price_index < bedrooms_index);
    }
}
