//! Core domain types shared by every component: the persisted shapes
//! (`SiteConfig`, `ScrapeJob`, `Listing`, `MediaAsset`, `PriceHistory`,
//! `FieldMapping`/`CharacterMapping`) and the canonical schema a raw page
//! read is normalized into (`PropertySchema`).

mod field_mapping;
mod listing;
mod property_schema;
mod scrape_job;
mod site_config;

pub use field_mapping::{CharacterMapping, CharacterMappingCategory, FieldMapping, MappingType};
pub use listing::{Listing, MediaAsset, MediaType, PriceHistory};
pub use property_schema::{Address, ListingFlags, Money, PropertySchema, PropertyMediaAsset};
pub use scrape_job::{JobLogs, JobProgress, JobStatus, JobUrls, LogEntry, ScrapeJob};
pub use site_config::{ExtractionMode, PaginationType, SiteConfig};
