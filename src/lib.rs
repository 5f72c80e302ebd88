pub mod config;
pub mod config_cache;
pub mod control;
pub mod domain;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod normalizer;
pub mod persistence;
pub mod progress;

pub use config::Settings;
pub use control::ControlSurface;
pub use engine::EngineContext;
pub use error::{ScrapeError, ScrapeResult};
pub use progress::{ProgressChannel, ProgressSnapshot};
