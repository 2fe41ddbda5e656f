//! Caches

mod metadata_cache;

pub use metadata_cache::{MetadataCache, MetadataKey, DEFAULT_METADATA_TTL};
