// src/cache/mod.rs

//! Fingerprint-keyed result cache and its persistence.

pub mod persist;
pub mod store;

pub use persist::{
    CACHE_FILE_PATH, CacheStore, FileCacheStore, MemoryCacheStore, load_or_cold, store_for,
};
pub use store::{CacheEntry, CacheStats, ResultCache};
