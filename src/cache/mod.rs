//! Catalog caches.
//!
//! Each cache wraps one JSON source file and keeps a ready-to-serve
//! serialization of it in memory:
//!
//! - [`CategoryCache`]: one instance per [`CategoryView`] (leaf, top-level, all).
//! - [`ProductCache`]: the product envelope, additionally persisted to a
//!   sibling `.cache` file so a restart can skip the source.
//!
//! Documents are loaded on first access and replaced only by `reload()`. A
//! failed reload never discards the document that is already being served.

mod category;
mod error;
mod lock;
mod product;
mod snapshot;
mod store;

pub use category::{CategoryCache, CategoryView};
pub use error::CacheError;
pub use product::{ProductCache, ProductStatus, cache_file_path};
pub use snapshot::{ServedDocument, Snapshot, SnapshotOrigin, count_records};
pub use store::{FsJsonStore, JsonStore};

pub const METRIC_CACHE_LOAD_TOTAL: &str = "catalog_cache_load_total";
pub const METRIC_CACHE_LOAD_FAILED_TOTAL: &str = "catalog_cache_load_failed_total";
pub const METRIC_CACHE_PERSIST_FAILED_TOTAL: &str = "catalog_cache_persist_failed_total";
pub const METRIC_CACHE_LOAD_MS: &str = "catalog_cache_load_ms";
