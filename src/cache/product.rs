//! Product listing cache with an on-disk derived copy.
//!
//! The served document is always an envelope `{"data": [...]}`. A cold cache
//! first tries the sibling `.cache` file written by an earlier load and only
//! falls back to the source file when that copy is missing or unusable.
//! `reload` always goes back to the source and rewrites the `.cache` file.

use std::{
    ffi::OsString,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use metrics::counter;
use serde::Serialize;
use serde_json::{Map, Value};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use super::METRIC_CACHE_PERSIST_FAILED_TOTAL;
use super::error::CacheError;
use super::snapshot::{ServedDocument, Snapshot, SnapshotCell, SnapshotOrigin};
use super::store::{FsJsonStore, JsonStore};

const CACHE_NAME: &str = "products";
const CACHE_FILE_SUFFIX: &str = ".cache";

/// Derived cache file for a product source: the source file name with
/// `.cache` appended, in the same directory.
pub fn cache_file_path(source_path: &Path) -> PathBuf {
    let mut name = source_path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(CACHE_FILE_SUFFIX);
    source_path.with_file_name(name)
}

/// Steps of a cold load. The disk copy is tried first; any problem with it
/// moves on to the source, and a source load always ends by persisting.
enum ProductLoadState {
    ColdDiskHit,
    ColdSourceFallback,
    Loaded(Snapshot),
}

/// Diagnostics for the product cache.
#[derive(Debug, Clone, Serialize)]
pub struct ProductStatus {
    pub products: usize,
    pub json_size: usize,
    #[serde(with = "time::serde::rfc3339")]
    pub loaded_at: OffsetDateTime,
    pub origin: SnapshotOrigin,
}

impl ProductStatus {
    pub fn of(snapshot: &Snapshot) -> Self {
        Self {
            products: snapshot.item_count(),
            json_size: snapshot.document().len(),
            loaded_at: snapshot.loaded_at(),
            origin: snapshot.origin(),
        }
    }
}

pub struct ProductCache {
    source_path: PathBuf,
    cache_path: PathBuf,
    store: Arc<dyn JsonStore>,
    cell: SnapshotCell,
}

impl fmt::Debug for ProductCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProductCache")
            .field("source_path", &self.source_path)
            .field("cache_path", &self.cache_path)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl ProductCache {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self::with_store(source_path, Arc::new(FsJsonStore))
    }

    pub fn with_store(source_path: impl Into<PathBuf>, store: Arc<dyn JsonStore>) -> Self {
        let source_path = source_path.into();
        let cache_path = cache_file_path(&source_path);
        Self {
            source_path,
            cache_path,
            store,
            cell: SnapshotCell::new(CACHE_NAME),
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.current().is_some()
    }

    pub fn snapshot(&self) -> Result<Arc<Snapshot>, CacheError> {
        self.cell.get_or_load(|| self.cold_load())
    }

    /// The product envelope, loading it on first use.
    pub fn json_response(&self) -> Result<ServedDocument, CacheError> {
        self.snapshot().map(|snapshot| snapshot.document().clone())
    }

    /// Number of products in the current envelope; `0` until loaded.
    pub fn count(&self) -> usize {
        self.cell
            .current()
            .map_or(0, |snapshot| snapshot.item_count())
    }

    pub fn status(&self) -> Result<ProductStatus, CacheError> {
        self.snapshot().map(|snapshot| ProductStatus::of(&snapshot))
    }

    /// Re-derive from the source file, ignoring the disk copy, then rewrite
    /// the disk copy. The previous document stays served if the source fails.
    pub fn reload(&self) -> Result<Arc<Snapshot>, CacheError> {
        let result = self.cell.refresh(|| {
            let (envelope, snapshot) = self.load_products()?;
            self.save_to_cache_file(&envelope);
            Ok(snapshot)
        });
        if let Err(err) = &result {
            warn!(
                target = "catalog::cache::product",
                path = %self.source_path.display(),
                stale_kept = self.is_loaded(),
                error = %err,
                "product reload failed"
            );
        }
        result
    }

    fn cold_load(&self) -> Result<Snapshot, CacheError> {
        let mut state = ProductLoadState::ColdDiskHit;
        loop {
            state = match state {
                ProductLoadState::ColdDiskHit => match self.load_from_cache_file() {
                    Some(snapshot) => ProductLoadState::Loaded(snapshot),
                    None => ProductLoadState::ColdSourceFallback,
                },
                ProductLoadState::ColdSourceFallback => {
                    let (envelope, snapshot) = self.load_products()?;
                    self.save_to_cache_file(&envelope);
                    ProductLoadState::Loaded(snapshot)
                }
                ProductLoadState::Loaded(snapshot) => return Ok(snapshot),
            };
        }
    }

    fn load_from_cache_file(&self) -> Option<Snapshot> {
        // A successful read doubles as the validity check.
        let value = match self.store.read(&self.cache_path) {
            Ok(value) => value,
            Err(err) if err.is_not_found() => {
                debug!(
                    target = "catalog::cache::product",
                    path = %self.cache_path.display(),
                    "no disk cache, using source"
                );
                return None;
            }
            Err(err) => {
                warn!(
                    target = "catalog::cache::product",
                    path = %self.cache_path.display(),
                    error = %err,
                    "disk cache is invalid, using source"
                );
                return None;
            }
        };

        if !is_envelope(&value) {
            warn!(
                target = "catalog::cache::product",
                path = %self.cache_path.display(),
                "disk cache is not a product envelope, using source"
            );
            return None;
        }

        match Snapshot::encode(CACHE_NAME, &value, SnapshotOrigin::DiskCache) {
            Ok(snapshot) => {
                info!(
                    target = "catalog::cache::product",
                    path = %self.cache_path.display(),
                    count = snapshot.item_count(),
                    "loaded products from disk cache"
                );
                Some(snapshot)
            }
            Err(err) => {
                warn!(
                    target = "catalog::cache::product",
                    path = %self.cache_path.display(),
                    error = %err,
                    "disk cache could not be encoded, using source"
                );
                None
            }
        }
    }

    fn load_products(&self) -> Result<(Value, Snapshot), CacheError> {
        let value = self
            .store
            .read(&self.source_path)
            .map_err(|source| CacheError::Load {
                cache: CACHE_NAME,
                path: self.source_path.clone(),
                source,
            })?;

        let envelope = into_envelope(value).map_err(|reason| CacheError::Shape {
            cache: CACHE_NAME,
            path: self.source_path.clone(),
            reason,
        })?;
        let snapshot = Snapshot::encode(CACHE_NAME, &envelope, SnapshotOrigin::Source)?;

        info!(
            target = "catalog::cache::product",
            path = %self.source_path.display(),
            count = snapshot.item_count(),
            bytes = snapshot.document().len(),
            "loaded products from source"
        );
        Ok((envelope, snapshot))
    }

    fn save_to_cache_file(&self, envelope: &Value) {
        if let Err(err) = self.store.write(&self.cache_path, envelope) {
            counter!(METRIC_CACHE_PERSIST_FAILED_TOTAL, "cache" => CACHE_NAME).increment(1);
            warn!(
                target = "catalog::cache::product",
                path = %self.cache_path.display(),
                error = %err,
                "failed to persist product disk cache"
            );
        }
    }
}

fn is_envelope(value: &Value) -> bool {
    matches!(value.get("data"), Some(Value::Array(_)))
}

fn into_envelope(value: Value) -> Result<Value, String> {
    match value {
        Value::Array(items) => {
            let mut envelope = Map::new();
            envelope.insert("data".to_string(), Value::Array(items));
            Ok(Value::Object(envelope))
        }
        value if is_envelope(&value) => Ok(value),
        Value::Object(_) => Err("object without a `data` array".to_string()),
        _ => Err("expected an array of products or a `data` envelope".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, sync::Barrier, thread, time::Duration};

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::cache::store::testing::CountingStore;
    use crate::infra::json_file::{read_json, write_json};

    fn products(n: usize) -> Value {
        Value::Array(
            (1..=n)
                .map(|id| json!({"id": id, "name": format!("product {id}")}))
                .collect(),
        )
    }

    #[test]
    fn cache_file_is_a_sibling_with_suffix() {
        assert_eq!(
            cache_file_path(Path::new("/data/products.json")),
            PathBuf::from("/data/products.json.cache")
        );
        assert_eq!(
            cache_file_path(Path::new("products.json")),
            PathBuf::from("products.json.cache")
        );
    }

    #[test]
    fn cold_start_without_disk_cache_uses_source_and_persists() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("products.json");
        write_json(&source, &products(5)).unwrap();
        let cache = ProductCache::new(&source);
        assert!(!cache.cache_path().exists());

        let doc = cache.json_response().unwrap();
        let value: Value = serde_json::from_str(doc.as_str()).unwrap();
        assert_eq!(value["data"].as_array().unwrap().len(), 5);
        assert_eq!(cache.count(), 5);
        assert_eq!(cache.status().unwrap().origin, SnapshotOrigin::Source);

        assert_eq!(read_json(cache.cache_path()).unwrap(), value);
    }

    #[test]
    fn restart_with_only_disk_cache_serves_same_document() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("products.json");
        write_json(&source, &products(5)).unwrap();
        let first = ProductCache::new(&source).json_response().unwrap();

        fs::remove_file(&source).unwrap();
        let restarted = ProductCache::new(&source);
        let second = restarted.json_response().unwrap();

        assert_eq!(first, second);
        assert_eq!(restarted.count(), 5);
        assert_eq!(restarted.status().unwrap().origin, SnapshotOrigin::DiskCache);
    }

    #[test]
    fn valid_disk_cache_wins_over_source() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("products.json");
        write_json(&source, &products(3)).unwrap();
        write_json(&cache_file_path(&source), &json!({"data": products(2)})).unwrap();
        let store = Arc::new(CountingStore::default());
        let cache = ProductCache::with_store(&source, store.clone());

        assert_eq!(cache.status().unwrap().products, 2);
        assert_eq!(store.reads_of(&source), 0);
        assert_eq!(store.reads_of(cache.cache_path()), 1);
        assert_eq!(store.writes(), 0);
    }

    #[test]
    fn concurrent_cold_reads_from_disk_cache_read_it_once() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("products.json");
        let cache_path = cache_file_path(&source);
        write_json(&cache_path, &json!({"data": products(4)})).unwrap();
        let store = Arc::new(CountingStore::with_read_delay(Duration::from_millis(50)));
        let cache = Arc::new(ProductCache::with_store(&source, store.clone()));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.json_response().unwrap()
                })
            })
            .collect();

        let documents: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(store.reads_of(&cache_path), 1);
        assert_eq!(store.reads_of(&source), 0);
        assert!(documents.iter().all(|doc| doc == &documents[0]));
        assert_eq!(cache.count(), 4);
    }

    #[test]
    fn concurrent_cold_reads_from_source_read_each_file_once() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("products.json");
        write_json(&source, &products(3)).unwrap();
        let store = Arc::new(CountingStore::with_read_delay(Duration::from_millis(50)));
        let cache = Arc::new(ProductCache::with_store(&source, store.clone()));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.json_response().unwrap()
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.reads_of(&source), 1);
        assert_eq!(store.reads_of(cache.cache_path()), 1);
        assert_eq!(store.writes(), 1);
    }

    #[test]
    fn malformed_disk_cache_falls_back_to_source_and_is_rewritten() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("products.json");
        write_json(&source, &products(4)).unwrap();
        let cache_path = cache_file_path(&source);
        fs::write(&cache_path, "{\"data\": [").unwrap();

        let cache = ProductCache::new(&source);
        assert_eq!(cache.status().unwrap().products, 4);
        assert_eq!(
            read_json(&cache_path).unwrap(),
            json!({"data": products(4)})
        );
    }

    #[test]
    fn disk_cache_without_envelope_falls_back_to_source() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("products.json");
        write_json(&source, &products(2)).unwrap();
        write_json(&cache_file_path(&source), &products(9)).unwrap();

        let cache = ProductCache::new(&source);
        assert_eq!(cache.count(), 0);
        assert_eq!(cache.status().unwrap().products, 2);
        assert_eq!(cache.status().unwrap().origin, SnapshotOrigin::Source);
    }

    #[test]
    fn envelope_source_is_served_as_is() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("products.json");
        write_json(&source, &json!({"data": products(1), "version": 3})).unwrap();

        let cache = ProductCache::new(&source);
        let value: Value = serde_json::from_str(cache.json_response().unwrap().as_str()).unwrap();
        assert_eq!(value["version"], 3);
        assert_eq!(cache.count(), 1);
    }

    #[test]
    fn source_of_wrong_shape_is_a_load_error() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("products.json");
        write_json(&source, &json!({"items": []})).unwrap();

        let err = ProductCache::new(&source).json_response().unwrap_err();
        assert!(matches!(err, CacheError::Shape { .. }));
    }

    #[test]
    fn missing_source_and_disk_cache_fails_first_load() {
        let dir = TempDir::new().unwrap();
        let cache = ProductCache::new(dir.path().join("products.json"));

        let err = cache.json_response().unwrap_err();
        assert!(err.is_not_found());
        assert!(!cache.is_loaded());
        assert!(!cache.cache_path().exists());
    }

    #[test]
    fn reload_bypasses_disk_cache_and_overwrites_it() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("products.json");
        write_json(&source, &products(6)).unwrap();
        write_json(&cache_file_path(&source), &json!({"data": products(1)})).unwrap();
        let cache = ProductCache::new(&source);
        assert_eq!(cache.status().unwrap().products, 1);

        let snapshot = cache.reload().unwrap();
        assert_eq!(snapshot.item_count(), 6);
        assert_eq!(snapshot.origin(), SnapshotOrigin::Source);

        let served: Value = serde_json::from_str(cache.json_response().unwrap().as_str()).unwrap();
        assert_eq!(read_json(cache.cache_path()).unwrap(), served);
        assert_eq!(served["data"].as_array().unwrap().len(), 6);
    }

    #[test]
    fn failed_reload_keeps_previous_document_and_disk_cache() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("products.json");
        write_json(&source, &products(2)).unwrap();
        let cache = ProductCache::new(&source);
        let before = cache.json_response().unwrap();

        fs::write(&source, "[{").unwrap();
        assert!(cache.reload().is_err());

        assert_eq!(cache.json_response().unwrap(), before);
        assert_eq!(
            read_json(cache.cache_path()).unwrap(),
            json!({"data": products(2)})
        );
    }

    #[test]
    fn persist_failure_does_not_fail_the_read() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("products.json");
        write_json(&source, &products(3)).unwrap();
        // A directory where the cache file should go makes the persist fail.
        fs::create_dir(cache_file_path(&source)).unwrap();

        let cache = ProductCache::new(&source);
        assert_eq!(cache.status().unwrap().products, 3);
        assert!(cache.reload().is_ok());
    }
}
