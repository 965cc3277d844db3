//! Immutable cache snapshots and the cell that swaps them.

use std::{
    fmt,
    ops::Deref,
    sync::{Arc, Mutex, RwLock},
    time::Instant,
};

use bytes::Bytes;
use metrics::{counter, histogram};
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

use super::error::CacheError;
use super::{METRIC_CACHE_LOAD_FAILED_TOTAL, METRIC_CACHE_LOAD_MS, METRIC_CACHE_LOAD_TOTAL};
use super::lock::{mutex_lock, rw_read, rw_write};

/// A serialized document, shared without copying between the cache and
/// every response that serves it.
#[derive(Clone, PartialEq, Eq)]
pub struct ServedDocument(Arc<str>);

impl ServedDocument {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Response body view of the document; no bytes are copied.
    pub fn to_bytes(&self) -> Bytes {
        Bytes::from_owner(self.clone())
    }
}

impl Deref for ServedDocument {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<[u8]> for ServedDocument {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for ServedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ServedDocument")
            .field(&format_args!("{} bytes", self.0.len()))
            .finish()
    }
}

impl fmt::Display for ServedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which file a snapshot was materialized from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotOrigin {
    Source,
    DiskCache,
}

impl SnapshotOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::DiskCache => "disk_cache",
        }
    }
}

/// One successfully loaded document together with its record count.
#[derive(Debug, Clone)]
pub struct Snapshot {
    document: ServedDocument,
    item_count: usize,
    loaded_at: OffsetDateTime,
    origin: SnapshotOrigin,
}

impl Snapshot {
    pub(crate) fn encode(
        cache: &'static str,
        value: &Value,
        origin: SnapshotOrigin,
    ) -> Result<Self, CacheError> {
        let document = serde_json::to_string(value)
            .map_err(|source| CacheError::Encode { cache, source })?;
        Ok(Self {
            document: ServedDocument(Arc::from(document)),
            item_count: count_records(value),
            loaded_at: OffsetDateTime::now_utc(),
            origin,
        })
    }

    pub fn document(&self) -> &ServedDocument {
        &self.document
    }

    pub fn item_count(&self) -> usize {
        self.item_count
    }

    pub fn loaded_at(&self) -> OffsetDateTime {
        self.loaded_at
    }

    pub fn origin(&self) -> SnapshotOrigin {
        self.origin
    }
}

/// Number of top-level records a document represents.
///
/// Arrays count their elements and `{"data": [...]}` envelopes count the
/// wrapped array. Any other object counts its members; scalars count nothing.
pub fn count_records(value: &Value) -> usize {
    match value {
        Value::Array(items) => items.len(),
        Value::Object(map) => match map.get("data") {
            Some(Value::Array(items)) => items.len(),
            _ => map.len(),
        },
        _ => 0,
    }
}

/// Holder of the current snapshot of one cache.
///
/// Readers clone an `Arc` under a short read lock. Loads are serialized by a
/// separate guard and run without holding the snapshot lock; the result is
/// swapped in under a short write lock.
#[derive(Debug)]
pub(crate) struct SnapshotCell {
    cache: &'static str,
    current: RwLock<Option<Arc<Snapshot>>>,
    load_guard: Mutex<()>,
}

impl SnapshotCell {
    pub(crate) fn new(cache: &'static str) -> Self {
        Self {
            cache,
            current: RwLock::new(None),
            load_guard: Mutex::new(()),
        }
    }

    pub(crate) fn current(&self) -> Option<Arc<Snapshot>> {
        rw_read(&self.current, self.cache, "current").clone()
    }

    /// Return the current snapshot, running `load` first if there is none.
    /// Concurrent callers on a cold cell wait for a single load.
    pub(crate) fn get_or_load<F>(&self, load: F) -> Result<Arc<Snapshot>, CacheError>
    where
        F: FnOnce() -> Result<Snapshot, CacheError>,
    {
        if let Some(snapshot) = self.current() {
            return Ok(snapshot);
        }

        let _guard = mutex_lock(&self.load_guard, self.cache, "get_or_load");
        if let Some(snapshot) = self.current() {
            return Ok(snapshot);
        }

        self.run_and_swap(load)
    }

    /// Run `load` unconditionally and swap its result in. On failure the
    /// previous snapshot stays current.
    pub(crate) fn refresh<F>(&self, load: F) -> Result<Arc<Snapshot>, CacheError>
    where
        F: FnOnce() -> Result<Snapshot, CacheError>,
    {
        let _guard = mutex_lock(&self.load_guard, self.cache, "refresh");
        self.run_and_swap(load)
    }

    fn run_and_swap<F>(&self, load: F) -> Result<Arc<Snapshot>, CacheError>
    where
        F: FnOnce() -> Result<Snapshot, CacheError>,
    {
        let started = Instant::now();
        let snapshot = match load() {
            Ok(snapshot) => Arc::new(snapshot),
            Err(err) => {
                counter!(METRIC_CACHE_LOAD_FAILED_TOTAL, "cache" => self.cache).increment(1);
                return Err(err);
            }
        };

        histogram!(METRIC_CACHE_LOAD_MS, "cache" => self.cache)
            .record(started.elapsed().as_secs_f64() * 1000.0);
        counter!(
            METRIC_CACHE_LOAD_TOTAL,
            "cache" => self.cache,
            "origin" => snapshot.origin().as_str()
        )
        .increment(1);

        *rw_write(&self.current, self.cache, "swap") = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }
}
