//! Category listings, one cache per view.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Serialize;
use tracing::{info, warn};

use super::error::CacheError;
use super::snapshot::{ServedDocument, Snapshot, SnapshotCell, SnapshotOrigin};
use super::store::{FsJsonStore, JsonStore};

/// The fixed projections of the category tree. Each view is backed by its own
/// source file; the cache does not derive one view from another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryView {
    Leaf,
    TopLevel,
    All,
}

impl CategoryView {
    pub const ALL: [CategoryView; 3] = [Self::Leaf, Self::TopLevel, Self::All];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Leaf => "leaf",
            Self::TopLevel => "top-level",
            Self::All => "all",
        }
    }

    pub(crate) fn cache_name(self) -> &'static str {
        match self {
            Self::Leaf => "leaf categories",
            Self::TopLevel => "top-level categories",
            Self::All => "all categories",
        }
    }
}

impl fmt::Display for CategoryView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pre-serialized document for one category view.
pub struct CategoryCache {
    view: CategoryView,
    source_path: PathBuf,
    store: Arc<dyn JsonStore>,
    cell: SnapshotCell,
}

impl fmt::Debug for CategoryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CategoryCache")
            .field("view", &self.view)
            .field("source_path", &self.source_path)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl CategoryCache {
    /// Bind a view to its source file. Nothing is read until first access.
    pub fn new(view: CategoryView, source_path: impl Into<PathBuf>) -> Self {
        Self::with_store(view, source_path, Arc::new(FsJsonStore))
    }

    pub fn with_store(
        view: CategoryView,
        source_path: impl Into<PathBuf>,
        store: Arc<dyn JsonStore>,
    ) -> Self {
        Self {
            view,
            source_path: source_path.into(),
            store,
            cell: SnapshotCell::new(view.cache_name()),
        }
    }

    pub fn view(&self) -> CategoryView {
        self.view
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.current().is_some()
    }

    /// Current snapshot, loading it from the source file on first use.
    pub fn snapshot(&self) -> Result<Arc<Snapshot>, CacheError> {
        self.cell.get_or_load(|| self.load_categories())
    }

    /// Served document of whichever view this cache holds.
    pub fn document(&self) -> Result<ServedDocument, CacheError> {
        self.snapshot().map(|snapshot| snapshot.document().clone())
    }

    pub fn leaf_categories_json(&self) -> Result<ServedDocument, CacheError> {
        self.view_document(CategoryView::Leaf)
    }

    pub fn top_level_categories_json(&self) -> Result<ServedDocument, CacheError> {
        self.view_document(CategoryView::TopLevel)
    }

    pub fn all_categories_json(&self) -> Result<ServedDocument, CacheError> {
        self.view_document(CategoryView::All)
    }

    /// Records in the current document; `0` until the first successful load.
    pub fn count(&self) -> usize {
        self.cell
            .current()
            .map_or(0, |snapshot| snapshot.item_count())
    }

    pub fn leaf_count(&self) -> usize {
        self.view_count(CategoryView::Leaf)
    }

    pub fn top_level_count(&self) -> usize {
        self.view_count(CategoryView::TopLevel)
    }

    pub fn all_count(&self) -> usize {
        self.view_count(CategoryView::All)
    }

    /// Re-read the source file and replace the served document.
    ///
    /// On failure the error is returned and the previous document, if any,
    /// keeps being served.
    pub fn reload(&self) -> Result<Arc<Snapshot>, CacheError> {
        let result = self.cell.refresh(|| self.load_categories());
        if let Err(err) = &result {
            warn!(
                target = "catalog::cache::category",
                view = %self.view,
                path = %self.source_path.display(),
                stale_kept = self.is_loaded(),
                error = %err,
                "category reload failed"
            );
        }
        result
    }

    fn view_document(&self, requested: CategoryView) -> Result<ServedDocument, CacheError> {
        if requested != self.view {
            return Err(CacheError::ViewMismatch {
                served: self.view,
                requested,
            });
        }
        self.document()
    }

    fn view_count(&self, requested: CategoryView) -> usize {
        if requested == self.view {
            self.count()
        } else {
            0
        }
    }

    fn load_categories(&self) -> Result<Snapshot, CacheError> {
        let cache = self.view.cache_name();
        let value = self
            .store
            .read(&self.source_path)
            .map_err(|source| CacheError::Load {
                cache,
                path: self.source_path.clone(),
                source,
            })?;

        let snapshot = Snapshot::encode(cache, &value, SnapshotOrigin::Source)?;
        info!(
            target = "catalog::cache::category",
            view = %self.view,
            path = %self.source_path.display(),
            count = snapshot.item_count(),
            bytes = snapshot.document().len(),
            "loaded categories"
        );
        Ok(snapshot)
    }
}
