//! The set of catalog caches served by one process.

use std::{path::Path, sync::Arc};

use serde::Serialize;
use tracing::info;

use crate::{
    cache::{CacheError, CategoryCache, CategoryView, ProductCache},
    config::CatalogSettings,
};

/// Category counts as reported by the status route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub leaf_count: usize,
    pub top_level_count: usize,
    pub all_count: usize,
}

/// Owned handles to every cache. Built once at startup and cloned into the
/// HTTP state; clones share the same caches.
#[derive(Debug, Clone)]
pub struct Catalog {
    leaf: Arc<CategoryCache>,
    top_level: Arc<CategoryCache>,
    all: Arc<CategoryCache>,
    products: Arc<ProductCache>,
}

impl Catalog {
    /// Bind each cache to its configured source. No file is read yet.
    pub fn from_settings(settings: &CatalogSettings) -> Self {
        let category = |view: CategoryView, path: &Path| Arc::new(CategoryCache::new(view, path));
        Self {
            leaf: category(CategoryView::Leaf, &settings.category_leaf_path),
            top_level: category(CategoryView::TopLevel, &settings.category_top_level_path),
            all: category(CategoryView::All, &settings.category_all_path),
            products: Arc::new(ProductCache::new(&settings.product_path)),
        }
    }

    pub fn categories(&self, view: CategoryView) -> &Arc<CategoryCache> {
        match view {
            CategoryView::Leaf => &self.leaf,
            CategoryView::TopLevel => &self.top_level,
            CategoryView::All => &self.all,
        }
    }

    pub fn products(&self) -> &Arc<ProductCache> {
        &self.products
    }

    pub fn category_counts(&self) -> CategoryCounts {
        CategoryCounts {
            leaf_count: self.leaf.leaf_count(),
            top_level_count: self.top_level.top_level_count(),
            all_count: self.all.all_count(),
        }
    }

    /// Load every cache that is still cold. Stops at the first failure.
    pub fn warm(&self) -> Result<(), CacheError> {
        self.leaf.leaf_categories_json()?;
        info!(target = "catalog::startup", count = self.leaf.leaf_count(), "leaf categories ready");
        self.top_level.top_level_categories_json()?;
        info!(
            target = "catalog::startup",
            count = self.top_level.top_level_count(),
            "top-level categories ready"
        );
        self.all.all_categories_json()?;
        info!(target = "catalog::startup", count = self.all.all_count(), "all categories ready");
        self.products.json_response()?;
        info!(target = "catalog::startup", count = self.products.count(), "products ready");
        Ok(())
    }

    /// Reload all three category views. Every view is attempted even when an
    /// earlier one fails; the first failure is returned.
    pub fn reload_categories(&self) -> Result<CategoryCounts, CacheError> {
        let mut first_error = None;
        for view in CategoryView::ALL {
            if let Err(err) = self.categories(view).reload() {
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => {
                let counts = self.category_counts();
                info!(
                    target = "catalog::cache::category",
                    leaf = counts.leaf_count,
                    top_level = counts.top_level_count,
                    all = counts.all_count,
                    "all category caches reloaded"
                );
                Ok(counts)
            }
        }
    }
}
