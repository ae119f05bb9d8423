//! In-memory cache for read-mostly catalog lookups.
//!
//! Entries live for 5 minutes. Availability checks always go to the
//! database, and staff catalog writes drop everything.

use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

use crate::models::catalog::{Category, ProductDetail, ProductSummary};

/// Cache key for catalog lookups.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Categories,
    CategoryBySlug(String),
    ProductBySlug(String),
    Featured(i64),
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Categories(Vec<Category>),
    Category(Box<Category>),
    Product(Box<ProductDetail>),
    Products(Vec<ProductSummary>),
}

/// Catalog cache shared through application state.
#[derive(Clone)]
pub struct CatalogCache {
    inner: Cache<CacheKey, CacheValue>,
}

impl std::fmt::Debug for CatalogCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogCache")
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogCache {
    #[must_use]
    pub fn new() -> Self {
        let inner = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Self { inner }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        self.inner.get(key).await
    }

    pub async fn insert(&self, key: CacheKey, value: CacheValue) {
        self.inner.insert(key, value).await;
    }

    /// Invalidate all cached data.
    pub async fn invalidate_all(&self) {
        self.inner.invalidate_all();
        self.inner.run_pending_tasks().await;
        debug!("Catalog cache invalidated");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_get_and_invalidate() {
        let cache = CatalogCache::new();
        cache
            .insert(CacheKey::Featured(10), CacheValue::Products(Vec::new()))
            .await;

        assert!(matches!(
            cache.get(&CacheKey::Featured(10)).await,
            Some(CacheValue::Products(products)) if products.is_empty()
        ));
        assert!(cache.get(&CacheKey::Featured(5)).await.is_none());

        cache.invalidate_all().await;
        assert!(cache.get(&CacheKey::Featured(10)).await.is_none());
    }
}
