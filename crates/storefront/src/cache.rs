//! In-memory cache for catalog facets and home page data.
//!
//! Brands, categories and the home page blocks change only through the
//! back-office, so they are cached with `moka` (5-minute TTL) and
//! invalidated explicitly after every admin mutation.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::debug;

use crate::db::{BrandRepository, CategoryRepository, ContentRepository, ProductRepository, RepositoryError};
use crate::models::catalog::{Brand, Category, Product};
use crate::models::content::{Banner, BlogPost};

/// Products shown in the home page "new arrivals" strip.
const FEATURED_LIMIT: i64 = 8;

/// Posts shown on the home page.
const HOME_POSTS_LIMIT: i64 = 3;

/// Cache key.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
enum CacheKey {
    Brands,
    Categories,
    Viscosities,
    Home,
}

/// Cached value types.
#[derive(Debug, Clone)]
enum CacheValue {
    Brands(Arc<Vec<Brand>>),
    Categories(Arc<Vec<Category>>),
    Viscosities(Arc<Vec<String>>),
    Home(Arc<HomeData>),
}

/// Everything the home page renders besides the session context.
#[derive(Debug, Clone, Default)]
pub struct HomeData {
    pub banners: Vec<Banner>,
    pub featured: Vec<Product>,
    pub brands: Vec<Brand>,
    pub posts: Vec<BlogPost>,
}

/// Catalog cache shared through `AppState`.
#[derive(Clone)]
pub struct CatalogCache {
    cache: Cache<CacheKey, CacheValue>,
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        let cache = Cache::builder()
            .max_capacity(16)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();
        Self { cache }
    }

    /// All brands, alphabetically.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the brands cannot be loaded.
    pub async fn brands(&self, pool: &PgPool) -> Result<Arc<Vec<Brand>>, RepositoryError> {
        if let Some(CacheValue::Brands(brands)) = self.cache.get(&CacheKey::Brands).await {
            debug!("Cache hit for brands");
            return Ok(brands);
        }
        let brands = Arc::new(BrandRepository::new(pool).list().await?);
        self.cache
            .insert(CacheKey::Brands, CacheValue::Brands(Arc::clone(&brands)))
            .await;
        Ok(brands)
    }

    /// All categories in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the categories cannot be loaded.
    pub async fn categories(&self, pool: &PgPool) -> Result<Arc<Vec<Category>>, RepositoryError> {
        if let Some(CacheValue::Categories(categories)) =
            self.cache.get(&CacheKey::Categories).await
        {
            debug!("Cache hit for categories");
            return Ok(categories);
        }
        let categories = Arc::new(CategoryRepository::new(pool).list().await?);
        self.cache
            .insert(
                CacheKey::Categories,
                CacheValue::Categories(Arc::clone(&categories)),
            )
            .await;
        Ok(categories)
    }

    /// Viscosity grades offered by active products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the grades cannot be loaded.
    pub async fn viscosities(&self, pool: &PgPool) -> Result<Arc<Vec<String>>, RepositoryError> {
        if let Some(CacheValue::Viscosities(grades)) = self.cache.get(&CacheKey::Viscosities).await
        {
            return Ok(grades);
        }
        let grades = Arc::new(ProductRepository::new(pool).viscosities().await?);
        self.cache
            .insert(
                CacheKey::Viscosities,
                CacheValue::Viscosities(Arc::clone(&grades)),
            )
            .await;
        Ok(grades)
    }

    /// Home page banners, new products, brands and latest posts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if any block cannot be loaded.
    pub async fn home(&self, pool: &PgPool) -> Result<Arc<HomeData>, RepositoryError> {
        if let Some(CacheValue::Home(home)) = self.cache.get(&CacheKey::Home).await {
            debug!("Cache hit for home page");
            return Ok(home);
        }

        let content = ContentRepository::new(pool);
        let products = ProductRepository::new(pool);
        let (banners, featured, posts) = tokio::try_join!(
            content.banners(true),
            products.featured(FEATURED_LIMIT),
            content.published_posts(HOME_POSTS_LIMIT),
        )?;
        let brands = self.brands(pool).await?;

        let home = Arc::new(HomeData {
            banners,
            featured,
            brands: brands.as_ref().clone(),
            posts,
        });
        self.cache
            .insert(CacheKey::Home, CacheValue::Home(Arc::clone(&home)))
            .await;
        Ok(home)
    }

    /// Drop everything; called after any back-office catalog or content change.
    pub async fn invalidate_all(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        debug!("Catalog cache invalidated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalidate_all_drops_home_page() {
        let catalog = CatalogCache::new();
        catalog
            .cache
            .insert(CacheKey::Home, CacheValue::Home(Arc::new(HomeData::default())))
            .await;
        assert!(catalog.cache.get(&CacheKey::Home).await.is_some());

        catalog.invalidate_all().await;
        assert!(catalog.cache.get(&CacheKey::Home).await.is_none());
    }
}
