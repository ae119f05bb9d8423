//! Catalog service: categories, products, and sponsorship units.
//!
//! Category and product lookups are served from [`CatalogCache`] when
//! possible. Staff writes invalidate the whole cache. Stock moves with every
//! checkout, so cached products always get a live stock reading.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument};

use nature_marketplace_core::{ProductId, ProductType, UserId, slugify};

use crate::cache::{CacheKey, CacheValue, CatalogCache};
use crate::db::RepositoryError;
use crate::db::catalog::{
    self, NewProduct, NewProductImage, NewProductUpdate, ProductFilter, ProductOrdering,
    ProductPatch,
};
use crate::db::units::{self, NewUnit, NewUnitUpdate};
use crate::db::{CategoryRepository, ProductRepository, UnitRepository};
use crate::models::catalog::{Category, ProductDetail, ProductImage, ProductSummary, ProductUpdate};
use crate::models::unit::{UnitDetail, UnitSummary, UnitUpdate};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;
/// Highest page number honoured; larger requests read this page.
pub const MAX_PAGE: i64 = 10_000;
pub const DEFAULT_LIST_LIMIT: i64 = 10;
pub const MAX_FEATURED_LIMIT: i64 = 50;

/// Search terms shorter than this are ignored.
const MIN_SEARCH_CHARS: usize = 2;

/// Approximate coordinates keep this many decimals (about 100 m).
const APPROX_DECIMALS: u32 = 3;

/// Default privacy radius for new units.
const DEFAULT_APPROX_RADIUS_KM: Decimal = Decimal::from_parts(5, 0, 0, false, 0);

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Category not found")]
    CategoryNotFound,

    #[error("Product not found")]
    ProductNotFound,

    #[error("Unit not found")]
    UnitNotFound,

    #[error("Unit is not available")]
    UnitUnavailable,

    #[error("Invalid ordering: {0}")]
    InvalidOrdering(String),

    #[error("Price must be greater than zero")]
    InvalidPrice,

    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    #[error("Stock cannot be negative")]
    NegativeStock,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Query string for product listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub category: Option<String>,
    pub product_type: Option<ProductType>,
    pub is_featured: Option<bool>,
    pub is_new: Option<bool>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

impl ProductQuery {
    fn filter(&self) -> ProductFilter {
        ProductFilter {
            category: self.category.clone(),
            product_type: self.product_type,
            is_featured: self.is_featured,
            is_new: self.is_new,
            min_price: self.min_price,
            max_price: self.max_price,
            search: self
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| s.chars().count() >= MIN_SEARCH_CHARS)
                .map(String::from),
        }
    }

    fn ordering(&self) -> Result<ProductOrdering, CatalogError> {
        match self.ordering.as_deref().map(str::trim) {
            None | Some("") => Ok(ProductOrdering::default()),
            Some(value) => ProductOrdering::parse(value)
                .ok_or_else(|| CatalogError::InvalidOrdering(value.to_string())),
        }
    }
}

/// Normalized `page`/`page_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub page_size: i64,
}

impl Page {
    #[must_use]
    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).clamp(1, MAX_PAGE),
            page_size: page_size
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }

    #[must_use]
    pub const fn offset(self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub count: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub results: Vec<T>,
}

impl<T> Paginated<T> {
    #[must_use]
    pub fn new(results: Vec<T>, count: i64, page: Page) -> Self {
        Self {
            count,
            page: page.page,
            page_size: page.page_size,
            total_pages: (count + page.page_size - 1) / page.page_size,
            results,
        }
    }
}

/// Availability check response.
#[derive(Debug, Clone, Serialize)]
pub struct Availability {
    pub product_id: ProductId,
    pub quantity: i32,
    pub is_available: bool,
    /// `None` for unlimited products.
    pub stock: Option<i32>,
}

/// Staff input for a new sponsorship unit.
#[derive(Debug, Clone, Deserialize)]
pub struct UnitInput {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub story: String,
    #[serde(default)]
    pub location_name: String,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
    pub location_area: Option<String>,
    pub latitude_approx: Option<Decimal>,
    pub longitude_approx: Option<Decimal>,
    pub approx_radius_km: Option<Decimal>,
    #[serde(default)]
    pub species: String,
    pub age_years: Option<i32>,
    pub height_cm: Option<Decimal>,
    pub area_m2: Option<Decimal>,
    pub co2_per_year: Option<Decimal>,
    #[serde(default)]
    pub is_featured: bool,
}

impl UnitInput {
    /// Fill in the slug and the public approximate location.
    fn into_new_unit(self) -> NewUnit {
        let slug = slugify(&format!("{}-{}", self.code, self.name));
        let location_area = self
            .location_area
            .filter(|area| !area.trim().is_empty())
            .unwrap_or_else(|| self.location_name.clone());

        NewUnit {
            slug,
            location_area,
            latitude_approx: self.latitude_approx.or(self.latitude.map(approximate)),
            longitude_approx: self.longitude_approx.or(self.longitude.map(approximate)),
            approx_radius_km: self.approx_radius_km.unwrap_or(DEFAULT_APPROX_RADIUS_KM),
            code: self.code,
            name: self.name,
            description: self.description,
            story: self.story,
            location_name: self.location_name,
            latitude: self.latitude,
            longitude: self.longitude,
            species: self.species,
            age_years: self.age_years,
            height_cm: self.height_cm,
            area_m2: self.area_m2,
            co2_per_year: self.co2_per_year,
            is_featured: self.is_featured,
        }
    }
}

/// Truncate a coordinate toward zero.
fn approximate(coordinate: Decimal) -> Decimal {
    coordinate.round_dp_with_strategy(APPROX_DECIMALS, RoundingStrategy::ToZero)
}

/// Catalog service.
pub struct CatalogService<'a> {
    pool: &'a PgPool,
    cache: &'a CatalogCache,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, cache: &'a CatalogCache) -> Self {
        Self { pool, cache }
    }

    /// Active categories.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the query fails.
    pub async fn categories(&self) -> Result<Vec<Category>, CatalogError> {
        if let Some(CacheValue::Categories(categories)) =
            self.cache.get(&CacheKey::Categories).await
        {
            return Ok(categories);
        }

        let categories = CategoryRepository::new(self.pool).list_active().await?;
        self.cache
            .insert(CacheKey::Categories, CacheValue::Categories(categories.clone()))
            .await;

        Ok(categories)
    }

    /// Active category by slug.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::CategoryNotFound` for unknown or inactive slugs.
    pub async fn category(&self, slug: &str) -> Result<Category, CatalogError> {
        let key = CacheKey::CategoryBySlug(slug.to_string());
        if let Some(CacheValue::Category(category)) = self.cache.get(&key).await {
            return Ok(*category);
        }

        let category = CategoryRepository::new(self.pool)
            .get_by_slug(slug)
            .await?
            .filter(|c| c.is_active)
            .ok_or(CatalogError::CategoryNotFound)?;

        self.cache
            .insert(key, CacheValue::Category(Box::new(category.clone())))
            .await;

        Ok(category)
    }

    /// Active products in a category.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::CategoryNotFound` for unknown or inactive slugs.
    pub async fn category_products(
        &self,
        slug: &str,
        page: Page,
    ) -> Result<Paginated<ProductSummary>, CatalogError> {
        let category = self.category(slug).await?;
        let filter = ProductFilter {
            category: Some(category.slug),
            ..ProductFilter::default()
        };

        self.list_with(&filter, ProductOrdering::default(), page)
            .await
    }

    /// Filtered, ordered, paginated product listing.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::InvalidOrdering` for unknown `ordering` values.
    #[instrument(skip(self, query))]
    pub async fn list_products(
        &self,
        query: &ProductQuery,
    ) -> Result<Paginated<ProductSummary>, CatalogError> {
        let ordering = query.ordering()?;
        let page = Page::new(query.page, query.page_size);

        self.list_with(&query.filter(), ordering, page).await
    }

    /// Listing restricted to one product type, as used by `/trees` and `/retreats`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::InvalidOrdering` for unknown `ordering` values.
    pub async fn list_by_type(
        &self,
        product_type: ProductType,
        query: &ProductQuery,
    ) -> Result<Paginated<ProductSummary>, CatalogError> {
        let ordering = query.ordering()?;
        let page = Page::new(query.page, query.page_size);
        let filter = ProductFilter {
            product_type: Some(product_type),
            ..query.filter()
        };

        self.list_with(&filter, ordering, page).await
    }

    async fn list_with(
        &self,
        filter: &ProductFilter,
        ordering: ProductOrdering,
        page: Page,
    ) -> Result<Paginated<ProductSummary>, CatalogError> {
        let (products, count) = ProductRepository::new(self.pool)
            .list(filter, ordering, page.page_size, page.offset())
            .await?;

        let results = products.iter().map(ProductSummary::from).collect();
        Ok(Paginated::new(results, count, page))
    }

    /// Product page by slug, with images and public updates.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::ProductNotFound` for unknown or inactive slugs.
    pub async fn product_detail(&self, slug: &str) -> Result<ProductDetail, CatalogError> {
        let key = CacheKey::ProductBySlug(slug.to_string());
        if let Some(CacheValue::Product(mut detail)) = self.cache.get(&key).await {
            let levels = ProductRepository::new(self.pool)
                .stock_levels(&[detail.summary.id])
                .await?;
            if let Some(level) = levels.first() {
                detail.apply_stock(level);
            }
            return Ok(*detail);
        }

        let repo = ProductRepository::new(self.pool);
        let product = repo
            .get_by_slug(slug)
            .await?
            .ok_or(CatalogError::ProductNotFound)?;
        let images = repo.images(product.id).await?;
        let updates = repo.public_updates(product.id).await?;

        let detail = ProductDetail::new(&product, images, updates);
        self.cache
            .insert(key, CacheValue::Product(Box::new(detail.clone())))
            .await;

        Ok(detail)
    }

    /// Featured products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the query fails.
    pub async fn featured(&self, limit: Option<i64>) -> Result<Vec<ProductSummary>, CatalogError> {
        let limit = limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_FEATURED_LIMIT);
        let key = CacheKey::Featured(limit);
        if let Some(CacheValue::Products(mut products)) = self.cache.get(&key).await {
            let ids: Vec<ProductId> = products.iter().map(|p| p.id).collect();
            let levels = ProductRepository::new(self.pool).stock_levels(&ids).await?;
            for product in &mut products {
                product.apply_stock(&levels);
            }
            return Ok(products);
        }

        let products: Vec<ProductSummary> = ProductRepository::new(self.pool)
            .featured(limit)
            .await?
            .iter()
            .map(ProductSummary::from)
            .collect();

        self.cache
            .insert(key, CacheValue::Products(products.clone()))
            .await;

        Ok(products)
    }

    /// Products flagged new, newest first.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the query fails.
    pub async fn new_arrivals(
        &self,
        limit: Option<i64>,
    ) -> Result<Vec<ProductSummary>, CatalogError> {
        let limit = limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_FEATURED_LIMIT);

        let products = ProductRepository::new(self.pool)
            .new_arrivals(limit)
            .await?
            .iter()
            .map(ProductSummary::from)
            .collect();

        Ok(products)
    }

    /// Whether `quantity` units of a product can be bought now. Never cached.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::InvalidQuantity` for quantities below 1.
    /// Returns `CatalogError::ProductNotFound` for unknown or inactive slugs.
    pub async fn availability(
        &self,
        slug: &str,
        quantity: i32,
    ) -> Result<Availability, CatalogError> {
        if quantity < 1 {
            return Err(CatalogError::InvalidQuantity);
        }

        let product = ProductRepository::new(self.pool)
            .get_by_slug(slug)
            .await?
            .ok_or(CatalogError::ProductNotFound)?;

        Ok(Availability {
            product_id: product.id,
            quantity,
            is_available: product.can_supply(quantity),
            stock: product.visible_stock(),
        })
    }

    /// Active units of a product as seen by `viewer`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::ProductNotFound` for unknown or inactive slugs.
    pub async fn units(
        &self,
        slug: &str,
        only_available: bool,
        viewer: Option<UserId>,
    ) -> Result<Vec<UnitSummary>, CatalogError> {
        let product = ProductRepository::new(self.pool)
            .get_by_slug(slug)
            .await?
            .ok_or(CatalogError::ProductNotFound)?;

        let units = UnitRepository::new(self.pool)
            .list_for_product(product.id, only_available)
            .await?;

        Ok(units
            .iter()
            .map(|unit| UnitSummary::new(unit, viewer))
            .collect())
    }

    /// Unit detail. Private updates are only shown to the sponsor.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::UnitNotFound` for unknown or inactive codes.
    pub async fn unit_detail(
        &self,
        code: &str,
        viewer: Option<UserId>,
    ) -> Result<UnitDetail, CatalogError> {
        let repo = UnitRepository::new(self.pool);
        let unit = repo
            .get_by_code(code)
            .await?
            .ok_or(CatalogError::UnitNotFound)?;

        let gallery = repo.images(unit.id).await?;
        let updates = repo.updates(unit.id, unit.is_sponsor(viewer)).await?;

        Ok(UnitDetail::new(&unit, viewer, gallery, updates))
    }

    /// Create a product, generating the slug from the title when blank.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::InvalidPrice` for non-positive prices.
    /// Returns `CatalogError::Repository` with `Conflict` if the slug is taken.
    #[instrument(skip(self, product), fields(title = %product.title))]
    pub async fn create_product(&self, mut product: NewProduct) -> Result<ProductDetail, CatalogError> {
        if product.price <= Decimal::ZERO {
            return Err(CatalogError::InvalidPrice);
        }
        if product.stock < 0 {
            return Err(CatalogError::NegativeStock);
        }

        product.slug = if product.slug.trim().is_empty() {
            slugify(&product.title)
        } else {
            slugify(&product.slug)
        };

        let id = catalog::insert_product(self.pool, &product).await?;
        self.cache.invalidate_all().await;
        info!(product_id = %id, slug = %product.slug, "Product created");

        self.detail_by_id(id).await
    }

    /// Apply a partial product update.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::ProductNotFound` for unknown slugs.
    /// Returns `CatalogError::InvalidPrice` for non-positive prices.
    #[instrument(skip(self, patch))]
    pub async fn update_product(
        &self,
        slug: &str,
        patch: &ProductPatch,
    ) -> Result<ProductDetail, CatalogError> {
        if patch.price.is_some_and(|price| price <= Decimal::ZERO) {
            return Err(CatalogError::InvalidPrice);
        }
        if patch.stock.is_some_and(|stock| stock < 0) {
            return Err(CatalogError::NegativeStock);
        }

        let id = self.product_id(slug).await?;
        catalog::update_product(self.pool, id, patch)
            .await
            .map_err(not_found_as(CatalogError::ProductNotFound))?;
        self.cache.invalidate_all().await;
        info!(product_id = %id, "Product updated");

        self.detail_by_id(id).await
    }

    /// Add a gallery image to a product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::ProductNotFound` for unknown slugs.
    pub async fn add_image(
        &self,
        slug: &str,
        image: &NewProductImage,
    ) -> Result<ProductImage, CatalogError> {
        let id = self.product_id(slug).await?;
        let image = catalog::insert_image(self.pool, id, image).await?;
        self.cache.invalidate_all().await;

        Ok(image)
    }

    /// Post a progress update on a product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::ProductNotFound` for unknown slugs.
    pub async fn add_update(
        &self,
        slug: &str,
        update: &NewProductUpdate,
    ) -> Result<ProductUpdate, CatalogError> {
        let id = self.product_id(slug).await?;
        let update = catalog::insert_update(self.pool, id, update).await?;
        self.cache.invalidate_all().await;

        Ok(update)
    }

    /// Create a sponsorship unit under a product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::ProductNotFound` for unknown slugs.
    /// Returns `CatalogError::Repository` with `Conflict` if the code is taken.
    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create_unit(
        &self,
        slug: &str,
        input: UnitInput,
        viewer: UserId,
    ) -> Result<UnitDetail, CatalogError> {
        let product_id = self.product_id(slug).await?;
        let new_unit = input.into_new_unit();
        let code = new_unit.code.clone();

        units::insert_unit(self.pool, product_id, &new_unit).await?;
        info!(code = %code, product_id = %product_id, "Sponsorship unit created");

        self.unit_detail(&code, Some(viewer)).await
    }

    /// Post an update on a unit.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::UnitNotFound` for unknown codes.
    pub async fn add_unit_update(
        &self,
        code: &str,
        update: &NewUnitUpdate,
        author: UserId,
    ) -> Result<UnitUpdate, CatalogError> {
        let unit = UnitRepository::new(self.pool)
            .get_by_code(code)
            .await?
            .ok_or(CatalogError::UnitNotFound)?;

        Ok(units::insert_update(self.pool, unit.id, update, author).await?)
    }

    /// Release a sponsored unit back to `available`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::UnitNotFound` for unknown codes.
    /// Returns `CatalogError::UnitUnavailable` if the unit isn't sponsored.
    #[instrument(skip(self))]
    pub async fn release_unit(&self, code: &str) -> Result<UnitDetail, CatalogError> {
        if !units::release_sponsorship(self.pool, code).await? {
            return match UnitRepository::new(self.pool).get_by_code(code).await? {
                Some(_) => Err(CatalogError::UnitUnavailable),
                None => Err(CatalogError::UnitNotFound),
            };
        }
        info!(code = %code, "Sponsorship released");

        self.unit_detail(code, None).await
    }

    /// Id of any product (active or not) by slug.
    async fn product_id(&self, slug: &str) -> Result<ProductId, CatalogError> {
        ProductRepository::new(self.pool)
            .get_any_by_slug(slug)
            .await?
            .map(|p| p.id)
            .ok_or(CatalogError::ProductNotFound)
    }

    async fn detail_by_id(&self, id: ProductId) -> Result<ProductDetail, CatalogError> {
        let repo = ProductRepository::new(self.pool);
        let product = repo
            .get_by_id(id)
            .await?
            .ok_or(CatalogError::ProductNotFound)?;
        let images = repo.images(id).await?;
        let updates = repo.public_updates(id).await?;

        Ok(ProductDetail::new(&product, images, updates))
    }
}

/// Map `RepositoryError::NotFound` to a domain error.
fn not_found_as(err: CatalogError) -> impl FnOnce(RepositoryError) -> CatalogError {
    move |e| match e {
        RepositoryError::NotFound => err,
        other => CatalogError::Repository(other),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_page_defaults_and_bounds() {
        assert_eq!(Page::new(None, None), Page { page: 1, page_size: 20 });
        assert_eq!(Page::new(Some(0), Some(500)), Page { page: 1, page_size: 100 });
        assert_eq!(Page::new(Some(3), Some(10)).offset(), 20);
    }

    #[test]
    fn test_huge_page_is_clamped() {
        let page = Page::new(Some(i64::MAX), Some(20));
        assert_eq!(page.page, MAX_PAGE);
        assert_eq!(page.offset(), (MAX_PAGE - 1) * 20);

        let raw = Page {
            page: i64::MAX,
            page_size: MAX_PAGE_SIZE,
        };
        assert_eq!(raw.offset(), i64::MAX);
    }

    #[test]
    fn test_paginated_total_pages() {
        let page = Page::new(Some(1), Some(20));
        assert_eq!(Paginated::<u8>::new(vec![], 0, page).total_pages, 0);
        assert_eq!(Paginated::<u8>::new(vec![], 20, page).total_pages, 1);
        assert_eq!(Paginated::<u8>::new(vec![], 21, page).total_pages, 2);
    }

    #[test]
    fn test_short_search_is_ignored() {
        let query = ProductQuery {
            search: Some(" c ".to_string()),
            ..ProductQuery::default()
        };
        assert!(query.filter().search.is_none());

        let query = ProductQuery {
            search: Some("ceiba".to_string()),
            ..ProductQuery::default()
        };
        assert_eq!(query.filter().search.as_deref(), Some("ceiba"));
    }

    #[test]
    fn test_ordering_parse() {
        let mut query = ProductQuery::default();
        assert_eq!(query.ordering().unwrap(), ProductOrdering::CreatedDesc);

        query.ordering = Some("-price".to_string());
        assert_eq!(query.ordering().unwrap(), ProductOrdering::PriceDesc);

        query.ordering = Some("popularity".to_string());
        assert!(matches!(
            query.ordering(),
            Err(CatalogError::InvalidOrdering(value)) if value == "popularity"
        ));
    }

    #[test]
    fn test_approximate_truncates_toward_zero() {
        assert_eq!(approximate(dec("9.93456789")), dec("9.934"));
        assert_eq!(approximate(dec("-84.08799")), dec("-84.087"));
    }

    #[test]
    fn test_unit_input_defaults() {
        let input: UnitInput = serde_json::from_value(serde_json::json!({
            "code": "CB-001",
            "name": "Ceiba Grande",
            "location_name": "Monteverde",
            "latitude": "10.30149",
            "longitude": "-84.82597"
        }))
        .unwrap();

        let unit = input.into_new_unit();
        assert_eq!(unit.slug, "cb-001-ceiba-grande");
        assert_eq!(unit.location_area, "Monteverde");
        assert_eq!(unit.latitude_approx, Some(dec("10.301")));
        assert_eq!(unit.longitude_approx, Some(dec("-84.825")));
        assert_eq!(unit.approx_radius_km, dec("5"));
    }

    #[test]
    fn test_unit_input_keeps_explicit_approximation() {
        let input: UnitInput = serde_json::from_value(serde_json::json!({
            "code": "LG-7",
            "name": "Manglar",
            "location_name": "Térraba",
            "location_area": "Pacífico Sur",
            "latitude": "8.95",
            "latitude_approx": "9.0",
            "approx_radius_km": "12"
        }))
        .unwrap();

        let unit = input.into_new_unit();
        assert_eq!(unit.location_area, "Pacífico Sur");
        assert_eq!(unit.latitude_approx, Some(dec("9.0")));
        assert_eq!(unit.longitude_approx, None);
        assert_eq!(unit.approx_radius_km, dec("12"));
    }
}
