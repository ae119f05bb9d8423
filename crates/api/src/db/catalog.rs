//! Category and product queries.
//!
//! Listing filters use nullable parameters (`$n IS NULL OR ...`) so one
//! statement serves every filter combination. Ordering is restricted to
//! [`ProductOrdering`], which maps to fixed `ORDER BY` clauses.

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use nature_marketplace_core::{
    CategoryId, CurrencyCode, PricingType, ProductId, ProductType, ProductUpdateType,
};

use super::RepositoryError;
use crate::models::catalog::{Category, Product, ProductImage, ProductUpdate, StockLevel};

const CATEGORY_SELECT: &str = r"
    SELECT c.id, c.name, c.slug, c.description, c.icon, c.image_url, c.is_active,
           c.display_order, c.created_at, c.updated_at,
           (SELECT COUNT(*) FROM marketplace.product p
             WHERE p.category_id = c.id AND p.is_active) AS product_count
    FROM marketplace.category c
";

const PRODUCT_SELECT: &str = r"
    SELECT p.id, p.title, p.slug, p.description, p.short_description, p.category_id,
           c.name AS category_name, c.slug AS category_slug,
           p.product_type, p.purpose, p.impact_description,
           p.price, p.pricing_type, p.currency, p.compare_at_price,
           p.stock, p.is_unlimited_stock,
           p.duration, p.max_participants, p.includes, p.area_size, p.is_collective,
           p.rating, p.reviews_count, p.features,
           p.location_name, p.location_lat, p.location_lng, p.co2_offset_kg, p.species,
           p.is_active, p.is_featured, p.is_new, p.meta_title, p.meta_description,
           (SELECT i.image_url FROM marketplace.product_image i
             WHERE i.product_id = p.id
             ORDER BY i.is_primary DESC, i.display_order, i.id
             LIMIT 1) AS primary_image_url,
           p.created_at, p.updated_at
    FROM marketplace.product p
    LEFT JOIN marketplace.category c ON c.id = p.category_id
";

const PRODUCT_FILTER: &str = r"
    WHERE p.is_active
      AND ($1::text IS NULL OR c.slug = $1)
      AND ($2::marketplace.product_type IS NULL OR p.product_type = $2)
      AND ($3::boolean IS NULL OR p.is_featured = $3)
      AND ($4::boolean IS NULL OR p.is_new = $4)
      AND ($5::numeric IS NULL OR p.price >= $5)
      AND ($6::numeric IS NULL OR p.price <= $6)
      AND ($7::text IS NULL
           OR p.title ILIKE $7 OR p.description ILIKE $7
           OR p.short_description ILIKE $7 OR p.species ILIKE $7)
";

const IMAGE_COLUMNS: &str =
    "id, product_id, image_url, alt_text, caption, is_primary, display_order, created_at";

const UPDATE_COLUMNS: &str = "id, product_id, update_type, title, content, image_url, co2_absorbed, height_cm, is_public, created_at";

/// Allowed sort orders for product listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductOrdering {
    PriceAsc,
    PriceDesc,
    RatingAsc,
    RatingDesc,
    CreatedAsc,
    #[default]
    CreatedDesc,
}

impl ProductOrdering {
    /// Parse the `ordering` query value (`price`, `-price`, ...).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "price" => Some(Self::PriceAsc),
            "-price" => Some(Self::PriceDesc),
            "rating" => Some(Self::RatingAsc),
            "-rating" => Some(Self::RatingDesc),
            "created_at" => Some(Self::CreatedAsc),
            "-created_at" => Some(Self::CreatedDesc),
            _ => None,
        }
    }

    const fn order_by(self) -> &'static str {
        match self {
            Self::PriceAsc => "ORDER BY p.price ASC, p.id",
            Self::PriceDesc => "ORDER BY p.price DESC, p.id",
            Self::RatingAsc => "ORDER BY p.rating ASC, p.id",
            Self::RatingDesc => "ORDER BY p.rating DESC, p.id",
            Self::CreatedAsc => "ORDER BY p.created_at ASC, p.id",
            Self::CreatedDesc => "ORDER BY p.created_at DESC, p.id DESC",
        }
    }
}

/// Product listing filters. `None` means "don't filter".
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub product_type: Option<ProductType>,
    pub is_featured: Option<bool>,
    pub is_new: Option<bool>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    /// Raw search text; wrapped in `%...%` when bound.
    pub search: Option<String>,
}

impl ProductFilter {
    fn search_pattern(&self) -> Option<String> {
        self.search.as_deref().map(|s| {
            let escaped = s
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{escaped}%")
        })
    }
}

/// Fields for a new product.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub short_description: String,
    pub category_id: Option<CategoryId>,
    pub product_type: ProductType,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub impact_description: String,
    pub price: Decimal,
    #[serde(default)]
    pub pricing_type: PricingType,
    #[serde(default)]
    pub currency: CurrencyCode,
    pub compare_at_price: Option<Decimal>,
    #[serde(default)]
    pub stock: i32,
    #[serde(default = "default_true")]
    pub is_unlimited_stock: bool,
    #[serde(default)]
    pub duration: String,
    pub max_participants: Option<i32>,
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default)]
    pub area_size: String,
    #[serde(default)]
    pub is_collective: bool,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub location_name: String,
    pub location_lat: Option<Decimal>,
    pub location_lng: Option<Decimal>,
    pub co2_offset_kg: Option<Decimal>,
    #[serde(default)]
    pub species: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default)]
    pub meta_title: String,
    #[serde(default)]
    pub meta_description: String,
}

const fn default_true() -> bool {
    true
}

/// Partial product update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub price: Option<Decimal>,
    pub compare_at_price: Option<Decimal>,
    pub stock: Option<i32>,
    pub is_unlimited_stock: Option<bool>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
    pub is_new: Option<bool>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
}

/// A new product image.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProductImage {
    pub image_url: String,
    #[serde(default)]
    pub alt_text: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub display_order: i32,
}

/// A new product progress update.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProductUpdate {
    pub update_type: ProductUpdateType,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub image_url: Option<String>,
    pub co2_absorbed: Option<Decimal>,
    pub height_cm: Option<Decimal>,
    #[serde(default = "default_true")]
    pub is_public: bool,
}

/// Repository for categories.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Active categories by display order, then name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(&self) -> Result<Vec<Category>, RepositoryError> {
        let categories = sqlx::query_as::<_, Category>(&format!(
            "{CATEGORY_SELECT} WHERE c.is_active ORDER BY c.display_order, c.name"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(categories)
    }

    /// Active category by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>, RepositoryError> {
        let category = sqlx::query_as::<_, Category>(&format!(
            "{CATEGORY_SELECT} WHERE c.slug = $1 AND c.is_active"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(category)
    }
}

/// Repository for products and their images and updates.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// One page of active products matching `filter`, plus the total match count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self, filter))]
    pub async fn list(
        &self,
        filter: &ProductFilter,
        ordering: ProductOrdering,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Product>, i64), RepositoryError> {
        let pattern = filter.search_pattern();

        let total: i64 = sqlx::query_scalar(&format!(
            r"
            SELECT COUNT(*)
            FROM marketplace.product p
            LEFT JOIN marketplace.category c ON c.id = p.category_id
            {PRODUCT_FILTER}
            "
        ))
        .bind(filter.category.as_deref())
        .bind(filter.product_type)
        .bind(filter.is_featured)
        .bind(filter.is_new)
        .bind(filter.min_price)
        .bind(filter.max_price)
        .bind(pattern.as_deref())
        .fetch_one(self.pool)
        .await?;

        let products = sqlx::query_as::<_, Product>(&format!(
            "{PRODUCT_SELECT} {PRODUCT_FILTER} {} LIMIT $8 OFFSET $9",
            ordering.order_by()
        ))
        .bind(filter.category.as_deref())
        .bind(filter.product_type)
        .bind(filter.is_featured)
        .bind(filter.is_new)
        .bind(filter.min_price)
        .bind(filter.max_price)
        .bind(pattern.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok((products, total))
    }

    /// Active featured products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn featured(&self, limit: i64) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "{PRODUCT_SELECT} WHERE p.is_active AND p.is_featured ORDER BY p.created_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(products)
    }

    /// Active products flagged as new, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn new_arrivals(&self, limit: i64) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "{PRODUCT_SELECT} WHERE p.is_active AND p.is_new ORDER BY p.created_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(products)
    }

    /// Active product by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "{PRODUCT_SELECT} WHERE p.slug = $1 AND p.is_active"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(product)
    }

    /// Product by slug, active or not. Used by staff endpoints.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_any_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!("{PRODUCT_SELECT} WHERE p.slug = $1"))
            .bind(slug)
            .fetch_optional(self.pool)
            .await?;

        Ok(product)
    }

    /// Product by id, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!("{PRODUCT_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(product)
    }

    /// Gallery images, primary first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn images(&self, product_id: ProductId) -> Result<Vec<ProductImage>, RepositoryError> {
        let images = sqlx::query_as::<_, ProductImage>(&format!(
            r"
            SELECT {IMAGE_COLUMNS}
            FROM marketplace.product_image
            WHERE product_id = $1
            ORDER BY is_primary DESC, display_order, id
            "
        ))
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;

        Ok(images)
    }

    /// Public updates, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn public_updates(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<ProductUpdate>, RepositoryError> {
        let updates = sqlx::query_as::<_, ProductUpdate>(&format!(
            r"
            SELECT {UPDATE_COLUMNS}
            FROM marketplace.product_update
            WHERE product_id = $1 AND is_public
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;

        Ok(updates)
    }

    /// Current stock of the given products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn stock_levels(&self, ids: &[ProductId]) -> Result<Vec<StockLevel>, RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let levels = sqlx::query_as::<_, StockLevel>(
            r"
            SELECT id AS product_id, stock, is_unlimited_stock
            FROM marketplace.product
            WHERE id = ANY($1)
            ",
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        Ok(levels)
    }

    /// Whether `quantity` units of the product can be sold right now.
    ///
    /// Missing and inactive products are never available.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn check_availability(
        &self,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<bool, RepositoryError> {
        let available: Option<bool> = sqlx::query_scalar(
            r"
            SELECT is_active AND (is_unlimited_stock OR stock >= $2)
            FROM marketplace.product
            WHERE id = $1
            ",
        )
        .bind(product_id)
        .bind(quantity)
        .fetch_optional(self.pool)
        .await?;

        Ok(available.unwrap_or(false))
    }
}

/// Take `quantity` units out of stock.
///
/// Unlimited products are left untouched. Returns `false` when the product
/// is missing, inactive, or short on stock.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn reserve_stock(
    conn: &mut PgConnection,
    product_id: ProductId,
    quantity: i32,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE marketplace.product
        SET stock = CASE WHEN is_unlimited_stock THEN stock ELSE stock - $2 END,
            updated_at = NOW()
        WHERE id = $1 AND is_active AND (is_unlimited_stock OR stock >= $2)
        ",
    )
    .bind(product_id)
    .bind(quantity)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Product by id, read inside an existing transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn product_by_id(
    conn: &mut PgConnection,
    id: ProductId,
) -> Result<Option<Product>, RepositoryError> {
    let product = sqlx::query_as::<_, Product>(&format!("{PRODUCT_SELECT} WHERE p.id = $1"))
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(product)
}

/// Put `quantity` units back into stock for a limited-stock product.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn restore_stock(
    conn: &mut PgConnection,
    product_id: ProductId,
    quantity: i32,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE marketplace.product
        SET stock = stock + $2, updated_at = NOW()
        WHERE id = $1 AND NOT is_unlimited_stock
        ",
    )
    .bind(product_id)
    .bind(quantity)
    .execute(conn)
    .await?;

    Ok(())
}

/// Insert a product. `slug` must already be final.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the slug is taken.
#[instrument(skip(pool, product), fields(slug = %product.slug))]
pub async fn insert_product(pool: &PgPool, product: &NewProduct) -> Result<ProductId, RepositoryError> {
    let id: ProductId = sqlx::query_scalar(
        r"
        INSERT INTO marketplace.product (
            title, slug, description, short_description, category_id, product_type,
            purpose, impact_description, price, pricing_type, currency, compare_at_price,
            stock, is_unlimited_stock, duration, max_participants, includes, area_size,
            is_collective, features, location_name, location_lat, location_lng,
            co2_offset_kg, species, is_active, is_featured, is_new, meta_title, meta_description
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30)
        RETURNING id
        ",
    )
    .bind(&product.title)
    .bind(&product.slug)
    .bind(&product.description)
    .bind(&product.short_description)
    .bind(product.category_id)
    .bind(product.product_type)
    .bind(&product.purpose)
    .bind(&product.impact_description)
    .bind(product.price)
    .bind(product.pricing_type)
    .bind(product.currency)
    .bind(product.compare_at_price)
    .bind(product.stock)
    .bind(product.is_unlimited_stock)
    .bind(&product.duration)
    .bind(product.max_participants)
    .bind(sqlx::types::Json(&product.includes))
    .bind(&product.area_size)
    .bind(product.is_collective)
    .bind(sqlx::types::Json(&product.features))
    .bind(&product.location_name)
    .bind(product.location_lat)
    .bind(product.location_lng)
    .bind(product.co2_offset_kg)
    .bind(&product.species)
    .bind(product.is_active)
    .bind(product.is_featured)
    .bind(product.is_new)
    .bind(&product.meta_title)
    .bind(&product.meta_description)
    .fetch_one(pool)
    .await
    .map_err(|e| RepositoryError::from_unique(e, "product slug already exists"))?;

    Ok(id)
}

/// Apply a partial update.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the product doesn't exist.
pub async fn update_product(
    pool: &PgPool,
    id: ProductId,
    patch: &ProductPatch,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE marketplace.product SET
            title = COALESCE($2, title),
            description = COALESCE($3, description),
            short_description = COALESCE($4, short_description),
            category_id = COALESCE($5, category_id),
            price = COALESCE($6, price),
            compare_at_price = COALESCE($7, compare_at_price),
            stock = COALESCE($8, stock),
            is_unlimited_stock = COALESCE($9, is_unlimited_stock),
            is_active = COALESCE($10, is_active),
            is_featured = COALESCE($11, is_featured),
            is_new = COALESCE($12, is_new),
            meta_title = COALESCE($13, meta_title),
            meta_description = COALESCE($14, meta_description),
            updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(patch.title.as_deref())
    .bind(patch.description.as_deref())
    .bind(patch.short_description.as_deref())
    .bind(patch.category_id)
    .bind(patch.price)
    .bind(patch.compare_at_price)
    .bind(patch.stock)
    .bind(patch.is_unlimited_stock)
    .bind(patch.is_active)
    .bind(patch.is_featured)
    .bind(patch.is_new)
    .bind(patch.meta_title.as_deref())
    .bind(patch.meta_description.as_deref())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

/// Add an image. A primary image demotes the current one in the same transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert_image(
    pool: &PgPool,
    product_id: ProductId,
    image: &NewProductImage,
) -> Result<ProductImage, RepositoryError> {
    let mut tx = pool.begin().await?;

    if image.is_primary {
        sqlx::query(
            "UPDATE marketplace.product_image SET is_primary = FALSE WHERE product_id = $1 AND is_primary",
        )
        .bind(product_id)
        .execute(&mut *tx)
        .await?;
    }

    let inserted = sqlx::query_as::<_, ProductImage>(&format!(
        r"
        INSERT INTO marketplace.product_image
            (product_id, image_url, alt_text, caption, is_primary, display_order)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {IMAGE_COLUMNS}
        "
    ))
    .bind(product_id)
    .bind(&image.image_url)
    .bind(&image.alt_text)
    .bind(&image.caption)
    .bind(image.is_primary)
    .bind(image.display_order)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(inserted)
}

/// Post a progress update on a product.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert_update(
    pool: &PgPool,
    product_id: ProductId,
    update: &NewProductUpdate,
) -> Result<ProductUpdate, RepositoryError> {
    let inserted = sqlx::query_as::<_, ProductUpdate>(&format!(
        r"
        INSERT INTO marketplace.product_update
            (product_id, update_type, title, content, image_url, co2_absorbed, height_cm, is_public)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {UPDATE_COLUMNS}
        "
    ))
    .bind(product_id)
    .bind(update.update_type)
    .bind(&update.title)
    .bind(&update.content)
    .bind(update.image_url.as_deref())
    .bind(update.co2_absorbed)
    .bind(update.height_cm)
    .bind(update.is_public)
    .fetch_one(pool)
    .await?;

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_parse() {
        assert_eq!(ProductOrdering::parse("-price"), Some(ProductOrdering::PriceDesc));
        assert_eq!(ProductOrdering::parse("rating"), Some(ProductOrdering::RatingAsc));
        assert_eq!(ProductOrdering::parse("title"), None);
        assert_eq!(ProductOrdering::default(), ProductOrdering::CreatedDesc);
    }

    #[test]
    fn test_search_pattern_escapes_wildcards() {
        let filter = ProductFilter {
            search: Some("100%_ceiba".to_string()),
            ..ProductFilter::default()
        };
        assert_eq!(filter.search_pattern().as_deref(), Some("%100\\%\\_ceiba%"));
        assert_eq!(ProductFilter::default().search_pattern(), None);
    }
}
