//! Catalog models: categories, products, and their images and updates.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use sqlx::types::Json;

use nature_marketplace_core::{
    CategoryId, CurrencyCode, PricingType, ProductId, ProductImageId, ProductType,
    ProductUpdateId, ProductUpdateType,
};

/// A product category with its active product count.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub icon: String,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub display_order: i32,
    /// Number of active products in this category.
    pub product_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A product row joined with its category and primary image.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub short_description: String,
    pub category_id: Option<CategoryId>,
    pub category_name: Option<String>,
    pub category_slug: Option<String>,
    pub product_type: ProductType,
    pub purpose: String,
    pub impact_description: String,

    pub price: Decimal,
    pub pricing_type: PricingType,
    pub currency: CurrencyCode,
    pub compare_at_price: Option<Decimal>,

    pub stock: i32,
    pub is_unlimited_stock: bool,

    pub duration: String,
    pub max_participants: Option<i32>,
    pub includes: Json<Vec<String>>,
    pub area_size: String,
    pub is_collective: bool,

    pub rating: Decimal,
    pub reviews_count: i32,
    pub features: Json<Vec<String>>,

    pub location_name: String,
    pub location_lat: Option<Decimal>,
    pub location_lng: Option<Decimal>,
    pub co2_offset_kg: Option<Decimal>,
    pub species: String,

    pub is_active: bool,
    pub is_featured: bool,
    pub is_new: bool,

    pub meta_title: String,
    pub meta_description: String,

    /// URL of the primary image, or the first image by display order.
    pub primary_image_url: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether a compare-at price above the current price is set.
    #[must_use]
    pub fn is_on_sale(&self) -> bool {
        self.compare_at_price.is_some_and(|compare| compare > self.price)
    }

    /// Whole-number discount against the compare-at price, truncated.
    #[must_use]
    pub fn discount_percentage(&self) -> u32 {
        match self.compare_at_price {
            Some(compare) if compare > self.price && compare > Decimal::ZERO => {
                ((compare - self.price) / compare * Decimal::ONE_HUNDRED)
                    .floor()
                    .to_u32()
                    .unwrap_or(0)
            }
            _ => 0,
        }
    }

    /// Unlimited products are always in stock.
    #[must_use]
    pub const fn is_in_stock(&self) -> bool {
        self.is_unlimited_stock || self.stock > 0
    }

    /// Whether `quantity` units could be sold right now.
    #[must_use]
    pub const fn can_supply(&self, quantity: i32) -> bool {
        self.is_active && (self.is_unlimited_stock || self.stock >= quantity)
    }

    #[must_use]
    pub fn seo_title(&self) -> &str {
        if self.meta_title.is_empty() {
            &self.title
        } else {
            &self.meta_title
        }
    }

    #[must_use]
    pub fn seo_description(&self) -> &str {
        if self.meta_description.is_empty() {
            &self.short_description
        } else {
            &self.meta_description
        }
    }

    /// Stock as shown to clients: `None` when unlimited.
    #[must_use]
    pub const fn visible_stock(&self) -> Option<i32> {
        if self.is_unlimited_stock {
            None
        } else {
            Some(self.stock)
        }
    }
}

/// Live stock of one product, read past the catalog cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct StockLevel {
    pub product_id: ProductId,
    pub stock: i32,
    pub is_unlimited_stock: bool,
}

impl StockLevel {
    #[must_use]
    pub const fn is_in_stock(&self) -> bool {
        self.is_unlimited_stock || self.stock > 0
    }

    #[must_use]
    pub const fn visible_stock(&self) -> Option<i32> {
        if self.is_unlimited_stock {
            None
        } else {
            Some(self.stock)
        }
    }
}

/// Category reference embedded in product responses.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryRef {
    pub name: String,
    pub slug: String,
}

/// Product as shown in listings.
#[derive(Debug, Clone, Serialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub title: String,
    pub slug: String,
    pub short_description: String,
    pub product_type: ProductType,
    pub category: Option<CategoryRef>,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub currency: CurrencyCode,
    pub pricing_type: PricingType,
    pub price_label: &'static str,
    pub is_on_sale: bool,
    pub discount_percentage: u32,
    pub is_in_stock: bool,
    pub rating: Decimal,
    pub reviews_count: i32,
    pub is_featured: bool,
    pub is_new: bool,
    pub location_name: String,
    pub species: String,
    pub co2_offset_kg: Option<Decimal>,
    pub primary_image: Option<String>,
}

impl From<&Product> for ProductSummary {
    fn from(p: &Product) -> Self {
        let category = match (&p.category_name, &p.category_slug) {
            (Some(name), Some(slug)) => Some(CategoryRef {
                name: name.clone(),
                slug: slug.clone(),
            }),
            _ => None,
        };

        Self {
            id: p.id,
            title: p.title.clone(),
            slug: p.slug.clone(),
            short_description: p.short_description.clone(),
            product_type: p.product_type,
            category,
            price: p.price,
            compare_at_price: p.compare_at_price,
            currency: p.currency,
            pricing_type: p.pricing_type,
            price_label: p.pricing_type.label(),
            is_on_sale: p.is_on_sale(),
            discount_percentage: p.discount_percentage(),
            is_in_stock: p.is_in_stock(),
            rating: p.rating,
            reviews_count: p.reviews_count,
            is_featured: p.is_featured,
            is_new: p.is_new,
            location_name: p.location_name.clone(),
            species: p.species.clone(),
            co2_offset_kg: p.co2_offset_kg,
            primary_image: p.primary_image_url.clone(),
        }
    }
}

impl ProductSummary {
    /// Replace cached stock flags with a live reading. Other products are ignored.
    pub fn apply_stock(&mut self, levels: &[StockLevel]) {
        if let Some(level) = levels.iter().find(|l| l.product_id == self.id) {
            self.is_in_stock = level.is_in_stock();
        }
    }
}

/// Full product page payload.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub summary: ProductSummary,
    pub description: String,
    pub purpose: String,
    pub impact_description: String,
    pub stock: Option<i32>,
    pub is_unlimited_stock: bool,
    pub duration: String,
    pub max_participants: Option<i32>,
    pub includes: Vec<String>,
    pub area_size: String,
    pub is_collective: bool,
    pub features: Vec<String>,
    pub location_lat: Option<Decimal>,
    pub location_lng: Option<Decimal>,
    pub seo_title: String,
    pub seo_description: String,
    pub images: Vec<ProductImage>,
    pub updates: Vec<ProductUpdate>,
    pub created_at: DateTime<Utc>,
}

impl ProductDetail {
    #[must_use]
    pub fn new(product: &Product, images: Vec<ProductImage>, updates: Vec<ProductUpdate>) -> Self {
        Self {
            summary: ProductSummary::from(product),
            description: product.description.clone(),
            purpose: product.purpose.clone(),
            impact_description: product.impact_description.clone(),
            stock: product.visible_stock(),
            is_unlimited_stock: product.is_unlimited_stock,
            duration: product.duration.clone(),
            max_participants: product.max_participants,
            includes: product.includes.0.clone(),
            area_size: product.area_size.clone(),
            is_collective: product.is_collective,
            features: product.features.0.clone(),
            location_lat: product.location_lat,
            location_lng: product.location_lng,
            seo_title: product.seo_title().to_string(),
            seo_description: product.seo_description().to_string(),
            images,
            updates,
            created_at: product.created_at,
        }
    }

    /// Replace cached stock fields with a live reading.
    pub fn apply_stock(&mut self, level: &StockLevel) {
        if level.product_id != self.summary.id {
            return;
        }
        self.summary.is_in_stock = level.is_in_stock();
        self.stock = level.visible_stock();
        self.is_unlimited_stock = level.is_unlimited_stock;
    }
}

/// A product gallery image.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductImage {
    pub id: ProductImageId,
    pub product_id: ProductId,
    pub image_url: String,
    pub alt_text: String,
    pub caption: String,
    pub is_primary: bool,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
}

/// A progress update posted on a product.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductUpdate {
    pub id: ProductUpdateId,
    pub product_id: ProductId,
    pub update_type: ProductUpdateType,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub co2_absorbed: Option<Decimal>,
    pub height_cm: Option<Decimal>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::str::FromStr;

    use super::*;

    pub(crate) fn sample_product() -> Product {
        Product {
            id: ProductId::new(7),
            title: "Ceiba Tree".to_string(),
            slug: "ceiba-tree".to_string(),
            description: "A sacred tree of the Yucatán.".to_string(),
            short_description: "Sacred ceiba".to_string(),
            category_id: Some(CategoryId::new(1)),
            category_name: Some("Trees".to_string()),
            category_slug: Some("trees".to_string()),
            product_type: ProductType::Tree,
            purpose: String::new(),
            impact_description: String::new(),
            price: Decimal::from_str("45.00").unwrap(),
            pricing_type: PricingType::Annual,
            currency: CurrencyCode::USD,
            compare_at_price: None,
            stock: 3,
            is_unlimited_stock: false,
            duration: String::new(),
            max_participants: None,
            includes: Json(Vec::new()),
            area_size: String::new(),
            is_collective: false,
            rating: Decimal::from_str("4.5").unwrap(),
            reviews_count: 12,
            features: Json(vec!["Certificate".to_string()]),
            location_name: "Valladolid".to_string(),
            location_lat: Some(Decimal::from_str("20.689700").unwrap()),
            location_lng: Some(Decimal::from_str("-88.201500").unwrap()),
            co2_offset_kg: Some(Decimal::from_str("22.50").unwrap()),
            species: "Ceiba pentandra".to_string(),
            is_active: true,
            is_featured: true,
            is_new: false,
            meta_title: String::new(),
            meta_description: String::new(),
            primary_image_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_discount_percentage_truncates() {
        let mut product = sample_product();
        assert!(!product.is_on_sale());
        assert_eq!(product.discount_percentage(), 0);

        product.price = Decimal::from_str("30.00").unwrap();
        product.compare_at_price = Some(Decimal::from_str("45.00").unwrap());
        assert!(product.is_on_sale());
        // 15 / 45 = 33.33..%
        assert_eq!(product.discount_percentage(), 33);
    }

    #[test]
    fn test_compare_price_below_price_is_not_a_sale() {
        let mut product = sample_product();
        product.compare_at_price = Some(Decimal::from_str("40.00").unwrap());
        assert!(!product.is_on_sale());
        assert_eq!(product.discount_percentage(), 0);
    }

    #[test]
    fn test_stock_rules() {
        let mut product = sample_product();
        assert!(product.can_supply(3));
        assert!(!product.can_supply(4));
        assert_eq!(product.visible_stock(), Some(3));

        product.stock = 0;
        assert!(!product.is_in_stock());

        product.is_unlimited_stock = true;
        assert!(product.is_in_stock());
        assert!(product.can_supply(1000));
        assert_eq!(product.visible_stock(), None);

        product.is_active = false;
        assert!(!product.can_supply(1));
    }

    #[test]
    fn test_seo_fallbacks() {
        let mut product = sample_product();
        assert_eq!(product.seo_title(), "Ceiba Tree");
        assert_eq!(product.seo_description(), "Sacred ceiba");

        product.meta_title = "Adopt a Ceiba".to_string();
        assert_eq!(product.seo_title(), "Adopt a Ceiba");
    }

    #[test]
    fn test_summary_serializes_money_as_strings() {
        let summary = ProductSummary::from(&sample_product());
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["price"], "45.00");
        assert_eq!(json["price_label"], "/año");
        assert_eq!(json["category"]["slug"], "trees");
        assert_eq!(json["product_type"], "tree");
    }

    #[test]
    fn test_live_stock_overrides_cached_payload() {
        let product = sample_product();
        let mut detail = ProductDetail::new(&product, Vec::new(), Vec::new());
        assert!(detail.summary.is_in_stock);
        assert_eq!(detail.stock, Some(3));

        let sold_out = StockLevel {
            product_id: product.id,
            stock: 0,
            is_unlimited_stock: false,
        };
        detail.apply_stock(&sold_out);
        assert!(!detail.summary.is_in_stock);
        assert_eq!(detail.stock, Some(0));

        let other = StockLevel {
            product_id: ProductId::new(99),
            stock: 50,
            is_unlimited_stock: false,
        };
        detail.apply_stock(&other);
        assert_eq!(detail.stock, Some(0));

        let mut summary = ProductSummary::from(&product);
        summary.apply_stock(&[other, sold_out]);
        assert!(!summary.is_in_stock);
    }
}
