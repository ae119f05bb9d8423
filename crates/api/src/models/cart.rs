//! Cart models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use nature_marketplace_core::{CartId, CartItemId, CurrencyCode, ProductId, ProductType, UserId};

/// Who a cart belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOwner {
    User(UserId),
    /// Anonymous visitor, keyed by a random value kept in their session.
    Session(String),
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Cart {
    pub id: CartId,
    pub user_id: Option<UserId>,
    pub session_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A cart line joined with the product fields needed for pricing and checkout.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CartLine {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub product_title: String,
    pub product_slug: String,
    pub product_type: ProductType,
    pub unit_price: Decimal,
    pub currency: CurrencyCode,
    pub is_active: bool,
    pub stock: i32,
    pub is_unlimited_stock: bool,
    pub primary_image_url: Option<String>,
    pub quantity: i32,
    pub selected_options: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl CartLine {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    /// Sponsorship unit chosen for this line, if any.
    #[must_use]
    pub fn unit_code(&self) -> Option<&str> {
        selected_unit_code(&self.selected_options)
    }

    /// Whether the line can still be bought in its current quantity.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.is_active && (self.is_unlimited_stock || self.stock >= self.quantity)
    }
}

/// Read `unit_code` out of a line's selected options.
#[must_use]
pub fn selected_unit_code(options: &serde_json::Value) -> Option<&str> {
    options
        .get("unit_code")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|code| !code.is_empty())
}

/// A line naming a specific unit holds exactly one of it.
#[must_use]
pub fn quantity_fits_options(options: &serde_json::Value, quantity: i32) -> bool {
    quantity == 1 || selected_unit_code(options).is_none()
}

/// Merge `incoming` options into `existing`; incoming keys win.
#[must_use]
pub fn merge_options(existing: &serde_json::Value, incoming: &serde_json::Value) -> serde_json::Value {
    let mut merged = existing.as_object().cloned().unwrap_or_default();
    if let Some(new) = incoming.as_object() {
        for (key, value) in new {
            merged.insert(key.clone(), value.clone());
        }
    }
    serde_json::Value::Object(merged)
}

#[derive(Debug, Clone, Serialize)]
pub struct CartLineView {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub product_title: String,
    pub product_slug: String,
    pub product_type: ProductType,
    pub primary_image: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub currency: CurrencyCode,
    pub selected_options: serde_json::Value,
}

impl From<&CartLine> for CartLineView {
    fn from(line: &CartLine) -> Self {
        Self {
            id: line.id,
            product_id: line.product_id,
            product_title: line.product_title.clone(),
            product_slug: line.product_slug.clone(),
            product_type: line.product_type,
            primary_image: line.primary_image_url.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            line_total: line.line_total(),
            currency: line.currency,
            selected_options: line.selected_options.clone(),
        }
    }
}

/// Cart totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartSummary {
    /// Number of distinct lines.
    pub item_count: usize,
    /// Sum of quantities.
    pub total_quantity: i64,
    pub subtotal: Decimal,
    pub total: Decimal,
}

impl CartSummary {
    #[must_use]
    pub fn from_lines(lines: &[CartLine]) -> Self {
        let subtotal: Decimal = lines.iter().map(CartLine::line_total).sum();
        Self {
            item_count: lines.len(),
            total_quantity: lines.iter().map(|l| i64::from(l.quantity)).sum(),
            subtotal,
            total: subtotal,
        }
    }
}

/// Full cart payload.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub id: CartId,
    pub items: Vec<CartLineView>,
    #[serde(flatten)]
    pub summary: CartSummary,
}

impl CartView {
    #[must_use]
    pub fn new(cart: &Cart, lines: &[CartLine]) -> Self {
        Self {
            id: cart.id,
            items: lines.iter().map(CartLineView::from).collect(),
            summary: CartSummary::from_lines(lines),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use serde_json::json;

    use super::*;

    fn line(id: i32, price: &str, quantity: i32) -> CartLine {
        CartLine {
            id: CartItemId::new(id),
            product_id: ProductId::new(id),
            product_title: format!("Product {id}"),
            product_slug: format!("product-{id}"),
            product_type: ProductType::Tree,
            unit_price: Decimal::from_str(price).unwrap(),
            currency: CurrencyCode::USD,
            is_active: true,
            stock: 2,
            is_unlimited_stock: false,
            primary_image_url: None,
            quantity,
            selected_options: json!({}),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_summary_totals() {
        let lines = vec![line(1, "45.00", 2), line(2, "19.99", 1)];
        let summary = CartSummary::from_lines(&lines);

        assert_eq!(summary.item_count, 2);
        assert_eq!(summary.total_quantity, 3);
        assert_eq!(summary.subtotal, Decimal::from_str("109.99").unwrap());
        assert_eq!(summary.total, summary.subtotal);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["subtotal"], "109.99");
    }

    #[test]
    fn test_empty_summary() {
        let summary = CartSummary::from_lines(&[]);
        assert_eq!(summary.item_count, 0);
        assert_eq!(summary.subtotal, Decimal::ZERO);
    }

    #[test]
    fn test_availability() {
        let mut l = line(1, "10.00", 3);
        assert!(!l.is_available());
        l.is_unlimited_stock = true;
        assert!(l.is_available());
        l.is_active = false;
        assert!(!l.is_available());
    }

    #[test]
    fn test_merge_options_new_keys_override() {
        let merged = merge_options(
            &json!({"nickname": "Luna", "unit_code": "CEI-001"}),
            &json!({"nickname": "Sol"}),
        );
        assert_eq!(merged, json!({"nickname": "Sol", "unit_code": "CEI-001"}));

        let from_null = merge_options(&serde_json::Value::Null, &json!({"a": 1}));
        assert_eq!(from_null, json!({"a": 1}));
    }

    #[test]
    fn test_selected_unit_code() {
        assert_eq!(selected_unit_code(&json!({"unit_code": " CEI-001 "})), Some("CEI-001"));
        assert_eq!(selected_unit_code(&json!({"unit_code": ""})), None);
        assert_eq!(selected_unit_code(&json!({"unit_code": 5})), None);
        assert_eq!(selected_unit_code(&json!({})), None);
    }

    #[test]
    fn test_unit_lines_hold_one() {
        let unit = json!({"unit_code": "CEI-001"});
        assert!(quantity_fits_options(&unit, 1));
        assert!(!quantity_fits_options(&unit, 2));
        assert!(!quantity_fits_options(&unit, 0));

        let plain = json!({"nickname": "Luna"});
        assert!(quantity_fits_options(&plain, 5));
        assert!(quantity_fits_options(&json!({"unit_code": "  "}), 3));
    }
}
