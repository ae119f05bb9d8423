//! Order models.
//!
//! Orders snapshot the cart at checkout: titles, slugs, and prices are
//! copied onto the items so later catalog edits never change history.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use nature_marketplace_core::{
    CurrencyCode, OrderItemId, OrderStatus, ProductId, ProductType, UserId,
};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: UserId,
    pub status: OrderStatus,

    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub currency: CurrencyCode,

    pub customer_email: String,
    pub customer_name: String,
    pub customer_notes: String,
    #[serde(skip_serializing)]
    pub internal_notes: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub fulfilled_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
    #[must_use]
    pub const fn is_paid(&self) -> bool {
        self.status.is_paid()
    }

    #[must_use]
    pub const fn can_cancel(&self) -> bool {
        self.status.can_cancel()
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: Uuid,
    pub product_id: Option<ProductId>,
    pub product_title: String,
    pub product_slug: String,
    pub product_type: ProductType,
    pub unit_code: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub selected_options: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Row for order history listings.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderSummary {
    pub id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub currency: CurrencyCode,
    pub item_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Order with its items.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub is_paid: bool,
    pub can_cancel: bool,
    pub items: Vec<OrderItem>,
}

impl OrderDetail {
    #[must_use]
    pub fn new(order: Order, items: Vec<OrderItem>) -> Self {
        Self {
            is_paid: order.is_paid(),
            can_cancel: order.can_cancel(),
            order,
            items,
        }
    }
}

/// Pre-computed totals for a new order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
}

impl OrderTotals {
    /// Totals for a set of line totals with no discount or tax.
    #[must_use]
    pub fn from_line_totals(line_totals: impl IntoIterator<Item = Decimal>) -> Self {
        let subtotal: Decimal = line_totals.into_iter().sum();
        let discount_amount = Decimal::ZERO;
        let tax_amount = Decimal::ZERO;
        Self {
            subtotal,
            discount_amount,
            tax_amount,
            total_amount: subtotal - discount_amount + tax_amount,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_totals_sum_lines() {
        let totals = OrderTotals::from_line_totals([
            Decimal::from_str("90.00").unwrap(),
            Decimal::from_str("15.50").unwrap(),
        ]);
        assert_eq!(totals.subtotal, Decimal::from_str("105.50").unwrap());
        assert_eq!(totals.total_amount, totals.subtotal);
        assert_eq!(totals.tax_amount, Decimal::ZERO);
    }

    #[test]
    fn test_detail_flags_follow_status() {
        let order = Order {
            id: Uuid::new_v4(),
            order_number: "NM-20261017-0042".to_string(),
            user_id: UserId::new(1),
            status: OrderStatus::Paid,
            subtotal: Decimal::TEN,
            discount_amount: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            total_amount: Decimal::TEN,
            currency: CurrencyCode::USD,
            customer_email: "ana@bosque.org".to_string(),
            customer_name: String::new(),
            customer_notes: String::new(),
            internal_notes: "fragile".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            paid_at: Some(Utc::now()),
            fulfilled_at: None,
            cancelled_at: None,
        };

        let detail = OrderDetail::new(order, Vec::new());
        assert!(detail.is_paid);
        assert!(detail.can_cancel);

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["status"], "Paid");
        assert!(json.get("internal_notes").is_none());
    }
}
