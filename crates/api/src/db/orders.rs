//! Order and order item queries.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;
use uuid::Uuid;

use nature_marketplace_core::{CurrencyCode, OrderStatus, ProductId, ProductType, UserId};

use super::RepositoryError;
use crate::models::order::{Order, OrderItem, OrderSummary, OrderTotals};

const ORDER_COLUMNS: &str = r"
    id, order_number, user_id, status, subtotal, discount_amount, tax_amount,
    total_amount, currency, customer_email, customer_name, customer_notes, internal_notes,
    created_at, updated_at, paid_at, fulfilled_at, cancelled_at
";

const ITEM_COLUMNS: &str = r"
    id, order_id, product_id, product_title, product_slug, product_type, unit_code,
    quantity, unit_price, line_total, selected_options, created_at
";

const SUMMARY_SELECT: &str = r"
    SELECT o.id, o.order_number, o.status, o.total_amount, o.currency,
           (SELECT COUNT(*) FROM marketplace.order_item i WHERE i.order_id = o.id) AS item_count,
           o.created_at
    FROM marketplace.order o
";

/// Header fields for a new order.
#[derive(Debug)]
pub struct NewOrder<'a> {
    pub id: Uuid,
    pub order_number: &'a str,
    pub user_id: UserId,
    pub totals: OrderTotals,
    pub currency: CurrencyCode,
    pub customer_email: &'a str,
    pub customer_name: &'a str,
    pub customer_notes: &'a str,
}

/// A line snapshot for a new order.
#[derive(Debug)]
pub struct NewOrderItem<'a> {
    pub product_id: ProductId,
    pub product_title: &'a str,
    pub product_slug: &'a str,
    pub product_type: ProductType,
    pub unit_code: Option<&'a str>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub selected_options: &'a serde_json::Value,
}

/// Repository for order reads.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Order by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: Uuid) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM marketplace.order WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(order)
    }

    /// Order by id, only if owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_user(
        &self,
        id: Uuid,
        user_id: UserId,
    ) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM marketplace.order WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(order)
    }

    /// Order by its public number, only if owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_number_for_user(
        &self,
        order_number: &str,
        user_id: UserId,
    ) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM marketplace.order WHERE order_number = $1 AND user_id = $2"
        ))
        .bind(order_number)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(order)
    }

    /// Items of an order in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, RepositoryError> {
        let items = sqlx::query_as::<_, OrderItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM marketplace.order_item WHERE order_id = $1 ORDER BY id"
        ))
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;

        Ok(items)
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<OrderSummary>, RepositoryError> {
        let orders = sqlx::query_as::<_, OrderSummary>(&format!(
            "{SUMMARY_SELECT} WHERE o.user_id = $1 ORDER BY o.created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(orders)
    }

    /// All orders, newest first, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(
        &self,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<OrderSummary>, RepositoryError> {
        let orders = sqlx::query_as::<_, OrderSummary>(&format!(
            r"
            {SUMMARY_SELECT}
            WHERE ($1::marketplace.order_status IS NULL OR o.status = $1)
            ORDER BY o.created_at DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(orders)
    }
}

/// Insert an order header.
///
/// Returns `None` when the order number is already taken, leaving the
/// surrounding transaction usable so the caller can retry with a new number.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
#[instrument(skip(conn, order), fields(order_number = %order.order_number))]
pub async fn insert_order(
    conn: &mut PgConnection,
    order: &NewOrder<'_>,
) -> Result<Option<Order>, RepositoryError> {
    let inserted = sqlx::query_as::<_, Order>(&format!(
        r"
        INSERT INTO marketplace.order (
            id, order_number, user_id, subtotal, discount_amount, tax_amount, total_amount,
            currency, customer_email, customer_name, customer_notes
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (order_number) DO NOTHING
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(order.id)
    .bind(order.order_number)
    .bind(order.user_id)
    .bind(order.totals.subtotal)
    .bind(order.totals.discount_amount)
    .bind(order.totals.tax_amount)
    .bind(order.totals.total_amount)
    .bind(order.currency)
    .bind(order.customer_email)
    .bind(order.customer_name)
    .bind(order.customer_notes)
    .fetch_optional(conn)
    .await?;

    Ok(inserted)
}

/// Snapshot one line onto an order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert_item(
    conn: &mut PgConnection,
    order_id: Uuid,
    item: &NewOrderItem<'_>,
) -> Result<OrderItem, RepositoryError> {
    let inserted = sqlx::query_as::<_, OrderItem>(&format!(
        r"
        INSERT INTO marketplace.order_item (
            order_id, product_id, product_title, product_slug, product_type, unit_code,
            quantity, unit_price, line_total, selected_options
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {ITEM_COLUMNS}
        "
    ))
    .bind(order_id)
    .bind(item.product_id)
    .bind(item.product_title)
    .bind(item.product_slug)
    .bind(item.product_type)
    .bind(item.unit_code)
    .bind(item.quantity)
    .bind(item.unit_price)
    .bind(item.unit_price * Decimal::from(item.quantity))
    .bind(item.selected_options)
    .fetch_one(conn)
    .await?;

    Ok(inserted)
}

/// Lock an order row for the rest of the transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock(conn: &mut PgConnection, id: Uuid) -> Result<Option<Order>, RepositoryError> {
    let order = sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM marketplace.order WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(order)
}

/// Items of an order, read inside a transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn items(conn: &mut PgConnection, order_id: Uuid) -> Result<Vec<OrderItem>, RepositoryError> {
    let items = sqlx::query_as::<_, OrderItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM marketplace.order_item WHERE order_id = $1 ORDER BY id"
    ))
    .bind(order_id)
    .fetch_all(conn)
    .await?;

    Ok(items)
}

/// Move an order from `from` to `to`, stamping the matching timestamp.
///
/// Returns `None` if the order is no longer in `from`.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn set_status(
    conn: &mut PgConnection,
    id: Uuid,
    from: OrderStatus,
    to: OrderStatus,
) -> Result<Option<Order>, RepositoryError> {
    let order = sqlx::query_as::<_, Order>(&format!(
        r"
        UPDATE marketplace.order
        SET status = $3,
            paid_at = CASE WHEN $3 = 'paid' THEN COALESCE(paid_at, NOW()) ELSE paid_at END,
            fulfilled_at = CASE WHEN $3 = 'fulfilled' THEN NOW() ELSE fulfilled_at END,
            cancelled_at = CASE WHEN $3 = 'cancelled' THEN NOW() ELSE cancelled_at END,
            updated_at = NOW()
        WHERE id = $1 AND status = $2
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(id)
    .bind(from)
    .bind(to)
    .fetch_optional(conn)
    .await?;

    Ok(order)
}
