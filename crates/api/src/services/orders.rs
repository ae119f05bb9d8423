//! Order service.
//!
//! Checkout turns the cart into an order in a single transaction: stock is
//! decremented, sponsorship units are reserved, and the cart is emptied.
//! Either every step lands or none does.

use chrono::{NaiveDate, Utc};
use rand::Rng;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use nature_marketplace_core::{CurrencyCode, OrderStatus, StatusTransitionError, UserId};

use crate::db::carts::{self, CartRepository};
use crate::db::orders::{self, NewOrder, NewOrderItem, OrderRepository};
use crate::db::{RepositoryError, UserRepository, catalog, payments, units};
use crate::error::add_breadcrumb;
use crate::models::cart::{CartOwner, quantity_fits_options};
use crate::models::order::{Order, OrderDetail, OrderSummary, OrderTotals};
use crate::services::catalog::Page;
use crate::services::payments::refund_in_tx;
use crate::stripe::{StripeClient, StripeError};

/// Attempts at finding a free order number before giving up.
const ORDER_NUMBER_ATTEMPTS: usize = 5;

/// Staff order listings.
pub const ADMIN_PAGE_SIZE: i64 = 50;

/// Errors from order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("{0} is not available in requested quantity")]
    Unavailable(String),

    #[error("Sponsorship unit {0} is no longer available")]
    UnitUnavailable(String),

    #[error("Sponsorship unit {0} can only be ordered once")]
    UnitQuantity(String),

    #[error("Order not found")]
    NotFound,

    #[error("Order cannot be cancelled")]
    NotCancellable,

    #[error(transparent)]
    Transition(#[from] StatusTransitionError),

    #[error("could not allocate a unique order number")]
    OrderNumberExhausted,

    #[error(transparent)]
    Stripe(#[from] StripeError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for OrderError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// Body of `POST /orders`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateOrder {
    pub customer_name: Option<String>,
    pub customer_notes: Option<String>,
}

/// Body of `POST /admin/orders/{id}/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusChange {
    pub status: OrderStatus,
}

/// Order service.
pub struct OrderService<'a> {
    pool: &'a PgPool,
    stripe: &'a StripeClient,
    orders: OrderRepository<'a>,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, stripe: &'a StripeClient) -> Self {
        Self {
            pool,
            stripe,
            orders: OrderRepository::new(pool),
        }
    }

    /// Place an order for everything in the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::EmptyCart` when there is nothing to buy.
    /// Returns `OrderError::Unavailable` if a line can't be supplied.
    /// Returns `OrderError::UnitUnavailable` if a selected unit was taken.
    /// Returns `OrderError::UnitQuantity` if a unit line asks for more than one.
    #[instrument(skip(self, input), fields(user_id = %user_id))]
    pub async fn create_from_cart(
        &self,
        user_id: UserId,
        input: &CreateOrder,
    ) -> Result<OrderDetail, OrderError> {
        let user = UserRepository::new(self.pool)
            .get_by_id(user_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        let cart = CartRepository::new(self.pool)
            .find(&CartOwner::User(user_id))
            .await?
            .ok_or(OrderError::EmptyCart)?;

        let mut tx = self.pool.begin().await?;

        let lines = carts::lines(&mut tx, cart.id).await?;
        if lines.is_empty() {
            return Err(OrderError::EmptyCart);
        }
        if let Some(line) = lines.iter().find(|line| !line.is_available()) {
            return Err(OrderError::Unavailable(line.product_title.clone()));
        }

        let customer_name = input
            .customer_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map_or_else(|| user.full_name(), str::to_string);
        let customer_notes = input.customer_notes.as_deref().unwrap_or_default().trim();
        let totals = OrderTotals::from_line_totals(lines.iter().map(|line| line.line_total()));
        let currency = lines
            .first()
            .map_or(CurrencyCode::default(), |line| line.currency);

        let mut order = None;
        for _ in 0..ORDER_NUMBER_ATTEMPTS {
            let number = order_number(Utc::now().date_naive(), rand::rng().random_range(0..10_000));
            let new_order = NewOrder {
                id: Uuid::new_v4(),
                order_number: &number,
                user_id,
                totals,
                currency,
                customer_email: user.email.as_str(),
                customer_name: &customer_name,
                customer_notes,
            };
            order = orders::insert_order(&mut tx, &new_order).await?;
            if order.is_some() {
                break;
            }
            warn!(order_number = %number, "Order number taken, retrying");
        }
        let order = order.ok_or(OrderError::OrderNumberExhausted)?;

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let unit_code = line.unit_code();
            if let Some(code) = unit_code
                && !quantity_fits_options(&line.selected_options, line.quantity)
            {
                return Err(OrderError::UnitQuantity(code.to_string()));
            }
            let item = orders::insert_item(
                &mut tx,
                order.id,
                &NewOrderItem {
                    product_id: line.product_id,
                    product_title: &line.product_title,
                    product_slug: &line.product_slug,
                    product_type: line.product_type,
                    unit_code,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    selected_options: &line.selected_options,
                },
            )
            .await?;
            items.push(item);

            if !catalog::reserve_stock(&mut tx, line.product_id, line.quantity).await? {
                return Err(OrderError::Unavailable(line.product_title.clone()));
            }
            if let Some(code) = unit_code
                && !units::reserve(&mut tx, code, line.product_id, order.id).await?
            {
                return Err(OrderError::UnitUnavailable(code.to_string()));
            }
        }

        carts::clear(&mut tx, cart.id).await?;
        tx.commit().await?;

        info!(order_id = %order.id, order_number = %order.order_number, total = %order.total_amount, "Order created");
        add_breadcrumb(
            "checkout",
            "Order created",
            Some(&[("order_number", order.order_number.as_str())]),
        );

        Ok(OrderDetail::new(order, items))
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<OrderSummary>, OrderError> {
        Ok(self.orders.list_for_user(user_id).await?)
    }

    /// One of the user's orders.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order doesn't exist or isn't theirs.
    pub async fn detail(&self, id: Uuid, user_id: UserId) -> Result<OrderDetail, OrderError> {
        let order = self
            .orders
            .get_for_user(id, user_id)
            .await?
            .ok_or(OrderError::NotFound)?;
        let items = self.orders.items(order.id).await?;

        Ok(OrderDetail::new(order, items))
    }

    /// One of the user's orders, by its public number.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order doesn't exist or isn't theirs.
    pub async fn by_number(&self, number: &str, user_id: UserId) -> Result<OrderDetail, OrderError> {
        let order = self
            .orders
            .get_by_number_for_user(number, user_id)
            .await?
            .ok_or(OrderError::NotFound)?;
        let items = self.orders.items(order.id).await?;

        Ok(OrderDetail::new(order, items))
    }

    /// Cancel one of the user's orders, refunding it if already paid.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order doesn't exist or isn't theirs.
    /// Returns `OrderError::NotCancellable` once the order is being processed.
    /// Returns `OrderError::Stripe` if the refund fails; nothing is changed then.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: Uuid, user_id: UserId) -> Result<OrderDetail, OrderError> {
        let mut tx = self.pool.begin().await?;

        let order = orders::lock(&mut tx, id)
            .await?
            .filter(|order| order.user_id == user_id)
            .ok_or(OrderError::NotFound)?;
        if !order.can_cancel() {
            return Err(OrderError::NotCancellable);
        }

        let cancelled = cancel_locked(&mut tx, self.stripe, &order).await?;
        let items = orders::items(&mut tx, id).await?;
        tx.commit().await?;

        info!(order_id = %id, was = %order.status, "Order cancelled");
        Ok(OrderDetail::new(cancelled, items))
    }

    /// Staff: every order, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the query fails.
    pub async fn list_all(
        &self,
        status: Option<OrderStatus>,
        page: i64,
    ) -> Result<Vec<OrderSummary>, OrderError> {
        Ok(self
            .orders
            .list_all(status, ADMIN_PAGE_SIZE, admin_offset(page))
            .await?)
    }

    /// Staff: move an order along its lifecycle.
    ///
    /// Cancelling here has the same effects as a customer cancellation.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order doesn't exist.
    /// Returns `OrderError::Transition` if the move isn't allowed.
    #[instrument(skip(self))]
    pub async fn update_status(&self, id: Uuid, next: OrderStatus) -> Result<OrderDetail, OrderError> {
        let mut tx = self.pool.begin().await?;

        let order = orders::lock(&mut tx, id).await?.ok_or(OrderError::NotFound)?;
        order.status.transition(next)?;

        let updated = if next == OrderStatus::Cancelled {
            cancel_locked(&mut tx, self.stripe, &order).await?
        } else {
            orders::set_status(&mut tx, id, order.status, next)
                .await?
                .ok_or(StatusTransitionError {
                    from: order.status,
                    to: next,
                })?
        };
        let items = orders::items(&mut tx, id).await?;
        tx.commit().await?;

        info!(order_id = %id, from = %order.status, to = %next, "Order status changed");
        Ok(OrderDetail::new(updated, items))
    }
}

/// What a successful payment does to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentArrival {
    /// `Pending -> Paid`, followed by fulfilment.
    Pay,
    /// An earlier event already paid the order.
    AlreadyPaid,
    /// Cancelled or refunded. A late payment never revives it.
    Closed,
}

impl PaymentArrival {
    #[must_use]
    pub const fn for_status(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Pending => Self::Pay,
            status if status.is_paid() => Self::AlreadyPaid,
            _ => Self::Closed,
        }
    }
}

/// `Pending -> Paid`. Returns `true` only when this call moved the order.
///
/// See [`PaymentArrival`] for the other statuses.
///
/// # Errors
///
/// Returns `OrderError::NotFound` if the order doesn't exist.
pub async fn mark_paid(conn: &mut PgConnection, order_id: Uuid) -> Result<bool, OrderError> {
    let order = orders::lock(conn, order_id)
        .await?
        .ok_or(OrderError::NotFound)?;

    match PaymentArrival::for_status(order.status) {
        PaymentArrival::Pay => {
            let paid = orders::set_status(conn, order_id, OrderStatus::Pending, OrderStatus::Paid)
                .await?
                .is_some();
            if paid {
                info!(order_id = %order_id, order_number = %order.order_number, "Order paid");
            }
            Ok(paid)
        }
        PaymentArrival::AlreadyPaid => Ok(false),
        PaymentArrival::Closed => {
            warn!(order_id = %order_id, status = %order.status, "Payment arrived for a closed order");
            Ok(false)
        }
    }
}

/// Move a paid order to `Refunded` after its money went back in full.
///
/// # Errors
///
/// Returns `OrderError::Repository` if a query fails.
pub async fn mark_refunded(conn: &mut PgConnection, order_id: Uuid) -> Result<bool, OrderError> {
    let Some(order) = orders::lock(conn, order_id).await? else {
        return Ok(false);
    };
    if !order.status.can_transition_to(OrderStatus::Refunded) {
        return Ok(false);
    }

    let refunded = orders::set_status(conn, order_id, order.status, OrderStatus::Refunded)
        .await?
        .is_some();
    if refunded {
        info!(order_id = %order_id, "Order refunded");
    }
    Ok(refunded)
}

/// Cancel a locked order, returning stock and units and refunding any capture.
async fn cancel_locked(
    conn: &mut PgConnection,
    stripe: &StripeClient,
    order: &Order,
) -> Result<Order, OrderError> {
    let cancelled = orders::set_status(conn, order.id, order.status, OrderStatus::Cancelled)
        .await?
        .ok_or(StatusTransitionError {
            from: order.status,
            to: OrderStatus::Cancelled,
        })?;

    for item in orders::items(conn, order.id).await? {
        if let Some(product_id) = item.product_id {
            catalog::restore_stock(conn, product_id, item.quantity).await?;
        }
    }
    let released = units::release_reservations(conn, order.id).await?;
    if released > 0 {
        info!(order_id = %order.id, released, "Released reserved units");
    }

    if order.status == OrderStatus::Paid
        && let Some(payment) = payments::lock_refundable_for_order(conn, order.id).await?
    {
        match payment.stripe_payment_intent_id.as_deref() {
            Some(intent_id) => {
                let amount = payment.net_amount();
                refund_in_tx::<OrderError>(conn, stripe, &payment, intent_id, amount).await?;
            }
            None => warn!(payment_id = %payment.id, "Paid order has no payment intent to refund"),
        }
    }

    Ok(cancelled)
}

/// Row offset of a staff listing page.
fn admin_offset(page: i64) -> i64 {
    Page::new(Some(page), Some(ADMIN_PAGE_SIZE)).offset()
}

/// `NM-YYYYMMDD-XXXX` with a zero-padded suffix.
fn order_number(date: NaiveDate, suffix: u16) -> String {
    format!("NM-{}-{suffix:04}", date.format("%Y%m%d"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_number_format() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert_eq!(order_number(date, 42), "NM-20260307-0042");
        assert_eq!(order_number(date, 9999), "NM-20260307-9999");
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(OrderError::EmptyCart.to_string(), "Cart is empty");
        assert_eq!(
            OrderError::Unavailable("Ceiba Tree".to_string()).to_string(),
            "Ceiba Tree is not available in requested quantity"
        );
        assert_eq!(
            OrderError::NotCancellable.to_string(),
            "Order cannot be cancelled"
        );
    }

    #[test]
    fn test_admin_offset_is_bounded() {
        assert_eq!(admin_offset(-3), 0);
        assert_eq!(admin_offset(2), ADMIN_PAGE_SIZE);
        assert_eq!(
            admin_offset(i64::MAX),
            (crate::services::catalog::MAX_PAGE - 1) * ADMIN_PAGE_SIZE
        );
    }

    #[test]
    fn test_payment_arrival() {
        assert_eq!(PaymentArrival::for_status(OrderStatus::Pending), PaymentArrival::Pay);
        assert_eq!(
            PaymentArrival::for_status(OrderStatus::Fulfilled),
            PaymentArrival::AlreadyPaid
        );
        assert_eq!(
            PaymentArrival::for_status(OrderStatus::Cancelled),
            PaymentArrival::Closed
        );
    }

    #[test]
    fn test_create_order_body_is_optional() {
        let input: CreateOrder = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(input.customer_name.is_none());
        assert!(input.customer_notes.is_none());
    }
}
