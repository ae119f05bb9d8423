//! Stripe payments: hosted checkout, payment intents, status, and refunds.
//!
//! A pending `Payment` row is written as soon as Stripe hands back a
//! session or intent id. The webhook later settles it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

use nature_marketplace_core::{OrderStatus, PaymentStatus, Price, UserId};

use crate::config::ApiConfig;
use crate::db::payments::{self, NewPayment, PaymentRepository, StripeReference};
use crate::db::{OrderRepository, ProductRepository, RepositoryError};
use crate::error::add_breadcrumb;
use crate::models::order::Order;
use crate::models::payment::{Payment, PaymentSummary};
use crate::services::orders::{self, CreateOrder, OrderError, OrderService};
use crate::stripe::types::MAX_DESCRIPTION_CHARS;
use crate::stripe::{
    CheckoutLine, CheckoutRequest, PaymentIntentRequest, StripeClient, StripeError,
};

/// Errors from payment operations.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Order not found")]
    OrderNotFound,

    #[error("Order is already paid")]
    AlreadyPaid,

    #[error("Cannot pay for cancelled order")]
    OrderCancelled,

    #[error("Payment not found")]
    NotFound,

    #[error("Payment is not refundable")]
    NotRefundable,

    #[error("Maximum refundable amount is {0}")]
    ExceedsRefundable(Decimal),

    #[error("Refund amount must be positive")]
    InvalidAmount,

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Stripe(#[from] StripeError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for PaymentError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// Body of `POST /payments/checkout`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutInput {
    pub order_id: Option<Uuid>,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub checkout_url: Option<String>,
    pub order_id: Uuid,
    pub order_number: String,
}

/// Body of `POST /payments/intent`.
#[derive(Debug, Clone, Deserialize)]
pub struct IntentInput {
    pub order_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntentResponse {
    pub client_secret: Option<String>,
    pub payment_intent_id: String,
    pub publishable_key: Option<String>,
}

/// Payment state of an order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderPaymentStatus {
    pub order_id: Uuid,
    pub order_number: String,
    pub order_status: OrderStatus,
    pub is_paid: bool,
    pub payments: Vec<PaymentSummary>,
}

/// Body of `POST /payments/{id}/refund`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefundInput {
    pub amount: Option<Decimal>,
    pub reason: Option<String>,
}

/// Query of `GET /admin/payments/stats`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentStatsQuery {
    pub pending_limit: Option<i64>,
}

/// Staff view of money kept and payments still open at Stripe.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentStats {
    pub total_revenue: Decimal,
    pub pending: Vec<PaymentSummary>,
}

const DEFAULT_PENDING_LIMIT: i64 = 50;
const MAX_PENDING_LIMIT: i64 = 200;

/// Payment service.
pub struct PaymentService<'a> {
    pool: &'a PgPool,
    stripe: &'a StripeClient,
    config: &'a ApiConfig,
}

impl<'a> PaymentService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, stripe: &'a StripeClient, config: &'a ApiConfig) -> Self {
        Self {
            pool,
            stripe,
            config,
        }
    }

    /// Start a hosted checkout. Without an order id the cart is ordered first.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::OrderNotFound` if the order isn't the user's.
    /// Returns `PaymentError::AlreadyPaid` or `PaymentError::OrderCancelled`
    /// for orders that can't take a payment.
    /// Returns `PaymentError::Stripe` if Stripe rejects the session.
    #[instrument(skip(self, input), fields(user_id = %user_id))]
    pub async fn checkout(
        &self,
        user_id: UserId,
        input: &CheckoutInput,
    ) -> Result<CheckoutResponse, PaymentError> {
        let order = match input.order_id {
            Some(id) => self.payable_order(id, user_id).await?,
            None => {
                OrderService::new(self.pool, self.stripe)
                    .create_from_cart(user_id, &CreateOrder::default())
                    .await?
                    .order
            }
        };

        let products = ProductRepository::new(self.pool);
        let items = OrderRepository::new(self.pool).items(order.id).await?;
        let mut lines = Vec::with_capacity(items.len());
        for item in &items {
            let description = match item.product_id {
                Some(id) => products
                    .get_by_id(id)
                    .await?
                    .map(|p| truncate_chars(&p.short_description, MAX_DESCRIPTION_CHARS))
                    .unwrap_or_default(),
                None => String::new(),
            };
            lines.push(CheckoutLine {
                name: item.product_title.clone(),
                description,
                unit_amount: Price::new(item.unit_price, order.currency)
                    .to_minor_units()
                    .map_err(StripeError::from)?,
                quantity: item.quantity,
            });
        }

        let base = &self.config.base_url;
        let request = CheckoutRequest {
            order_id: order.id,
            order_number: order.order_number.clone(),
            customer_email: order.customer_email.clone(),
            currency: order.currency,
            lines,
            success_url: input.success_url.clone().unwrap_or_else(|| {
                format!("{base}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}")
            }),
            cancel_url: input
                .cancel_url
                .clone()
                .unwrap_or_else(|| format!("{base}/cart")),
        };
        let session = self.stripe.create_checkout_session(&request).await?;

        payments::insert(
            self.pool,
            &NewPayment {
                order_id: order.id,
                user_id,
                reference: StripeReference::CheckoutSession(session.id.clone()),
                amount: order.total_amount,
                currency: order.currency,
                metadata: serde_json::json!({ "order_number": order.order_number }),
            },
        )
        .await?;

        info!(order_id = %order.id, session_id = %session.id, "Checkout session created");
        add_breadcrumb(
            "payment",
            "Checkout session created",
            Some(&[("order_number", order.order_number.as_str())]),
        );

        Ok(CheckoutResponse {
            session_id: session.id,
            checkout_url: session.url,
            order_id: order.id,
            order_number: order.order_number,
        })
    }

    /// Create a payment intent for an embedded payment form.
    ///
    /// # Errors
    ///
    /// Same order checks as [`Self::checkout`].
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn create_intent(
        &self,
        user_id: UserId,
        order_id: Uuid,
    ) -> Result<IntentResponse, PaymentError> {
        let order = self.payable_order(order_id, user_id).await?;

        let request = PaymentIntentRequest {
            order_id: order.id,
            order_number: order.order_number.clone(),
            amount: Price::new(order.total_amount, order.currency)
                .to_minor_units()
                .map_err(StripeError::from)?,
            currency: order.currency,
        };
        let intent = self.stripe.create_payment_intent(&request).await?;

        payments::insert(
            self.pool,
            &NewPayment {
                order_id: order.id,
                user_id,
                reference: StripeReference::PaymentIntent(intent.id.clone()),
                amount: order.total_amount,
                currency: order.currency,
                metadata: serde_json::json!({ "order_number": order.order_number }),
            },
        )
        .await?;

        info!(order_id = %order.id, intent_id = %intent.id, "Payment intent created");
        add_breadcrumb(
            "payment",
            "Payment intent created",
            Some(&[("order_number", order.order_number.as_str())]),
        );

        Ok(IntentResponse {
            client_secret: intent.client_secret,
            payment_intent_id: intent.id,
            publishable_key: self.config.stripe.publishable_key.clone(),
        })
    }

    /// Payment state of one of the user's orders.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::OrderNotFound` if the order isn't the user's.
    pub async fn status(
        &self,
        user_id: UserId,
        order_id: Uuid,
    ) -> Result<OrderPaymentStatus, PaymentError> {
        let order = OrderRepository::new(self.pool)
            .get_for_user(order_id, user_id)
            .await?
            .ok_or(PaymentError::OrderNotFound)?;
        let payments = PaymentRepository::new(self.pool)
            .list_for_order(order.id)
            .await?;

        Ok(OrderPaymentStatus {
            order_id: order.id,
            is_paid: order.is_paid(),
            order_number: order.order_number,
            order_status: order.status,
            payments: payments.iter().map(PaymentSummary::from).collect(),
        })
    }

    /// The user's payments, newest first.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Repository` if the query fails.
    pub async fn history(&self, user_id: UserId) -> Result<Vec<PaymentSummary>, PaymentError> {
        let payments = PaymentRepository::new(self.pool)
            .list_for_user(user_id)
            .await?;
        Ok(payments.iter().map(PaymentSummary::from).collect())
    }

    /// Staff: revenue net of refunds, and the oldest payments still open.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Repository` if a query fails.
    pub async fn stats(&self, query: &PaymentStatsQuery) -> Result<PaymentStats, PaymentError> {
        let repo = PaymentRepository::new(self.pool);
        let total_revenue = repo.total_revenue().await?;
        let pending = repo.pending(pending_limit(query.pending_limit)).await?;

        Ok(PaymentStats {
            total_revenue,
            pending: pending.iter().map(PaymentSummary::from).collect(),
        })
    }

    /// Staff: refund part or all of a captured payment.
    ///
    /// The amount defaults to everything not yet refunded. A full refund
    /// also moves the order to `Refunded`.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::NotRefundable` if nothing can be refunded.
    /// Returns `PaymentError::ExceedsRefundable` if the amount is too large.
    /// Returns `PaymentError::Stripe` if Stripe rejects the refund.
    #[instrument(skip(self, input))]
    pub async fn refund(&self, payment_id: Uuid, input: &RefundInput) -> Result<Payment, PaymentError> {
        let mut tx = self.pool.begin().await?;

        let payment = payments::lock(&mut tx, payment_id)
            .await?
            .ok_or(PaymentError::NotFound)?;
        let amount = refund_amount(&payment, input.amount)?;
        let intent_id = payment
            .stripe_payment_intent_id
            .clone()
            .ok_or(PaymentError::NotRefundable)?;

        let updated =
            refund_in_tx::<PaymentError>(&mut tx, self.stripe, &payment, &intent_id, amount).await?;
        if updated.status == PaymentStatus::Refunded {
            orders::mark_refunded(&mut tx, updated.order_id).await?;
        }
        tx.commit().await?;

        info!(
            payment_id = %payment_id,
            %amount,
            reason = input.reason.as_deref().unwrap_or_default(),
            status = %updated.status,
            "Payment refunded"
        );
        Ok(updated)
    }

    async fn payable_order(&self, order_id: Uuid, user_id: UserId) -> Result<Order, PaymentError> {
        let order = OrderRepository::new(self.pool)
            .get_for_user(order_id, user_id)
            .await?
            .ok_or(PaymentError::OrderNotFound)?;
        ensure_payable(&order)?;
        Ok(order)
    }
}

/// Refund `amount` of a locked payment through Stripe and record it.
///
/// # Errors
///
/// Fails with the Stripe error, or a repository error if the row can't be updated.
pub(crate) async fn refund_in_tx<E>(
    conn: &mut PgConnection,
    stripe: &StripeClient,
    payment: &Payment,
    intent_id: &str,
    amount: Decimal,
) -> Result<Payment, E>
where
    E: From<StripeError> + From<RepositoryError>,
{
    let cents = Price::new(amount, payment.currency)
        .to_minor_units()
        .map_err(StripeError::from)?;
    let refund = stripe.create_refund(intent_id, cents).await?;

    let refunded_total = payment.refunded_amount + amount;
    let updated = payments::set_refunded(
        conn,
        payment.id,
        refunded_total,
        payment.status_after_refund(refunded_total),
    )
    .await?;

    info!(payment_id = %payment.id, refund_id = %refund.id, %amount, "Refund issued");
    Ok(updated)
}

fn ensure_payable(order: &Order) -> Result<(), PaymentError> {
    match order.status {
        OrderStatus::Cancelled => Err(PaymentError::OrderCancelled),
        OrderStatus::Pending => Ok(()),
        _ => Err(PaymentError::AlreadyPaid),
    }
}

fn refund_amount(payment: &Payment, requested: Option<Decimal>) -> Result<Decimal, PaymentError> {
    if !payment.is_refundable() {
        return Err(PaymentError::NotRefundable);
    }

    let net = payment.net_amount();
    let amount = requested.unwrap_or(net);
    if amount <= Decimal::ZERO {
        return Err(PaymentError::InvalidAmount);
    }
    if amount > net {
        return Err(PaymentError::ExceedsRefundable(net));
    }

    Ok(amount)
}

fn pending_limit(requested: Option<i64>) -> i64 {
    requested
        .unwrap_or(DEFAULT_PENDING_LIMIT)
        .clamp(1, MAX_PENDING_LIMIT)
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.trim().chars().take(max).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::models::payment::tests::payment;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_refund_defaults_to_net() {
        let p = payment(PaymentStatus::PartiallyRefunded, "80.00", "30.00");
        assert_eq!(refund_amount(&p, None).unwrap(), dec("50.00"));
    }

    #[test]
    fn test_refund_over_net_is_rejected() {
        let p = payment(PaymentStatus::Succeeded, "80.00", "0");
        let err = refund_amount(&p, Some(dec("80.01"))).unwrap_err();
        assert!(matches!(err, PaymentError::ExceedsRefundable(net) if net == dec("80.00")));
        assert_eq!(err.to_string(), "Maximum refundable amount is 80.00");
    }

    #[test]
    fn test_refund_requires_captured_payment() {
        let p = payment(PaymentStatus::Pending, "80.00", "0");
        assert!(matches!(
            refund_amount(&p, None),
            Err(PaymentError::NotRefundable)
        ));
        let p = payment(PaymentStatus::Succeeded, "80.00", "0");
        assert!(matches!(
            refund_amount(&p, Some(Decimal::ZERO)),
            Err(PaymentError::InvalidAmount)
        ));
    }

    #[test]
    fn test_truncate_description() {
        let long = "x".repeat(MAX_DESCRIPTION_CHARS + 20);
        assert_eq!(truncate_chars(&long, MAX_DESCRIPTION_CHARS).len(), MAX_DESCRIPTION_CHARS);
        assert_eq!(truncate_chars("  Cloud forest  ", 500), "Cloud forest");
    }

    #[test]
    fn test_pending_limit_is_clamped() {
        assert_eq!(pending_limit(None), DEFAULT_PENDING_LIMIT);
        assert_eq!(pending_limit(Some(0)), 1);
        assert_eq!(pending_limit(Some(i64::MAX)), MAX_PENDING_LIMIT);
        assert_eq!(pending_limit(Some(20)), 20);
    }
}
