//! Payment routes and the Stripe webhook endpoint.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::HeaderMap,
};
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::middleware::{RequireAuth, RequireStaff};
use crate::models::payment::{Payment, PaymentSummary};
use crate::services::payments::{
    CheckoutInput, CheckoutResponse, IntentInput, IntentResponse, OrderPaymentStatus,
    PaymentService, PaymentStats, PaymentStatsQuery, RefundInput,
};
use crate::services::webhook::WebhookService;
use crate::state::AppState;

/// Header carrying the webhook signature.
const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

fn payments(state: &AppState) -> PaymentService<'_> {
    PaymentService::new(state.pool(), state.stripe(), state.config())
}

/// Start a hosted Stripe Checkout for an order, or for the cart.
///
/// POST /api/payments/checkout
pub async fn checkout(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    body: Option<Json<CheckoutInput>>,
) -> Result<Json<CheckoutResponse>> {
    let input = body.map(|Json(input)| input).unwrap_or_default();
    Ok(Json(payments(&state).checkout(user.id, &input).await?))
}

/// POST /api/payments/intent
pub async fn intent(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<IntentInput>,
) -> Result<Json<IntentResponse>> {
    Ok(Json(
        payments(&state)
            .create_intent(user.id, body.order_id)
            .await?,
    ))
}

/// GET /api/payments/status/{order_id}
pub async fn status(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderPaymentStatus>> {
    Ok(Json(payments(&state).status(user.id, order_id).await?))
}

/// GET /api/payments/history
pub async fn history(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<PaymentSummary>>> {
    Ok(Json(payments(&state).history(user.id).await?))
}

/// GET /api/admin/payments/stats (staff)
pub async fn admin_stats(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Query(query): Query<PaymentStatsQuery>,
) -> Result<Json<PaymentStats>> {
    Ok(Json(payments(&state).stats(&query).await?))
}

/// POST /api/payments/{id}/refund (staff)
pub async fn refund(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<Uuid>,
    body: Option<Json<RefundInput>>,
) -> Result<Json<Payment>> {
    let input = body.map(|Json(input)| input).unwrap_or_default();
    Ok(Json(payments(&state).refund(id, &input).await?))
}

/// Verified Stripe event delivery.
///
/// POST /api/payments/webhook
///
/// The body is read raw so the signature covers exactly what Stripe sent.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let outcome = WebhookService::new(
        state.pool(),
        state.stripe(),
        &state.config().stripe.webhook_secret,
    )
    .handle(&body, signature)
    .await?;
    debug!(?outcome, "Webhook handled");

    Ok(Json(json!({ "status": "success" })))
}
