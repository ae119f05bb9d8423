//! Order routes for customers and staff.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use nature_marketplace_core::OrderStatus;

use crate::error::Result;
use crate::middleware::{RequireAuth, RequireStaff};
use crate::models::order::{OrderDetail, OrderSummary};
use crate::services::orders::{CreateOrder, OrderService, StatusChange};
use crate::state::AppState;

/// `?status=&page=` on the staff listing.
#[derive(Debug, Default, Deserialize)]
pub struct AdminOrdersQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<i64>,
}

fn orders(state: &AppState) -> OrderService<'_> {
    OrderService::new(state.pool(), state.stripe())
}

/// The caller's orders, newest first.
///
/// GET /api/orders
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<OrderSummary>>> {
    Ok(Json(orders(&state).list(user.id).await?))
}

/// Turn the caller's cart into a pending order.
///
/// POST /api/orders
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    body: Option<Json<CreateOrder>>,
) -> Result<(StatusCode, Json<OrderDetail>)> {
    let input = body.map(|Json(input)| input).unwrap_or_default();
    let order = orders(&state).create_from_cart(user.id, &input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /api/orders/{id}
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderDetail>> {
    Ok(Json(orders(&state).detail(id, user.id).await?))
}

/// GET /api/orders/by-number/{number}
pub async fn by_number(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(number): Path<String>,
) -> Result<Json<OrderDetail>> {
    Ok(Json(orders(&state).by_number(&number, user.id).await?))
}

/// POST /api/orders/{id}/cancel
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderDetail>> {
    Ok(Json(orders(&state).cancel(id, user.id).await?))
}

/// GET /api/admin/orders (staff)
pub async fn admin_list(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Query(query): Query<AdminOrdersQuery>,
) -> Result<Json<Vec<OrderSummary>>> {
    let page = query.page.unwrap_or(1);
    Ok(Json(orders(&state).list_all(query.status, page).await?))
}

/// POST /api/admin/orders/{id}/status (staff)
pub async fn admin_update_status(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusChange>,
) -> Result<Json<OrderDetail>> {
    tracing::info!(staff_id = %staff.id, order_id = %id, status = %body.status, "Staff status change");
    Ok(Json(orders(&state).update_status(id, body.status).await?))
}
