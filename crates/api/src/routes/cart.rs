//! Cart routes. Anonymous visitors get a session-keyed cart.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use nature_marketplace_core::ProductId;

use crate::error::Result;
use crate::middleware::CartIdentity;
use crate::models::cart::{CartSummary, CartView};
use crate::services::cart::{AddToCart, CartService};
use crate::state::AppState;

/// Body of `PATCH /api/cart/items/{product_id}`.
#[derive(Debug, Deserialize)]
pub struct QuantityUpdate {
    pub quantity: i32,
}

/// GET /api/cart
pub async fn show(
    State(state): State<AppState>,
    CartIdentity(owner): CartIdentity,
) -> Result<Json<CartView>> {
    Ok(Json(CartService::new(state.pool()).get(&owner).await?))
}

/// GET /api/cart/summary
pub async fn summary(
    State(state): State<AppState>,
    CartIdentity(owner): CartIdentity,
) -> Result<Json<CartSummary>> {
    Ok(Json(CartService::new(state.pool()).summary(&owner).await?))
}

/// Add a product, or increase the quantity of an existing line.
///
/// POST /api/cart/add
pub async fn add(
    State(state): State<AppState>,
    CartIdentity(owner): CartIdentity,
    Json(body): Json<AddToCart>,
) -> Result<(StatusCode, Json<CartView>)> {
    let cart = CartService::new(state.pool()).add(&owner, &body).await?;
    Ok((StatusCode::CREATED, Json(cart)))
}

/// Set a line's quantity. Zero removes the line.
///
/// PATCH /api/cart/items/{product_id}
pub async fn update(
    State(state): State<AppState>,
    CartIdentity(owner): CartIdentity,
    Path(product_id): Path<ProductId>,
    Json(body): Json<QuantityUpdate>,
) -> Result<Json<CartView>> {
    let cart = CartService::new(state.pool())
        .update_quantity(&owner, product_id, body.quantity)
        .await?;
    Ok(Json(cart))
}

/// DELETE /api/cart/items/{product_id}
pub async fn remove(
    State(state): State<AppState>,
    CartIdentity(owner): CartIdentity,
    Path(product_id): Path<ProductId>,
) -> Result<Json<CartView>> {
    let cart = CartService::new(state.pool())
        .remove(&owner, product_id)
        .await?;
    Ok(Json(cart))
}

/// DELETE /api/cart
pub async fn clear(
    State(state): State<AppState>,
    CartIdentity(owner): CartIdentity,
) -> Result<Json<CartView>> {
    Ok(Json(CartService::new(state.pool()).clear(&owner).await?))
}
