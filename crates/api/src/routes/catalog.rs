//! Catalog routes: categories, products, and sponsorship units.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use nature_marketplace_core::ProductType;

use crate::db::catalog::{NewProduct, NewProductImage, NewProductUpdate, ProductPatch};
use crate::db::units::NewUnitUpdate;
use crate::error::Result;
use crate::middleware::{OptionalAuth, RequireStaff};
use crate::models::catalog::{Category, ProductDetail, ProductImage, ProductSummary, ProductUpdate};
use crate::models::unit::{UnitDetail, UnitSummary, UnitUpdate};
use crate::services::catalog::{
    Availability, CatalogService, Page, Paginated, ProductQuery, UnitInput,
};
use crate::state::AppState;

/// `?page=&page_size=`
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// `?limit=`
#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

/// `?quantity=`
#[derive(Debug, Default, Deserialize)]
pub struct AvailabilityQuery {
    pub quantity: Option<i32>,
}

/// `?status=available`
#[derive(Debug, Default, Deserialize)]
pub struct UnitsQuery {
    pub status: Option<String>,
}

fn catalog(state: &AppState) -> CatalogService<'_> {
    CatalogService::new(state.pool(), state.cache())
}

// =============================================================================
// Categories
// =============================================================================

/// GET /api/categories
pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    Ok(Json(catalog(&state).categories().await?))
}

/// GET /api/categories/{slug}
pub async fn category(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Category>> {
    Ok(Json(catalog(&state).category(&slug).await?))
}

/// GET /api/categories/{slug}/products
pub async fn category_products(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<ProductSummary>>> {
    let page = Page::new(query.page, query.page_size);
    Ok(Json(catalog(&state).category_products(&slug, page).await?))
}

// =============================================================================
// Products
// =============================================================================

/// Filtered, paginated product listing.
///
/// GET /api/products
pub async fn products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Paginated<ProductSummary>>> {
    Ok(Json(catalog(&state).list_products(&query).await?))
}

/// GET /api/products/featured
pub async fn featured(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<ProductSummary>>> {
    Ok(Json(catalog(&state).featured(query.limit).await?))
}

/// GET /api/products/new-arrivals
pub async fn new_arrivals(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<ProductSummary>>> {
    Ok(Json(catalog(&state).new_arrivals(query.limit).await?))
}

/// GET /api/products/trees
pub async fn trees(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Paginated<ProductSummary>>> {
    Ok(Json(
        catalog(&state)
            .list_by_type(ProductType::Tree, &query)
            .await?,
    ))
}

/// GET /api/products/retreats
pub async fn retreats(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Paginated<ProductSummary>>> {
    Ok(Json(
        catalog(&state)
            .list_by_type(ProductType::Experience, &query)
            .await?,
    ))
}

/// GET /api/products/{slug}
pub async fn product(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ProductDetail>> {
    Ok(Json(catalog(&state).product_detail(&slug).await?))
}

/// GET /api/products/{slug}/availability
pub async fn availability(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Availability>> {
    let quantity = query.quantity.unwrap_or(1);
    Ok(Json(catalog(&state).availability(&slug, quantity).await?))
}

/// POST /api/products (staff)
pub async fn create_product(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Json(body): Json<NewProduct>,
) -> Result<(StatusCode, Json<ProductDetail>)> {
    let detail = catalog(&state).create_product(body).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// PATCH /api/products/{slug} (staff)
pub async fn update_product(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(slug): Path<String>,
    Json(body): Json<ProductPatch>,
) -> Result<Json<ProductDetail>> {
    Ok(Json(catalog(&state).update_product(&slug, &body).await?))
}

/// POST /api/products/{slug}/images (staff)
pub async fn add_product_image(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(slug): Path<String>,
    Json(body): Json<NewProductImage>,
) -> Result<(StatusCode, Json<ProductImage>)> {
    let image = catalog(&state).add_image(&slug, &body).await?;
    Ok((StatusCode::CREATED, Json(image)))
}

/// POST /api/products/{slug}/updates (staff)
pub async fn add_product_update(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(slug): Path<String>,
    Json(body): Json<NewProductUpdate>,
) -> Result<(StatusCode, Json<ProductUpdate>)> {
    let update = catalog(&state).add_update(&slug, &body).await?;
    Ok((StatusCode::CREATED, Json(update)))
}

// =============================================================================
// Sponsorship units
// =============================================================================

/// Active units of a product. Location precision depends on the viewer.
///
/// GET /api/products/{slug}/units
pub async fn units(
    State(state): State<AppState>,
    OptionalAuth(viewer): OptionalAuth,
    Path(slug): Path<String>,
    Query(query): Query<UnitsQuery>,
) -> Result<Json<Vec<UnitSummary>>> {
    let only_available = query.status.as_deref() == Some("available");
    let units = catalog(&state)
        .units(&slug, only_available, viewer.map(|user| user.id))
        .await?;
    Ok(Json(units))
}

/// GET /api/units/{code}
pub async fn unit(
    State(state): State<AppState>,
    OptionalAuth(viewer): OptionalAuth,
    Path(code): Path<String>,
) -> Result<Json<UnitDetail>> {
    let detail = catalog(&state)
        .unit_detail(&code, viewer.map(|user| user.id))
        .await?;
    Ok(Json(detail))
}

/// POST /api/products/{slug}/units (staff)
pub async fn create_unit(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(slug): Path<String>,
    Json(body): Json<UnitInput>,
) -> Result<(StatusCode, Json<UnitDetail>)> {
    let detail = catalog(&state).create_unit(&slug, body, staff.id).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// POST /api/units/{code}/updates (staff)
pub async fn add_unit_update(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(code): Path<String>,
    Json(body): Json<NewUnitUpdate>,
) -> Result<(StatusCode, Json<UnitUpdate>)> {
    let update = catalog(&state)
        .add_unit_update(&code, &body, staff.id)
        .await?;
    Ok((StatusCode::CREATED, Json(update)))
}

/// POST /api/units/{code}/release (staff)
pub async fn release_unit(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(code): Path<String>,
) -> Result<Json<UnitDetail>> {
    Ok(Json(catalog(&state).release_unit(&code).await?))
}
