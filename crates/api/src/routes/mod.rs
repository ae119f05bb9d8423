//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /api/health                           - Service identity
//!
//! # Auth (strict rate limit)
//! POST /api/auth/register                    - Create account and log in
//! POST /api/auth/login                       - Log in
//! POST /api/auth/logout                      - Log out
//! GET  /api/auth/me                          - Current account
//!
//! # Catalog
//! GET  /api/categories[/{slug}[/products]]
//! GET  /api/products[/featured|/new-arrivals|/trees|/retreats]
//! GET  /api/products/{slug}[/availability|/units]
//! GET  /api/units/{code}
//! POST /api/products, PATCH /api/products/{slug}              - Staff
//! POST /api/products/{slug}/images|updates|units              - Staff
//! POST /api/units/{code}/updates|release                      - Staff
//!
//! # Cart (user or session)
//! GET  /api/cart, GET /api/cart/summary, POST /api/cart/add
//! PATCH|DELETE /api/cart/items/{product_id}, DELETE /api/cart
//!
//! # Orders
//! GET|POST /api/orders, GET /api/orders/{id}, POST /api/orders/{id}/cancel
//! GET  /api/orders/by-number/{number}
//! GET  /api/admin/orders, POST /api/admin/orders/{id}/status  - Staff
//!
//! # Payments
//! POST /api/payments/checkout|intent
//! GET  /api/payments/status/{order_id}, GET /api/payments/history
//! POST /api/payments/{id}/refund                              - Staff
//! GET  /api/admin/payments/stats                              - Staff
//! POST /api/payments/webhook                                  - Stripe, no rate limit
//!
//! # Ecosystems
//! GET  /api/ecosystems/trees[/stats]
//! GET|PATCH /api/ecosystems/trees/{id}
//! GET  /api/ecosystems/trees/{id}/timeline|gallery
//! POST /api/ecosystems/trees/{id}/events|images               - Staff
//! PATCH /api/ecosystems/trees/{id}/metrics                    - Staff
//!
//! # Users
//! GET|PATCH /api/users/profile, GET /api/users/profile/full
//! GET|PATCH /api/users/preferences, GET /api/users/stats
//! GET  /api/users/badges[/all]
//! ```

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod ecosystems;
pub mod orders;
pub mod payments;
pub mod users;

use axum::{
    Json, Router,
    routing::{get, patch, post},
};
use serde_json::json;

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Service name reported by `/api/health`.
pub const SERVICE_NAME: &str = "nature-marketplace-api";

/// GET /api/health
pub async fn api_health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "service": SERVICE_NAME }))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
}

/// Create the category routes router.
pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(catalog::categories))
        .route("/{slug}", get(catalog::category))
        .route("/{slug}/products", get(catalog::category_products))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(catalog::products).post(catalog::create_product))
        .route("/featured", get(catalog::featured))
        .route("/new-arrivals", get(catalog::new_arrivals))
        .route("/trees", get(catalog::trees))
        .route("/retreats", get(catalog::retreats))
        .route(
            "/{slug}",
            get(catalog::product).patch(catalog::update_product),
        )
        .route("/{slug}/availability", get(catalog::availability))
        .route("/{slug}/images", post(catalog::add_product_image))
        .route("/{slug}/updates", post(catalog::add_product_update))
        .route(
            "/{slug}/units",
            get(catalog::units).post(catalog::create_unit),
        )
}

/// Create the sponsorship unit routes router.
pub fn unit_routes() -> Router<AppState> {
    Router::new()
        .route("/{code}", get(catalog::unit))
        .route("/{code}/updates", post(catalog::add_unit_update))
        .route("/{code}/release", post(catalog::release_unit))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/summary", get(cart::summary))
        .route("/add", post(cart::add))
        .route(
            "/items/{product_id}",
            patch(cart::update).delete(cart::remove),
        )
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::list).post(orders::create))
        .route("/by-number/{number}", get(orders::by_number))
        .route("/{id}", get(orders::show))
        .route("/{id}/cancel", post(orders::cancel))
}

/// Create the staff routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(orders::admin_list))
        .route("/orders/{id}/status", post(orders::admin_update_status))
        .route("/payments/stats", get(payments::admin_stats))
}

/// Create the payment routes router, without the webhook.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/checkout", post(payments::checkout))
        .route("/intent", post(payments::intent))
        .route("/status/{order_id}", get(payments::status))
        .route("/history", get(payments::history))
        .route("/{id}/refund", post(payments::refund))
}

/// Create the ecosystem routes router.
pub fn ecosystem_routes() -> Router<AppState> {
    Router::new()
        .route("/trees", get(ecosystems::list))
        .route("/trees/stats", get(ecosystems::stats))
        .route(
            "/trees/{id}",
            get(ecosystems::show).patch(ecosystems::update),
        )
        .route("/trees/{id}/timeline", get(ecosystems::timeline))
        .route("/trees/{id}/gallery", get(ecosystems::gallery))
        .route("/trees/{id}/events", post(ecosystems::add_event))
        .route("/trees/{id}/images", post(ecosystems::add_image))
        .route("/trees/{id}/metrics", patch(ecosystems::update_metrics))
}

/// Create the user routes router.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/profile",
            get(users::profile).patch(users::update_profile),
        )
        .route("/profile/full", get(users::full_profile))
        .route(
            "/preferences",
            get(users::preferences).patch(users::update_preferences),
        )
        .route("/stats", get(users::stats))
        .route("/badges", get(users::badges))
        .route("/badges/all", get(users::all_badges))
}

/// Create all `/api` routes.
///
/// Login and registration get the strict limiter, everything else except
/// the Stripe webhook gets the general one.
pub fn routes() -> Router<AppState> {
    let limited = Router::new()
        .nest("/categories", category_routes())
        .nest("/products", product_routes())
        .nest("/units", unit_routes())
        .nest("/cart", cart_routes())
        .nest("/orders", order_routes())
        .nest("/admin", admin_routes())
        .nest("/payments", payment_routes())
        .nest("/ecosystems", ecosystem_routes())
        .nest("/users", user_routes())
        .layer(api_rate_limiter());

    Router::new()
        .route("/health", get(api_health))
        .nest("/auth", auth_routes().layer(auth_rate_limiter()))
        .route("/payments/webhook", post(payments::webhook))
        .merge(limited)
}
