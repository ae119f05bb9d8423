//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Responses carry a JSON body `{"error": "<message>"}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::cart::CartError;
use crate::services::catalog::CatalogError;
use crate::services::ecosystem::EcosystemError;
use crate::services::orders::OrderError;
use crate::services::payments::PaymentError;
use crate::services::webhook::WebhookError;
use crate::stripe::StripeError;

const INTERNAL_MESSAGE: &str = "Internal server error";
const PROVIDER_MESSAGE: &str = "Payment provider error";

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Webhook(#[from] WebhookError),

    #[error(transparent)]
    Ecosystem(#[from] EcosystemError),

    /// Stripe API call failed.
    #[error("Stripe error: {0}")]
    Stripe(#[from] StripeError),

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but lacking staff rights.
    #[error("{0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("{0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// How an error is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Client(StatusCode),
    Server,
    Upstream,
}

impl Class {
    const fn status(self) -> StatusCode {
        match self {
            Self::Client(status) => status,
            Self::Server => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream => StatusCode::BAD_GATEWAY,
        }
    }
}

const fn repository(err: &RepositoryError) -> Class {
    match err {
        RepositoryError::NotFound => Class::Client(StatusCode::NOT_FOUND),
        RepositoryError::Conflict(_) => Class::Client(StatusCode::CONFLICT),
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => Class::Server,
    }
}

const BAD_REQUEST: Class = Class::Client(StatusCode::BAD_REQUEST);
const NOT_FOUND: Class = Class::Client(StatusCode::NOT_FOUND);
const CONFLICT: Class = Class::Client(StatusCode::CONFLICT);

impl AppError {
    fn class(&self) -> Class {
        match self {
            Self::Database(err) => repository(err),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => Class::Client(StatusCode::UNAUTHORIZED),
                AuthError::UserAlreadyExists => CONFLICT,
                AuthError::WeakPassword(_) | AuthError::InvalidEmail(_) => BAD_REQUEST,
                AuthError::Repository(err) => repository(err),
                AuthError::PasswordHash => Class::Server,
            },
            Self::Catalog(err) => match err {
                CatalogError::CategoryNotFound
                | CatalogError::ProductNotFound
                | CatalogError::UnitNotFound => NOT_FOUND,
                CatalogError::UnitUnavailable => CONFLICT,
                CatalogError::InvalidOrdering(_)
                | CatalogError::InvalidPrice
                | CatalogError::InvalidQuantity
                | CatalogError::NegativeStock => BAD_REQUEST,
                CatalogError::Repository(err) => repository(err),
            },
            Self::Cart(err) => match err {
                CartError::ItemNotFound => NOT_FOUND,
                CartError::Repository(err) => repository(err),
                _ => BAD_REQUEST,
            },
            Self::Order(err) => order(err),
            Self::Payment(err) => match err {
                PaymentError::OrderNotFound | PaymentError::NotFound => NOT_FOUND,
                PaymentError::AlreadyPaid
                | PaymentError::OrderCancelled
                | PaymentError::NotRefundable
                | PaymentError::ExceedsRefundable(_)
                | PaymentError::InvalidAmount => BAD_REQUEST,
                PaymentError::Order(err) => order(err),
                PaymentError::Stripe(_) => Class::Upstream,
                PaymentError::Repository(err) => repository(err),
            },
            Self::Webhook(err) => match err {
                WebhookError::MissingSignature
                | WebhookError::InvalidSignature(_)
                | WebhookError::InvalidPayload => BAD_REQUEST,
                WebhookError::PaymentNotFound => NOT_FOUND,
                WebhookError::Order(err) => order(err),
                WebhookError::Ecosystem(err) => ecosystem(err),
                WebhookError::Stripe(_) => Class::Upstream,
                WebhookError::Repository(err) => repository(err),
            },
            Self::Ecosystem(err) => ecosystem(err),
            Self::Stripe(_) => Class::Upstream,
            Self::NotFound(_) => NOT_FOUND,
            Self::Unauthorized(_) => Class::Client(StatusCode::UNAUTHORIZED),
            Self::Forbidden(_) => Class::Client(StatusCode::FORBIDDEN),
            Self::BadRequest(_) => BAD_REQUEST,
            Self::RateLimited => Class::Client(StatusCode::TOO_MANY_REQUESTS),
            Self::Internal(_) => Class::Server,
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.class().status()
    }

    fn public_message(&self, class: Class) -> String {
        match class {
            Class::Server => INTERNAL_MESSAGE.to_string(),
            Class::Upstream => PROVIDER_MESSAGE.to_string(),
            Class::Client(_) => match self {
                Self::Database(err) => repository_message(err),
                Self::Auth(AuthError::InvalidCredentials) => "Invalid credentials".to_string(),
                Self::Auth(AuthError::UserAlreadyExists) => {
                    "An account with this email already exists".to_string()
                }
                Self::Auth(AuthError::WeakPassword(msg)) => msg.clone(),
                Self::Auth(AuthError::InvalidEmail(_)) => "Invalid email address".to_string(),
                Self::Auth(AuthError::Repository(err))
                | Self::Catalog(CatalogError::Repository(err))
                | Self::Cart(CartError::Repository(err)) => repository_message(err),
                _ => self.to_string(),
            },
        }
    }
}

const fn order(err: &OrderError) -> Class {
    match err {
        OrderError::EmptyCart
        | OrderError::Unavailable(_)
        | OrderError::UnitUnavailable(_)
        | OrderError::UnitQuantity(_) => BAD_REQUEST,
        OrderError::NotFound => NOT_FOUND,
        OrderError::NotCancellable => BAD_REQUEST,
        OrderError::Transition(_) => CONFLICT,
        OrderError::OrderNumberExhausted => Class::Server,
        OrderError::Stripe(_) => Class::Upstream,
        OrderError::Repository(err) => repository(err),
    }
}

const fn ecosystem(err: &EcosystemError) -> Class {
    match err {
        EcosystemError::TreeNotFound => NOT_FOUND,
        EcosystemError::NicknameTooLong => BAD_REQUEST,
        EcosystemError::TreeNumberExhausted => Class::Server,
        EcosystemError::Repository(err) => repository(err),
    }
}

fn repository_message(err: &RepositoryError) -> String {
    match err {
        RepositoryError::NotFound => "Not found".to_string(),
        RepositoryError::Conflict(msg) => msg.clone(),
        _ => INTERNAL_MESSAGE.to_string(),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let class = self.class();

        // Capture server errors to Sentry
        if !matches!(class, Class::Client(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let body = serde_json::json!({ "error": self.public_message(class) });
        (class.status(), Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for checkout, payment, and adoption steps.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Order created", Some(&[("order_number", "NM-20260101-0001")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;
    use rust_decimal::Decimal;

    use super::*;
    use crate::stripe::SignatureError;

    async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            AppError::NotFound("test".to_string()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Unauthorized("test".to_string()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Forbidden("test".to_string()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(AppError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            AppError::from(OrderError::Transition(
                nature_marketplace_core::OrderStatus::Fulfilled
                    .transition(nature_marketplace_core::OrderStatus::Paid)
                    .unwrap_err()
            ))
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(AuthError::UserAlreadyExists).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(RepositoryError::Conflict("slug taken".to_string())).status(),
            StatusCode::CONFLICT
        );
    }

    #[tokio::test]
    async fn test_client_errors_keep_their_message() {
        let (status, body) = body_of(PaymentError::ExceedsRefundable(Decimal::new(4000, 2)).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Maximum refundable amount is 40.00");

        let (status, body) = body_of(WebhookError::InvalidSignature(SignatureError::Stale).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid signature");
    }

    #[tokio::test]
    async fn test_server_errors_hide_details() {
        let (status, body) = body_of(AppError::Internal("pool exhausted".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");

        let stripe = StripeError::Api {
            status: 402,
            message: "Your card was declined.".to_string(),
            code: Some("card_declined".to_string()),
        };
        let (status, body) = body_of(PaymentError::Stripe(stripe).into()).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Payment provider error");
    }
}
