//! Authentication extractors and session helpers.
//!
//! The session holds a [`CurrentUser`] after login. Staff routes re-read
//! the flag from the database so a revoked grant takes effect immediately.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;
use uuid::Uuid;

use crate::db::UserRepository;
use crate::error::{AppError, set_sentry_user};
use crate::models::cart::CartOwner;
use crate::models::{CurrentUser, session_keys};
use crate::state::AppState;

/// Extractor that requires a logged-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(user): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = session_user(parts)
            .await
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

        set_sentry_user(&user.id, Some(user.email.as_str()));
        Ok(Self(user))
    }
}

/// Extractor that optionally gets the current user.
///
/// Unlike `RequireAuth`, this does not reject anonymous requests.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(session_user(parts).await))
    }
}

/// Extractor that requires a logged-in staff member.
///
/// Anonymous requests get 401; non-staff users get 403.
pub struct RequireStaff(pub CurrentUser);

impl FromRequestParts<AppState> for RequireStaff {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;

        if !UserRepository::new(state.pool()).is_staff(user.id).await? {
            return Err(AppError::Forbidden("Staff access required".to_string()));
        }

        Ok(Self(user))
    }
}

/// Extractor resolving who owns the cart for this request.
///
/// Logged-in users own their cart by id. Anonymous visitors get a random
/// key stored in their session on first use; it survives the id cycle at login.
pub struct CartIdentity(pub CartOwner);

impl<S> FromRequestParts<S> for CartIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = session_user(parts).await {
            return Ok(Self(CartOwner::User(user.id)));
        }

        let session = parts
            .extensions
            .get::<Session>()
            .ok_or_else(|| AppError::Internal("session layer missing".to_string()))?;
        Ok(Self(CartOwner::Session(anonymous_cart_key(session).await?)))
    }
}

async fn session_user(parts: &Parts) -> Option<CurrentUser> {
    let session = parts.extensions.get::<Session>()?;
    session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
}

/// The session's anonymous cart key, created if missing.
///
/// # Errors
///
/// Returns `AppError::Internal` if the session store fails.
pub async fn anonymous_cart_key(session: &Session) -> Result<String, AppError> {
    if let Some(key) = session
        .get::<String>(session_keys::CART_KEY)
        .await
        .map_err(session_error)?
    {
        return Ok(key);
    }

    let key = Uuid::new_v4().to_string();
    session
        .insert(session_keys::CART_KEY, &key)
        .await
        .map_err(session_error)?;
    Ok(key)
}

/// Store the logged-in user in the session under a fresh session id.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Drop the whole session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be flushed.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

/// Map a session store failure to an internal error.
#[must_use]
pub fn session_error(err: tower_sessions::session::Error) -> AppError {
    AppError::Internal(format!("session error: {err}"))
}
