//! Account routes: register, login, logout, and the current user.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;
use tracing::{info, warn};

use crate::db::{CartRepository, UserRepository};
use crate::error::{AppError, Result, add_breadcrumb, clear_sentry_user};
use crate::middleware::auth::session_error;
use crate::middleware::{RequireAuth, clear_current_user, set_current_user};
use crate::models::{CurrentUser, User, session_keys};
use crate::services::auth::{AuthService, Registration};
use crate::state::AppState;

/// Body of `POST /api/auth/register`.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Body of `POST /api/auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Create an account and log it in.
///
/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>)> {
    let user = AuthService::new(state.pool())
        .register(Registration {
            email: &body.email,
            password: &body.password,
            first_name: body.first_name.trim(),
            last_name: body.last_name.trim(),
        })
        .await?;

    start_session(&state, &session, &user).await?;
    info!(user_id = %user.id, "Account registered");

    Ok((StatusCode::CREATED, Json(user)))
}

/// Log in with email and password.
///
/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> Result<Json<User>> {
    let user = AuthService::new(state.pool())
        .login(&body.email, &body.password)
        .await?;

    start_session(&state, &session, &user).await?;
    add_breadcrumb("auth", "Logged in", None);

    Ok(Json(user))
}

/// End the session.
///
/// POST /api/auth/logout
pub async fn logout(session: Session) -> Result<Json<serde_json::Value>> {
    clear_current_user(&session).await.map_err(session_error)?;
    clear_sentry_user();

    Ok(Json(json!({ "status": "logged_out" })))
}

/// The logged-in account.
///
/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<User>> {
    let user = UserRepository::new(state.pool())
        .get_by_id(current.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

    Ok(Json(user))
}

/// Store the user in the session and fold in their anonymous cart.
///
/// A failed merge is logged and does not fail the login.
async fn start_session(state: &AppState, session: &Session, user: &User) -> Result<()> {
    let cart_key = session
        .get::<String>(session_keys::CART_KEY)
        .await
        .map_err(session_error)?;

    set_current_user(session, &CurrentUser::from(user))
        .await
        .map_err(session_error)?;

    if let Some(key) = cart_key {
        match CartRepository::new(state.pool())
            .merge_session_cart(&key, user.id)
            .await
        {
            Ok(_) => {
                session
                    .remove::<String>(session_keys::CART_KEY)
                    .await
                    .map_err(session_error)?;
            }
            Err(e) => warn!(error = %e, "Failed to merge anonymous cart"),
        }
    }

    Ok(())
}
