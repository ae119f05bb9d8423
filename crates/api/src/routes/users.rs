//! Profile, preference, stats, and badge routes.
//!
//! The profile is created on first access with the email local part as
//! its display name.

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::db::profiles::{self, PreferencesPatch, ProfilePatch};
use crate::db::{PaymentRepository, ProfileRepository, TreeRepository, UserRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::profile::{Badge, EarnedBadge, LevelInfo, Preferences, UserProfile};
use crate::models::tree::ForestStats;
use crate::models::{CurrentUser, User};
use crate::state::AppState;

/// Everything the profile page shows at once.
#[derive(Debug, Serialize)]
pub struct FullProfile {
    pub user: User,
    pub profile: UserProfile,
    pub level: LevelInfo,
    pub forest: ForestStats,
    pub badges: Vec<EarnedBadge>,
}

/// Level progress merged with forest figures.
#[derive(Debug, Serialize)]
pub struct UserStats {
    #[serde(flatten)]
    pub level: LevelInfo,
    #[serde(flatten)]
    pub forest: ForestStats,
    pub badge_count: i64,
    /// Captured payments net of refunds.
    pub total_spent: Decimal,
}

async fn profile_for(state: &AppState, user: &CurrentUser) -> Result<UserProfile> {
    Ok(ProfileRepository::new(state.pool())
        .get_or_create(user.id, user.email.local_part())
        .await?)
}

async fn forest_for(state: &AppState, user: &CurrentUser) -> Result<ForestStats> {
    let (count, co2) = TreeRepository::new(state.pool()).stats(user.id).await?;
    Ok(ForestStats::new(count, co2))
}

/// GET /api/users/profile
pub async fn profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<UserProfile>> {
    Ok(Json(profile_for(&state, &user).await?))
}

/// PATCH /api/users/profile
pub async fn update_profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<ProfilePatch>,
) -> Result<Json<UserProfile>> {
    if body
        .display_name
        .as_deref()
        .is_some_and(|name| name.trim().is_empty())
    {
        return Err(AppError::BadRequest(
            "Display name cannot be blank".to_string(),
        ));
    }

    let profile = profile_for(&state, &user).await?;
    let updated = ProfileRepository::new(state.pool())
        .update(profile.id, &body)
        .await?;
    Ok(Json(updated))
}

/// GET /api/users/profile/full
pub async fn full_profile(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<FullProfile>> {
    let user = UserRepository::new(state.pool())
        .get_by_id(current.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;
    let profile = profile_for(&state, &current).await?;
    let badges = ProfileRepository::new(state.pool())
        .earned_badges(profile.id)
        .await?;

    Ok(Json(FullProfile {
        level: profile.level_info(),
        forest: forest_for(&state, &current).await?,
        user,
        profile,
        badges,
    }))
}

/// GET /api/users/preferences
pub async fn preferences(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Preferences>> {
    Ok(Json(profile_for(&state, &user).await?.preferences()))
}

/// PATCH /api/users/preferences
pub async fn update_preferences(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<PreferencesPatch>,
) -> Result<Json<Preferences>> {
    let profile = profile_for(&state, &user).await?;
    let updated = ProfileRepository::new(state.pool())
        .update_preferences(profile.id, &body)
        .await?;
    Ok(Json(updated.preferences()))
}

/// GET /api/users/stats
pub async fn stats(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<UserStats>> {
    let profile = profile_for(&state, &user).await?;
    let badge_count = profiles::badge_count(state.pool(), profile.id).await?;

    Ok(Json(UserStats {
        level: profile.level_info(),
        forest: forest_for(&state, &user).await?,
        badge_count,
        total_spent: PaymentRepository::new(state.pool())
            .user_total_spent(user.id)
            .await?,
    }))
}

/// The caller's badges, newest first.
///
/// GET /api/users/badges
pub async fn badges(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<EarnedBadge>>> {
    let profile = profile_for(&state, &user).await?;
    Ok(Json(
        ProfileRepository::new(state.pool())
            .earned_badges(profile.id)
            .await?,
    ))
}

/// The badge catalog.
///
/// GET /api/users/badges/all
pub async fn all_badges(
    State(state): State<AppState>,
    RequireAuth(_): RequireAuth,
) -> Result<Json<Vec<Badge>>> {
    Ok(Json(ProfileRepository::new(state.pool()).all_badges().await?))
}
