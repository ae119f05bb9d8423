//! Profiles, points, and badges.

use serde::Deserialize;
use sqlx::{PgConnection, PgExecutor, PgPool};

use nature_marketplace_core::{BadgeId, CurrencyCode, ProfileId, ProfileLevel, Theme, UserId};

use super::RepositoryError;
use crate::models::profile::{Badge, EarnedBadge, UserProfile};

const PROFILE_COLUMNS: &str = r"
    id, user_id, display_name, photo_url, theme, currency, notify_email, notify_push,
    notify_tree_updates, level, current_points, total_points_earned, created_at, updated_at
";

const BADGE_COLUMNS: &str = "id, name, description, icon, points_value";

/// Profile fields a user may edit.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

/// Preference fields a user may edit.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreferencesPatch {
    pub theme: Option<Theme>,
    pub currency: Option<CurrencyCode>,
    pub notify_email: Option<bool>,
    pub notify_push: Option<bool>,
    pub notify_tree_updates: Option<bool>,
}

/// Level before and after a points change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointsChange {
    pub old_level: ProfileLevel,
    pub new_level: ProfileLevel,
    pub total_points_earned: i32,
}

/// Repository for profile reads and user edits.
pub struct ProfileRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProfileRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's profile, created with `display_name` on first access.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_or_create(
        &self,
        user_id: UserId,
        display_name: &str,
    ) -> Result<UserProfile, RepositoryError> {
        get_or_create_profile(self.pool, user_id, display_name).await
    }

    /// Update display name and photo.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the profile doesn't exist.
    pub async fn update(
        &self,
        profile_id: ProfileId,
        patch: &ProfilePatch,
    ) -> Result<UserProfile, RepositoryError> {
        sqlx::query_as::<_, UserProfile>(&format!(
            r"
            UPDATE marketplace.user_profile
            SET display_name = COALESCE($2, display_name),
                photo_url = COALESCE($3, photo_url),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PROFILE_COLUMNS}
            "
        ))
        .bind(profile_id)
        .bind(patch.display_name.as_deref())
        .bind(patch.photo_url.as_deref())
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Update display and notification preferences.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the profile doesn't exist.
    pub async fn update_preferences(
        &self,
        profile_id: ProfileId,
        patch: &PreferencesPatch,
    ) -> Result<UserProfile, RepositoryError> {
        sqlx::query_as::<_, UserProfile>(&format!(
            r"
            UPDATE marketplace.user_profile
            SET theme = COALESCE($2, theme),
                currency = COALESCE($3, currency),
                notify_email = COALESCE($4, notify_email),
                notify_push = COALESCE($5, notify_push),
                notify_tree_updates = COALESCE($6, notify_tree_updates),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PROFILE_COLUMNS}
            "
        ))
        .bind(profile_id)
        .bind(patch.theme)
        .bind(patch.currency)
        .bind(patch.notify_email)
        .bind(patch.notify_push)
        .bind(patch.notify_tree_updates)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Badges a profile has earned, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn earned_badges(&self, profile_id: ProfileId) -> Result<Vec<EarnedBadge>, RepositoryError> {
        let badges = sqlx::query_as::<_, EarnedBadge>(
            r"
            SELECT b.id, b.name, b.description, b.icon, b.points_value, ub.earned_at
            FROM marketplace.user_badge ub
            JOIN marketplace.badge b ON b.id = ub.badge_id
            WHERE ub.profile_id = $1
            ORDER BY ub.earned_at DESC, b.id
            ",
        )
        .bind(profile_id)
        .fetch_all(self.pool)
        .await?;

        Ok(badges)
    }

    /// The full badge catalog.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn all_badges(&self) -> Result<Vec<Badge>, RepositoryError> {
        let badges = sqlx::query_as::<_, Badge>(&format!(
            "SELECT {BADGE_COLUMNS} FROM marketplace.badge ORDER BY points_value, name"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(badges)
    }
}

/// Profile for a user inside a transaction, created on first access.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get_or_create(
    conn: &mut PgConnection,
    user_id: UserId,
    display_name: &str,
) -> Result<UserProfile, RepositoryError> {
    get_or_create_profile(conn, user_id, display_name).await
}

/// Add `points` to a profile and recompute its level under a row lock.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the profile doesn't exist.
pub async fn add_points(
    conn: &mut PgConnection,
    profile_id: ProfileId,
    points: i32,
) -> Result<PointsChange, RepositoryError> {
    let (old_level, total): (ProfileLevel, i32) = sqlx::query_as(
        r"
        SELECT level, total_points_earned
        FROM marketplace.user_profile
        WHERE id = $1
        FOR UPDATE
        ",
    )
    .bind(profile_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    let total_points_earned = total.saturating_add(points);
    let new_level = ProfileLevel::for_points(total_points_earned);

    sqlx::query(
        r"
        UPDATE marketplace.user_profile
        SET current_points = current_points + $2,
            total_points_earned = $3,
            level = $4,
            updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(profile_id)
    .bind(points)
    .bind(total_points_earned)
    .bind(new_level)
    .execute(&mut *conn)
    .await?;

    Ok(PointsChange {
        old_level,
        new_level,
        total_points_earned,
    })
}

/// Badge by name.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn badge_by_name(conn: &mut PgConnection, name: &str) -> Result<Option<Badge>, RepositoryError> {
    let badge = sqlx::query_as::<_, Badge>(&format!(
        "SELECT {BADGE_COLUMNS} FROM marketplace.badge WHERE name = $1"
    ))
    .bind(name)
    .fetch_optional(conn)
    .await?;

    Ok(badge)
}

/// Record a badge for a profile. Returns `false` if it was already earned.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn insert_user_badge(
    conn: &mut PgConnection,
    profile_id: ProfileId,
    badge_id: BadgeId,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        INSERT INTO marketplace.user_badge (profile_id, badge_id)
        VALUES ($1, $2)
        ON CONFLICT (profile_id, badge_id) DO NOTHING
        ",
    )
    .bind(profile_id)
    .bind(badge_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Number of badges a profile has earned.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn badge_count(pool: &PgPool, profile_id: ProfileId) -> Result<i64, RepositoryError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM marketplace.user_badge WHERE profile_id = $1")
            .bind(profile_id)
            .fetch_one(pool)
            .await?;

    Ok(count)
}

async fn get_or_create_profile<'e, E: PgExecutor<'e>>(
    executor: E,
    user_id: UserId,
    display_name: &str,
) -> Result<UserProfile, RepositoryError> {
    let profile = sqlx::query_as::<_, UserProfile>(&format!(
        r"
        INSERT INTO marketplace.user_profile AS p (user_id, display_name)
        VALUES ($1, $2)
        ON CONFLICT (user_id) DO UPDATE SET updated_at = p.updated_at
        RETURNING {PROFILE_COLUMNS}
        "
    ))
    .bind(user_id)
    .bind(display_name)
    .fetch_one(executor)
    .await?;

    Ok(profile)
}
