//! Points, levels, and badges.
//!
//! Everything here runs on a caller-supplied connection so awards land in
//! the same transaction as the purchase that earned them.

use sqlx::PgConnection;
use tracing::{info, warn};

use nature_marketplace_core::ProfileId;

use crate::db::RepositoryError;
use crate::db::profiles::{self, PointsChange};
use crate::models::profile::Badge;

/// Points for each adopted tree.
pub const ADOPTION_POINTS: i32 = 50;

/// Badges earned by tree count.
pub const TREE_BADGES: [(i64, &str); 3] = [
    (1, "First Tree"),
    (5, "Forest Starter"),
    (10, "Forest Guardian"),
];

/// Badges earned by lifetime points.
pub const POINT_BADGES: [(i32, &str); 3] = [
    (100, "Point Collector"),
    (500, "Point Master"),
    (1000, "Point Champion"),
];

/// Add points and recompute the level.
///
/// Non-positive amounts are ignored and return `None`.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the profile doesn't exist.
pub async fn add_points(
    conn: &mut PgConnection,
    profile_id: ProfileId,
    points: i32,
    reason: &str,
) -> Result<Option<PointsChange>, RepositoryError> {
    if points <= 0 {
        return Ok(None);
    }

    let change = profiles::add_points(conn, profile_id, points).await?;
    info!(%profile_id, points, reason, total = change.total_points_earned, "Points added");
    if change.old_level != change.new_level {
        info!(%profile_id, from = %change.old_level, to = %change.new_level, "Level up");
    }

    Ok(Some(change))
}

/// Award a badge once. Returns `None` if the profile already has it.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn award_badge(
    conn: &mut PgConnection,
    profile_id: ProfileId,
    badge: Badge,
) -> Result<Option<Badge>, RepositoryError> {
    if !profiles::insert_user_badge(conn, profile_id, badge.id).await? {
        return Ok(None);
    }

    info!(%profile_id, badge = %badge.name, "Badge earned");
    add_points(
        conn,
        profile_id,
        badge.points_value,
        &format!("Badge: {}", badge.name),
    )
    .await?;

    Ok(Some(badge))
}

/// Award a badge by name. Unknown names are logged and skipped.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn award_badge_by_name(
    conn: &mut PgConnection,
    profile_id: ProfileId,
    name: &str,
) -> Result<Option<Badge>, RepositoryError> {
    let Some(badge) = profiles::badge_by_name(conn, name).await? else {
        warn!(badge = name, "Badge not found");
        return Ok(None);
    };

    award_badge(conn, profile_id, badge).await
}

/// Award every points badge whose threshold `total_points` has reached.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn check_point_badges(
    conn: &mut PgConnection,
    profile_id: ProfileId,
    total_points: i32,
) -> Result<Vec<Badge>, RepositoryError> {
    let mut awarded = Vec::new();
    for name in reached(&POINT_BADGES, total_points) {
        if let Some(badge) = award_badge_by_name(conn, profile_id, name).await? {
            awarded.push(badge);
        }
    }

    Ok(awarded)
}

/// Award every tree badge whose threshold `tree_count` has reached.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn check_tree_badges(
    conn: &mut PgConnection,
    profile_id: ProfileId,
    tree_count: i64,
) -> Result<Vec<Badge>, RepositoryError> {
    let mut awarded = Vec::new();
    for name in reached(&TREE_BADGES, tree_count) {
        if let Some(badge) = award_badge_by_name(conn, profile_id, name).await? {
            awarded.push(badge);
        }
    }

    Ok(awarded)
}

fn reached<T: PartialOrd + Copy>(
    thresholds: &[(T, &'static str)],
    value: T,
) -> impl Iterator<Item = &'static str> {
    thresholds
        .iter()
        .filter(move |(threshold, _)| value >= *threshold)
        .map(|(_, name)| *name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_badge_thresholds() {
        assert!(reached(&TREE_BADGES, 0).next().is_none());
        assert_eq!(reached(&TREE_BADGES, 1).collect::<Vec<_>>(), ["First Tree"]);
        assert_eq!(
            reached(&TREE_BADGES, 7).collect::<Vec<_>>(),
            ["First Tree", "Forest Starter"]
        );
        assert_eq!(reached(&TREE_BADGES, 10).count(), 3);
    }

    #[test]
    fn test_point_badge_thresholds() {
        assert!(reached(&POINT_BADGES, 99).next().is_none());
        assert_eq!(
            reached(&POINT_BADGES, 650).collect::<Vec<_>>(),
            ["Point Collector", "Point Master"]
        );
        assert_eq!(reached(&POINT_BADGES, 1000).count(), 3);
    }
}
