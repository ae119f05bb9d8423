//! Profiles, badges, and level progress.

use chrono::{DateTime, Utc};
use serde::Serialize;

use nature_marketplace_core::{BadgeId, CurrencyCode, ProfileId, ProfileLevel, Theme, UserId};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserProfile {
    pub id: ProfileId,
    pub user_id: UserId,
    pub display_name: String,
    pub photo_url: Option<String>,

    pub theme: Theme,
    pub currency: CurrencyCode,
    pub notify_email: bool,
    pub notify_push: bool,
    pub notify_tree_updates: bool,

    pub level: ProfileLevel,
    pub current_points: i32,
    pub total_points_earned: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    #[must_use]
    pub fn level_info(&self) -> LevelInfo {
        LevelInfo::new(self.level, self.current_points, self.total_points_earned)
    }

    #[must_use]
    pub const fn preferences(&self) -> Preferences {
        Preferences {
            theme: self.theme,
            currency: self.currency,
            notify_email: self.notify_email,
            notify_push: self.notify_push,
            notify_tree_updates: self.notify_tree_updates,
        }
    }
}

/// Display and notification preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Preferences {
    pub theme: Theme,
    pub currency: CurrencyCode,
    pub notify_email: bool,
    pub notify_push: bool,
    pub notify_tree_updates: bool,
}

/// Level and progress towards the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelInfo {
    pub level: ProfileLevel,
    pub current_points: i32,
    pub total_points_earned: i32,
    pub next_level_threshold: i32,
    pub progress_percent: u8,
    pub min_points: i32,
    pub max_points: i32,
}

impl LevelInfo {
    #[must_use]
    pub fn new(level: ProfileLevel, current_points: i32, total_points_earned: i32) -> Self {
        Self {
            level,
            current_points,
            total_points_earned,
            next_level_threshold: level.next_threshold(),
            progress_percent: level.progress_percent(total_points_earned),
            min_points: level.min_points(),
            max_points: level.next_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Badge {
    pub id: BadgeId,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub points_value: i32,
}

/// A badge together with when the profile earned it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EarnedBadge {
    pub id: BadgeId,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub points_value: i32,
    pub earned_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_info_for_sprout() {
        let info = LevelInfo::new(ProfileLevel::Sprout, 180, 300);
        assert_eq!(info.min_points, 100);
        assert_eq!(info.next_level_threshold, 500);
        assert_eq!(info.max_points, 500);
        // (300 - 100) / (500 - 100) = 50%
        assert_eq!(info.progress_percent, 50);
    }

    #[test]
    fn test_level_info_serializes_spaced_names() {
        let info = LevelInfo::new(ProfileLevel::EarthGuardian, 0, 1500);
        let json = serde_json::to_value(info).unwrap_or_default();
        assert_eq!(json["level"], "Earth Guardian");
        assert_eq!(json["progress_percent"], 0);
    }
}
