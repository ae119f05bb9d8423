//! Profile preferences and gamification levels.

use serde::{Deserialize, Serialize};

/// UI theme preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "marketplace.theme", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Dark,
    Light,
    System,
}

str_enum!(Theme, "theme", {
    Dark => "dark",
    Light => "light",
    System => "system",
});

/// Gamification level, derived from lifetime points.
///
/// | Level          | Points from | Next at |
/// |----------------|-------------|---------|
/// | Seed           | 0           | 100     |
/// | Sprout         | 100         | 500     |
/// | Sapling        | 500         | 1500    |
/// | Earth Guardian | 1500        | 5000    |
/// | Forest Master  | 5000        | 999999  |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "marketplace.profile_level", rename_all = "snake_case")
)]
pub enum ProfileLevel {
    #[default]
    Seed,
    Sprout,
    Sapling,
    #[serde(rename = "Earth Guardian")]
    EarthGuardian,
    #[serde(rename = "Forest Master")]
    ForestMaster,
}

str_enum!(ProfileLevel, "profile level", {
    Seed => "Seed",
    Sprout => "Sprout",
    Sapling => "Sapling",
    EarthGuardian => "Earth Guardian",
    ForestMaster => "Forest Master",
});

impl ProfileLevel {
    /// Sentinel upper bound for the top level.
    pub const MAX_THRESHOLD: i32 = 999_999;

    /// Level for a lifetime points total.
    #[must_use]
    pub const fn for_points(total_points: i32) -> Self {
        match total_points {
            i32::MIN..100 => Self::Seed,
            100..500 => Self::Sprout,
            500..1500 => Self::Sapling,
            1500..5000 => Self::EarthGuardian,
            _ => Self::ForestMaster,
        }
    }

    /// Lifetime points at which this level starts.
    #[must_use]
    pub const fn min_points(self) -> i32 {
        match self {
            Self::Seed => 0,
            Self::Sprout => 100,
            Self::Sapling => 500,
            Self::EarthGuardian => 1500,
            Self::ForestMaster => 5000,
        }
    }

    /// Lifetime points at which the next level starts.
    #[must_use]
    pub const fn next_threshold(self) -> i32 {
        match self {
            Self::Seed => 100,
            Self::Sprout => 500,
            Self::Sapling => 1500,
            Self::EarthGuardian => 5000,
            Self::ForestMaster => Self::MAX_THRESHOLD,
        }
    }

    /// Percentage of the way from this level's floor to the next threshold.
    ///
    /// Truncates toward zero and is clamped to `0..=100`.
    #[must_use]
    pub fn progress_percent(self, total_points: i32) -> u8 {
        let min = i64::from(self.min_points());
        let span = i64::from(self.next_threshold()) - min;
        let earned = (i64::from(total_points) - min).max(0);
        let percent = (earned * 100 / span).min(100);
        u8::try_from(percent).unwrap_or(100)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_for_points_boundaries() {
        assert_eq!(ProfileLevel::for_points(0), ProfileLevel::Seed);
        assert_eq!(ProfileLevel::for_points(99), ProfileLevel::Seed);
        assert_eq!(ProfileLevel::for_points(100), ProfileLevel::Sprout);
        assert_eq!(ProfileLevel::for_points(1499), ProfileLevel::Sapling);
        assert_eq!(ProfileLevel::for_points(1500), ProfileLevel::EarthGuardian);
        assert_eq!(ProfileLevel::for_points(5000), ProfileLevel::ForestMaster);
    }

    #[test]
    fn test_thresholds_agree_across_levels() {
        for pair in ProfileLevel::ALL.windows(2) {
            let (lower, upper) = (pair[0], pair[1]);
            assert!(lower < upper);
            assert_eq!(lower.next_threshold(), upper.min_points());
            assert_eq!(ProfileLevel::for_points(upper.min_points() - 1), lower);
        }
        for level in ProfileLevel::ALL {
            assert_eq!(ProfileLevel::for_points(level.min_points()), *level);
        }
    }

    #[test]
    fn test_progress_percent() {
        assert_eq!(ProfileLevel::Seed.progress_percent(50), 50);
        assert_eq!(ProfileLevel::Sprout.progress_percent(300), 50);
        // 1499 is 99.9% of the way to 1500: truncated
        assert_eq!(ProfileLevel::Sapling.progress_percent(1499), 99);
        assert_eq!(ProfileLevel::ForestMaster.progress_percent(5000), 0);
        assert_eq!(ProfileLevel::Seed.progress_percent(250), 100);
    }

    #[test]
    fn test_level_serializes_with_spaces() {
        assert_eq!(
            serde_json::to_string(&ProfileLevel::EarthGuardian).unwrap(),
            "\"Earth Guardian\""
        );
        assert_eq!(
            "Forest Master".parse::<ProfileLevel>().unwrap(),
            ProfileLevel::ForestMaster
        );
    }
}
