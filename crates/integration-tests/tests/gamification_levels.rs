//! Level thresholds and progress reporting.

use nature_marketplace_api::models::profile::LevelInfo;
use nature_marketplace_core::ProfileLevel;

#[test]
fn each_threshold_starts_the_next_level() {
    let mut level = ProfileLevel::Seed;
    while level != ProfileLevel::ForestMaster {
        let next = ProfileLevel::for_points(level.next_threshold());
        assert_eq!(next.min_points(), level.next_threshold());
        assert_eq!(ProfileLevel::for_points(level.next_threshold() - 1), level);
        level = next;
    }
}

#[test]
fn fifty_point_adoptions_climb_levels() {
    // Two adoptions reach Sprout, ten reach Sapling
    assert_eq!(ProfileLevel::for_points(2 * 50), ProfileLevel::Sprout);
    assert_eq!(ProfileLevel::for_points(10 * 50), ProfileLevel::Sapling);
}

#[test]
fn level_info_for_a_sprout() {
    let info = LevelInfo::new(ProfileLevel::Sprout, 180, 300);

    assert_eq!(info.min_points, 100);
    assert_eq!(info.max_points, 500);
    assert_eq!(info.next_level_threshold, 500);
    assert_eq!(info.progress_percent, 50);
    assert_eq!(info.current_points, 180);
}

#[test]
fn level_info_at_the_top() {
    let info = LevelInfo::new(ProfileLevel::ForestMaster, 7000, 7000);

    assert_eq!(info.next_level_threshold, ProfileLevel::MAX_THRESHOLD);
    assert!(info.progress_percent < 100);
}

#[test]
fn level_info_serializes_level_name() {
    let info = LevelInfo::new(ProfileLevel::EarthGuardian, 1600, 1600);
    let json = serde_json::to_value(info).unwrap();

    assert_eq!(json["level"], "Earth Guardian");
    assert_eq!(json["min_points"], 1500);
}
