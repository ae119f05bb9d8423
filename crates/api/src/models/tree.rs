//! Adopted trees, their timelines and galleries.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use uuid::Uuid;

use nature_marketplace_core::{
    GalleryImageId, OrderItemId, ProductId, TimelineEventId, TimelineEventType, TreeStatus, UserId,
};

/// Days per year used for tree age.
const DAYS_PER_YEAR: Decimal = Decimal::from_parts(36525, 0, 0, false, 2);

/// Miles driven by an average car per kilogram of CO₂.
const CAR_MILES_PER_KG: Decimal = Decimal::from_parts(25, 0, 0, false, 1);

/// Prefix used in tree numbers when the species is blank.
pub const DEFAULT_TREE_PREFIX: &str = "TRE";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AdoptedTree {
    pub id: Uuid,
    pub tree_number: String,
    pub user_id: UserId,
    pub product_id: Option<ProductId>,
    pub product_title: Option<String>,
    pub product_slug: Option<String>,
    pub order_item_id: Option<OrderItemId>,

    pub nickname: String,
    pub species: String,
    pub status: TreeStatus,
    pub location_name: String,
    pub latitude: Decimal,
    pub longitude: Decimal,

    pub age_days: i32,
    pub height_cm: Decimal,
    pub co2_offset_kg: Decimal,
    pub certificate_url: Option<String>,

    pub adoption_date: NaiveDate,
    pub planted_date: Option<NaiveDate>,
    pub primary_image_url: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AdoptedTree {
    /// Age in years, one decimal place.
    #[must_use]
    pub fn age_years(&self) -> Decimal {
        (Decimal::from(self.age_days) / DAYS_PER_YEAR).round_dp(1)
    }

    /// Nickname when set, else the species.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.nickname.trim().is_empty() {
            &self.species
        } else {
            &self.nickname
        }
    }
}

/// Prefix for a tree number: first three characters of the species, upper-cased.
#[must_use]
pub fn tree_number_prefix(species: &str) -> String {
    let species = species.trim();
    if species.is_empty() {
        return DEFAULT_TREE_PREFIX.to_string();
    }
    species.chars().take(3).collect::<String>().to_uppercase()
}

/// Tree as shown in "my forest".
#[derive(Debug, Clone, Serialize)]
pub struct TreeSummary {
    pub id: Uuid,
    pub tree_number: String,
    pub display_name: String,
    pub nickname: String,
    pub species: String,
    pub status: TreeStatus,
    pub status_label: &'static str,
    pub location_name: String,
    pub age_years: Decimal,
    pub height_cm: Decimal,
    pub co2_offset_kg: Decimal,
    pub adoption_date: NaiveDate,
    pub primary_image: Option<String>,
}

impl From<&AdoptedTree> for TreeSummary {
    fn from(tree: &AdoptedTree) -> Self {
        Self {
            id: tree.id,
            tree_number: tree.tree_number.clone(),
            display_name: tree.display_name().to_string(),
            nickname: tree.nickname.clone(),
            species: tree.species.clone(),
            status: tree.status,
            status_label: tree.status.label(),
            location_name: tree.location_name.clone(),
            age_years: tree.age_years(),
            height_cm: tree.height_cm,
            co2_offset_kg: tree.co2_offset_kg,
            adoption_date: tree.adoption_date,
            primary_image: tree.primary_image_url.clone(),
        }
    }
}

/// Tree detail page payload.
#[derive(Debug, Clone, Serialize)]
pub struct TreeDetail {
    #[serde(flatten)]
    pub summary: TreeSummary,
    pub latitude: Decimal,
    pub longitude: Decimal,
    pub age_days: i32,
    pub certificate_url: Option<String>,
    pub planted_date: Option<NaiveDate>,
    pub product_title: Option<String>,
    pub product_slug: Option<String>,
    pub timeline: Vec<TimelineEvent>,
    pub gallery: Vec<GalleryImage>,
}

impl TreeDetail {
    #[must_use]
    pub fn new(tree: &AdoptedTree, timeline: Vec<TimelineEvent>, gallery: Vec<GalleryImage>) -> Self {
        Self {
            summary: TreeSummary::from(tree),
            latitude: tree.latitude,
            longitude: tree.longitude,
            age_days: tree.age_days,
            certificate_url: tree.certificate_url.clone(),
            planted_date: tree.planted_date,
            product_title: tree.product_title.clone(),
            product_slug: tree.product_slug.clone(),
            timeline,
            gallery,
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TimelineEvent {
    pub id: TimelineEventId,
    pub tree_id: Uuid,
    pub event_type: TimelineEventType,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub event_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GalleryImage {
    pub id: GalleryImageId,
    pub tree_id: Uuid,
    pub image_url: String,
    pub thumbnail_url: Option<String>,
    pub caption: String,
    pub alt_text: String,
    pub is_primary: bool,
    pub taken_date: Option<NaiveDate>,
    pub uploaded_at: DateTime<Utc>,
}

/// Aggregate impact of a user's trees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForestStats {
    pub tree_count: i64,
    pub total_co2_offset_kg: Decimal,
    pub total_co2_offset_tons: Decimal,
    pub equivalent_car_miles: i64,
}

impl ForestStats {
    #[must_use]
    pub fn new(tree_count: i64, total_co2_offset_kg: Decimal) -> Self {
        Self {
            tree_count,
            total_co2_offset_kg,
            total_co2_offset_tons: (total_co2_offset_kg / Decimal::ONE_THOUSAND).round_dp(2),
            equivalent_car_miles: (total_co2_offset_kg * CAR_MILES_PER_KG)
                .round()
                .to_i64()
                .unwrap_or(i64::MAX),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_forest_stats_conversions() {
        let stats = ForestStats::new(3, dec("1234.56"));
        assert_eq!(stats.total_co2_offset_tons, dec("1.23"));
        // 1234.56 * 2.5 = 3086.4
        assert_eq!(stats.equivalent_car_miles, 3086);

        let empty = ForestStats::new(0, Decimal::ZERO);
        assert_eq!(empty.total_co2_offset_tons, Decimal::ZERO);
        assert_eq!(empty.equivalent_car_miles, 0);
    }

    #[test]
    fn test_tree_number_prefix() {
        assert_eq!(tree_number_prefix("Ceiba pentandra"), "CEI");
        assert_eq!(tree_number_prefix("  "), "TRE");
        assert_eq!(tree_number_prefix("Ek"), "EK");
        assert_eq!(tree_number_prefix("ñandubay"), "ÑAN");
    }

    #[test]
    fn test_age_years_and_display_name() {
        let tree = AdoptedTree {
            id: Uuid::new_v4(),
            tree_number: "CEI-2026-0001".to_string(),
            user_id: UserId::new(1),
            product_id: None,
            product_title: None,
            product_slug: None,
            order_item_id: None,
            nickname: String::new(),
            species: "Ceiba pentandra".to_string(),
            status: TreeStatus::Healthy,
            location_name: String::new(),
            latitude: Decimal::ZERO,
            longitude: Decimal::ZERO,
            age_days: 548,
            height_cm: Decimal::ZERO,
            co2_offset_kg: Decimal::ZERO,
            certificate_url: None,
            adoption_date: NaiveDate::from_ymd_opt(2026, 10, 17).unwrap(),
            planted_date: None,
            primary_image_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        // 548 / 365.25 = 1.5003
        assert_eq!(tree.age_years(), dec("1.5"));
        assert_eq!(tree.display_name(), "Ceiba pentandra");

        let named = AdoptedTree {
            nickname: "Abuela".to_string(),
            ..tree
        };
        assert_eq!(named.display_name(), "Abuela");
    }
}
