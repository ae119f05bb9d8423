//! Sponsorship units: individually trackable trees or plots with one sponsor.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use nature_marketplace_core::{
    PricingType, ProductId, UnitId, UnitImageId, UnitStatus, UnitUpdateId, UnitUpdateType, UserId,
};

/// Shown with approximate locations.
pub const APPROXIMATE_LOCATION_MESSAGE: &str = "La ubicación exacta se revela al apadrinar";

/// Sponsor label used when the sponsor has no first name.
pub const ANONYMOUS_SPONSOR: &str = "Padrino anónimo";

/// A sponsorship unit joined with its product and sponsor.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SponsorshipUnit {
    pub id: UnitId,
    pub code: String,
    pub name: String,
    pub slug: String,
    pub product_id: ProductId,
    pub product_title: String,
    pub product_slug: String,
    pub pricing_type: PricingType,
    pub status: UnitStatus,

    pub description: String,
    pub story: String,

    pub location_name: String,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
    pub location_area: String,
    pub latitude_approx: Option<Decimal>,
    pub longitude_approx: Option<Decimal>,
    pub approx_radius_km: Option<Decimal>,

    pub species: String,
    pub age_years: Option<i32>,
    pub height_cm: Option<Decimal>,
    pub area_m2: Option<Decimal>,
    pub co2_absorbed_total: Decimal,
    pub co2_per_year: Option<Decimal>,

    pub sponsor_id: Option<UserId>,
    pub sponsor_first_name: Option<String>,
    pub sponsor_last_name: Option<String>,
    pub reserved_by_order_id: Option<Uuid>,
    pub sponsored_at: Option<DateTime<Utc>>,
    pub sponsorship_expires_at: Option<DateTime<Utc>>,

    pub is_active: bool,
    pub is_featured: bool,
    pub primary_image_url: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Where a unit is, as visible to a particular viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UnitLocation {
    /// Only the sponsor sees the exact coordinates.
    Exact {
        name: String,
        lat: Option<Decimal>,
        lng: Option<Decimal>,
    },
    Approximate {
        area: String,
        lat: Option<Decimal>,
        lng: Option<Decimal>,
        radius_km: Decimal,
        message: &'static str,
    },
}

impl SponsorshipUnit {
    /// Whether `viewer` is the current sponsor.
    #[must_use]
    pub fn is_sponsor(&self, viewer: Option<UserId>) -> bool {
        viewer.is_some() && self.sponsor_id == viewer
    }

    /// Public sponsor label: first name and last initial.
    #[must_use]
    pub fn sponsor_name(&self) -> Option<String> {
        self.sponsor_id?;

        let first = self.sponsor_first_name.as_deref().unwrap_or_default().trim();
        if first.is_empty() {
            return Some(ANONYMOUS_SPONSOR.to_string());
        }

        let initial = self
            .sponsor_last_name
            .as_deref()
            .and_then(|last| last.trim().chars().next());
        Some(match initial {
            Some(c) => format!("{first} {c}."),
            None => first.to_string(),
        })
    }

    /// Location as `viewer` is allowed to see it.
    #[must_use]
    pub fn location_for(&self, viewer: Option<UserId>) -> UnitLocation {
        if self.is_sponsor(viewer) {
            return UnitLocation::Exact {
                name: self.location_name.clone(),
                lat: self.latitude,
                lng: self.longitude,
            };
        }

        UnitLocation::Approximate {
            area: if self.location_area.is_empty() {
                self.location_name.clone()
            } else {
                self.location_area.clone()
            },
            lat: self.latitude_approx,
            lng: self.longitude_approx,
            radius_km: self.approx_radius_km.unwrap_or(Decimal::ONE),
            message: APPROXIMATE_LOCATION_MESSAGE,
        }
    }
}

/// Unit as shown in product listings.
#[derive(Debug, Clone, Serialize)]
pub struct UnitSummary {
    pub id: UnitId,
    pub code: String,
    pub name: String,
    pub slug: String,
    pub status: UnitStatus,
    pub species: String,
    pub age_years: Option<i32>,
    pub co2_absorbed_total: Decimal,
    pub is_featured: bool,
    pub location: UnitLocation,
    pub primary_image: Option<String>,
}

impl UnitSummary {
    #[must_use]
    pub fn new(unit: &SponsorshipUnit, viewer: Option<UserId>) -> Self {
        Self {
            id: unit.id,
            code: unit.code.clone(),
            name: unit.name.clone(),
            slug: unit.slug.clone(),
            status: unit.status,
            species: unit.species.clone(),
            age_years: unit.age_years,
            co2_absorbed_total: unit.co2_absorbed_total,
            is_featured: unit.is_featured,
            location: unit.location_for(viewer),
            primary_image: unit.primary_image_url.clone(),
        }
    }
}

/// Unit detail page payload.
#[derive(Debug, Clone, Serialize)]
pub struct UnitDetail {
    #[serde(flatten)]
    pub summary: UnitSummary,
    pub product_id: ProductId,
    pub product_title: String,
    pub product_slug: String,
    pub description: String,
    pub story: String,
    pub height_cm: Option<Decimal>,
    pub area_m2: Option<Decimal>,
    pub co2_per_year: Option<Decimal>,
    pub is_user_sponsor: bool,
    pub sponsor_name: Option<String>,
    pub sponsored_at: Option<DateTime<Utc>>,
    pub sponsorship_expires_at: Option<DateTime<Utc>>,
    pub gallery: Vec<UnitImage>,
    pub updates: Vec<UnitUpdate>,
}

impl UnitDetail {
    #[must_use]
    pub fn new(
        unit: &SponsorshipUnit,
        viewer: Option<UserId>,
        gallery: Vec<UnitImage>,
        updates: Vec<UnitUpdate>,
    ) -> Self {
        let is_user_sponsor = unit.is_sponsor(viewer);
        Self {
            summary: UnitSummary::new(unit, viewer),
            product_id: unit.product_id,
            product_title: unit.product_title.clone(),
            product_slug: unit.product_slug.clone(),
            description: unit.description.clone(),
            story: unit.story.clone(),
            height_cm: unit.height_cm,
            area_m2: unit.area_m2,
            co2_per_year: unit.co2_per_year,
            is_user_sponsor,
            sponsor_name: unit.sponsor_name(),
            sponsored_at: unit.sponsored_at,
            sponsorship_expires_at: is_user_sponsor
                .then_some(unit.sponsorship_expires_at)
                .flatten(),
            gallery,
            updates,
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UnitImage {
    pub id: UnitImageId,
    pub unit_id: UnitId,
    pub image_url: String,
    pub alt_text: String,
    pub caption: String,
    pub taken_at: Option<NaiveDate>,
    pub is_primary: bool,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
}

/// News posted on a unit; private updates are visible to the sponsor only.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UnitUpdate {
    pub id: UnitUpdateId,
    pub unit_id: UnitId,
    pub update_type: UnitUpdateType,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub height_cm: Option<Decimal>,
    pub co2_absorbed: Option<Decimal>,
    pub health_status: String,
    pub is_public: bool,
    pub notify_sponsor: bool,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn unit() -> SponsorshipUnit {
        SponsorshipUnit {
            id: UnitId::new(3),
            code: "CEI-001".to_string(),
            name: "Abuela Ceiba".to_string(),
            slug: "cei-001-abuela-ceiba".to_string(),
            product_id: ProductId::new(7),
            product_title: "Ceiba Tree".to_string(),
            product_slug: "ceiba-tree".to_string(),
            pricing_type: PricingType::Annual,
            status: UnitStatus::Sponsored,
            description: String::new(),
            story: String::new(),
            location_name: "Cenote Zací".to_string(),
            latitude: Some(Decimal::from_str("20.689712").unwrap()),
            longitude: Some(Decimal::from_str("-88.201534").unwrap()),
            location_area: String::new(),
            latitude_approx: Some(Decimal::from_str("20.689").unwrap()),
            longitude_approx: Some(Decimal::from_str("-88.201").unwrap()),
            approx_radius_km: None,
            species: "Ceiba pentandra".to_string(),
            age_years: Some(40),
            height_cm: None,
            area_m2: None,
            co2_absorbed_total: Decimal::ZERO,
            co2_per_year: None,
            sponsor_id: Some(UserId::new(11)),
            sponsor_first_name: Some("Mariana".to_string()),
            sponsor_last_name: Some("Quintero".to_string()),
            reserved_by_order_id: None,
            sponsored_at: Some(Utc::now()),
            sponsorship_expires_at: None,
            is_active: true,
            is_featured: false,
            primary_image_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_sponsor_sees_exact_location() {
        let unit = unit();
        let location = unit.location_for(Some(UserId::new(11)));
        assert!(matches!(location, UnitLocation::Exact { ref name, .. } if name == "Cenote Zací"));
    }

    #[test]
    fn test_others_see_approximate_location() {
        let unit = unit();
        for viewer in [None, Some(UserId::new(12))] {
            let json = serde_json::to_value(unit.location_for(viewer)).unwrap();
            assert_eq!(json["type"], "approximate");
            assert_eq!(json["area"], "Cenote Zací");
            assert_eq!(json["lat"], "20.689");
            assert_eq!(json["radius_km"], "1");
            assert_eq!(json["message"], APPROXIMATE_LOCATION_MESSAGE);
        }
    }

    #[test]
    fn test_sponsor_name_variants() {
        let mut unit = unit();
        assert_eq!(unit.sponsor_name().as_deref(), Some("Mariana Q."));

        unit.sponsor_last_name = Some(String::new());
        assert_eq!(unit.sponsor_name().as_deref(), Some("Mariana"));

        unit.sponsor_first_name = Some("  ".to_string());
        assert_eq!(unit.sponsor_name().as_deref(), Some(ANONYMOUS_SPONSOR));

        unit.sponsor_id = None;
        assert_eq!(unit.sponsor_name(), None);
    }

    #[test]
    fn test_detail_hides_expiry_from_non_sponsors() {
        let mut unit = unit();
        unit.sponsorship_expires_at = Some(Utc::now());

        let public = UnitDetail::new(&unit, None, Vec::new(), Vec::new());
        assert!(!public.is_user_sponsor);
        assert!(public.sponsorship_expires_at.is_none());

        let own = UnitDetail::new(&unit, Some(UserId::new(11)), Vec::new(), Vec::new());
        assert!(own.is_user_sponsor);
        assert!(own.sponsorship_expires_at.is_some());
    }
}
