//! Catalog classification enums.

use serde::{Deserialize, Serialize};

/// Kind of product sold in the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "marketplace.product_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    /// A single tree. Paying for one creates adopted trees.
    Tree,
    Forest,
    Lagoon,
    /// A retreat or guided experience.
    Experience,
}

str_enum!(ProductType, "product type", {
    Tree => "tree",
    Forest => "forest",
    Lagoon => "lagoon",
    Experience => "experience",
});

/// How a product is billed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "marketplace.pricing_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PricingType {
    #[default]
    Annual,
    OneTime,
}

str_enum!(PricingType, "pricing type", {
    Annual => "annual",
    OneTime => "one_time",
});

impl PricingType {
    /// Suffix shown after the price.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Annual => "/año",
            Self::OneTime => "",
        }
    }

    /// Whether a sponsorship bought at this pricing expires after a year.
    #[must_use]
    pub const fn is_recurring(&self) -> bool {
        matches!(self, Self::Annual)
    }
}

/// Kind of progress update posted on a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "marketplace.product_update_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ProductUpdateType {
    Photo,
    Growth,
    Milestone,
    Maintenance,
    Impact,
    News,
    Event,
}

str_enum!(ProductUpdateType, "product update type", {
    Photo => "photo",
    Growth => "growth",
    Milestone => "milestone",
    Maintenance => "maintenance",
    Impact => "impact",
    News => "news",
    Event => "event",
});

/// Availability of an individually sponsorable unit.
///
/// ```text
/// available -> reserved -> sponsored -> available
///     |            \-> available
///     \-> sponsored (paid order re-claiming a released unit)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "marketplace.unit_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    #[default]
    Available,
    Sponsored,
    Reserved,
    Inactive,
}

str_enum!(UnitStatus, "unit status", {
    Available => "available",
    Sponsored => "sponsored",
    Reserved => "reserved",
    Inactive => "inactive",
});

impl UnitStatus {
    /// Whether a unit may move from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Available, Self::Reserved | Self::Sponsored | Self::Inactive)
                | (Self::Reserved, Self::Sponsored | Self::Available)
                | (Self::Sponsored | Self::Inactive, Self::Available)
        )
    }

    /// Whether a paid order may take the unit as its sponsorship.
    ///
    /// `held_by_order` is true when the unit is reserved by that order. A unit
    /// released after a failed payment attempt is available again and is
    /// re-claimed unless another order reserved or sponsored it meanwhile.
    #[must_use]
    pub const fn claimable_by_paid_order(self, held_by_order: bool) -> bool {
        match self {
            Self::Reserved => held_by_order,
            Self::Available => true,
            Self::Sponsored | Self::Inactive => false,
        }
    }
}

/// Kind of update posted on a sponsorship unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "marketplace.unit_update_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UnitUpdateType {
    Photo,
    Growth,
    Milestone,
    Maintenance,
    Impact,
    Health,
    Weather,
    Wildlife,
}

str_enum!(UnitUpdateType, "unit update type", {
    Photo => "photo",
    Growth => "growth",
    Milestone => "milestone",
    Maintenance => "maintenance",
    Impact => "impact",
    Health => "health",
    Weather => "weather",
    Wildlife => "wildlife",
});

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_pricing_label() {
        assert_eq!(PricingType::Annual.label(), "/año");
        assert_eq!(PricingType::OneTime.label(), "");
        assert_eq!(PricingType::default(), PricingType::Annual);
    }

    #[test]
    fn test_product_type_parse() {
        assert_eq!("tree".parse::<ProductType>().unwrap(), ProductType::Tree);
        assert_eq!(
            serde_json::to_string(&ProductType::Experience).unwrap(),
            "\"experience\""
        );
        let err = "volcano".parse::<ProductType>().unwrap_err();
        assert_eq!(err.to_string(), "invalid product type: volcano");
    }

    #[test]
    fn test_unit_status_transitions() {
        assert!(UnitStatus::Available.can_transition_to(UnitStatus::Reserved));
        assert!(UnitStatus::Reserved.can_transition_to(UnitStatus::Sponsored));
        assert!(UnitStatus::Reserved.can_transition_to(UnitStatus::Available));
        assert!(UnitStatus::Sponsored.can_transition_to(UnitStatus::Available));
        assert!(UnitStatus::Available.can_transition_to(UnitStatus::Sponsored));
        assert!(!UnitStatus::Inactive.can_transition_to(UnitStatus::Sponsored));
        assert!(!UnitStatus::Sponsored.can_transition_to(UnitStatus::Reserved));
    }

    #[test]
    fn test_paid_order_claims() {
        assert!(UnitStatus::Reserved.claimable_by_paid_order(true));
        assert!(!UnitStatus::Reserved.claimable_by_paid_order(false));
        assert!(UnitStatus::Available.claimable_by_paid_order(false));
        assert!(!UnitStatus::Sponsored.claimable_by_paid_order(false));
        assert!(!UnitStatus::Inactive.claimable_by_paid_order(false));
    }
}
