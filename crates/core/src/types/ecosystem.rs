//! Adopted tree enums.

use serde::{Deserialize, Serialize};

/// Health status of an adopted tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "marketplace.tree_status", rename_all = "snake_case")
)]
pub enum TreeStatus {
    #[default]
    Healthy,
    Maintenance,
    Critical,
    Dormant,
}

str_enum!(TreeStatus, "tree status", {
    Healthy => "Healthy",
    Maintenance => "Maintenance",
    Critical => "Critical",
    Dormant => "Dormant",
});

impl TreeStatus {
    /// Human readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Healthy => "Healthy",
            Self::Maintenance => "Under Maintenance",
            Self::Critical => "Critical",
            Self::Dormant => "Dormant (Winter)",
        }
    }
}

/// Kind of entry on a tree's timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "marketplace.timeline_event_type", rename_all = "snake_case")
)]
pub enum TimelineEventType {
    Milestone,
    Audit,
    Update,
    Maintenance,
    Photo,
}

str_enum!(TimelineEventType, "timeline event type", {
    Milestone => "Milestone",
    Audit => "Audit",
    Update => "Update",
    Maintenance => "Maintenance",
    Photo => "Photo",
});

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_status_wire_format() {
        assert_eq!(serde_json::to_string(&TreeStatus::Dormant).unwrap(), "\"Dormant\"");
        assert_eq!("Critical".parse::<TreeStatus>().unwrap(), TreeStatus::Critical);
        assert_eq!(TreeStatus::Maintenance.label(), "Under Maintenance");
    }

    #[test]
    fn test_event_type_parse_is_case_sensitive() {
        assert!("milestone".parse::<TimelineEventType>().is_err());
        assert_eq!(
            "Audit".parse::<TimelineEventType>().unwrap(),
            TimelineEventType::Audit
        );
    }
}
