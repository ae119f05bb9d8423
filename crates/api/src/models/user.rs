//! Account types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use nature_marketplace_core::{Email, UserId};

/// A marketplace account.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Normalized email address.
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    /// Staff may manage the catalog, orders, refunds, and tree metrics.
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// First and last name joined, or empty when neither is set.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_full_name_trims_missing_parts() {
        let mut user = User {
            id: UserId::new(1),
            email: Email::parse("lucia@selva.org").unwrap(),
            first_name: "Lucía".to_string(),
            last_name: String::new(),
            is_staff: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(user.full_name(), "Lucía");

        user.last_name = "Mora".to_string();
        assert_eq!(user.full_name(), "Lucía Mora");
    }
}
