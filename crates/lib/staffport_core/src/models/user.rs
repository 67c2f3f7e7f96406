use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A staff member who can sign in through the identity provider.
///
/// `employee_id` is the stable identifier asserted by the IdP; users are
/// provisioned out of band and matched by it at login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub employee_id: String,
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
    pub username: String,
    pub email: String,
    pub active: bool,
    pub locked: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// The name to address the user by: the explicit display name when
    /// set, otherwise "first last" trimmed.
    pub fn name(&self) -> String {
        if !self.display_name.is_empty() {
            return self.display_name.clone();
        }
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Input for provisioning a new user.
#[derive(Debug, Default, Clone)]
pub struct NewUser {
    pub employee_id: String,
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
    pub username: String,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(first: &str, last: &str, display: &str) -> User {
        User {
            id: 1,
            employee_id: "10001".to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            display_name: display.to_string(),
            username: "jdoe".to_string(),
            email: "jdoe@example.org".to_string(),
            active: true,
            locked: false,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn name_prefers_display_name() {
        assert_eq!("Johnny", user("John", "Doe", "Johnny").name());
    }

    #[test]
    fn name_falls_back_to_first_and_last() {
        assert_eq!("John Doe", user("John", "Doe", "").name());
    }

    #[test]
    fn name_trims_missing_parts() {
        assert_eq!("a", user("a", "", "").name());
        assert_eq!("Doe", user("", "Doe", "").name());
        assert_eq!("", user("", "", "").name());
    }
}
