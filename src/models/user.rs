//! User model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered user.
///
/// Users have no global role; Instructor/Student is derived per class from
/// the class registry (see [`crate::services::ClassService`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Email address (unique, stored lowercased)
    pub email: String,
    /// Password hash (argon2 PHC string)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Optional display name, shown instead of the email when set
    pub display_name: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new User. The password must already be hashed
    /// (`services::password::hash_password`).
    pub fn new(email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Set by the database
            email: email.trim().to_lowercase(),
            password_hash,
            display_name: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Name to show in rosters and chat listings.
    pub fn visible_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.email)
    }
}
