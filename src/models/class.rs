//! Class model
//!
//! A class has exactly one immutable creator (its Instructor) and a set of
//! member users (its Students), stored in a separate membership table. The
//! creator never appears in the member set; joining one's own class is
//! rejected at join time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A course/section identified externally by a short join code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Class {
    /// Unique identifier
    pub id: i64,
    /// Class name
    pub name: String,
    /// Class description
    pub description: String,
    /// Creator (the Instructor); immutable after creation
    pub creator_id: i64,
    /// Unique 6-character join code, upper-case alphanumeric
    pub join_code: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Role of a user with respect to a single class.
///
/// Derived from structure, never stored: the creator is the Instructor,
/// membership rows are Students. A user holds at most one of the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassRole {
    /// The class creator
    Instructor,
    /// A joined member
    Student,
}

impl fmt::Display for ClassRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassRole::Instructor => write!(f, "Instructor"),
            ClassRole::Student => write!(f, "Student"),
        }
    }
}

impl FromStr for ClassRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "instructor" => Ok(ClassRole::Instructor),
            "student" => Ok(ClassRole::Student),
            _ => Err(anyhow::anyhow!("Invalid class role: {}", s)),
        }
    }
}
