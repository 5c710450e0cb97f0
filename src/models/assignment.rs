//! Assignment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An assignment posted to a class by its instructor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    /// Unique identifier
    pub id: i64,
    /// Owning class
    pub class_id: i64,
    /// Title
    pub title: String,
    /// Description
    pub description: String,
    /// Due date
    pub due_date: DateTime<Utc>,
    /// Maximum achievable score (non-negative)
    pub points_possible: f64,
    /// Creating instructor
    pub created_by: i64,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}
