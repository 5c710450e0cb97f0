//! Grade model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scored record linking one assignment to one student.
///
/// The (assignment, student) pair is unique; re-grading overwrites the
/// existing row rather than appending a second one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grade {
    /// Unique identifier
    pub id: i64,
    /// Graded assignment
    pub assignment_id: i64,
    /// Graded student
    pub student_id: i64,
    /// Score, within [0, assignment.points_possible]
    pub score: f64,
    /// Free-text feedback
    pub feedback: String,
    /// Instructor who recorded the grade
    pub graded_by: i64,
    /// When the grade was last written
    pub graded_at: DateTime<Utc>,
}
