//! Calendar event model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A personal calendar event; never visible to other users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier
    pub id: i64,
    /// Owning user
    pub user_id: i64,
    /// Event title
    pub title: String,
    /// Calendar date
    pub date: NaiveDate,
    /// Time of day, "HH:MM"
    pub time: String,
    /// Color tag for rendering
    pub color: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Default time of day for events created without one.
pub const DEFAULT_EVENT_TIME: &str = "00:00";

/// Default color tag.
pub const DEFAULT_EVENT_COLOR: &str = "#3b82f6";
