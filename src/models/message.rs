//! Message model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat message. Append-only, ordered by creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier
    pub id: i64,
    /// Owning chat
    pub chat_id: i64,
    /// Sending user (a chat participant at send time)
    pub sender_id: i64,
    /// Message text, trimmed, never blank
    pub content: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}
