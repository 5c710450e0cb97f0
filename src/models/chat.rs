//! Chat model
//!
//! A chat is a class-scoped conversation with a fixed participant set.
//! Within a class, no two chats may share a participant set; equality is
//! order-independent and enforced through a canonical key derived from the
//! sorted participant ids.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A class-scoped conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    /// Unique identifier
    pub id: i64,
    /// Owning class
    pub class_id: i64,
    /// True for group chats (more than two people, or explicitly requested)
    pub is_group: bool,
    /// Display name; meaningful only for group chats, empty for direct chats
    pub name: String,
    /// Participant user ids, ascending
    pub participants: Vec<i64>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
    /// Timestamp of the most recent message (used to order chat lists)
    pub last_message_at: DateTime<Utc>,
}

impl Chat {
    /// Whether the given user currently participates in this chat.
    pub fn has_participant(&self, user_id: i64) -> bool {
        self.participants.contains(&user_id)
    }
}

/// Canonical key for a participant set: sorted, deduplicated ids joined
/// with `:`. Two participant lists describe the same chat iff their keys
/// are equal, regardless of input order or repetitions.
pub fn participant_key(participants: &[i64]) -> String {
    let mut ids: Vec<i64> = participants.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_key_is_order_independent() {
        assert_eq!(participant_key(&[3, 1, 2]), "1:2:3");
        assert_eq!(participant_key(&[1, 2, 3]), "1:2:3");
        assert_eq!(participant_key(&[2, 3, 1]), participant_key(&[3, 2, 1]));
    }

    #[test]
    fn test_participant_key_dedups() {
        assert_eq!(participant_key(&[5, 5, 2]), "2:5");
    }

    #[test]
    fn test_participant_key_distinguishes_sets() {
        assert_ne!(participant_key(&[1, 2]), participant_key(&[1, 3]));
        assert_ne!(participant_key(&[1, 2]), participant_key(&[1, 2, 3]));
        // String-level prefix collisions must not conflate distinct ids
        assert_ne!(participant_key(&[1, 23]), participant_key(&[12, 3]));
    }

    #[test]
    fn test_has_participant() {
        let chat = Chat {
            id: 1,
            class_id: 1,
            is_group: false,
            name: String::new(),
            participants: vec![4, 9],
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_message_at: Utc::now(),
        };
        assert!(chat.has_participant(4));
        assert!(!chat.has_participant(5));
    }
}
