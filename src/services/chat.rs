//! Chat service
//!
//! Class-scoped chats with fixed participant sets and an append-only
//! message log. Within a class no two chats may share a participant set;
//! creation is idempotent against that rule (the existing chat is returned,
//! flagged not-new) while growing a chat into another chat's set is a hard
//! conflict. The stored canonical participant key and its unique index
//! backstop both paths against concurrent writers.

use crate::db::repositories::{ChatRepository, MessageRepository, UserRepository};
use crate::models::{Chat, Message, User};
use crate::services::class::{ClassService, ClassServiceError};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

/// Default page size when listing messages
const DEFAULT_MESSAGE_LIMIT: i64 = 50;

/// Name given to group chats created without one
const DEFAULT_GROUP_NAME: &str = "Group Chat";

/// Error types for chat service operations
#[derive(Debug, thiserror::Error)]
pub enum ChatServiceError {
    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Referenced class or chat not found
    #[error("{0}")]
    NotFound(String),

    /// Caller lacks the required role or participation
    #[error("{0}")]
    Forbidden(String),

    /// Participant-set collision with another chat
    #[error("{0}")]
    Conflict(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<ClassServiceError> for ChatServiceError {
    fn from(err: ClassServiceError) -> Self {
        match err {
            ClassServiceError::ValidationError(msg) => Self::ValidationError(msg),
            ClassServiceError::NotFound(msg) => Self::NotFound(msg),
            ClassServiceError::Forbidden(msg) => Self::Forbidden(msg),
            ClassServiceError::Conflict(msg) => Self::Conflict(msg),
            ClassServiceError::InternalError(e) => Self::InternalError(e),
        }
    }
}

/// Result of a chat-creation call. `is_new` is false when an identical
/// participant set already existed and that chat was returned instead.
#[derive(Debug, Clone)]
pub struct ChatCreation {
    pub chat: Chat,
    pub is_new: bool,
}

/// A chat together with its participant roster
#[derive(Debug, Clone)]
pub struct ChatWithParticipants {
    pub chat: Chat,
    pub participants: Vec<User>,
}

/// Chat service
pub struct ChatService {
    chat_repo: Arc<dyn ChatRepository>,
    message_repo: Arc<dyn MessageRepository>,
    user_repo: Arc<dyn UserRepository>,
    classes: Arc<ClassService>,
}

impl ChatService {
    /// Create a new chat service
    pub fn new(
        chat_repo: Arc<dyn ChatRepository>,
        message_repo: Arc<dyn MessageRepository>,
        user_repo: Arc<dyn UserRepository>,
        classes: Arc<ClassService>,
    ) -> Self {
        Self {
            chat_repo,
            message_repo,
            user_repo,
            classes,
        }
    }

    /// Create a chat, or return the existing one with the same participant
    /// set in the same class.
    ///
    /// The caller is implicitly part of the set. Every participant,
    /// including the caller, must hold class access; one outsider rejects
    /// the whole request. The call is idempotent regardless of participant
    /// order and of which participant initiates it.
    pub async fn create_chat(
        &self,
        user_id: i64,
        input: CreateChatInput,
    ) -> Result<ChatCreation, ChatServiceError> {
        let class = self
            .classes
            .get_class(input.class_id)
            .await?
            .ok_or_else(|| ChatServiceError::NotFound("Class not found".to_string()))?;

        // Resolve the set: caller included, sorted, deduplicated
        let mut participants = input.participant_ids;
        participants.push(user_id);
        participants.sort_unstable();
        participants.dedup();

        if participants.len() < 2 {
            return Err(ChatServiceError::ValidationError(
                "A chat needs at least one other participant".to_string(),
            ));
        }

        for &participant in &participants {
            if !self.classes.has_class_access(participant, class.id).await? {
                return Err(ChatServiceError::Forbidden(
                    "All participants must belong to the class".to_string(),
                ));
            }
        }

        if let Some(existing) = self
            .chat_repo
            .find_by_participants(class.id, &participants)
            .await
            .context("Failed to search for existing chat")?
        {
            return Ok(ChatCreation {
                chat: existing,
                is_new: false,
            });
        }

        let is_group = input.is_group || participants.len() > 2;
        let name = if is_group {
            input
                .name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| DEFAULT_GROUP_NAME.to_string())
        } else {
            // Direct chats derive their display name from the other
            // participant at render time
            String::new()
        };

        let now = Utc::now();
        let chat = Chat {
            id: 0,
            class_id: class.id,
            is_group,
            name,
            participants: participants.clone(),
            created_at: now,
            updated_at: now,
            last_message_at: now,
        };

        match self.chat_repo.create(&chat).await {
            Ok(created) => Ok(ChatCreation {
                chat: created,
                is_new: true,
            }),
            Err(err) => {
                // A concurrent create may have taken the participant key
                // between our check and the insert; the unique index turns
                // that into an error here, and the winner is what we return.
                if let Some(existing) = self
                    .chat_repo
                    .find_by_participants(class.id, &participants)
                    .await
                    .context("Failed to re-check for existing chat")?
                {
                    return Ok(ChatCreation {
                        chat: existing,
                        is_new: false,
                    });
                }
                Err(ChatServiceError::InternalError(
                    err.context("Failed to create chat"),
                ))
            }
        }
    }

    /// Add members to a chat. Caller must be a current participant; each
    /// new member must hold class access; the grown set must not equal any
    /// other chat's set in the class.
    pub async fn add_members(
        &self,
        user_id: i64,
        chat_id: i64,
        new_member_ids: Vec<i64>,
    ) -> Result<Chat, ChatServiceError> {
        let chat = self.require_participant(user_id, chat_id).await?;

        if new_member_ids.is_empty() {
            return Err(ChatServiceError::ValidationError(
                "No members to add".to_string(),
            ));
        }

        let mut grown = chat.participants.clone();
        for &member in &new_member_ids {
            if chat.has_participant(member) {
                return Err(ChatServiceError::ValidationError(
                    "User is already a participant".to_string(),
                ));
            }
            if !self.classes.has_class_access(member, chat.class_id).await? {
                return Err(ChatServiceError::Forbidden(
                    "All new members must belong to the class".to_string(),
                ));
            }
            grown.push(member);
        }
        grown.sort_unstable();
        grown.dedup();

        // Growing into another chat's exact set would recreate the
        // duplicate that creation prevents; reject, never merge.
        if let Some(existing) = self
            .chat_repo
            .find_by_participants(chat.class_id, &grown)
            .await
            .context("Failed to check for participant-set collision")?
        {
            if existing.id != chat.id {
                return Err(ChatServiceError::Conflict(format!(
                    "A chat with these participants already exists (chat {})",
                    existing.id
                )));
            }
        }

        let is_group = chat.is_group || grown.len() > 2;
        self.chat_repo
            .update_participants(chat.id, &grown, is_group)
            .await
            .context("Failed to update participants")?;

        let updated = self
            .chat_repo
            .get_by_id(chat.id)
            .await
            .context("Failed to reload chat")?
            .ok_or_else(|| ChatServiceError::NotFound("Chat not found".to_string()))?;

        Ok(updated)
    }

    /// Send a message. Sender must be a current participant; blank content
    /// is rejected before persistence; the chat's last-activity timestamp
    /// moves with every accepted send.
    pub async fn send_message(
        &self,
        user_id: i64,
        chat_id: i64,
        content: &str,
    ) -> Result<Message, ChatServiceError> {
        let chat = self.require_participant(user_id, chat_id).await?;

        let content = content.trim();
        if content.is_empty() {
            return Err(ChatServiceError::ValidationError(
                "Message cannot be empty".to_string(),
            ));
        }

        let message = Message {
            id: 0,
            chat_id: chat.id,
            sender_id: user_id,
            content: content.to_string(),
            created_at: Utc::now(),
        };

        let created = self
            .message_repo
            .create(&message)
            .await
            .context("Failed to create message")?;

        self.chat_repo
            .touch_last_message(chat.id)
            .await
            .context("Failed to update chat activity")?;

        Ok(created)
    }

    /// List a chat's messages, oldest first. Participant-only.
    pub async fn list_messages(
        &self,
        user_id: i64,
        chat_id: i64,
        offset: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Vec<Message>, ChatServiceError> {
        let chat = self.require_participant(user_id, chat_id).await?;

        let offset = offset.unwrap_or(0).max(0);
        let limit = limit.unwrap_or(DEFAULT_MESSAGE_LIMIT).clamp(1, 500);

        let messages = self
            .message_repo
            .list_by_chat(chat.id, offset, limit)
            .await
            .context("Failed to list messages")?;

        Ok(messages)
    }

    /// List the chats the caller participates in, most recent activity
    /// first, optionally restricted to one class.
    pub async fn list_chats(
        &self,
        user_id: i64,
        class_id: Option<i64>,
    ) -> Result<Vec<Chat>, ChatServiceError> {
        let chats = self
            .chat_repo
            .list_for_user(user_id, class_id)
            .await
            .context("Failed to list chats")?;

        Ok(chats)
    }

    /// Get a chat with its participant roster. Participant-only.
    pub async fn get_chat(
        &self,
        user_id: i64,
        chat_id: i64,
    ) -> Result<ChatWithParticipants, ChatServiceError> {
        let chat = self.require_participant(user_id, chat_id).await?;

        let mut participants = Vec::with_capacity(chat.participants.len());
        for &participant_id in &chat.participants {
            if let Some(user) = self
                .user_repo
                .get_by_id(participant_id)
                .await
                .context("Failed to load participant")?
            {
                participants.push(user);
            }
        }

        Ok(ChatWithParticipants { chat, participants })
    }

    /// Delete a chat and every message in it. Any current participant may
    /// delete; no elevated role is required.
    pub async fn delete_chat(&self, user_id: i64, chat_id: i64) -> Result<(), ChatServiceError> {
        let chat = self.require_participant(user_id, chat_id).await?;

        // Messages go first so a failure cannot leave them orphaned
        self.message_repo
            .delete_by_chat(chat.id)
            .await
            .context("Failed to delete messages")?;
        self.chat_repo
            .delete(chat.id)
            .await
            .context("Failed to delete chat")?;

        Ok(())
    }

    /// Load the chat and require that the caller currently participates.
    async fn require_participant(
        &self,
        user_id: i64,
        chat_id: i64,
    ) -> Result<Chat, ChatServiceError> {
        let chat = self
            .chat_repo
            .get_by_id(chat_id)
            .await
            .context("Failed to get chat")?
            .ok_or_else(|| ChatServiceError::NotFound("Chat not found".to_string()))?;

        if !chat.has_participant(user_id) {
            return Err(ChatServiceError::Forbidden(
                "You are not a participant of this chat".to_string(),
            ));
        }

        Ok(chat)
    }
}

/// Input for chat creation
#[derive(Debug, Clone)]
pub struct CreateChatInput {
    pub class_id: i64,
    /// Other participants; the caller is added implicitly if absent
    pub participant_ids: Vec<i64>,
    /// Explicit group intent; two-person chats stay direct unless set
    pub is_group: bool,
    /// Display name, used only for group chats
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxChatRepository, SqlxClassRepository, SqlxMessageRepository, SqlxUserRepository,
        UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::User;
    use crate::services::class::CreateClassInput;

    struct Fixture {
        service: ChatService,
        teacher: i64,
        students: Vec<i64>,
        outsider: i64,
        class_id: i64,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user_repo = SqlxUserRepository::new(pool.clone());
        let mut ids = Vec::new();
        for email in [
            "teacher@example.com",
            "s1@example.com",
            "s2@example.com",
            "outsider@example.com",
        ] {
            let user = user_repo
                .create(&User::new(email.to_string(), "hash".to_string()))
                .await
                .expect("Failed to create user");
            ids.push(user.id);
        }
        let (teacher, s1, s2, outsider) = (ids[0], ids[1], ids[2], ids[3]);

        let classes = Arc::new(ClassService::new(SqlxClassRepository::shared(pool.clone())));
        let class = classes
            .create_class(
                teacher,
                CreateClassInput {
                    name: "CS 1".to_string(),
                    description: "Intro".to_string(),
                },
            )
            .await
            .expect("Failed to create class");
        for student in [s1, s2] {
            classes
                .join_by_code(student, &class.join_code)
                .await
                .expect("Failed to join");
        }

        let service = ChatService::new(
            SqlxChatRepository::shared(pool.clone()),
            SqlxMessageRepository::shared(pool.clone()),
            SqlxUserRepository::shared(pool),
            classes,
        );

        Fixture {
            service,
            teacher,
            students: vec![s1, s2],
            outsider,
            class_id: class.id,
        }
    }

    fn direct_chat(class_id: i64, with: i64) -> CreateChatInput {
        CreateChatInput {
            class_id,
            participant_ids: vec![with],
            is_group: false,
            name: None,
        }
    }

    #[tokio::test]
    async fn test_create_direct_chat() {
        let f = setup().await;
        let created = f
            .service
            .create_chat(f.teacher, direct_chat(f.class_id, f.students[0]))
            .await
            .expect("Failed to create chat");

        assert!(created.is_new);
        assert!(!created.chat.is_group);
        assert!(created.chat.name.is_empty());
        assert_eq!(created.chat.participants.len(), 2);
    }

    #[tokio::test]
    async fn test_create_is_idempotent_across_order_and_caller() {
        let f = setup().await;
        let first = f
            .service
            .create_chat(f.teacher, direct_chat(f.class_id, f.students[0]))
            .await
            .expect("Failed to create chat");
        assert!(first.is_new);

        // Same pair, initiated by the other participant
        let second = f
            .service
            .create_chat(f.students[0], direct_chat(f.class_id, f.teacher))
            .await
            .expect("Failed to create chat");
        assert!(!second.is_new);
        assert_eq!(second.chat.id, first.chat.id);

        // Duplicated ids in the list make no difference
        let third = f
            .service
            .create_chat(
                f.teacher,
                CreateChatInput {
                    class_id: f.class_id,
                    participant_ids: vec![f.students[0], f.students[0], f.teacher],
                    is_group: false,
                    name: None,
                },
            )
            .await
            .expect("Failed to create chat");
        assert!(!third.is_new);
        assert_eq!(third.chat.id, first.chat.id);
    }

    #[tokio::test]
    async fn test_group_chat_by_count_and_by_flag() {
        let f = setup().await;

        let by_count = f
            .service
            .create_chat(
                f.teacher,
                CreateChatInput {
                    class_id: f.class_id,
                    participant_ids: f.students.clone(),
                    is_group: false,
                    name: None,
                },
            )
            .await
            .expect("Failed to create chat");
        assert!(by_count.chat.is_group);
        assert_eq!(by_count.chat.name, "Group Chat");

        let by_flag = f
            .service
            .create_chat(
                f.teacher,
                CreateChatInput {
                    class_id: f.class_id,
                    participant_ids: vec![f.students[0]],
                    is_group: true,
                    name: Some("Project A".to_string()),
                },
            )
            .await
            .expect("Failed to create chat");
        assert!(by_flag.chat.is_group);
        assert_eq!(by_flag.chat.name, "Project A");
    }

    #[tokio::test]
    async fn test_outsider_participant_rejects_whole_request() {
        let f = setup().await;
        let result = f
            .service
            .create_chat(
                f.teacher,
                CreateChatInput {
                    class_id: f.class_id,
                    participant_ids: vec![f.students[0], f.outsider],
                    is_group: false,
                    name: None,
                },
            )
            .await;
        assert!(matches!(result, Err(ChatServiceError::Forbidden(_))));

        // Nothing was created
        let chats = f
            .service
            .list_chats(f.teacher, Some(f.class_id))
            .await
            .expect("Failed to list");
        assert!(chats.is_empty());
    }

    #[tokio::test]
    async fn test_create_requires_other_participant() {
        let f = setup().await;
        let result = f
            .service
            .create_chat(
                f.teacher,
                CreateChatInput {
                    class_id: f.class_id,
                    participant_ids: vec![f.teacher],
                    is_group: false,
                    name: None,
                },
            )
            .await;
        assert!(matches!(result, Err(ChatServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_create_unknown_class() {
        let f = setup().await;
        let result = f
            .service
            .create_chat(f.teacher, direct_chat(9999, f.students[0]))
            .await;
        assert!(matches!(result, Err(ChatServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_add_members_flips_to_group() {
        let f = setup().await;
        let created = f
            .service
            .create_chat(f.teacher, direct_chat(f.class_id, f.students[0]))
            .await
            .expect("Failed to create chat");
        assert!(!created.chat.is_group);

        let grown = f
            .service
            .add_members(f.teacher, created.chat.id, vec![f.students[1]])
            .await
            .expect("Failed to add member");
        assert!(grown.is_group);
        assert_eq!(grown.participants.len(), 3);
    }

    #[tokio::test]
    async fn test_add_members_collision_rejected_outright() {
        let f = setup().await;
        // Chat A: teacher + s1, chat B: teacher + s1 + s2
        let a = f
            .service
            .create_chat(f.teacher, direct_chat(f.class_id, f.students[0]))
            .await
            .expect("Failed to create chat");
        let b = f
            .service
            .create_chat(
                f.teacher,
                CreateChatInput {
                    class_id: f.class_id,
                    participant_ids: f.students.clone(),
                    is_group: false,
                    name: None,
                },
            )
            .await
            .expect("Failed to create chat");

        // Growing A to {teacher, s1, s2} would equal B's set
        let result = f
            .service
            .add_members(f.teacher, a.chat.id, vec![f.students[1]])
            .await;
        assert!(matches!(result, Err(ChatServiceError::Conflict(_))));

        // Both chats are unchanged
        let a_after = f
            .service
            .get_chat(f.teacher, a.chat.id)
            .await
            .expect("Failed to get chat");
        assert_eq!(a_after.chat.participants.len(), 2);
        let b_after = f
            .service
            .get_chat(f.teacher, b.chat.id)
            .await
            .expect("Failed to get chat");
        assert_eq!(b_after.chat.participants.len(), 3);
    }

    #[tokio::test]
    async fn test_add_members_checks() {
        let f = setup().await;
        let created = f
            .service
            .create_chat(f.teacher, direct_chat(f.class_id, f.students[0]))
            .await
            .expect("Failed to create chat");

        // Non-participant cannot add
        let denied = f
            .service
            .add_members(f.students[1], created.chat.id, vec![f.students[1]])
            .await;
        assert!(matches!(denied, Err(ChatServiceError::Forbidden(_))));

        // New member must belong to the class
        let outsider = f
            .service
            .add_members(f.teacher, created.chat.id, vec![f.outsider])
            .await;
        assert!(matches!(outsider, Err(ChatServiceError::Forbidden(_))));

        // Already a participant
        let duplicate = f
            .service
            .add_members(f.teacher, created.chat.id, vec![f.students[0]])
            .await;
        assert!(matches!(duplicate, Err(ChatServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_send_and_list_messages() {
        let f = setup().await;
        let created = f
            .service
            .create_chat(f.teacher, direct_chat(f.class_id, f.students[0]))
            .await
            .expect("Failed to create chat");

        f.service
            .send_message(f.teacher, created.chat.id, "hello")
            .await
            .expect("Failed to send");
        f.service
            .send_message(f.students[0], created.chat.id, "  hi there  ")
            .await
            .expect("Failed to send");

        let messages = f
            .service
            .list_messages(f.students[0], created.chat.id, None, None)
            .await
            .expect("Failed to list");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "hello");
        // Content is stored trimmed
        assert_eq!(messages[1].content, "hi there");
    }

    #[tokio::test]
    async fn test_send_rejects_blank_and_non_participant() {
        let f = setup().await;
        let created = f
            .service
            .create_chat(f.teacher, direct_chat(f.class_id, f.students[0]))
            .await
            .expect("Failed to create chat");

        let blank = f
            .service
            .send_message(f.teacher, created.chat.id, "   ")
            .await;
        assert!(matches!(blank, Err(ChatServiceError::ValidationError(_))));

        let stranger = f
            .service
            .send_message(f.students[1], created.chat.id, "hi")
            .await;
        assert!(matches!(stranger, Err(ChatServiceError::Forbidden(_))));

        // Neither attempt persisted anything
        let messages = f
            .service
            .list_messages(f.teacher, created.chat.id, None, None)
            .await
            .expect("Failed to list");
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn test_send_bumps_chat_ordering() {
        let f = setup().await;
        let first = f
            .service
            .create_chat(f.teacher, direct_chat(f.class_id, f.students[0]))
            .await
            .expect("Failed to create chat");
        let second = f
            .service
            .create_chat(f.teacher, direct_chat(f.class_id, f.students[1]))
            .await
            .expect("Failed to create chat");

        f.service
            .send_message(f.teacher, first.chat.id, "ping")
            .await
            .expect("Failed to send");

        let listed = f
            .service
            .list_chats(f.teacher, Some(f.class_id))
            .await
            .expect("Failed to list");
        assert_eq!(listed[0].id, first.chat.id);
        assert_eq!(listed[1].id, second.chat.id);
    }

    #[tokio::test]
    async fn test_list_messages_requires_participation() {
        let f = setup().await;
        let created = f
            .service
            .create_chat(f.teacher, direct_chat(f.class_id, f.students[0]))
            .await
            .expect("Failed to create chat");

        let denied = f
            .service
            .list_messages(f.students[1], created.chat.id, None, None)
            .await;
        assert!(matches!(denied, Err(ChatServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_get_chat_returns_roster() {
        let f = setup().await;
        let created = f
            .service
            .create_chat(f.teacher, direct_chat(f.class_id, f.students[0]))
            .await
            .expect("Failed to create chat");

        let with_roster = f
            .service
            .get_chat(f.teacher, created.chat.id)
            .await
            .expect("Failed to get chat");
        assert_eq!(with_roster.participants.len(), 2);
        let emails: Vec<&str> = with_roster
            .participants
            .iter()
            .map(|u| u.email.as_str())
            .collect();
        assert!(emails.contains(&"teacher@example.com"));
        assert!(emails.contains(&"s1@example.com"));
    }

    #[tokio::test]
    async fn test_delete_cascades_messages() {
        let f = setup().await;
        let created = f
            .service
            .create_chat(f.teacher, direct_chat(f.class_id, f.students[0]))
            .await
            .expect("Failed to create chat");
        f.service
            .send_message(f.teacher, created.chat.id, "hello")
            .await
            .expect("Failed to send");

        // Any participant may delete, not just the creator
        f.service
            .delete_chat(f.students[0], created.chat.id)
            .await
            .expect("Failed to delete");

        let gone = f.service.get_chat(f.teacher, created.chat.id).await;
        assert!(matches!(gone, Err(ChatServiceError::NotFound(_))));
        let messages = f
            .service
            .list_messages(f.teacher, created.chat.id, None, None)
            .await;
        assert!(matches!(messages, Err(ChatServiceError::NotFound(_))));
    }
}
