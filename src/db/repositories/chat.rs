//! Chat repository
//!
//! Database operations for chats and their participant sets. The chat row
//! stores a canonical `participant_key` (sorted ids joined with `:`) under a
//! `(class_id, participant_key)` unique index, so participant-set equality
//! checks are a single key lookup and the no-duplicate invariant holds even
//! across concurrent writers. Participant rows are kept in a join table and
//! written in the same transaction as the chat row.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{participant_key, Chat};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Chat repository trait
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Create a new chat together with its participant rows
    async fn create(&self, chat: &Chat) -> Result<Chat>;

    /// Get chat by ID, with its participant roster
    async fn get_by_id(&self, id: i64) -> Result<Option<Chat>>;

    /// Find the chat in a class whose participant set equals the given one
    /// (order-independent)
    async fn find_by_participants(
        &self,
        class_id: i64,
        participants: &[i64],
    ) -> Result<Option<Chat>>;

    /// List chats the user participates in, most recent activity first,
    /// optionally restricted to one class
    async fn list_for_user(&self, user_id: i64, class_id: Option<i64>) -> Result<Vec<Chat>>;

    /// Replace a chat's participant set and group flag
    async fn update_participants(
        &self,
        chat_id: i64,
        participants: &[i64],
        is_group: bool,
    ) -> Result<()>;

    /// Bump the chat's last-activity timestamp
    async fn touch_last_message(&self, chat_id: i64) -> Result<()>;

    /// Delete a chat (participant rows go with it)
    async fn delete(&self, id: i64) -> Result<()>;
}

/// SQLx-based chat repository implementation
pub struct SqlxChatRepository {
    pool: DynDatabasePool,
}

impl SqlxChatRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a shared repository for dependency injection
    pub fn shared(pool: DynDatabasePool) -> Arc<dyn ChatRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ChatRepository for SqlxChatRepository {
    async fn create(&self, chat: &Chat) -> Result<Chat> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.as_sqlite().unwrap(), chat).await,
            DatabaseDriver::Mysql => create_mysql(self.pool.as_mysql().unwrap(), chat).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Chat>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn find_by_participants(
        &self,
        class_id: i64,
        participants: &[i64],
    ) -> Result<Option<Chat>> {
        let key = participant_key(participants);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                find_by_key_sqlite(self.pool.as_sqlite().unwrap(), class_id, &key).await
            }
            DatabaseDriver::Mysql => {
                find_by_key_mysql(self.pool.as_mysql().unwrap(), class_id, &key).await
            }
        }
    }

    async fn list_for_user(&self, user_id: i64, class_id: Option<i64>) -> Result<Vec<Chat>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_for_user_sqlite(self.pool.as_sqlite().unwrap(), user_id, class_id).await
            }
            DatabaseDriver::Mysql => {
                list_for_user_mysql(self.pool.as_mysql().unwrap(), user_id, class_id).await
            }
        }
    }

    async fn update_participants(
        &self,
        chat_id: i64,
        participants: &[i64],
        is_group: bool,
    ) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_participants_sqlite(
                    self.pool.as_sqlite().unwrap(),
                    chat_id,
                    participants,
                    is_group,
                )
                .await
            }
            DatabaseDriver::Mysql => {
                update_participants_mysql(
                    self.pool.as_mysql().unwrap(),
                    chat_id,
                    participants,
                    is_group,
                )
                .await
            }
        }
    }

    async fn touch_last_message(&self, chat_id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                touch_sqlite(self.pool.as_sqlite().unwrap(), chat_id).await
            }
            DatabaseDriver::Mysql => touch_mysql(self.pool.as_mysql().unwrap(), chat_id).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => delete_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_sqlite(pool: &SqlitePool, chat: &Chat) -> Result<Chat> {
    let now = Utc::now();
    let key = participant_key(&chat.participants);

    let mut tx = pool.begin().await.context("Failed to start transaction")?;

    let result = sqlx::query(
        r#"
        INSERT INTO chats (class_id, is_group, name, participant_key, created_at, updated_at, last_message_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(chat.class_id)
    .bind(chat.is_group)
    .bind(&chat.name)
    .bind(&key)
    .bind(now)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create chat")?;

    let chat_id = result.last_insert_rowid();

    for user_id in &chat.participants {
        sqlx::query("INSERT INTO chat_participants (chat_id, user_id) VALUES (?, ?)")
            .bind(chat_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .context("Failed to add chat participant")?;
    }

    tx.commit().await.context("Failed to commit chat creation")?;

    get_by_id_sqlite(pool, chat_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Chat not found after creation"))
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Chat>> {
    let row = sqlx::query(
        "SELECT id, class_id, is_group, name, created_at, updated_at, last_message_at \
         FROM chats WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get chat by ID")?;

    match row {
        Some(row) => {
            let participants = load_participants_sqlite(pool, id).await?;
            Ok(Some(row_to_chat_sqlite(&row, participants)))
        }
        None => Ok(None),
    }
}

async fn find_by_key_sqlite(pool: &SqlitePool, class_id: i64, key: &str) -> Result<Option<Chat>> {
    let row = sqlx::query(
        "SELECT id, class_id, is_group, name, created_at, updated_at, last_message_at \
         FROM chats WHERE class_id = ? AND participant_key = ?",
    )
    .bind(class_id)
    .bind(key)
    .fetch_optional(pool)
    .await
    .context("Failed to find chat by participant set")?;

    match row {
        Some(row) => {
            let id: i64 = row.get("id");
            let participants = load_participants_sqlite(pool, id).await?;
            Ok(Some(row_to_chat_sqlite(&row, participants)))
        }
        None => Ok(None),
    }
}

async fn list_for_user_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    class_id: Option<i64>,
) -> Result<Vec<Chat>> {
    let rows = match class_id {
        Some(class_id) => {
            sqlx::query(
                r#"
                SELECT c.id, c.class_id, c.is_group, c.name, c.created_at, c.updated_at, c.last_message_at
                FROM chats c
                JOIN chat_participants cp ON cp.chat_id = c.id
                WHERE cp.user_id = ? AND c.class_id = ?
                ORDER BY c.last_message_at DESC, c.id DESC
                "#,
            )
            .bind(user_id)
            .bind(class_id)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query(
                r#"
                SELECT c.id, c.class_id, c.is_group, c.name, c.created_at, c.updated_at, c.last_message_at
                FROM chats c
                JOIN chat_participants cp ON cp.chat_id = c.id
                WHERE cp.user_id = ?
                ORDER BY c.last_message_at DESC, c.id DESC
                "#,
            )
            .bind(user_id)
            .fetch_all(pool)
            .await
        }
    }
    .context("Failed to list chats for user")?;

    let mut chats = Vec::with_capacity(rows.len());
    for row in rows {
        let id: i64 = row.get("id");
        let participants = load_participants_sqlite(pool, id).await?;
        chats.push(row_to_chat_sqlite(&row, participants));
    }

    Ok(chats)
}

async fn update_participants_sqlite(
    pool: &SqlitePool,
    chat_id: i64,
    participants: &[i64],
    is_group: bool,
) -> Result<()> {
    let now = Utc::now();
    let key = participant_key(participants);

    let mut tx = pool.begin().await.context("Failed to start transaction")?;

    sqlx::query(
        "UPDATE chats SET participant_key = ?, is_group = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&key)
    .bind(is_group)
    .bind(now)
    .bind(chat_id)
    .execute(&mut *tx)
    .await
    .context("Failed to update chat")?;

    sqlx::query("DELETE FROM chat_participants WHERE chat_id = ?")
        .bind(chat_id)
        .execute(&mut *tx)
        .await
        .context("Failed to clear chat participants")?;

    for user_id in participants {
        sqlx::query("INSERT INTO chat_participants (chat_id, user_id) VALUES (?, ?)")
            .bind(chat_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .context("Failed to add chat participant")?;
    }

    tx.commit().await.context("Failed to commit participant update")?;

    Ok(())
}

async fn touch_sqlite(pool: &SqlitePool, chat_id: i64) -> Result<()> {
    sqlx::query("UPDATE chats SET last_message_at = ?, updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(Utc::now())
        .bind(chat_id)
        .execute(pool)
        .await
        .context("Failed to touch chat")?;

    Ok(())
}

async fn delete_sqlite(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM chats WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete chat")?;

    Ok(())
}

async fn load_participants_sqlite(pool: &SqlitePool, chat_id: i64) -> Result<Vec<i64>> {
    let rows = sqlx::query(
        "SELECT user_id FROM chat_participants WHERE chat_id = ? ORDER BY user_id",
    )
    .bind(chat_id)
    .fetch_all(pool)
    .await
    .context("Failed to load chat participants")?;

    Ok(rows.iter().map(|row| row.get("user_id")).collect())
}

fn row_to_chat_sqlite(row: &sqlx::sqlite::SqliteRow, participants: Vec<i64>) -> Chat {
    Chat {
        id: row.get("id"),
        class_id: row.get("class_id"),
        is_group: row.get("is_group"),
        name: row.get("name"),
        participants,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        last_message_at: row.get("last_message_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(pool: &MySqlPool, chat: &Chat) -> Result<Chat> {
    let now = Utc::now();
    let key = participant_key(&chat.participants);

    let mut tx = pool.begin().await.context("Failed to start transaction")?;

    let result = sqlx::query(
        r#"
        INSERT INTO chats (class_id, is_group, name, participant_key, created_at, updated_at, last_message_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(chat.class_id)
    .bind(chat.is_group)
    .bind(&chat.name)
    .bind(&key)
    .bind(now)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create chat")?;

    let chat_id = result.last_insert_id() as i64;

    for user_id in &chat.participants {
        sqlx::query("INSERT INTO chat_participants (chat_id, user_id) VALUES (?, ?)")
            .bind(chat_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .context("Failed to add chat participant")?;
    }

    tx.commit().await.context("Failed to commit chat creation")?;

    get_by_id_mysql(pool, chat_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Chat not found after creation"))
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Chat>> {
    let row = sqlx::query(
        "SELECT id, class_id, is_group, name, created_at, updated_at, last_message_at \
         FROM chats WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get chat by ID")?;

    match row {
        Some(row) => {
            let participants = load_participants_mysql(pool, id).await?;
            Ok(Some(row_to_chat_mysql(&row, participants)))
        }
        None => Ok(None),
    }
}

async fn find_by_key_mysql(pool: &MySqlPool, class_id: i64, key: &str) -> Result<Option<Chat>> {
    let row = sqlx::query(
        "SELECT id, class_id, is_group, name, created_at, updated_at, last_message_at \
         FROM chats WHERE class_id = ? AND participant_key = ?",
    )
    .bind(class_id)
    .bind(key)
    .fetch_optional(pool)
    .await
    .context("Failed to find chat by participant set")?;

    match row {
        Some(row) => {
            let id: i64 = row.get("id");
            let participants = load_participants_mysql(pool, id).await?;
            Ok(Some(row_to_chat_mysql(&row, participants)))
        }
        None => Ok(None),
    }
}

async fn list_for_user_mysql(
    pool: &MySqlPool,
    user_id: i64,
    class_id: Option<i64>,
) -> Result<Vec<Chat>> {
    let rows = match class_id {
        Some(class_id) => {
            sqlx::query(
                r#"
                SELECT c.id, c.class_id, c.is_group, c.name, c.created_at, c.updated_at, c.last_message_at
                FROM chats c
                JOIN chat_participants cp ON cp.chat_id = c.id
                WHERE cp.user_id = ? AND c.class_id = ?
                ORDER BY c.last_message_at DESC, c.id DESC
                "#,
            )
            .bind(user_id)
            .bind(class_id)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query(
                r#"
                SELECT c.id, c.class_id, c.is_group, c.name, c.created_at, c.updated_at, c.last_message_at
                FROM chats c
                JOIN chat_participants cp ON cp.chat_id = c.id
                WHERE cp.user_id = ?
                ORDER BY c.last_message_at DESC, c.id DESC
                "#,
            )
            .bind(user_id)
            .fetch_all(pool)
            .await
        }
    }
    .context("Failed to list chats for user")?;

    let mut chats = Vec::with_capacity(rows.len());
    for row in rows {
        let id: i64 = row.get("id");
        let participants = load_participants_mysql(pool, id).await?;
        chats.push(row_to_chat_mysql(&row, participants));
    }

    Ok(chats)
}

async fn update_participants_mysql(
    pool: &MySqlPool,
    chat_id: i64,
    participants: &[i64],
    is_group: bool,
) -> Result<()> {
    let now = Utc::now();
    let key = participant_key(participants);

    let mut tx = pool.begin().await.context("Failed to start transaction")?;

    sqlx::query(
        "UPDATE chats SET participant_key = ?, is_group = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&key)
    .bind(is_group)
    .bind(now)
    .bind(chat_id)
    .execute(&mut *tx)
    .await
    .context("Failed to update chat")?;

    sqlx::query("DELETE FROM chat_participants WHERE chat_id = ?")
        .bind(chat_id)
        .execute(&mut *tx)
        .await
        .context("Failed to clear chat participants")?;

    for user_id in participants {
        sqlx::query("INSERT INTO chat_participants (chat_id, user_id) VALUES (?, ?)")
            .bind(chat_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .context("Failed to add chat participant")?;
    }

    tx.commit().await.context("Failed to commit participant update")?;

    Ok(())
}

async fn touch_mysql(pool: &MySqlPool, chat_id: i64) -> Result<()> {
    sqlx::query("UPDATE chats SET last_message_at = ?, updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(Utc::now())
        .bind(chat_id)
        .execute(pool)
        .await
        .context("Failed to touch chat")?;

    Ok(())
}

async fn delete_mysql(pool: &MySqlPool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM chats WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete chat")?;

    Ok(())
}

async fn load_participants_mysql(pool: &MySqlPool, chat_id: i64) -> Result<Vec<i64>> {
    let rows = sqlx::query(
        "SELECT user_id FROM chat_participants WHERE chat_id = ? ORDER BY user_id",
    )
    .bind(chat_id)
    .fetch_all(pool)
    .await
    .context("Failed to load chat participants")?;

    Ok(rows.iter().map(|row| row.get("user_id")).collect())
}

fn row_to_chat_mysql(row: &sqlx::mysql::MySqlRow, participants: Vec<i64>) -> Chat {
    Chat {
        id: row.get("id"),
        class_id: row.get("class_id"),
        is_group: row.get("is_group"),
        name: row.get("name"),
        participants,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        last_message_at: row.get("last_message_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::{ClassRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{Class, User};

    struct Fixture {
        repo: SqlxChatRepository,
        users: Vec<i64>,
        class_id: i64,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user_repo = super::super::SqlxUserRepository::new(pool.clone());
        let mut users = Vec::new();
        for email in ["a@example.com", "b@example.com", "c@example.com"] {
            let user = user_repo
                .create(&User::new(email.to_string(), "hash".to_string()))
                .await
                .expect("Failed to create user");
            users.push(user.id);
        }

        let now = Utc::now();
        let classes = super::super::SqlxClassRepository::new(pool.clone());
        let class = classes
            .create(&Class {
                id: 0,
                name: "CS 1".to_string(),
                description: "Intro".to_string(),
                creator_id: users[0],
                join_code: "ABC123".to_string(),
                created_at: now,
                updated_at: now,
            })
            .await
            .expect("Failed to create class");

        Fixture {
            repo: SqlxChatRepository::new(pool),
            users,
            class_id: class.id,
        }
    }

    fn chat_for(class_id: i64, participants: Vec<i64>, is_group: bool) -> Chat {
        let now = Utc::now();
        Chat {
            id: 0,
            class_id,
            is_group,
            name: if is_group { "Group Chat".to_string() } else { String::new() },
            participants,
            created_at: now,
            updated_at: now,
            last_message_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_loads_participants_sorted() {
        let f = setup().await;
        let chat = f
            .repo
            .create(&chat_for(f.class_id, vec![f.users[1], f.users[0]], false))
            .await
            .expect("Failed to create chat");

        assert!(chat.id > 0);
        assert_eq!(chat.participants, vec![f.users[0], f.users[1]]);
    }

    #[tokio::test]
    async fn test_find_by_participants_order_independent() {
        let f = setup().await;
        let created = f
            .repo
            .create(&chat_for(f.class_id, vec![f.users[0], f.users[1]], false))
            .await
            .expect("Failed to create chat");

        let found = f
            .repo
            .find_by_participants(f.class_id, &[f.users[1], f.users[0]])
            .await
            .expect("Failed to search")
            .expect("Chat not found");
        assert_eq!(found.id, created.id);

        let missing = f
            .repo
            .find_by_participants(f.class_id, &[f.users[0], f.users[2]])
            .await
            .expect("Failed to search");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_participant_set_rejected_by_index() {
        let f = setup().await;
        f.repo
            .create(&chat_for(f.class_id, vec![f.users[0], f.users[1]], false))
            .await
            .expect("Failed to create chat");

        let duplicate = f
            .repo
            .create(&chat_for(f.class_id, vec![f.users[1], f.users[0]], false))
            .await;
        assert!(duplicate.is_err(), "Same set in same class must be rejected");
    }

    #[tokio::test]
    async fn test_update_participants() {
        let f = setup().await;
        let chat = f
            .repo
            .create(&chat_for(f.class_id, vec![f.users[0], f.users[1]], false))
            .await
            .expect("Failed to create chat");

        let grown = vec![f.users[0], f.users[1], f.users[2]];
        f.repo
            .update_participants(chat.id, &grown, true)
            .await
            .expect("Failed to update participants");

        let reloaded = f
            .repo
            .get_by_id(chat.id)
            .await
            .expect("Failed to get chat")
            .expect("Chat not found");
        assert!(reloaded.is_group);
        assert_eq!(reloaded.participants, grown);
    }

    #[tokio::test]
    async fn test_list_for_user_filters_and_orders() {
        let f = setup().await;
        let first = f
            .repo
            .create(&chat_for(f.class_id, vec![f.users[0], f.users[1]], false))
            .await
            .expect("Failed to create chat");
        let second = f
            .repo
            .create(&chat_for(f.class_id, vec![f.users[0], f.users[2]], false))
            .await
            .expect("Failed to create chat");

        // Activity on the first chat moves it to the front
        f.repo
            .touch_last_message(first.id)
            .await
            .expect("Failed to touch chat");

        let listed = f
            .repo
            .list_for_user(f.users[0], Some(f.class_id))
            .await
            .expect("Failed to list");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, first.id);

        // users[1] participates only in the first chat
        let other = f
            .repo
            .list_for_user(f.users[1], None)
            .await
            .expect("Failed to list");
        assert_eq!(other.len(), 1);
        assert_eq!(other[0].id, first.id);
        let _ = second;
    }

    #[tokio::test]
    async fn test_delete() {
        let f = setup().await;
        let chat = f
            .repo
            .create(&chat_for(f.class_id, vec![f.users[0], f.users[1]], false))
            .await
            .expect("Failed to create chat");

        f.repo.delete(chat.id).await.expect("Failed to delete chat");

        assert!(f.repo.get_by_id(chat.id).await.unwrap().is_none());
    }
}
