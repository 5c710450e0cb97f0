//! Message repository
//!
//! Database operations for the append-only message log. Messages are always
//! read in creation order (oldest first) with offset/limit pagination; the
//! `(chat_id, created_at)` index backs both the listing and the cascade
//! delete that accompanies chat deletion.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Message;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Message repository trait
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Append a new message
    async fn create(&self, message: &Message) -> Result<Message>;

    /// List a chat's messages, oldest first, paginated
    async fn list_by_chat(&self, chat_id: i64, offset: i64, limit: i64) -> Result<Vec<Message>>;

    /// Count the messages in a chat
    async fn count_by_chat(&self, chat_id: i64) -> Result<i64>;

    /// Delete all messages of a chat, returning the count
    async fn delete_by_chat(&self, chat_id: i64) -> Result<i64>;
}

/// SQLx-based message repository implementation
pub struct SqlxMessageRepository {
    pool: DynDatabasePool,
}

impl SqlxMessageRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a shared repository for dependency injection
    pub fn shared(pool: DynDatabasePool) -> Arc<dyn MessageRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl MessageRepository for SqlxMessageRepository {
    async fn create(&self, message: &Message) -> Result<Message> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.as_sqlite().unwrap(), message).await,
            DatabaseDriver::Mysql => create_mysql(self.pool.as_mysql().unwrap(), message).await,
        }
    }

    async fn list_by_chat(&self, chat_id: i64, offset: i64, limit: i64) -> Result<Vec<Message>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_by_chat_sqlite(self.pool.as_sqlite().unwrap(), chat_id, offset, limit).await
            }
            DatabaseDriver::Mysql => {
                list_by_chat_mysql(self.pool.as_mysql().unwrap(), chat_id, offset, limit).await
            }
        }
    }

    async fn count_by_chat(&self, chat_id: i64) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                count_by_chat_sqlite(self.pool.as_sqlite().unwrap(), chat_id).await
            }
            DatabaseDriver::Mysql => {
                count_by_chat_mysql(self.pool.as_mysql().unwrap(), chat_id).await
            }
        }
    }

    async fn delete_by_chat(&self, chat_id: i64) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                delete_by_chat_sqlite(self.pool.as_sqlite().unwrap(), chat_id).await
            }
            DatabaseDriver::Mysql => {
                delete_by_chat_mysql(self.pool.as_mysql().unwrap(), chat_id).await
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_sqlite(pool: &SqlitePool, message: &Message) -> Result<Message> {
    let now = Utc::now();

    let result =
        sqlx::query("INSERT INTO messages (chat_id, sender_id, content, created_at) VALUES (?, ?, ?, ?)")
            .bind(message.chat_id)
            .bind(message.sender_id)
            .bind(&message.content)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create message")?;

    Ok(Message {
        id: result.last_insert_rowid(),
        chat_id: message.chat_id,
        sender_id: message.sender_id,
        content: message.content.clone(),
        created_at: now,
    })
}

async fn list_by_chat_sqlite(
    pool: &SqlitePool,
    chat_id: i64,
    offset: i64,
    limit: i64,
) -> Result<Vec<Message>> {
    let rows = sqlx::query(
        "SELECT id, chat_id, sender_id, content, created_at FROM messages \
         WHERE chat_id = ? ORDER BY created_at, id LIMIT ? OFFSET ?",
    )
    .bind(chat_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .context("Failed to list messages")?;

    Ok(rows.iter().map(row_to_message_sqlite).collect())
}

async fn count_by_chat_sqlite(pool: &SqlitePool, chat_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE chat_id = ?")
        .bind(chat_id)
        .fetch_one(pool)
        .await
        .context("Failed to count messages")?;

    Ok(count)
}

async fn delete_by_chat_sqlite(pool: &SqlitePool, chat_id: i64) -> Result<i64> {
    let result = sqlx::query("DELETE FROM messages WHERE chat_id = ?")
        .bind(chat_id)
        .execute(pool)
        .await
        .context("Failed to delete messages")?;

    Ok(result.rows_affected() as i64)
}

fn row_to_message_sqlite(row: &sqlx::sqlite::SqliteRow) -> Message {
    Message {
        id: row.get("id"),
        chat_id: row.get("chat_id"),
        sender_id: row.get("sender_id"),
        content: row.get("content"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(pool: &MySqlPool, message: &Message) -> Result<Message> {
    let now = Utc::now();

    let result =
        sqlx::query("INSERT INTO messages (chat_id, sender_id, content, created_at) VALUES (?, ?, ?, ?)")
            .bind(message.chat_id)
            .bind(message.sender_id)
            .bind(&message.content)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create message")?;

    Ok(Message {
        id: result.last_insert_id() as i64,
        chat_id: message.chat_id,
        sender_id: message.sender_id,
        content: message.content.clone(),
        created_at: now,
    })
}

async fn list_by_chat_mysql(
    pool: &MySqlPool,
    chat_id: i64,
    offset: i64,
    limit: i64,
) -> Result<Vec<Message>> {
    let rows = sqlx::query(
        "SELECT id, chat_id, sender_id, content, created_at FROM messages \
         WHERE chat_id = ? ORDER BY created_at, id LIMIT ? OFFSET ?",
    )
    .bind(chat_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .context("Failed to list messages")?;

    Ok(rows.iter().map(row_to_message_mysql).collect())
}

async fn count_by_chat_mysql(pool: &MySqlPool, chat_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE chat_id = ?")
        .bind(chat_id)
        .fetch_one(pool)
        .await
        .context("Failed to count messages")?;

    Ok(count)
}

async fn delete_by_chat_mysql(pool: &MySqlPool, chat_id: i64) -> Result<i64> {
    let result = sqlx::query("DELETE FROM messages WHERE chat_id = ?")
        .bind(chat_id)
        .execute(pool)
        .await
        .context("Failed to delete messages")?;

    Ok(result.rows_affected() as i64)
}

fn row_to_message_mysql(row: &sqlx::mysql::MySqlRow) -> Message {
    Message {
        id: row.get("id"),
        chat_id: row.get("chat_id"),
        sender_id: row.get("sender_id"),
        content: row.get("content"),
        created_at: row.get("created_at"),
    }
}
