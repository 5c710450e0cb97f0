//! Calendar event repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Event;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Event repository trait
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Create a new event
    async fn create(&self, event: &Event) -> Result<Event>;

    /// Get event by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Event>>;

    /// List a user's events, ascending by date then time
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Event>>;

    /// Delete an event
    async fn delete(&self, id: i64) -> Result<()>;
}

/// SQLx-based event repository implementation
pub struct SqlxEventRepository {
    pool: DynDatabasePool,
}

impl SqlxEventRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a shared repository for dependency injection
    pub fn shared(pool: DynDatabasePool) -> Arc<dyn EventRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl EventRepository for SqlxEventRepository {
    async fn create(&self, event: &Event) -> Result<Event> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.as_sqlite().unwrap(), event).await,
            DatabaseDriver::Mysql => create_mysql(self.pool.as_mysql().unwrap(), event).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Event>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Event>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_for_user_sqlite(self.pool.as_sqlite().unwrap(), user_id).await
            }
            DatabaseDriver::Mysql => {
                list_for_user_mysql(self.pool.as_mysql().unwrap(), user_id).await
            }
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

async fn create_sqlite(pool: &SqlitePool, event: &Event) -> Result<Event> {
    let now = Utc::now();

    let result = sqlx::query(
        "INSERT INTO events (user_id, title, date, time, color, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(event.user_id)
    .bind(&event.title)
    .bind(event.date)
    .bind(&event.time)
    .bind(&event.color)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create event")?;

    Ok(Event {
        id: result.last_insert_rowid(),
        user_id: event.user_id,
        title: event.title.clone(),
        date: event.date,
        time: event.time.clone(),
        color: event.color.clone(),
        created_at: now,
    })
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Event>> {
    let row = sqlx::query(
        "SELECT id, user_id, title, date, time, color, created_at FROM events WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get event by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_event_sqlite(&row))),
        None => Ok(None),
    }
}

async fn list_for_user_sqlite(pool: &SqlitePool, user_id: i64) -> Result<Vec<Event>> {
    let rows = sqlx::query(
        "SELECT id, user_id, title, date, time, color, created_at FROM events \
         WHERE user_id = ? ORDER BY date, time, id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to list events")?;

    Ok(rows.iter().map(row_to_event_sqlite).collect())
}

async fn delete_sqlite(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM events WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete event")?;

    Ok(())
}

fn row_to_event_sqlite(row: &sqlx::sqlite::SqliteRow) -> Event {
    Event {
        id: row.get("id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        date: row.get("date"),
        time: row.get("time"),
        color: row.get("color"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(pool: &MySqlPool, event: &Event) -> Result<Event> {
    let now = Utc::now();

    let result = sqlx::query(
        "INSERT INTO events (user_id, title, date, time, color, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(event.user_id)
    .bind(&event.title)
    .bind(event.date)
    .bind(&event.time)
    .bind(&event.color)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create event")?;

    Ok(Event {
        id: result.last_insert_id() as i64,
        user_id: event.user_id,
        title: event.title.clone(),
        date: event.date,
        time: event.time.clone(),
        color: event.color.clone(),
        created_at: now,
    })
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Event>> {
    let row = sqlx::query(
        "SELECT id, user_id, title, date, time, color, created_at FROM events WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get event by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_event_mysql(&row))),
        None => Ok(None),
    }
}

async fn list_for_user_mysql(pool: &MySqlPool, user_id: i64) -> Result<Vec<Event>> {
    let rows = sqlx::query(
        "SELECT id, user_id, title, date, time, color, created_at FROM events \
         WHERE user_id = ? ORDER BY date, time, id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to list events")?;

    Ok(rows.iter().map(row_to_event_mysql).collect())
}

async fn delete_mysql(pool: &MySqlPool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM events WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete event")?;

    Ok(())
}

fn row_to_event_mysql(row: &sqlx::mysql::MySqlRow) -> Event {
    Event {
        id: row.get("id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        date: row.get("date"),
        time: row.get("time"),
        color: row.get("color"),
        created_at: row.get("created_at"),
    }
}
