//! Assignment repository
//!
//! Database operations for assignments. Class listings come back in due-date
//! order; the cross-class listing joins in the class name for display.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Assignment;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// An assignment annotated with the name of its class
#[derive(Debug, Clone)]
pub struct AssignmentWithClass {
    pub assignment: Assignment,
    pub class_name: String,
}

/// Assignment repository trait
#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    /// Create a new assignment
    async fn create(&self, assignment: &Assignment) -> Result<Assignment>;

    /// Get assignment by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Assignment>>;

    /// List a class's assignments, ascending by due date
    async fn list_by_class(&self, class_id: i64) -> Result<Vec<Assignment>>;

    /// List assignments across every class the user created or joined,
    /// ascending by due date
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<AssignmentWithClass>>;

    /// Delete an assignment
    async fn delete(&self, id: i64) -> Result<()>;
}

/// SQLx-based assignment repository implementation
pub struct SqlxAssignmentRepository {
    pool: DynDatabasePool,
}

impl SqlxAssignmentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a shared repository for dependency injection
    pub fn shared(pool: DynDatabasePool) -> Arc<dyn AssignmentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AssignmentRepository for SqlxAssignmentRepository {
    async fn create(&self, assignment: &Assignment) -> Result<Assignment> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_sqlite(self.pool.as_sqlite().unwrap(), assignment).await
            }
            DatabaseDriver::Mysql => create_mysql(self.pool.as_mysql().unwrap(), assignment).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Assignment>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn list_by_class(&self, class_id: i64) -> Result<Vec<Assignment>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_by_class_sqlite(self.pool.as_sqlite().unwrap(), class_id).await
            }
            DatabaseDriver::Mysql => {
                list_by_class_mysql(self.pool.as_mysql().unwrap(), class_id).await
            }
        }
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<AssignmentWithClass>> {
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

async fn create_sqlite(pool: &SqlitePool, assignment: &Assignment) -> Result<Assignment> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO assignments
            (class_id, title, description, due_date, points_possible, created_by, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(assignment.class_id)
    .bind(&assignment.title)
    .bind(&assignment.description)
    .bind(assignment.due_date)
    .bind(assignment.points_possible)
    .bind(assignment.created_by)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create assignment")?;

    Ok(Assignment {
        id: result.last_insert_rowid(),
        class_id: assignment.class_id,
        title: assignment.title.clone(),
        description: assignment.description.clone(),
        due_date: assignment.due_date,
        points_possible: assignment.points_possible,
        created_by: assignment.created_by,
        created_at: now,
        updated_at: now,
    })
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Assignment>> {
    let row = sqlx::query(
        "SELECT id, class_id, title, description, due_date, points_possible, created_by, \
         created_at, updated_at FROM assignments WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get assignment by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_assignment_sqlite(&row))),
        None => Ok(None),
    }
}

async fn list_by_class_sqlite(pool: &SqlitePool, class_id: i64) -> Result<Vec<Assignment>> {
    let rows = sqlx::query(
        "SELECT id, class_id, title, description, due_date, points_possible, created_by, \
         created_at, updated_at FROM assignments WHERE class_id = ? ORDER BY due_date, id",
    )
    .bind(class_id)
    .fetch_all(pool)
    .await
    .context("Failed to list assignments")?;

    Ok(rows.iter().map(row_to_assignment_sqlite).collect())
}

async fn list_for_user_sqlite(pool: &SqlitePool, user_id: i64) -> Result<Vec<AssignmentWithClass>> {
    let rows = sqlx::query(
        r#"
        SELECT DISTINCT a.id, a.class_id, a.title, a.description, a.due_date,
               a.points_possible, a.created_by, a.created_at, a.updated_at,
               c.name AS class_name
        FROM assignments a
        JOIN classes c ON c.id = a.class_id
        LEFT JOIN class_members cm ON cm.class_id = c.id
        WHERE c.creator_id = ? OR cm.user_id = ?
        ORDER BY a.due_date, a.id
        "#,
    )
    .bind(user_id)
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to list assignments for user")?;

    Ok(rows
        .iter()
        .map(|row| AssignmentWithClass {
            assignment: row_to_assignment_sqlite(row),
            class_name: row.get("class_name"),
        })
        .collect())
}

async fn delete_sqlite(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM assignments WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete assignment")?;

    Ok(())
}

fn row_to_assignment_sqlite(row: &sqlx::sqlite::SqliteRow) -> Assignment {
    Assignment {
        id: row.get("id"),
        class_id: row.get("class_id"),
        title: row.get("title"),
        description: row.get("description"),
        due_date: row.get("due_date"),
        points_possible: row.get("points_possible"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(pool: &MySqlPool, assignment: &Assignment) -> Result<Assignment> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO assignments
            (class_id, title, description, due_date, points_possible, created_by, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(assignment.class_id)
    .bind(&assignment.title)
    .bind(&assignment.description)
    .bind(assignment.due_date)
    .bind(assignment.points_possible)
    .bind(assignment.created_by)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create assignment")?;

    Ok(Assignment {
        id: result.last_insert_id() as i64,
        class_id: assignment.class_id,
        title: assignment.title.clone(),
        description: assignment.description.clone(),
        due_date: assignment.due_date,
        points_possible: assignment.points_possible,
        created_by: assignment.created_by,
        created_at: now,
        updated_at: now,
    })
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Assignment>> {
    let row = sqlx::query(
        "SELECT id, class_id, title, description, due_date, points_possible, created_by, \
         created_at, updated_at FROM assignments WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get assignment by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_assignment_mysql(&row))),
        None => Ok(None),
    }
}

async fn list_by_class_mysql(pool: &MySqlPool, class_id: i64) -> Result<Vec<Assignment>> {
    let rows = sqlx::query(
        "SELECT id, class_id, title, description, due_date, points_possible, created_by, \
         created_at, updated_at FROM assignments WHERE class_id = ? ORDER BY due_date, id",
    )
    .bind(class_id)
    .fetch_all(pool)
    .await
    .context("Failed to list assignments")?;

    Ok(rows.iter().map(row_to_assignment_mysql).collect())
}

async fn list_for_user_mysql(pool: &MySqlPool, user_id: i64) -> Result<Vec<AssignmentWithClass>> {
    let rows = sqlx::query(
        r#"
        SELECT DISTINCT a.id, a.class_id, a.title, a.description, a.due_date,
               a.points_possible, a.created_by, a.created_at, a.updated_at,
               c.name AS class_name
        FROM assignments a
        JOIN classes c ON c.id = a.class_id
        LEFT JOIN class_members cm ON cm.class_id = c.id
        WHERE c.creator_id = ? OR cm.user_id = ?
        ORDER BY a.due_date, a.id
        "#,
    )
    .bind(user_id)
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to list assignments for user")?;

    Ok(rows
        .iter()
        .map(|row| AssignmentWithClass {
            assignment: row_to_assignment_mysql(row),
            class_name: row.get("class_name"),
        })
        .collect())
}

async fn delete_mysql(pool: &MySqlPool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM assignments WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete assignment")?;

    Ok(())
}

fn row_to_assignment_mysql(row: &sqlx::mysql::MySqlRow) -> Assignment {
    Assignment {
        id: row.get("id"),
        class_id: row.get("class_id"),
        title: row.get("title"),
        description: row.get("description"),
        due_date: row.get("due_date"),
        points_possible: row.get("points_possible"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
