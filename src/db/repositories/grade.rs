//! Grade repository
//!
//! Database operations for grades. The (assignment, student) pair is unique;
//! `upsert` overwrites an existing row in place instead of appending.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Grade;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Grade repository trait
#[async_trait]
pub trait GradeRepository: Send + Sync {
    /// Insert the grade, or overwrite the existing (assignment, student)
    /// row's score/feedback/grader/timestamp
    async fn upsert(
        &self,
        assignment_id: i64,
        student_id: i64,
        score: f64,
        feedback: &str,
        graded_by: i64,
    ) -> Result<Grade>;

    /// Get the grade for an (assignment, student) pair
    async fn get_by_assignment_and_student(
        &self,
        assignment_id: i64,
        student_id: i64,
    ) -> Result<Option<Grade>>;

    /// List every grade recorded for an assignment
    async fn list_by_assignment(&self, assignment_id: i64) -> Result<Vec<Grade>>;

    /// List a student's grades across all assignments of a class
    async fn list_for_student_in_class(
        &self,
        class_id: i64,
        student_id: i64,
    ) -> Result<Vec<Grade>>;

    /// Delete all grades referencing an assignment, returning the count
    async fn delete_by_assignment(&self, assignment_id: i64) -> Result<i64>;
}

/// SQLx-based grade repository implementation
pub struct SqlxGradeRepository {
    pool: DynDatabasePool,
}

impl SqlxGradeRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a shared repository for dependency injection
    pub fn shared(pool: DynDatabasePool) -> Arc<dyn GradeRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl GradeRepository for SqlxGradeRepository {
    async fn upsert(
        &self,
        assignment_id: i64,
        student_id: i64,
        score: f64,
        feedback: &str,
        graded_by: i64,
    ) -> Result<Grade> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                upsert_sqlite(
                    self.pool.as_sqlite().unwrap(),
                    assignment_id,
                    student_id,
                    score,
                    feedback,
                    graded_by,
                )
                .await
            }
            DatabaseDriver::Mysql => {
                upsert_mysql(
                    self.pool.as_mysql().unwrap(),
                    assignment_id,
                    student_id,
                    score,
                    feedback,
                    graded_by,
                )
                .await
            }
        }
    }

    async fn get_by_assignment_and_student(
        &self,
        assignment_id: i64,
        student_id: i64,
    ) -> Result<Option<Grade>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_sqlite(self.pool.as_sqlite().unwrap(), assignment_id, student_id).await
            }
            DatabaseDriver::Mysql => {
                get_mysql(self.pool.as_mysql().unwrap(), assignment_id, student_id).await
            }
        }
    }

    async fn list_by_assignment(&self, assignment_id: i64) -> Result<Vec<Grade>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_by_assignment_sqlite(self.pool.as_sqlite().unwrap(), assignment_id).await
            }
            DatabaseDriver::Mysql => {
                list_by_assignment_mysql(self.pool.as_mysql().unwrap(), assignment_id).await
            }
        }
    }

    async fn list_for_student_in_class(
        &self,
        class_id: i64,
        student_id: i64,
    ) -> Result<Vec<Grade>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_for_student_sqlite(self.pool.as_sqlite().unwrap(), class_id, student_id).await
            }
            DatabaseDriver::Mysql => {
                list_for_student_mysql(self.pool.as_mysql().unwrap(), class_id, student_id).await
            }
        }
    }

    async fn delete_by_assignment(&self, assignment_id: i64) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                delete_by_assignment_sqlite(self.pool.as_sqlite().unwrap(), assignment_id).await
            }
            DatabaseDriver::Mysql => {
                delete_by_assignment_mysql(self.pool.as_mysql().unwrap(), assignment_id).await
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn upsert_sqlite(
    pool: &SqlitePool,
    assignment_id: i64,
    student_id: i64,
    score: f64,
    feedback: &str,
    graded_by: i64,
) -> Result<Grade> {
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO grades (assignment_id, student_id, score, feedback, graded_by, graded_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT (assignment_id, student_id)
        DO UPDATE SET score = excluded.score, feedback = excluded.feedback,
                      graded_by = excluded.graded_by, graded_at = excluded.graded_at
        "#,
    )
    .bind(assignment_id)
    .bind(student_id)
    .bind(score)
    .bind(feedback)
    .bind(graded_by)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to save grade")?;

    get_sqlite(pool, assignment_id, student_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Grade not found after save"))
}

async fn get_sqlite(
    pool: &SqlitePool,
    assignment_id: i64,
    student_id: i64,
) -> Result<Option<Grade>> {
    let row = sqlx::query(
        "SELECT id, assignment_id, student_id, score, feedback, graded_by, graded_at \
         FROM grades WHERE assignment_id = ? AND student_id = ?",
    )
    .bind(assignment_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await
    .context("Failed to get grade")?;

    match row {
        Some(row) => Ok(Some(row_to_grade_sqlite(&row))),
        None => Ok(None),
    }
}

async fn list_by_assignment_sqlite(pool: &SqlitePool, assignment_id: i64) -> Result<Vec<Grade>> {
    let rows = sqlx::query(
        "SELECT id, assignment_id, student_id, score, feedback, graded_by, graded_at \
         FROM grades WHERE assignment_id = ? ORDER BY id",
    )
    .bind(assignment_id)
    .fetch_all(pool)
    .await
    .context("Failed to list grades for assignment")?;

    Ok(rows.iter().map(row_to_grade_sqlite).collect())
}

async fn list_for_student_sqlite(
    pool: &SqlitePool,
    class_id: i64,
    student_id: i64,
) -> Result<Vec<Grade>> {
    let rows = sqlx::query(
        r#"
        SELECT g.id, g.assignment_id, g.student_id, g.score, g.feedback, g.graded_by, g.graded_at
        FROM grades g
        JOIN assignments a ON a.id = g.assignment_id
        WHERE a.class_id = ? AND g.student_id = ?
        ORDER BY a.due_date, a.id
        "#,
    )
    .bind(class_id)
    .bind(student_id)
    .fetch_all(pool)
    .await
    .context("Failed to list grades for student")?;

    Ok(rows.iter().map(row_to_grade_sqlite).collect())
}

async fn delete_by_assignment_sqlite(pool: &SqlitePool, assignment_id: i64) -> Result<i64> {
    let result = sqlx::query("DELETE FROM grades WHERE assignment_id = ?")
        .bind(assignment_id)
        .execute(pool)
        .await
        .context("Failed to delete grades for assignment")?;

    Ok(result.rows_affected() as i64)
}

fn row_to_grade_sqlite(row: &sqlx::sqlite::SqliteRow) -> Grade {
    let graded_at: DateTime<Utc> = row.get("graded_at");
    Grade {
        id: row.get("id"),
        assignment_id: row.get("assignment_id"),
        student_id: row.get("student_id"),
        score: row.get("score"),
        feedback: row.get("feedback"),
        graded_by: row.get("graded_by"),
        graded_at,
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn upsert_mysql(
    pool: &MySqlPool,
    assignment_id: i64,
    student_id: i64,
    score: f64,
    feedback: &str,
    graded_by: i64,
) -> Result<Grade> {
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO grades (assignment_id, student_id, score, feedback, graded_by, graded_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE score = VALUES(score), feedback = VALUES(feedback),
                                graded_by = VALUES(graded_by), graded_at = VALUES(graded_at)
        "#,
    )
    .bind(assignment_id)
    .bind(student_id)
    .bind(score)
    .bind(feedback)
    .bind(graded_by)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to save grade")?;

    get_mysql(pool, assignment_id, student_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Grade not found after save"))
}

async fn get_mysql(
    pool: &MySqlPool,
    assignment_id: i64,
    student_id: i64,
) -> Result<Option<Grade>> {
    let row = sqlx::query(
        "SELECT id, assignment_id, student_id, score, feedback, graded_by, graded_at \
         FROM grades WHERE assignment_id = ? AND student_id = ?",
    )
    .bind(assignment_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await
    .context("Failed to get grade")?;

    match row {
        Some(row) => Ok(Some(row_to_grade_mysql(&row))),
        None => Ok(None),
    }
}

async fn list_by_assignment_mysql(pool: &MySqlPool, assignment_id: i64) -> Result<Vec<Grade>> {
    let rows = sqlx::query(
        "SELECT id, assignment_id, student_id, score, feedback, graded_by, graded_at \
         FROM grades WHERE assignment_id = ? ORDER BY id",
    )
    .bind(assignment_id)
    .fetch_all(pool)
    .await
    .context("Failed to list grades for assignment")?;

    Ok(rows.iter().map(row_to_grade_mysql).collect())
}

async fn list_for_student_mysql(
    pool: &MySqlPool,
    class_id: i64,
    student_id: i64,
) -> Result<Vec<Grade>> {
    let rows = sqlx::query(
        r#"
        SELECT g.id, g.assignment_id, g.student_id, g.score, g.feedback, g.graded_by, g.graded_at
        FROM grades g
        JOIN assignments a ON a.id = g.assignment_id
        WHERE a.class_id = ? AND g.student_id = ?
        ORDER BY a.due_date, a.id
        "#,
    )
    .bind(class_id)
    .bind(student_id)
    .fetch_all(pool)
    .await
    .context("Failed to list grades for student")?;

    Ok(rows.iter().map(row_to_grade_mysql).collect())
}

async fn delete_by_assignment_mysql(pool: &MySqlPool, assignment_id: i64) -> Result<i64> {
    let result = sqlx::query("DELETE FROM grades WHERE assignment_id = ?")
        .bind(assignment_id)
        .execute(pool)
        .await
        .context("Failed to delete grades for assignment")?;

    Ok(result.rows_affected() as i64)
}

fn row_to_grade_mysql(row: &sqlx::mysql::MySqlRow) -> Grade {
    Grade {
        id: row.get("id"),
        assignment_id: row.get("assignment_id"),
        student_id: row.get("student_id"),
        score: row.get("score"),
        feedback: row.get("feedback"),
        graded_by: row.get("graded_by"),
        graded_at: row.get("graded_at"),
    }
}
