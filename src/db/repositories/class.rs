//! Class repository
//!
//! Database operations for the class registry and its membership table.
//! Role predicates in the service layer reduce to `get_by_id` (creator
//! check) and `is_member` (membership row lookup), both single indexed
//! queries.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Class, User};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

use super::user::{row_to_user_mysql, row_to_user_sqlite};

/// Class repository trait
#[async_trait]
pub trait ClassRepository: Send + Sync {
    /// Create a new class
    async fn create(&self, class: &Class) -> Result<Class>;

    /// Get class by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Class>>;

    /// Get class by (upper-cased) join code
    async fn get_by_join_code(&self, code: &str) -> Result<Option<Class>>;

    /// Check whether a join code is already taken
    async fn join_code_exists(&self, code: &str) -> Result<bool>;

    /// Add a user to the member set
    async fn add_member(&self, class_id: i64, user_id: i64) -> Result<()>;

    /// Check whether a user is in the member set
    async fn is_member(&self, class_id: i64, user_id: i64) -> Result<bool>;

    /// List the member users of a class, joined-first
    async fn list_members(&self, class_id: i64) -> Result<Vec<User>>;

    /// List every class the user created or joined, newest-first
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Class>>;
}

/// SQLx-based class repository implementation
pub struct SqlxClassRepository {
    pool: DynDatabasePool,
}

impl SqlxClassRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a shared repository for dependency injection
    pub fn shared(pool: DynDatabasePool) -> Arc<dyn ClassRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ClassRepository for SqlxClassRepository {
    async fn create(&self, class: &Class) -> Result<Class> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.as_sqlite().unwrap(), class).await,
            DatabaseDriver::Mysql => create_mysql(self.pool.as_mysql().unwrap(), class).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Class>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn get_by_join_code(&self, code: &str) -> Result<Option<Class>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_by_join_code_sqlite(self.pool.as_sqlite().unwrap(), code).await
            }
            DatabaseDriver::Mysql => {
                get_by_join_code_mysql(self.pool.as_mysql().unwrap(), code).await
            }
        }
    }

    async fn join_code_exists(&self, code: &str) -> Result<bool> {
        Ok(self.get_by_join_code(code).await?.is_some())
    }

    async fn add_member(&self, class_id: i64, user_id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                add_member_sqlite(self.pool.as_sqlite().unwrap(), class_id, user_id).await
            }
            DatabaseDriver::Mysql => {
                add_member_mysql(self.pool.as_mysql().unwrap(), class_id, user_id).await
            }
        }
    }

    async fn is_member(&self, class_id: i64, user_id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                is_member_sqlite(self.pool.as_sqlite().unwrap(), class_id, user_id).await
            }
            DatabaseDriver::Mysql => {
                is_member_mysql(self.pool.as_mysql().unwrap(), class_id, user_id).await
            }
        }
    }

    async fn list_members(&self, class_id: i64) -> Result<Vec<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_members_sqlite(self.pool.as_sqlite().unwrap(), class_id).await
            }
            DatabaseDriver::Mysql => {
                list_members_mysql(self.pool.as_mysql().unwrap(), class_id).await
            }
        }
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Class>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_for_user_sqlite(self.pool.as_sqlite().unwrap(), user_id).await
            }
            DatabaseDriver::Mysql => {
                list_for_user_mysql(self.pool.as_mysql().unwrap(), user_id).await
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_sqlite(pool: &SqlitePool, class: &Class) -> Result<Class> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO classes (name, description, creator_id, join_code, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&class.name)
    .bind(&class.description)
    .bind(class.creator_id)
    .bind(&class.join_code)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create class")?;

    Ok(Class {
        id: result.last_insert_rowid(),
        name: class.name.clone(),
        description: class.description.clone(),
        creator_id: class.creator_id,
        join_code: class.join_code.clone(),
        created_at: now,
        updated_at: now,
    })
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Class>> {
    let row = sqlx::query(
        "SELECT id, name, description, creator_id, join_code, created_at, updated_at \
         FROM classes WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get class by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_class_sqlite(&row))),
        None => Ok(None),
    }
}

async fn get_by_join_code_sqlite(pool: &SqlitePool, code: &str) -> Result<Option<Class>> {
    let row = sqlx::query(
        "SELECT id, name, description, creator_id, join_code, created_at, updated_at \
         FROM classes WHERE join_code = ?",
    )
    .bind(code)
    .fetch_optional(pool)
    .await
    .context("Failed to get class by join code")?;

    match row {
        Some(row) => Ok(Some(row_to_class_sqlite(&row))),
        None => Ok(None),
    }
}

async fn add_member_sqlite(pool: &SqlitePool, class_id: i64, user_id: i64) -> Result<()> {
    sqlx::query("INSERT INTO class_members (class_id, user_id) VALUES (?, ?)")
        .bind(class_id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to add class member")?;

    Ok(())
}

async fn is_member_sqlite(pool: &SqlitePool, class_id: i64, user_id: i64) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM class_members WHERE class_id = ? AND user_id = ?",
    )
    .bind(class_id)
    .bind(user_id)
    .fetch_one(pool)
    .await
    .context("Failed to check class membership")?;

    Ok(count > 0)
}

async fn list_members_sqlite(pool: &SqlitePool, class_id: i64) -> Result<Vec<User>> {
    let rows = sqlx::query(
        r#"
        SELECT u.id, u.email, u.password_hash, u.display_name, u.created_at, u.updated_at
        FROM class_members cm
        JOIN users u ON u.id = cm.user_id
        WHERE cm.class_id = ?
        ORDER BY cm.joined_at, cm.id
        "#,
    )
    .bind(class_id)
    .fetch_all(pool)
    .await
    .context("Failed to list class members")?;

    Ok(rows.iter().map(row_to_user_sqlite).collect())
}

async fn list_for_user_sqlite(pool: &SqlitePool, user_id: i64) -> Result<Vec<Class>> {
    let rows = sqlx::query(
        r#"
        SELECT DISTINCT c.id, c.name, c.description, c.creator_id, c.join_code,
               c.created_at, c.updated_at
        FROM classes c
        LEFT JOIN class_members cm ON cm.class_id = c.id
        WHERE c.creator_id = ? OR cm.user_id = ?
        ORDER BY c.created_at DESC, c.id DESC
        "#,
    )
    .bind(user_id)
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to list classes for user")?;

    Ok(rows.iter().map(row_to_class_sqlite).collect())
}

fn row_to_class_sqlite(row: &sqlx::sqlite::SqliteRow) -> Class {
    Class {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        creator_id: row.get("creator_id"),
        join_code: row.get("join_code"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(pool: &MySqlPool, class: &Class) -> Result<Class> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO classes (name, description, creator_id, join_code, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&class.name)
    .bind(&class.description)
    .bind(class.creator_id)
    .bind(&class.join_code)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create class")?;

    Ok(Class {
        id: result.last_insert_id() as i64,
        name: class.name.clone(),
        description: class.description.clone(),
        creator_id: class.creator_id,
        join_code: class.join_code.clone(),
        created_at: now,
        updated_at: now,
    })
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Class>> {
    let row = sqlx::query(
        "SELECT id, name, description, creator_id, join_code, created_at, updated_at \
         FROM classes WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get class by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_class_mysql(&row))),
        None => Ok(None),
    }
}

async fn get_by_join_code_mysql(pool: &MySqlPool, code: &str) -> Result<Option<Class>> {
    let row = sqlx::query(
        "SELECT id, name, description, creator_id, join_code, created_at, updated_at \
         FROM classes WHERE join_code = ?",
    )
    .bind(code)
    .fetch_optional(pool)
    .await
    .context("Failed to get class by join code")?;

    match row {
        Some(row) => Ok(Some(row_to_class_mysql(&row))),
        None => Ok(None),
    }
}

async fn add_member_mysql(pool: &MySqlPool, class_id: i64, user_id: i64) -> Result<()> {
    sqlx::query("INSERT INTO class_members (class_id, user_id) VALUES (?, ?)")
        .bind(class_id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to add class member")?;

    Ok(())
}

async fn is_member_mysql(pool: &MySqlPool, class_id: i64, user_id: i64) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM class_members WHERE class_id = ? AND user_id = ?",
    )
    .bind(class_id)
    .bind(user_id)
    .fetch_one(pool)
    .await
    .context("Failed to check class membership")?;

    Ok(count > 0)
}

async fn list_members_mysql(pool: &MySqlPool, class_id: i64) -> Result<Vec<User>> {
    let rows = sqlx::query(
        r#"
        SELECT u.id, u.email, u.password_hash, u.display_name, u.created_at, u.updated_at
        FROM class_members cm
        JOIN users u ON u.id = cm.user_id
        WHERE cm.class_id = ?
        ORDER BY cm.joined_at, cm.id
        "#,
    )
    .bind(class_id)
    .fetch_all(pool)
    .await
    .context("Failed to list class members")?;

    Ok(rows.iter().map(row_to_user_mysql).collect())
}

async fn list_for_user_mysql(pool: &MySqlPool, user_id: i64) -> Result<Vec<Class>> {
    let rows = sqlx::query(
        r#"
        SELECT DISTINCT c.id, c.name, c.description, c.creator_id, c.join_code,
               c.created_at, c.updated_at
        FROM classes c
        LEFT JOIN class_members cm ON cm.class_id = c.id
        WHERE c.creator_id = ? OR cm.user_id = ?
        ORDER BY c.created_at DESC, c.id DESC
        "#,
    )
    .bind(user_id)
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to list classes for user")?;

    Ok(rows.iter().map(row_to_class_mysql).collect())
}

fn row_to_class_mysql(row: &sqlx::mysql::MySqlRow) -> Class {
    Class {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        creator_id: row.get("creator_id"),
        join_code: row.get("join_code"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::UserRepository;
    use crate::db::{create_test_pool, migrations};
    use crate::models::User;

    async fn setup() -> (SqlxClassRepository, i64, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = super::super::SqlxUserRepository::new(pool.clone());
        let teacher = users
            .create(&User::new("teacher@example.com".to_string(), "hash".to_string()))
            .await
            .expect("Failed to create teacher");
        let student = users
            .create(&User::new("student@example.com".to_string(), "hash".to_string()))
            .await
            .expect("Failed to create student");

        (SqlxClassRepository::new(pool), teacher.id, student.id)
    }

    fn class_for(creator_id: i64, code: &str) -> Class {
        let now = Utc::now();
        Class {
            id: 0,
            name: "CS 1".to_string(),
            description: "Intro".to_string(),
            creator_id,
            join_code: code.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup_by_code() {
        let (repo, teacher, _) = setup().await;
        let created = repo
            .create(&class_for(teacher, "ABC123"))
            .await
            .expect("Failed to create class");
        assert!(created.id > 0);

        let found = repo
            .get_by_join_code("ABC123")
            .await
            .expect("Failed to look up class")
            .expect("Class not found");
        assert_eq!(found.id, created.id);

        assert!(repo.join_code_exists("ABC123").await.unwrap());
        assert!(!repo.join_code_exists("ZZZ999").await.unwrap());
    }

    #[tokio::test]
    async fn test_membership() {
        let (repo, teacher, student) = setup().await;
        let class = repo
            .create(&class_for(teacher, "ABC123"))
            .await
            .expect("Failed to create class");

        assert!(!repo.is_member(class.id, student).await.unwrap());

        repo.add_member(class.id, student)
            .await
            .expect("Failed to add member");

        assert!(repo.is_member(class.id, student).await.unwrap());
        // The creator is never a member
        assert!(!repo.is_member(class.id, teacher).await.unwrap());

        let members = repo.list_members(class.id).await.expect("Failed to list");
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id, student);
    }

    #[tokio::test]
    async fn test_duplicate_membership_rejected() {
        let (repo, teacher, student) = setup().await;
        let class = repo
            .create(&class_for(teacher, "ABC123"))
            .await
            .expect("Failed to create class");

        repo.add_member(class.id, student)
            .await
            .expect("Failed to add member");
        let second = repo.add_member(class.id, student).await;
        assert!(second.is_err(), "Duplicate membership row must be rejected");
    }

    #[tokio::test]
    async fn test_list_for_user_covers_both_roles() {
        let (repo, teacher, student) = setup().await;
        let owned = repo
            .create(&class_for(teacher, "AAAAAA"))
            .await
            .expect("Failed to create class");
        let joined = repo
            .create(&class_for(student, "BBBBBB"))
            .await
            .expect("Failed to create class");
        repo.add_member(joined.id, teacher)
            .await
            .expect("Failed to add member");

        let classes = repo.list_for_user(teacher).await.expect("Failed to list");
        let ids: Vec<i64> = classes.iter().map(|c| c.id).collect();
        assert!(ids.contains(&owned.id));
        assert!(ids.contains(&joined.id));
        assert_eq!(classes.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_join_code_rejected() {
        let (repo, teacher, _) = setup().await;
        repo.create(&class_for(teacher, "SAME99"))
            .await
            .expect("Failed to create class");

        let second = repo.create(&class_for(teacher, "SAME99")).await;
        assert!(second.is_err(), "Join codes are unique");
    }
}
