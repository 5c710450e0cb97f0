//! Class service
//!
//! The class registry and the role predicates that gate every class-scoped
//! operation. A user's role is derived from structure, never stored: the
//! class creator is its Instructor, a membership row makes a Student, and
//! joining one's own class is rejected so nobody holds both roles at once.

use crate::db::repositories::ClassRepository;
use crate::models::{Class, ClassRole, User};
use anyhow::Context;
use chrono::Utc;
use rand::rngs::OsRng;
use rand::Rng;
use std::sync::Arc;

/// Join codes are 6 characters drawn from this alphabet.
const JOIN_CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Join code length
const JOIN_CODE_LENGTH: usize = 6;

/// Error types for class service operations
#[derive(Debug, thiserror::Error)]
pub enum ClassServiceError {
    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Class not found
    #[error("{0}")]
    NotFound(String),

    /// Caller lacks the required role
    #[error("{0}")]
    Forbidden(String),

    /// Conflicting state (already a member)
    #[error("{0}")]
    Conflict(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// A class annotated with the caller's role in it
#[derive(Debug, Clone)]
pub struct ClassWithRole {
    pub class: Class,
    pub role: ClassRole,
}

/// Class service: registry, join codes and role predicates
pub struct ClassService {
    class_repo: Arc<dyn ClassRepository>,
}

impl ClassService {
    /// Create a new class service
    pub fn new(class_repo: Arc<dyn ClassRepository>) -> Self {
        Self { class_repo }
    }

    /// Create a class with a freshly generated join code. The creator
    /// becomes the Instructor; the member set starts empty.
    pub async fn create_class(
        &self,
        creator_id: i64,
        input: CreateClassInput,
    ) -> Result<Class, ClassServiceError> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(ClassServiceError::ValidationError(
                "Class name cannot be empty".to_string(),
            ));
        }

        let join_code = self.generate_join_code().await?;

        let now = Utc::now();
        let class = Class {
            id: 0,
            name,
            description: input.description.trim().to_string(),
            creator_id,
            join_code,
            created_at: now,
            updated_at: now,
        };

        let created = self
            .class_repo
            .create(&class)
            .await
            .context("Failed to create class")?;

        Ok(created)
    }

    /// Join a class by its code. Matching is case-insensitive.
    ///
    /// Checked in order: the code must resolve to a class; the caller must
    /// not be the creator; the caller must not already be a member. A repeat
    /// join is an explicit conflict, never a silent success.
    pub async fn join_by_code(&self, user_id: i64, code: &str) -> Result<Class, ClassServiceError> {
        let code = code.trim().to_uppercase();

        let class = self
            .class_repo
            .get_by_join_code(&code)
            .await
            .context("Failed to look up join code")?
            .ok_or_else(|| {
                ClassServiceError::NotFound("No class with that join code".to_string())
            })?;

        if class.creator_id == user_id {
            return Err(ClassServiceError::ValidationError(
                "You are the creator of this class".to_string(),
            ));
        }

        if self
            .class_repo
            .is_member(class.id, user_id)
            .await
            .context("Failed to check membership")?
        {
            return Err(ClassServiceError::Conflict(
                "You are already a member of this class".to_string(),
            ));
        }

        self.class_repo
            .add_member(class.id, user_id)
            .await
            .context("Failed to add member")?;

        Ok(class)
    }

    /// List every class the user created or joined, annotated with the
    /// user's role in each.
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<ClassWithRole>, ClassServiceError> {
        let classes = self
            .class_repo
            .list_for_user(user_id)
            .await
            .context("Failed to list classes")?;

        Ok(classes
            .into_iter()
            .map(|class| {
                let role = if class.creator_id == user_id {
                    ClassRole::Instructor
                } else {
                    ClassRole::Student
                };
                ClassWithRole { class, role }
            })
            .collect())
    }

    /// Get a class by ID
    pub async fn get_class(&self, class_id: i64) -> Result<Option<Class>, ClassServiceError> {
        let class = self
            .class_repo
            .get_by_id(class_id)
            .await
            .context("Failed to get class")?;

        Ok(class)
    }

    /// List the member users (Students) of a class
    pub async fn members(&self, class_id: i64) -> Result<Vec<User>, ClassServiceError> {
        let members = self
            .class_repo
            .list_members(class_id)
            .await
            .context("Failed to list members")?;

        Ok(members)
    }

    // ========================================================================
    // Role predicates
    // ========================================================================

    /// True iff the class exists and the user is its creator. A missing
    /// class yields `false`, not an error.
    pub async fn is_instructor(&self, user_id: i64, class_id: i64) -> Result<bool, ClassServiceError> {
        let class = self
            .class_repo
            .get_by_id(class_id)
            .await
            .context("Failed to get class")?;

        Ok(class.is_some_and(|c| c.creator_id == user_id))
    }

    /// True iff the user appears in the class's member set.
    pub async fn is_member(&self, user_id: i64, class_id: i64) -> Result<bool, ClassServiceError> {
        let member = self
            .class_repo
            .is_member(class_id, user_id)
            .await
            .context("Failed to check membership")?;

        Ok(member)
    }

    /// True iff the user is the Instructor or a Student of the class.
    pub async fn has_class_access(
        &self,
        user_id: i64,
        class_id: i64,
    ) -> Result<bool, ClassServiceError> {
        if self.is_instructor(user_id, class_id).await? {
            return Ok(true);
        }
        self.is_member(user_id, class_id).await
    }

    /// The user's role in the class, creator checked first.
    pub async fn user_role(
        &self,
        user_id: i64,
        class_id: i64,
    ) -> Result<Option<ClassRole>, ClassServiceError> {
        if self.is_instructor(user_id, class_id).await? {
            return Ok(Some(ClassRole::Instructor));
        }
        if self.is_member(user_id, class_id).await? {
            return Ok(Some(ClassRole::Student));
        }
        Ok(None)
    }

    // ========================================================================
    // Guards for class-scoped operations
    // ========================================================================

    /// Load the class and require that the caller is its Instructor or a
    /// Student. Existence is checked first, so a missing class reports
    /// not-found rather than an access failure.
    pub async fn require_access(
        &self,
        user_id: i64,
        class_id: i64,
    ) -> Result<(Class, ClassRole), ClassServiceError> {
        let class = self
            .get_class(class_id)
            .await?
            .ok_or_else(|| ClassServiceError::NotFound("Class not found".to_string()))?;

        let role = if class.creator_id == user_id {
            ClassRole::Instructor
        } else if self.is_member(user_id, class_id).await? {
            ClassRole::Student
        } else {
            return Err(ClassServiceError::Forbidden(
                "You do not have access to this class".to_string(),
            ));
        };

        Ok((class, role))
    }

    /// Load the class and require that the caller is its Instructor.
    /// `action` completes the error message ("Only instructors can …").
    pub async fn require_instructor(
        &self,
        user_id: i64,
        class_id: i64,
        action: &str,
    ) -> Result<Class, ClassServiceError> {
        let class = self
            .get_class(class_id)
            .await?
            .ok_or_else(|| ClassServiceError::NotFound("Class not found".to_string()))?;

        if class.creator_id != user_id {
            return Err(ClassServiceError::Forbidden(format!(
                "Only instructors can {}",
                action
            )));
        }

        Ok(class)
    }

    /// Generate a join code that no existing class uses. Collisions retry;
    /// with 36^6 codes the loop all but never runs twice.
    async fn generate_join_code(&self) -> Result<String, ClassServiceError> {
        loop {
            let code = random_join_code();
            if !self
                .class_repo
                .join_code_exists(&code)
                .await
                .context("Failed to check join code")?
            {
                return Ok(code);
            }
        }
    }
}

/// Draw a 6-character join code from `[A-Z0-9]` using the OS RNG.
fn random_join_code() -> String {
    let mut rng = OsRng;
    (0..JOIN_CODE_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..JOIN_CODE_CHARSET.len());
            JOIN_CODE_CHARSET[idx] as char
        })
        .collect()
}

/// Input for class creation
#[derive(Debug, Clone)]
pub struct CreateClassInput {
    pub name: String,
    pub description: String,
}
