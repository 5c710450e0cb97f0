//! User service
//!
//! Registration, login/logout and session validation. Sessions are opaque
//! uuid-v4 bearer tokens with an absolute expiry; expiry is enforced with an
//! explicit timestamp comparison at lookup time, so a token is unusable the
//! moment it passes its window even if no sweep has run.

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{Session, User};
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Default session validity window in hours
const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

/// Minimum accepted password length
const MIN_PASSWORD_LENGTH: usize = 8;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Authentication failed (invalid credentials)
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Email already registered
    #[error("{0}")]
    EmailTaken(String),

    /// User not found
    #[error("User not found")]
    NotFound,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// User service for accounts and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_ttl_hours: i64,
}

impl UserService {
    /// Create a new user service with the default session window
    pub fn new(user_repo: Arc<dyn UserRepository>, session_repo: Arc<dyn SessionRepository>) -> Self {
        Self {
            user_repo,
            session_repo,
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
        }
    }

    /// Create a new user service with a custom session window
    pub fn with_session_ttl(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_ttl_hours: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_ttl_hours,
        }
    }

    /// Register a new user.
    ///
    /// Emails are unique case-insensitively; the stored form is lowercased
    /// and lookups lowercase the input, so `Alice@X` and `alice@x` are the
    /// same account.
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        self.validate_register_input(&input)?;

        let email = input.email.trim().to_lowercase();

        if self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::EmailTaken(format!(
                "Email '{}' is already registered",
                email
            )));
        }

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;

        let mut user = User::new(email, password_hash);
        user.display_name = input
            .display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        let created = self
            .user_repo
            .create(&user)
            .await
            .context("Failed to create user")?;

        Ok(created)
    }

    /// Login with email and password.
    ///
    /// Invalid email and invalid password produce the same error, so callers
    /// cannot probe which emails are registered.
    pub async fn login(&self, input: LoginInput) -> Result<(Session, User), UserServiceError> {
        let email = input.email.trim().to_lowercase();

        let user = self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to get user by email")?
            .ok_or_else(|| {
                UserServiceError::AuthenticationError("Invalid email or password".to_string())
            })?;

        let password_valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;

        if !password_valid {
            return Err(UserServiceError::AuthenticationError(
                "Invalid email or password".to_string(),
            ));
        }

        let session = self.create_session(user.id).await?;

        Ok((session, user))
    }

    /// Logout: delete the session, making the token immediately unusable.
    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;

        Ok(())
    }

    /// Validate a session token and return the associated user.
    ///
    /// Returns `None` for an unknown or expired token. Expired rows are
    /// deleted lazily on lookup.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            let _ = self.session_repo.delete(token).await;
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user)
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        let user = self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?;

        Ok(user)
    }

    /// Update the caller's display name. An empty or whitespace-only name
    /// clears it.
    pub async fn update_display_name(
        &self,
        user_id: i64,
        display_name: Option<String>,
    ) -> Result<User, UserServiceError> {
        let mut user = self
            .user_repo
            .get_by_id(user_id)
            .await
            .context("Failed to get user")?
            .ok_or(UserServiceError::NotFound)?;

        user.display_name = display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        let updated = self
            .user_repo
            .update(&user)
            .await
            .context("Failed to update user")?;

        Ok(updated)
    }

    /// Delete all expired sessions, returning how many were removed.
    pub async fn cleanup_expired_sessions(&self) -> Result<i64, UserServiceError> {
        let count = self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?;

        Ok(count)
    }

    fn validate_register_input(&self, input: &RegisterInput) -> Result<(), UserServiceError> {
        let email = input.email.trim();

        if email.is_empty() {
            return Err(UserServiceError::ValidationError(
                "Email cannot be empty".to_string(),
            ));
        }

        if !email.contains('@') {
            return Err(UserServiceError::ValidationError(
                "Invalid email format".to_string(),
            ));
        }

        if input.password.len() < MIN_PASSWORD_LENGTH {
            return Err(UserServiceError::ValidationError(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        Ok(())
    }

    async fn create_session(&self, user_id: i64) -> Result<Session, UserServiceError> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id,
            expires_at: now + Duration::hours(self.session_ttl_hours),
            created_at: now,
        };

        let created = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        Ok(created)
    }
}

/// Input for user registration
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

/// Input for user login
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> UserService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        UserService::new(
            SqlxUserRepository::shared(pool.clone()),
            SqlxSessionRepository::shared(pool),
        )
    }

    async fn setup_with_ttl(hours: i64) -> UserService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        UserService::with_session_ttl(
            SqlxUserRepository::shared(pool.clone()),
            SqlxSessionRepository::shared(pool),
            hours,
        )
    }

    fn register_input(email: &str, password: &str) -> RegisterInput {
        RegisterInput {
            email: email.to_string(),
            password: password.to_string(),
            display_name: None,
        }
    }

    fn login_input(email: &str, password: &str) -> LoginInput {
        LoginInput {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_stores_lowercased_email_and_hashed_password() {
        let service = setup().await;

        let user = service
            .register(register_input("Alice@Example.COM", "password123"))
            .await
            .expect("Failed to register");

        assert_eq!(user.email, "alice@example.com");
        assert_ne!(user.password_hash, "password123");
        assert!(user.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_register_duplicate_email_case_insensitive() {
        let service = setup().await;

        service
            .register(register_input("same@example.com", "password123"))
            .await
            .expect("Failed to register");

        let result = service
            .register(register_input("SAME@EXAMPLE.COM", "password456"))
            .await;
        assert!(matches!(result, Err(UserServiceError::EmailTaken(_))));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let service = setup().await;

        let no_at = service.register(register_input("not-an-email", "password123")).await;
        assert!(matches!(no_at, Err(UserServiceError::ValidationError(_))));

        let short = service.register(register_input("a@example.com", "short")).await;
        assert!(matches!(short, Err(UserServiceError::ValidationError(_))));

        let empty = service.register(register_input("", "password123")).await;
        assert!(matches!(empty, Err(UserServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_login_roundtrip() {
        let service = setup().await;
        let registered = service
            .register(register_input("a@example.com", "password123"))
            .await
            .expect("Failed to register");

        let (session, user) = service
            .login(login_input("A@Example.com", "password123"))
            .await
            .expect("Failed to login");
        assert_eq!(user.id, registered.id);
        assert!(!session.is_expired());

        let validated = service
            .validate_session(&session.id)
            .await
            .expect("Failed to validate")
            .expect("Session should be valid");
        assert_eq!(validated.id, registered.id);
    }

    #[tokio::test]
    async fn test_login_invalid_credentials_uniform_error() {
        let service = setup().await;
        service
            .register(register_input("a@example.com", "password123"))
            .await
            .expect("Failed to register");

        let wrong_password = service.login(login_input("a@example.com", "wrongpass99")).await;
        let unknown_email = service.login(login_input("b@example.com", "password123")).await;

        let msg_of = |r: Result<(Session, User), UserServiceError>| match r {
            Err(UserServiceError::AuthenticationError(m)) => m,
            other => panic!("Expected AuthenticationError, got {:?}", other.map(|_| ())),
        };
        // Same message for both, no account enumeration
        assert_eq!(msg_of(wrong_password), msg_of(unknown_email));
    }

    #[tokio::test]
    async fn test_validate_unknown_token() {
        let service = setup().await;
        let result = service
            .validate_session("no-such-token")
            .await
            .expect("Failed to validate");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_expired_session_rejected_and_removed() {
        let service = setup_with_ttl(-1).await;
        service
            .register(register_input("a@example.com", "password123"))
            .await
            .expect("Failed to register");
        let (session, _) = service
            .login(login_input("a@example.com", "password123"))
            .await
            .expect("Failed to login");

        assert!(session.is_expired());
        let result = service
            .validate_session(&session.id)
            .await
            .expect("Failed to validate");
        assert!(result.is_none());

        // The expired row was deleted lazily, so the sweep finds nothing
        assert_eq!(service.cleanup_expired_sessions().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_logout_invalidates_token() {
        let service = setup().await;
        service
            .register(register_input("a@example.com", "password123"))
            .await
            .expect("Failed to register");
        let (session, _) = service
            .login(login_input("a@example.com", "password123"))
            .await
            .expect("Failed to login");

        service.logout(&session.id).await.expect("Failed to logout");

        assert!(service.validate_session(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_multiple_concurrent_sessions() {
        let service = setup().await;
        service
            .register(register_input("a@example.com", "password123"))
            .await
            .expect("Failed to register");

        let (first, _) = service
            .login(login_input("a@example.com", "password123"))
            .await
            .expect("Failed to login");
        let (second, _) = service
            .login(login_input("a@example.com", "password123"))
            .await
            .expect("Failed to login");

        assert_ne!(first.id, second.id);
        assert!(service.validate_session(&first.id).await.unwrap().is_some());
        assert!(service.validate_session(&second.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_display_name() {
        let service = setup().await;
        let user = service
            .register(register_input("a@example.com", "password123"))
            .await
            .expect("Failed to register");

        let updated = service
            .update_display_name(user.id, Some("  Alice  ".to_string()))
            .await
            .expect("Failed to update");
        assert_eq!(updated.display_name.as_deref(), Some("Alice"));

        let cleared = service
            .update_display_name(user.id, Some("   ".to_string()))
            .await
            .expect("Failed to update");
        assert!(cleared.display_name.is_none());
    }

    #[tokio::test]
    async fn test_cleanup_expired_sessions() {
        let service = setup_with_ttl(-1).await;
        service
            .register(register_input("a@example.com", "password123"))
            .await
            .expect("Failed to register");
        service
            .login(login_input("a@example.com", "password123"))
            .await
            .expect("Failed to login");

        let removed = service
            .cleanup_expired_sessions()
            .await
            .expect("Failed to cleanup");
        assert_eq!(removed, 1);
    }
}
