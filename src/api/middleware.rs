//! API middleware and shared state
//!
//! Holds the application state handed to every handler, the authentication
//! middleware that turns a bearer token into an `AuthenticatedUser`
//! extension, and the error type that maps service failures onto HTTP
//! statuses with the uniform `{ success: false, message }` body.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::config::Config;
use crate::db::repositories::{
    SqlxAssignmentRepository, SqlxChatRepository, SqlxClassRepository, SqlxEventRepository,
    SqlxGradeRepository, SqlxMessageRepository, SqlxSessionRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::{
    AssignmentService, AssignmentServiceError, ChatService, ChatServiceError, ClassService,
    ClassServiceError, EventService, EventServiceError, UserService, UserServiceError,
};

/// Application state containing the shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub user_service: Arc<UserService>,
    pub class_service: Arc<ClassService>,
    pub assignment_service: Arc<AssignmentService>,
    pub chat_service: Arc<ChatService>,
    pub event_service: Arc<EventService>,
}

impl AppState {
    /// Wire repositories and services over the given pool.
    pub fn new(pool: DynDatabasePool, config: &Config) -> Self {
        let user_repo = SqlxUserRepository::shared(pool.clone());
        let session_repo = SqlxSessionRepository::shared(pool.clone());
        let class_repo = SqlxClassRepository::shared(pool.clone());
        let assignment_repo = SqlxAssignmentRepository::shared(pool.clone());
        let grade_repo = SqlxGradeRepository::shared(pool.clone());
        let chat_repo = SqlxChatRepository::shared(pool.clone());
        let message_repo = SqlxMessageRepository::shared(pool.clone());
        let event_repo = SqlxEventRepository::shared(pool.clone());

        let user_service = Arc::new(UserService::with_session_ttl(
            user_repo.clone(),
            session_repo,
            config.session.ttl_hours,
        ));
        let class_service = Arc::new(ClassService::new(class_repo));
        let assignment_service = Arc::new(AssignmentService::new(
            assignment_repo,
            grade_repo,
            class_service.clone(),
        ));
        let chat_service = Arc::new(ChatService::new(
            chat_repo,
            message_repo,
            user_repo,
            class_service.clone(),
        ));
        let event_service = Arc::new(EventService::new(event_repo));

        Self {
            pool,
            user_service,
            class_service,
            assignment_service,
            chat_service,
            event_service,
        }
    }
}

/// Authenticated user extracted from the request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// API error: a code selecting the HTTP status, and a message rendered in
/// the uniform response envelope.
#[derive(Debug)]
pub struct ApiError {
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn internal_error() -> Self {
        Self::new("INTERNAL_ERROR", "Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.code {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = json!({
            "success": false,
            "message": self.message,
        });

        (status, Json(body)).into_response()
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::AuthenticationError(msg) => Self::unauthorized(msg),
            UserServiceError::ValidationError(msg) => Self::validation_error(msg),
            UserServiceError::EmailTaken(msg) => Self::conflict(msg),
            UserServiceError::NotFound => Self::not_found("User not found"),
            UserServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<ClassServiceError> for ApiError {
    fn from(err: ClassServiceError) -> Self {
        match err {
            ClassServiceError::ValidationError(msg) => Self::validation_error(msg),
            ClassServiceError::NotFound(msg) => Self::not_found(msg),
            ClassServiceError::Forbidden(msg) => Self::forbidden(msg),
            ClassServiceError::Conflict(msg) => Self::conflict(msg),
            ClassServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<AssignmentServiceError> for ApiError {
    fn from(err: AssignmentServiceError) -> Self {
        match err {
            AssignmentServiceError::ValidationError(msg) => Self::validation_error(msg),
            AssignmentServiceError::NotFound(msg) => Self::not_found(msg),
            AssignmentServiceError::Forbidden(msg) => Self::forbidden(msg),
            AssignmentServiceError::Conflict(msg) => Self::conflict(msg),
            AssignmentServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<ChatServiceError> for ApiError {
    fn from(err: ChatServiceError) -> Self {
        match err {
            ChatServiceError::ValidationError(msg) => Self::validation_error(msg),
            ChatServiceError::NotFound(msg) => Self::not_found(msg),
            ChatServiceError::Forbidden(msg) => Self::forbidden(msg),
            ChatServiceError::Conflict(msg) => Self::conflict(msg),
            ChatServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<EventServiceError> for ApiError {
    fn from(err: EventServiceError) -> Self {
        match err {
            EventServiceError::ValidationError(msg) => Self::validation_error(msg),
            EventServiceError::NotFound => Self::not_found("Event not found"),
            EventServiceError::Forbidden(msg) => Self::forbidden(msg),
            EventServiceError::InternalError(e) => internal(e),
        }
    }
}

/// Unexpected faults are logged with their chain and reported generically;
/// the request fails, the process does not.
fn internal(err: anyhow::Error) -> ApiError {
    tracing::error!("Internal error: {:#}", err);
    ApiError::internal_error()
}

/// Extract the session token from the Authorization header (Bearer) or the
/// `session` cookie, in that priority order.
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }

    if let Some(cookie_header) = headers.get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                let cookie = cookie.trim();
                if let Some(token) = cookie.strip_prefix("session=") {
                    return Some(token.to_string());
                }
            }
        }
    }

    None
}

/// Authentication middleware: resolve the session token to a user and stash
/// it as a request extension. Missing, unknown and expired tokens all come
/// back 401.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("No session token provided"))?;

    let user = state
        .user_service
        .validate_session(&token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}
