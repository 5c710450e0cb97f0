//! Authentication and profile endpoints
//!
//! - POST /api/auth/register
//! - POST /api/auth/login
//! - POST /api/auth/logout
//! - GET  /api/auth/verify
//! - GET  /api/auth/health
//! - GET  /api/profile
//! - PUT  /api/profile/display-name

use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use crate::api::middleware::{extract_session_token, ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{ApiResponse, AuthResponse, UserResponse};
use crate::services::user::{LoginInput, RegisterInput};

/// Request body for registration
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

/// Request body for login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for a display-name update
#[derive(Debug, Deserialize)]
pub struct DisplayNameRequest {
    pub display_name: Option<String>,
}

/// Public auth routes (no session required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/health", get(health))
}

/// Protected auth routes
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/verify", get(verify))
}

/// Protected profile routes
pub fn profile_router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_profile))
        .route("/display-name", put(update_display_name))
}

/// POST /api/auth/register
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = state
        .user_service
        .register(RegisterInput {
            email: body.email,
            password: body.password,
            display_name: body.display_name,
        })
        .await?;

    Ok(ApiResponse::with_message(
        "Registration successful",
        user.into(),
    ))
}

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, ApiError> {
    let (session, user) = state
        .user_service
        .login(LoginInput {
            email: body.email,
            password: body.password,
        })
        .await?;

    Ok(ApiResponse::data(AuthResponse {
        token: session.id,
        expires_at: session.expires_at.to_rfc3339(),
        user: user.into(),
    }))
}

/// POST /api/auth/logout
async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    // The middleware already validated this token
    if let Some(token) = extract_session_token(&headers) {
        state.user_service.logout(&token).await?;
    }

    Ok(ApiResponse::message("Logged out"))
}

/// GET /api/auth/verify - return the session's user
async fn verify(
    Extension(user): Extension<AuthenticatedUser>,
) -> Json<ApiResponse<UserResponse>> {
    ApiResponse::data(user.0.into())
}

/// GET /api/auth/health - unauthenticated liveness check
async fn health() -> Json<ApiResponse<serde_json::Value>> {
    ApiResponse::data(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// GET /api/profile
async fn get_profile(
    Extension(user): Extension<AuthenticatedUser>,
) -> Json<ApiResponse<UserResponse>> {
    ApiResponse::data(user.0.into())
}

/// PUT /api/profile/display-name
async fn update_display_name(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<DisplayNameRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let updated = state
        .user_service
        .update_display_name(user.0.id, body.display_name)
        .await?;

    Ok(ApiResponse::data(updated.into()))
}
