//! Class endpoints
//!
//! - POST /api/class/create - returns the generated join code
//! - POST /api/class/join
//! - GET  /api/class/list

use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{ApiResponse, ClassResponse};
use crate::models::ClassRole;
use crate::services::class::CreateClassInput;

/// Request body for class creation
#[derive(Debug, Deserialize)]
pub struct CreateClassRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Request body for joining by code
#[derive(Debug, Deserialize)]
pub struct JoinClassRequest {
    pub code: String,
}

/// Build the class router (all routes require auth)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create_class))
        .route("/join", post(join_class))
        .route("/list", get(list_classes))
}

/// POST /api/class/create
async fn create_class(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<CreateClassRequest>,
) -> Result<Json<ApiResponse<ClassResponse>>, ApiError> {
    let class = state
        .class_service
        .create_class(
            user.0.id,
            CreateClassInput {
                name: body.name,
                description: body.description,
            },
        )
        .await?;

    Ok(ApiResponse::with_message(
        "Class created",
        ClassResponse::from(class).with_role(ClassRole::Instructor),
    ))
}

/// POST /api/class/join
async fn join_class(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<JoinClassRequest>,
) -> Result<Json<ApiResponse<ClassResponse>>, ApiError> {
    let class = state.class_service.join_by_code(user.0.id, &body.code).await?;

    Ok(ApiResponse::with_message(
        "Joined class",
        ClassResponse::from(class).with_role(ClassRole::Student),
    ))
}

/// GET /api/class/list
async fn list_classes(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<ApiResponse<Vec<ClassResponse>>>, ApiError> {
    let classes = state.class_service.list_for_user(user.0.id).await?;

    Ok(ApiResponse::data(
        classes.into_iter().map(ClassResponse::from).collect(),
    ))
}
