//! Assignment and grade endpoints
//!
//! - POST   /api/assignment/create
//! - GET    /api/assignment/list/{class_id}
//! - DELETE /api/assignment/{assignment_id}
//! - POST   /api/assignment/grade
//! - GET    /api/assignment/grades/{class_id}
//! - GET    /api/assignment/my-assignments

use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{
    ApiResponse, AssignmentGradesResponse, AssignmentResponse, GradeResponse,
    StudentGradeResponse,
};
use crate::services::assignment::{CreateAssignmentInput, GradeInput, GradeReport};

/// Request body for assignment creation
#[derive(Debug, Deserialize)]
pub struct CreateAssignmentRequest {
    pub class_id: i64,
    pub title: String,
    pub description: String,
    pub due_date: DateTime<Utc>,
    pub points_possible: f64,
}

/// Request body for recording a grade
#[derive(Debug, Deserialize)]
pub struct GradeRequest {
    pub assignment_id: i64,
    pub student_id: i64,
    pub score: f64,
    pub feedback: Option<String>,
}

/// Role-tagged aggregate grade view
#[derive(Debug, Serialize)]
#[serde(tag = "view", rename_all = "lowercase")]
pub enum GradeReportResponse {
    Instructor { assignments: Vec<AssignmentGradesResponse> },
    Student { grades: Vec<StudentGradeResponse> },
}

/// Build the assignment router (all routes require auth)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create_assignment))
        .route("/list/{class_id}", get(list_assignments))
        .route("/{assignment_id}", delete(delete_assignment))
        .route("/grade", post(grade))
        .route("/grades/{class_id}", get(grades_for_class))
        .route("/my-assignments", get(my_assignments))
}

/// POST /api/assignment/create
async fn create_assignment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<CreateAssignmentRequest>,
) -> Result<Json<ApiResponse<AssignmentResponse>>, ApiError> {
    let assignment = state
        .assignment_service
        .create_assignment(
            user.0.id,
            CreateAssignmentInput {
                class_id: body.class_id,
                title: body.title,
                description: body.description,
                due_date: body.due_date,
                points_possible: body.points_possible,
            },
        )
        .await?;

    Ok(ApiResponse::with_message(
        "Assignment created",
        assignment.into(),
    ))
}

/// GET /api/assignment/list/{class_id}
async fn list_assignments(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(class_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<AssignmentResponse>>>, ApiError> {
    let assignments = state
        .assignment_service
        .list_for_class(user.0.id, class_id)
        .await?;

    Ok(ApiResponse::data(
        assignments.into_iter().map(AssignmentResponse::from).collect(),
    ))
}

/// DELETE /api/assignment/{assignment_id}
async fn delete_assignment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(assignment_id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state
        .assignment_service
        .delete_assignment(user.0.id, assignment_id)
        .await?;

    Ok(ApiResponse::message("Assignment deleted"))
}

/// POST /api/assignment/grade
async fn grade(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<GradeRequest>,
) -> Result<Json<ApiResponse<GradeResponse>>, ApiError> {
    let grade = state
        .assignment_service
        .grade(
            user.0.id,
            GradeInput {
                assignment_id: body.assignment_id,
                student_id: body.student_id,
                score: body.score,
                feedback: body.feedback,
            },
        )
        .await?;

    Ok(ApiResponse::with_message("Grade recorded", grade.into()))
}

/// GET /api/assignment/grades/{class_id}
async fn grades_for_class(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(class_id): Path<i64>,
) -> Result<Json<ApiResponse<GradeReportResponse>>, ApiError> {
    let report = state
        .assignment_service
        .grades_for_class(user.0.id, class_id)
        .await?;

    let response = match report {
        GradeReport::Instructor(rows) => GradeReportResponse::Instructor {
            assignments: rows.into_iter().map(AssignmentGradesResponse::from).collect(),
        },
        GradeReport::Student(entries) => GradeReportResponse::Student {
            grades: entries.into_iter().map(StudentGradeResponse::from).collect(),
        },
    };

    Ok(ApiResponse::data(response))
}

/// GET /api/assignment/my-assignments
async fn my_assignments(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<ApiResponse<Vec<AssignmentResponse>>>, ApiError> {
    let assignments = state.assignment_service.my_assignments(user.0.id).await?;

    Ok(ApiResponse::data(
        assignments.into_iter().map(AssignmentResponse::from).collect(),
    ))
}
