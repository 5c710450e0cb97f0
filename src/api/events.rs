//! Personal calendar event endpoints
//!
//! - POST   /api/event
//! - GET    /api/event
//! - DELETE /api/event/{event_id}

use axum::{
    extract::{Path, State},
    routing::{delete, get},
    Extension, Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{ApiResponse, EventResponse};
use crate::services::event::CreateEventInput;

/// Request body for event creation
#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    pub date: NaiveDate,
    pub time: Option<String>,
    pub color: Option<String>,
}

/// Build the event router (all routes require auth)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_events).post(create_event))
        .route("/{event_id}", delete(delete_event))
}

/// POST /api/event
async fn create_event(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<CreateEventRequest>,
) -> Result<Json<ApiResponse<EventResponse>>, ApiError> {
    let event = state
        .event_service
        .create_event(
            user.0.id,
            CreateEventInput {
                title: body.title,
                date: body.date,
                time: body.time,
                color: body.color,
            },
        )
        .await?;

    Ok(ApiResponse::with_message("Event created", event.into()))
}

/// GET /api/event
async fn list_events(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<ApiResponse<Vec<EventResponse>>>, ApiError> {
    let events = state.event_service.list_events(user.0.id).await?;

    Ok(ApiResponse::data(
        events.into_iter().map(EventResponse::from).collect(),
    ))
}

/// DELETE /api/event/{event_id}
async fn delete_event(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(event_id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.event_service.delete_event(user.0.id, event_id).await?;

    Ok(ApiResponse::message("Event deleted"))
}
