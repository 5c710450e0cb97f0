//! Chat and message endpoints
//!
//! - POST   /api/chat/create
//! - GET    /api/chat/list
//! - GET    /api/chat/{chat_id}
//! - POST   /api/chat/{chat_id}/add-members
//! - GET    /api/chat/{chat_id}/messages
//! - POST   /api/chat/{chat_id}/send
//! - DELETE /api/chat/{chat_id}

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{ApiResponse, ChatResponse, MessageResponse};
use crate::services::chat::CreateChatInput;

/// Request body for chat creation
#[derive(Debug, Deserialize)]
pub struct CreateChatRequest {
    pub class_id: i64,
    /// Other participants; the caller is added implicitly
    pub participant_ids: Vec<i64>,
    #[serde(default)]
    pub is_group: bool,
    pub name: Option<String>,
}

/// Request body for adding members
#[derive(Debug, Deserialize)]
pub struct AddMembersRequest {
    pub member_ids: Vec<i64>,
}

/// Request body for sending a message
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

/// Query parameters for the chat list
#[derive(Debug, Deserialize)]
pub struct ListChatsQuery {
    pub class_id: Option<i64>,
}

/// Query parameters for message pagination
#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

/// Build the chat router (all routes require auth)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create_chat))
        .route("/list", get(list_chats))
        .route("/{chat_id}", get(get_chat).delete(delete_chat))
        .route("/{chat_id}/add-members", post(add_members))
        .route("/{chat_id}/messages", get(list_messages))
        .route("/{chat_id}/send", post(send_message))
}

/// POST /api/chat/create
///
/// Idempotent: an existing chat with the same participant set comes back
/// with `is_new: false` instead of an error.
async fn create_chat(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<CreateChatRequest>,
) -> Result<Json<ApiResponse<ChatResponse>>, ApiError> {
    let creation = state
        .chat_service
        .create_chat(
            user.0.id,
            CreateChatInput {
                class_id: body.class_id,
                participant_ids: body.participant_ids,
                is_group: body.is_group,
                name: body.name,
            },
        )
        .await?;

    let message = if creation.is_new {
        "Chat created"
    } else {
        "Chat already exists"
    };

    Ok(ApiResponse::with_message(message, creation.into()))
}

/// GET /api/chat/list
async fn list_chats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<ListChatsQuery>,
) -> Result<Json<ApiResponse<Vec<ChatResponse>>>, ApiError> {
    let chats = state
        .chat_service
        .list_chats(user.0.id, query.class_id)
        .await?;

    Ok(ApiResponse::data(
        chats.into_iter().map(ChatResponse::from).collect(),
    ))
}

/// GET /api/chat/{chat_id}
async fn get_chat(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(chat_id): Path<i64>,
) -> Result<Json<ApiResponse<ChatResponse>>, ApiError> {
    let chat = state.chat_service.get_chat(user.0.id, chat_id).await?;

    Ok(ApiResponse::data(chat.into()))
}

/// POST /api/chat/{chat_id}/add-members
async fn add_members(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(chat_id): Path<i64>,
    Json(body): Json<AddMembersRequest>,
) -> Result<Json<ApiResponse<ChatResponse>>, ApiError> {
    let chat = state
        .chat_service
        .add_members(user.0.id, chat_id, body.member_ids)
        .await?;

    Ok(ApiResponse::with_message("Members added", chat.into()))
}

/// GET /api/chat/{chat_id}/messages
async fn list_messages(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(chat_id): Path<i64>,
    Query(query): Query<ListMessagesQuery>,
) -> Result<Json<ApiResponse<Vec<MessageResponse>>>, ApiError> {
    let messages = state
        .chat_service
        .list_messages(user.0.id, chat_id, query.offset, query.limit)
        .await?;

    Ok(ApiResponse::data(
        messages.into_iter().map(MessageResponse::from).collect(),
    ))
}

/// POST /api/chat/{chat_id}/send
async fn send_message(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(chat_id): Path<i64>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let message = state
        .chat_service
        .send_message(user.0.id, chat_id, &body.content)
        .await?;

    Ok(ApiResponse::data(message.into()))
}

/// DELETE /api/chat/{chat_id}
async fn delete_chat(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(chat_id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.chat_service.delete_chat(user.0.id, chat_id).await?;

    Ok(ApiResponse::message("Chat deleted"))
}
