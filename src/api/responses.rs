//! Shared API response types
//!
//! The uniform `{ success, message?, data? }` envelope every route returns,
//! plus the serialized shapes of the domain entities. Timestamps are
//! RFC 3339 strings; password hashes never leave the server.

use axum::Json;
use serde::Serialize;

use crate::db::repositories::AssignmentWithClass;
use crate::models::{Assignment, Chat, Class, ClassRole, Event, Grade, Message, User};
use crate::services::assignment::{AssignmentGradeRows, AssignmentView, StudentGradeEntry};
use crate::services::chat::{ChatCreation, ChatWithParticipants};
use crate::services::class::ClassWithRole;

/// Uniform response envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Successful response carrying data
    pub fn data(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
            data: Some(data),
        })
    }

    /// Successful response carrying data and a message
    pub fn with_message(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        })
    }
}

impl ApiResponse<()> {
    /// Successful response carrying only a message
    pub fn message(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message.into()),
            data: None,
        })
    }
}

// ============================================================================
// Entity shapes
// ============================================================================

/// User info (never includes the password hash)
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Successful login: the bearer token and its owner
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub expires_at: String,
    pub user: UserResponse,
}

/// A class, optionally annotated with the caller's role
#[derive(Debug, Serialize)]
pub struct ClassResponse {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub creator_id: i64,
    pub join_code: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl From<Class> for ClassResponse {
    fn from(class: Class) -> Self {
        Self {
            id: class.id,
            name: class.name,
            description: class.description,
            creator_id: class.creator_id,
            join_code: class.join_code,
            created_at: class.created_at.to_rfc3339(),
            role: None,
        }
    }
}

impl From<ClassWithRole> for ClassResponse {
    fn from(entry: ClassWithRole) -> Self {
        let mut response = Self::from(entry.class);
        response.role = Some(entry.role.to_string());
        response
    }
}

impl ClassResponse {
    /// Annotate with an explicit role
    pub fn with_role(mut self, role: ClassRole) -> Self {
        self.role = Some(role.to_string());
        self
    }
}

/// A recorded grade
#[derive(Debug, Serialize)]
pub struct GradeResponse {
    pub id: i64,
    pub assignment_id: i64,
    pub student_id: i64,
    pub score: f64,
    pub feedback: String,
    pub graded_by: i64,
    pub graded_at: String,
}

impl From<Grade> for GradeResponse {
    fn from(grade: Grade) -> Self {
        Self {
            id: grade.id,
            assignment_id: grade.assignment_id,
            student_id: grade.student_id,
            score: grade.score,
            feedback: grade.feedback,
            graded_by: grade.graded_by,
            graded_at: grade.graded_at.to_rfc3339(),
        }
    }
}

/// An assignment; `user_grade` carries the calling student's own grade in
/// class listings, `class_name` the owning class in cross-class listings.
#[derive(Debug, Serialize)]
pub struct AssignmentResponse {
    pub id: i64,
    pub class_id: i64,
    pub title: String,
    pub description: String,
    pub due_date: String,
    pub points_possible: f64,
    pub created_by: i64,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_grade: Option<GradeResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

impl From<Assignment> for AssignmentResponse {
    fn from(assignment: Assignment) -> Self {
        Self {
            id: assignment.id,
            class_id: assignment.class_id,
            title: assignment.title,
            description: assignment.description,
            due_date: assignment.due_date.to_rfc3339(),
            points_possible: assignment.points_possible,
            created_by: assignment.created_by,
            created_at: assignment.created_at.to_rfc3339(),
            user_grade: None,
            class_name: None,
        }
    }
}

impl From<AssignmentView> for AssignmentResponse {
    fn from(view: AssignmentView) -> Self {
        let mut response = Self::from(view.assignment);
        response.user_grade = view.user_grade.map(GradeResponse::from);
        response
    }
}

impl From<AssignmentWithClass> for AssignmentResponse {
    fn from(entry: AssignmentWithClass) -> Self {
        let mut response = Self::from(entry.assignment);
        response.class_name = Some(entry.class_name);
        response
    }
}

/// One member row in the instructor's aggregate grade view. Ungraded
/// members carry an explicit "ungraded" status rather than being omitted.
#[derive(Debug, Serialize)]
pub struct GradeRowResponse {
    pub student: UserResponse,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<GradeResponse>,
}

/// All member rows for one assignment in the instructor's aggregate view
#[derive(Debug, Serialize)]
pub struct AssignmentGradesResponse {
    pub assignment: AssignmentResponse,
    pub rows: Vec<GradeRowResponse>,
}

impl From<AssignmentGradeRows> for AssignmentGradesResponse {
    fn from(entry: AssignmentGradeRows) -> Self {
        Self {
            assignment: entry.assignment.into(),
            rows: entry
                .rows
                .into_iter()
                .map(|row| GradeRowResponse {
                    student: row.student.into(),
                    status: if row.grade.is_some() { "graded" } else { "ungraded" },
                    grade: row.grade.map(GradeResponse::from),
                })
                .collect(),
        }
    }
}

/// One of a student's own grade records with its assignment
#[derive(Debug, Serialize)]
pub struct StudentGradeResponse {
    pub assignment: AssignmentResponse,
    pub grade: GradeResponse,
}

impl From<StudentGradeEntry> for StudentGradeResponse {
    fn from(entry: StudentGradeEntry) -> Self {
        Self {
            assignment: entry.assignment.into(),
            grade: entry.grade.into(),
        }
    }
}

/// A chat. `is_new` appears only in creation responses; `participant_users`
/// only when the roster was loaded.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub id: i64,
    pub class_id: i64,
    pub is_group: bool,
    pub name: String,
    pub participants: Vec<i64>,
    pub created_at: String,
    pub last_message_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_new: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_users: Option<Vec<UserResponse>>,
}

impl From<Chat> for ChatResponse {
    fn from(chat: Chat) -> Self {
        Self {
            id: chat.id,
            class_id: chat.class_id,
            is_group: chat.is_group,
            name: chat.name,
            participants: chat.participants,
            created_at: chat.created_at.to_rfc3339(),
            last_message_at: chat.last_message_at.to_rfc3339(),
            is_new: None,
            participant_users: None,
        }
    }
}

impl From<ChatCreation> for ChatResponse {
    fn from(creation: ChatCreation) -> Self {
        let mut response = Self::from(creation.chat);
        response.is_new = Some(creation.is_new);
        response
    }
}

impl From<ChatWithParticipants> for ChatResponse {
    fn from(entry: ChatWithParticipants) -> Self {
        let mut response = Self::from(entry.chat);
        response.participant_users =
            Some(entry.participants.into_iter().map(UserResponse::from).collect());
        response
    }
}

/// A chat message
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: i64,
    pub chat_id: i64,
    pub sender_id: i64,
    pub content: String,
    pub created_at: String,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            chat_id: message.chat_id,
            sender_id: message.sender_id,
            content: message.content,
            created_at: message.created_at.to_rfc3339(),
        }
    }
}

/// A personal calendar event
#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub id: i64,
    pub title: String,
    pub date: String,
    pub time: String,
    pub color: String,
    pub created_at: String,
}

impl From<Event> for EventResponse {
    fn from(event: Event) -> Self {
        Self {
            id: event.id,
            title: event.title,
            date: event.date.to_string(),
            time: event.time,
            color: event.color,
            created_at: event.created_at.to_rfc3339(),
        }
    }
}
