//! Repository layer
//!
//! One trait per entity describing the data-access interface, each with a
//! SQLx implementation that dispatches on the configured driver.

pub mod assignment;
pub mod chat;
pub mod class;
pub mod event;
pub mod grade;
pub mod message;
pub mod session;
pub mod user;

pub use assignment::{AssignmentRepository, SqlxAssignmentRepository};
pub use chat::{ChatRepository, SqlxChatRepository};
pub use class::{ClassRepository, SqlxClassRepository};
pub use event::{EventRepository, SqlxEventRepository};
pub use grade::{GradeRepository, SqlxGradeRepository};
pub use message::{MessageRepository, SqlxMessageRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};
