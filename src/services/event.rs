//! Calendar event service
//!
//! Per-user CRUD for personal events. Events are never shared; the only
//! rule beyond field validation is that users touch only their own rows.

use crate::db::repositories::EventRepository;
use crate::models::event::{DEFAULT_EVENT_COLOR, DEFAULT_EVENT_TIME};
use crate::models::Event;
use anyhow::Context;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;

/// Error types for event service operations
#[derive(Debug, thiserror::Error)]
pub enum EventServiceError {
    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Event not found
    #[error("Event not found")]
    NotFound,

    /// Event belongs to another user
    #[error("{0}")]
    Forbidden(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Calendar event service
pub struct EventService {
    event_repo: Arc<dyn EventRepository>,
}

impl EventService {
    /// Create a new event service
    pub fn new(event_repo: Arc<dyn EventRepository>) -> Self {
        Self { event_repo }
    }

    /// Create an event for the caller. Time defaults to midnight, color to
    /// the standard tag.
    pub async fn create_event(
        &self,
        user_id: i64,
        input: CreateEventInput,
    ) -> Result<Event, EventServiceError> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(EventServiceError::ValidationError(
                "Title cannot be empty".to_string(),
            ));
        }

        let time = input
            .time
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_EVENT_TIME.to_string());
        if !is_valid_time(&time) {
            return Err(EventServiceError::ValidationError(
                "Time must be in HH:MM format".to_string(),
            ));
        }

        let color = input
            .color
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_EVENT_COLOR.to_string());

        let event = Event {
            id: 0,
            user_id,
            title,
            date: input.date,
            time,
            color,
            created_at: Utc::now(),
        };

        let created = self
            .event_repo
            .create(&event)
            .await
            .context("Failed to create event")?;

        Ok(created)
    }

    /// List the caller's events, ascending by date then time.
    pub async fn list_events(&self, user_id: i64) -> Result<Vec<Event>, EventServiceError> {
        let events = self
            .event_repo
            .list_for_user(user_id)
            .await
            .context("Failed to list events")?;

        Ok(events)
    }

    /// Delete one of the caller's events. Another user's event is forbidden,
    /// an unknown id is not found.
    pub async fn delete_event(&self, user_id: i64, event_id: i64) -> Result<(), EventServiceError> {
        let event = self
            .event_repo
            .get_by_id(event_id)
            .await
            .context("Failed to get event")?
            .ok_or(EventServiceError::NotFound)?;

        if event.user_id != user_id {
            return Err(EventServiceError::Forbidden(
                "You can only delete your own events".to_string(),
            ));
        }

        self.event_repo
            .delete(event.id)
            .await
            .context("Failed to delete event")?;

        Ok(())
    }
}

/// Check "HH:MM" with hours 00-23 and minutes 00-59.
fn is_valid_time(time: &str) -> bool {
    let Some((hours, minutes)) = time.split_once(':') else {
        return false;
    };
    if hours.len() != 2 || minutes.len() != 2 {
        return false;
    }
    let (Ok(h), Ok(m)) = (hours.parse::<u8>(), minutes.parse::<u8>()) else {
        return false;
    };
    h < 24 && m < 60
}

/// Input for event creation
#[derive(Debug, Clone)]
pub struct CreateEventInput {
    pub title: String,
    pub date: NaiveDate,
    pub time: Option<String>,
    pub color: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxEventRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::User;

    async fn setup() -> (EventService, i64, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::new(pool.clone());
        let a = users
            .create(&User::new("a@example.com".to_string(), "hash".to_string()))
            .await
            .expect("Failed to create user");
        let b = users
            .create(&User::new("b@example.com".to_string(), "hash".to_string()))
            .await
            .expect("Failed to create user");

        (EventService::new(SqlxEventRepository::shared(pool)), a.id, b.id)
    }

    fn event_input(title: &str) -> CreateEventInput {
        CreateEventInput {
            title: title.to_string(),
            date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            time: None,
            color: None,
        }
    }

    #[test]
    fn test_is_valid_time() {
        assert!(is_valid_time("00:00"));
        assert!(is_valid_time("23:59"));
        assert!(!is_valid_time("24:00"));
        assert!(!is_valid_time("12:60"));
        assert!(!is_valid_time("9:00"));
        assert!(!is_valid_time("noon"));
    }

    #[tokio::test]
    async fn test_create_applies_defaults() {
        let (service, user, _) = setup().await;

        let event = service
            .create_event(user, event_input("Study session"))
            .await
            .expect("Failed to create event");
        assert_eq!(event.time, DEFAULT_EVENT_TIME);
        assert_eq!(event.color, DEFAULT_EVENT_COLOR);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (service, user, _) = setup().await;

        let blank = service.create_event(user, event_input("   ")).await;
        assert!(matches!(blank, Err(EventServiceError::ValidationError(_))));

        let bad_time = service
            .create_event(
                user,
                CreateEventInput {
                    time: Some("25:99".to_string()),
                    ..event_input("Bad time")
                },
            )
            .await;
        assert!(matches!(bad_time, Err(EventServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_events_are_private() {
        let (service, owner, other) = setup().await;
        service
            .create_event(owner, event_input("Mine"))
            .await
            .expect("Failed to create event");

        let theirs = service.list_events(other).await.expect("Failed to list");
        assert!(theirs.is_empty());
    }

    #[tokio::test]
    async fn test_delete_rules() {
        let (service, owner, other) = setup().await;
        let event = service
            .create_event(owner, event_input("Mine"))
            .await
            .expect("Failed to create event");

        let denied = service.delete_event(other, event.id).await;
        assert!(matches!(denied, Err(EventServiceError::Forbidden(_))));
        // The event survives the denied attempt
        assert_eq!(service.list_events(owner).await.unwrap().len(), 1);

        service
            .delete_event(owner, event.id)
            .await
            .expect("Failed to delete");
        assert!(service.list_events(owner).await.unwrap().is_empty());

        let missing = service.delete_event(owner, event.id).await;
        assert!(matches!(missing, Err(EventServiceError::NotFound)));
    }
}
