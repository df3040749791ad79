use chrono::NaiveDate;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::models::event::EventStatus;

pub type Result<T> = std::result::Result<T, SchedulingError>;

#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid date range: {start} is after {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("transition from '{from}' to '{to}' is not allowed")]
    InvalidTransition { from: EventStatus, to: EventStatus },

    #[error("event {event_id} was modified concurrently (expected version {expected}, found {actual})")]
    Conflict {
        event_id: Uuid,
        expected: i64,
        actual: i64,
    },

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl SchedulingError {
    pub fn event_not_found(event_id: Uuid) -> Self {
        Self::NotFound {
            entity: "event",
            id: event_id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<sqlx::Error> for SchedulingError {
    fn from(err: sqlx::Error) -> Self {
        Self::Store(anyhow::Error::new(err))
    }
}
