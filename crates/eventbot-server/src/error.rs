//! Server error types.

use chrono::{DateTime, Utc};
use eventbot_core::WhenError;
use thiserror::Error;

use crate::store::StoreError;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The event store refused an operation.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// An event was requested with a start time that has already passed.
    #[error("I can't schedule an event in the past! ({start})")]
    PastSchedule { start: DateTime<Utc> },

    /// A start time or duration that could not be understood.
    #[error(transparent)]
    When(#[from] WhenError),

    /// No event with this id.
    #[error("Sorry, I couldn't find that event.")]
    NotFound { id: String },
}

impl ServerError {
    /// Creates a not found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Returns true for errors that are meant to be shown to the chat user
    /// as-is rather than logged.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::PastSchedule { .. } | Self::When(_) | Self::NotFound { .. }
        )
    }
}
