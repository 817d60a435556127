//! Core error types for slotwise-core.
//!
//! This module defines the error hierarchy using thiserror. Placement and
//! validation failures are recoverable by the caller; none of them leave the
//! timeline in an overlapping state.

use std::path::PathBuf;
use thiserror::Error;

use crate::event::EventId;
use crate::timeline::TimeInterval;

/// Core error type for slotwise-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed or incomplete request, rejected before placement
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The request was valid but could not be placed
    #[error("Placement failed: {0}")]
    Placement(#[from] PlacementError),

    /// Lookup or delete of an unknown event
    #[error("Event {0} not found")]
    NotFound(EventId),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Errors a caller may safely ignore (e.g. deleting an already-removed event).
    pub fn is_benign(&self) -> bool {
        matches!(self, CoreError::NotFound(_))
    }
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Title is empty or whitespace
    #[error("Title must not be empty")]
    EmptyTitle,

    /// A field required by the declared kind is absent
    #[error("Missing required field '{field}' for event type '{kind}'")]
    MissingField { kind: String, field: &'static str },

    /// Unknown event type tag
    #[error("Unknown event type: {0}")]
    UnknownKind(String),

    /// Timestamp that could not be parsed
    #[error("Invalid datetime for '{field}': {value}")]
    InvalidDateTime { field: &'static str, value: String },

    /// Invalid time range
    #[error("Invalid time range: '{end_field}' must be after '{start_field}'")]
    InvalidTimeRange {
        start_field: &'static str,
        end_field: &'static str,
    },

    /// Preferred window not in `HH:MM - HH:MM` form, or empty
    #[error("Invalid preferred time '{0}': expected 'HH:MM - HH:MM' with start before end")]
    InvalidPreferredWindow(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: &'static str, message: String },
}

/// Placement failures. Surfaced to callers as conflicts (409).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlacementError {
    /// The exact interval requested collides with an existing placement
    #[error("Time slot {interval} is occupied by event {existing}")]
    Conflict {
        interval: TimeInterval,
        existing: EventId,
    },

    /// The whole search range was exhausted
    #[error("No free slot available for event {event}")]
    NoSlotAvailable { event: EventId },

    /// Some occurrences of a recurring event could not be placed
    #[error("Recurring event {event}: {placed} occurrence(s) placed, {failed} failed")]
    PartialSeries {
        event: EventId,
        placed: usize,
        failed: usize,
    },
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// Persisted rows that cannot be turned back into domain values
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// No home/config directory
    #[error("Cannot determine data directory: {0}")]
    NoDataDir(String),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_benign() {
        assert!(CoreError::NotFound(EventId(7)).is_benign());
        assert!(!CoreError::from(ValidationError::EmptyTitle).is_benign());
    }

    #[test]
    fn placement_error_messages_name_the_event() {
        let err = PlacementError::PartialSeries {
            event: EventId(3),
            placed: 2,
            failed: 1,
        };
        assert_eq!(
            err.to_string(),
            "Recurring event 3: 2 occurrence(s) placed, 1 failed"
        );
    }
}
