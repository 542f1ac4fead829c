//! Core error types for doseguard-core.
//!
//! Every failure in this crate is recoverable at the process level: the
//! worst outcome is a dose that stays active until proof is accepted.

use std::path::PathBuf;
use thiserror::Error;

use crate::dose::{DoseId, DoseStatus};
use crate::notify::platform::PlatformError;

/// Core error type for doseguard-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Backend unreachable, timed out or answered with a non-success status
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Notification scheduler or evidence capture was refused by the platform
    #[error("Permission denied by {capability}")]
    PermissionDenied { capability: String },

    /// Notification platform refused or failed a request
    #[error("Notification platform error: {0}")]
    Platform(PlatformError),

    /// Dose is not in the active set
    #[error("Dose {dose_id} not found")]
    NotFound { dose_id: DoseId },

    /// Proof workflow failed and the dose was reverted
    #[error("Proof submission failed: {0}")]
    Workflow(#[from] WorkflowFailure),

    /// Status change not permitted by the dose lifecycle
    #[error("Dose {dose_id} cannot move from {from} to {to}")]
    InvalidTransition {
        dose_id: DoseId,
        from: DoseStatus,
        to: DoseStatus,
    },

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Whether the caller can carry on with stale or reverted state.
    ///
    /// Only local storage and configuration failures are treated as
    /// non-recoverable; they mean the cache itself cannot be trusted.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, CoreError::Database(_) | CoreError::Config(_))
    }
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

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Stored row could not be decoded
    #[error("Corrupt row in {table}: {message}")]
    CorruptRow { table: String, message: String },

    /// Database is locked
    #[error("Database is locked")]
    Locked,
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

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Failures at the backend boundary.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Request timed out")]
    Timeout,

    #[error("Backend answered HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else {
            TransportError::Network(err)
        }
    }
}

/// Reversible failures of the proof-of-dose workflow.
///
/// The dose is always back in its prior status when one of these is returned.
#[derive(Error, Debug)]
pub enum WorkflowFailure {
    #[error("Evidence capture was canceled")]
    CaptureCanceled,

    #[error("Evidence capture unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("Backend rejected the proof (HTTP {status})")]
    UploadRejected { status: u16 },

    #[error("Proof upload failed: {0}")]
    UploadFailed(#[source] TransportError),

    #[error("Evidence could not be read: {0}")]
    EvidenceUnreadable(String),
}

/// Malformed dose records coming from the backend.
///
/// These never escape a sync: the offending record is dropped and logged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DoseDecodeError {
    #[error("record is not an object")]
    NotAnObject,

    #[error("missing or invalid field '{0}'")]
    MissingField(&'static str),

    #[error("dose {id}: unparsable hora_programada '{raw}'")]
    InvalidInstant { id: DoseId, raw: String },

    #[error("dose {0}: duplicate id in backend response")]
    DuplicateId(DoseId),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Two records share one id
    #[error("Duplicate dose id {0}")]
    DuplicateDoseId(DoseId),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg) => {
                if inner.code == rusqlite::ErrorCode::DatabaseBusy
                    || inner.code == rusqlite::ErrorCode::DatabaseLocked
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<PlatformError> for CoreError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::PermissionDenied => CoreError::PermissionDenied {
                capability: "notifications".into(),
            },
            other => CoreError::Platform(other),
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
