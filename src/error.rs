//! Error types for VAYMN
//!
//! This module defines error types using thiserror for ergonomic error handling.
//! Errors are categorized by domain (remote store, local storage, validation,
//! configuration) so callers can decide what to surface and what to swallow.
//!
//! ## Where errors go
//!
//! The persistence mirror never lets a remote-store failure escape to its
//! callers: remote variants are produced by [`crate::remote`] and consumed
//! (logged, then dropped) by [`crate::mirror`]. Local storage variants are the
//! ones callers actually see, because there is no tier beneath the local
//! mirror to fall back to.

use thiserror::Error;

/// Result type alias using our VaymnError type
pub type Result<T> = std::result::Result<T, VaymnError>;

/// Main error type for VAYMN
#[derive(Error, Debug)]
pub enum VaymnError {
    // ===== Remote Store Errors =====

    /// Remote request returned a non-success status
    #[error("Remote request failed: {message}")]
    RemoteRequestFailed {
        message: String,
        /// HTTP status code if available
        status_code: Option<u16>,
        /// Remote table the request targeted
        table: Option<String>,
    },

    /// Remote store returned a body or header we could not interpret
    #[error("Invalid remote response: {message}")]
    InvalidRemoteResponse {
        message: String,
        /// Response body snippet for debugging
        response_body: Option<String>,
    },

    /// Remote store could not be reached
    #[error("Remote store unreachable: {0}")]
    RemoteUnreachable(String),

    // ===== Local Storage Errors =====

    /// Database schema migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Stored value could not be decoded back into its collection
    #[error("Corrupt local entry '{key}': {reason}")]
    CorruptEntry { key: String, reason: String },

    /// Generic file I/O error
    #[error("File I/O error: {0}")]
    FileIoError(String),

    // ===== Validation Errors =====

    /// Record not found
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// Operation not allowed in the record's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    // ===== Configuration Errors =====

    /// Configuration is invalid or incomplete
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    // ===== External Library Errors =====

    /// HTTP client error from reqwest
    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// Database driver error from sqlx
    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Malformed remote URL
    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),
}

// Helper methods for creating common errors
impl VaymnError {
    /// Create a RecordNotFound error with a resource name
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        VaymnError::RecordNotFound(resource.into())
    }

    /// Create an InvalidState error with a message
    pub fn invalid_state<S: Into<String>>(message: S) -> Self {
        VaymnError::InvalidState(message.into())
    }

    /// Create a RemoteRequestFailed error
    pub fn remote_failed<S: Into<String>>(
        message: S,
        status_code: Option<u16>,
        table: Option<String>,
    ) -> Self {
        VaymnError::RemoteRequestFailed {
            message: message.into(),
            status_code,
            table,
        }
    }

    /// Check if error originated in the remote tier
    ///
    /// These are the errors the mirror swallows.
    pub fn is_remote_error(&self) -> bool {
        matches!(
            self,
            VaymnError::RemoteRequestFailed { .. }
                | VaymnError::InvalidRemoteResponse { .. }
                | VaymnError::RemoteUnreachable(_)
                | VaymnError::ReqwestError(_)
        )
    }

    /// Check if error originated in the local storage tier
    pub fn is_storage_error(&self) -> bool {
        matches!(
            self,
            VaymnError::MigrationFailed(_)
                | VaymnError::CorruptEntry { .. }
                | VaymnError::FileIoError(_)
                | VaymnError::SqlxError(_)
                | VaymnError::IoError(_)
        )
    }

    /// Get user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            VaymnError::RemoteUnreachable(_) | VaymnError::ReqwestError(_) => {
                "Cloud sync is unavailable right now. Changes are kept on this device.".to_string()
            }
            VaymnError::CorruptEntry { key, .. } => {
                format!("Local data for '{}' is damaged. Import a backup or reset the device.", key)
            }
            VaymnError::RecordNotFound(what) => format!("{} no longer exists.", what),
            VaymnError::InvalidState(message) => message.clone(),
            _ => self.to_string(),
        }
    }
}
