//! Error taxonomy surfaced by the sync engine to its callers.

use jira_api::TrackerError;
use thiserror::Error;

/// Coarse classification shown next to the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Auth,
    Fetch,
    Write,
    Validation,
    Credentials,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("{0}")]
    Auth(String),
    #[error("{0}")]
    Fetch(String),
    #[error("{0}")]
    Write(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Credentials(String),
}

pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Auth(_) => ErrorKind::Auth,
            SyncError::Fetch(_) => ErrorKind::Fetch,
            SyncError::Write(_) => ErrorKind::Write,
            SyncError::Validation(_) => ErrorKind::Validation,
            SyncError::Credentials(_) => ErrorKind::Credentials,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            SyncError::Auth(message)
            | SyncError::Fetch(message)
            | SyncError::Write(message)
            | SyncError::Validation(message)
            | SyncError::Credentials(message) => message,
        }
    }

    /// Read-side failure. Rejected credentials stay distinguishable so the session can be dropped.
    pub fn fetch(err: TrackerError) -> Self {
        if err.is_authentication() {
            SyncError::Auth(err.to_string())
        } else {
            SyncError::Fetch(err.to_string())
        }
    }
}
