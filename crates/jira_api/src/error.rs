//! Error model used by Jira API client operations.

use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrackerError>;

/// Represents the failure modes of a Jira API call: HTTP errors with status and body, rejected credentials, timeouts, network issues, payload decoding problems and invalid client settings.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("http {status}: {message}")]
    Http {
        status: StatusCode,
        server_message: Option<String>,
        message: String,
    },
    #[error("authentication error: {message}")]
    Authentication {
        status: StatusCode,
        server_message: Option<String>,
        message: String,
    },
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("unexpected error: {0}")]
    Other(String),
}

impl TrackerError {
    /// Constructs an HTTP error variant with the message Jira put in its error envelope, if any.
    pub fn http(
        status: StatusCode,
        server_message: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        TrackerError::Http {
            status,
            server_message,
            message: message.into(),
        }
    }

    /// Returns the HTTP status carried by the error, if a response was received.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            TrackerError::Http { status, .. } | TrackerError::Authentication { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Returns the message extracted from Jira's `errorMessages`/`errors` envelope.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            TrackerError::Http { server_message, .. }
            | TrackerError::Authentication { server_message, .. } => server_message.as_deref(),
            _ => None,
        }
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, TrackerError::Authentication { .. })
    }
}

impl From<reqwest::Error> for TrackerError {
    /// Converts reqwest errors into semantic TrackerError variants.
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TrackerError::Timeout(err.to_string())
        } else if err.is_status() {
            let status = err.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            TrackerError::Http {
                status,
                server_message: None,
                message: err.to_string(),
            }
        } else if err.is_decode() {
            TrackerError::Serialization(err.to_string())
        } else if err.is_connect() || err.is_request() {
            TrackerError::Network(err.to_string())
        } else {
            TrackerError::Other(err.to_string())
        }
    }
}

impl From<serde_json::Error> for TrackerError {
    /// Converts serde_json decode/encode failures into serialization errors.
    fn from(err: serde_json::Error) -> Self {
        TrackerError::Serialization(err.to_string())
    }
}
