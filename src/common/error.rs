//! Error types for meetsync

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Registry Errors ===
    #[error("Unknown node: {0}")]
    NodeUnknown(String),

    #[error("Invalid node data: {0}")]
    InvalidNode(String),

    // === Meeting Errors ===
    #[error("Meeting not found: {0}")]
    MeetingNotFound(String),

    #[error("Meeting not in progress: {0}")]
    MeetingNotActive(String),

    #[error("Bundle unavailable: {0}")]
    BundleUnavailable(String),

    // === Network Errors ===
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Unexpected status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    // === Serialization ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Operation timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Is this a retryable error?
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Timeout(_) | Error::ConnectionFailed(_) => true,
            Error::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Error::UnexpectedStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Convert to HTTP status code
    pub fn to_http_status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Error::NodeUnknown(_) | Error::MeetingNotFound(_) | Error::MeetingNotActive(_) => {
                StatusCode::NOT_FOUND
            }
            Error::InvalidNode(_) | Error::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            Error::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            Error::BundleUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Implement From for common error types
impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Other(e.to_string())
    }
}
