//! Server error types

use std::time::Duration;
use thiserror::Error;

use crate::events::RecordTooLong;

/// Errors that can occur talking to the server
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Malformed event stream: {0}")]
    RecordTooLong(#[from] RecordTooLong),
}

impl ServerError {
    /// Check if retrying the same request could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ServerError::Api { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            ServerError::Network(_) => true,
            ServerError::Timeout(_) => true,
            ServerError::RecordTooLong(_) => true,
            ServerError::InvalidResponse(_) => false,
        }
    }

    /// Check if the server rejected our credentials
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ServerError::Api { status: 401 | 403, .. })
    }
}
