//! Errors surfaced by the sentiment read API.

use thiserror::Error;

/// Failure of a read request, mapped to an HTTP status.
#[derive(Error, Debug)]
pub enum Error {
    /// Ticker is not configured, or has no stored sentiment yet
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage backend could not serve the read
    #[error("Storage error: {0}")]
    Storage(String),
}

impl Error {
    /// HTTP status code for this error.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Storage(_) => 503,
        }
    }

    /// Whether the error points at a server-side fault rather than the request.
    pub const fn is_server_fault(&self) -> bool {
        self.status_code() >= 500
    }
}
