//! Adapter error types and the degrade-to-default conversion.
//!
//! Every adapter boundary returns an explicit `Result`. Where a failure must
//! not propagate (article scoring, article fetch, history append), callers
//! turn it into a neutral default through [`Degrade::or_degrade`], which is the
//! only place such failures are logged and swallowed.

use std::fmt::Display;
use thiserror::Error;
use tracing::warn;

use zero_common::util::sanitize_for_log;

/// Errors returned by an article source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Connection failure or timeout
    #[error("Network error: {0}")]
    Network(String),

    /// Missing or rejected API key
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Quota exhausted
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Error reported by the API itself
    #[error("API error ({code}): {message}")]
    Api { code: String, message: String },

    /// Response body could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Errors returned by a text classifier.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    /// Model still loading or endpoint overloaded
    #[error("Classifier unavailable: {0}")]
    Unavailable(String),

    /// Nothing to classify
    #[error("Empty input")]
    EmptyInput,

    /// Labels or probabilities that do not fit the positive/negative/neutral schema
    #[error("Invalid classifier output: {0}")]
    InvalidOutput(String),
}

/// Errors returned by a sentiment store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage request failed: {0}")]
    Request(String),

    #[error("Storage rejected write for {ticker}: {message}")]
    Rejected { ticker: String, message: String },

    #[error("Invalid stored record: {0}")]
    InvalidRecord(String),

    #[error("Storage task failed: {0}")]
    Task(String),
}

impl From<StorageError> for zero_common::Error {
    fn from(err: StorageError) -> Self {
        zero_common::Error::Storage(err.to_string())
    }
}

/// Central degrade-to-default conversion for non-fatal adapter failures.
pub trait Degrade<T> {
    /// Return the success value, or log the failure with ticker context and
    /// return `default`.
    fn or_degrade(self, default: T, operation: &str, ticker: &str) -> T;
}

impl<T, E: Display> Degrade<T> for Result<T, E> {
    fn or_degrade(self, default: T, operation: &str, ticker: &str) -> T {
        match self {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    ticker = ticker,
                    operation = operation,
                    error = %sanitize_for_log(&e.to_string()),
                    "Degrading to neutral default"
                );
                default
            }
        }
    }
}
