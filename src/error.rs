//! Relay error types.
//!
//! | Variant     | Scope                    | Retryable |
//! |-------------|--------------------------|-----------|
//! | `Config`    | whole run                | no        |
//! | `Lock`      | whole run                | no        |
//! | `Query`     | one direction's pass     | no        |
//! | `Transport` | one delivery attempt     | yes       |
//! | `Cache`     | sent-record cache tier   | no        |
//!
//! Per-record skips and per-record write failures are not errors; they are
//! tallied in the pass report.

use crate::config::ConfigError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Debug, Error)]
pub enum RelayError {
    /// Missing or invalid configuration. Fatal before any progress.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Another invocation holds the run lock.
    #[error("run lock unavailable: {0}")]
    Lock(String),

    /// A store query failed or returned an error object.
    #[error("query failed on {store}: {message}")]
    Query { store: String, message: String },

    /// Transport-level fault talking to a remote endpoint.
    #[error("transport error: {0}")]
    Transport(String),

    /// A cache tier could not be read or written.
    #[error("cache error: {0}")]
    Cache(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl RelayError {
    pub fn query(store: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Query {
            store: store.into(),
            message: message.into(),
        }
    }

    /// Whether the failed operation may succeed if attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RelayError::Transport(_))
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        RelayError::Transport(err.to_string())
    }
}
