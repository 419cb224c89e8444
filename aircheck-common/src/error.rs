//! Common error types for AIRCHECK
//!
//! Recoverable resolution problems (unparseable strings, ambiguous
//! classifications, boundary match scores) are NOT errors: they travel on the
//! quarantine channel alongside the best-effort result. This enum covers
//! infrastructure failures, caller-contract violations, and internal
//! invariant breaks only.

use thiserror::Error;

/// Common result type for AIRCHECK operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across AIRCHECK services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file parse error (wraps toml::de::Error)
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// JSON document error (wraps serde_json::Error)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Playlist document fetch failure (network or HTTP status)
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Syndication resolution requested for a date whose ingestion has not
    /// finished across all enabled stations; the batch is rejected whole
    #[error("Ingest incomplete: {0}")]
    IncompleteIngest(String),

    /// Internal invariant violation (e.g. a master-link cycle); must never
    /// occur under correct use
    #[error("Internal error: {0}")]
    Internal(String),
}
