//! Error types for the backup pipeline.

use thiserror::Error;
use tracing::warn;

/// Result type alias for backup operations.
pub type Result<T> = std::result::Result<T, BackupError>;

/// Core error type for the backup pipeline.
#[derive(Error, Debug)]
pub enum BackupError {
    /// Configuration errors (missing or unusable environment settings).
    #[error("configuration error: {0}")]
    Config(String),

    /// A listing operation against the DNS service failed outright.
    #[error("failed to list {resource}: {message}")]
    Listing {
        /// What was being listed (e.g. "hosted zones").
        resource: &'static str,
        /// Provider error text.
        message: String,
    },

    /// A single-item fetch failed; carries the id that was requested.
    #[error("failed to fetch {resource} {id}: {message}")]
    ResourceFetch {
        /// What was being fetched (e.g. "hosted zone").
        resource: &'static str,
        /// The requested identifier.
        id: String,
        /// Provider error text.
        message: String,
    },

    /// JSON serialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The object store rejected a write.
    #[error("object write failed for {key}: {message}")]
    ObjectWrite {
        /// Destination key of the failed write.
        key: String,
        /// Store error text.
        message: String,
    },

    /// The inbound trigger payload was missing a field it must carry.
    #[error("malformed trigger event: {0}")]
    MalformedEvent(String),
}

impl BackupError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a listing error.
    pub fn listing(resource: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Listing {
            resource,
            message: err.to_string(),
        }
    }

    /// Create a single-item fetch error.
    pub fn fetch(
        resource: &'static str,
        id: impl Into<String>,
        err: impl std::fmt::Display,
    ) -> Self {
        Self::ResourceFetch {
            resource,
            id: id.into(),
            message: err.to_string(),
        }
    }

    /// Create an object-write error.
    pub fn write(key: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::ObjectWrite {
            key: key.into(),
            message: err.to_string(),
        }
    }

    /// Create a malformed-event error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedEvent(msg.into())
    }
}

/// Per-invocation record of best-effort failures.
///
/// Auxiliary fetches and writes are allowed to fail without aborting the
/// invocation; each such failure is logged when it happens and kept here so
/// the final report can surface it.
#[derive(Debug, Default)]
pub struct FailureLog {
    entries: Vec<String>,
}

impl FailureLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log a failure and retain it for the invocation report.
    pub fn record(&mut self, context: impl std::fmt::Display, error: impl std::fmt::Display) {
        let entry = format!("{}: {}", context, error);
        warn!("{}", entry);
        self.entries.push(entry);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<String> {
        self.entries
    }
}
