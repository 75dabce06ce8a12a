//! Domain error types
//!
//! This module defines the error hierarchy for Invex.
//! All errors are domain-specific and don't expose third-party types.

use std::path::PathBuf;
use thiserror::Error;

/// Main Invex error type
///
/// This is the primary error type used throughout the application.
/// Variants map onto the failure classes the exporter distinguishes:
/// run preconditions (configuration, lock, preflight) abort the run, while
/// source and write failures are scoped to one tenant or one record.
#[derive(Debug, Error)]
pub enum InvexError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Source database errors (connection, query, row decoding)
    #[error("Source error: {0}")]
    Source(String),

    /// Checkpoint store errors
    #[error("State management error: {0}")]
    State(String),

    /// Another incremental run holds the process lock
    #[error("Another incremental export is already running (lock held at {resource})")]
    LockContention {
        /// Identity of the lock resource, for operator inspection
        resource: String,
    },

    /// A run precondition failed before any work began
    #[error("Preflight check failed: {0}")]
    Preflight(String),

    /// Writing an exported record failed
    #[error(transparent)]
    Write(#[from] WriteError),

    /// Export process errors
    #[error("Export error: {0}")]
    Export(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl InvexError {
    /// Whether this error invalidates the run as a whole
    ///
    /// Precondition failures stop the run; anything else is absorbed by the
    /// tenant or record it belongs to.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            InvexError::Configuration(_)
                | InvexError::LockContention { .. }
                | InvexError::Preflight(_)
        )
    }
}

/// Failure to materialize a single record
///
/// Carries the destination that was attempted so the operator can find it.
#[derive(Debug, Error)]
#[error("Failed to write {}: {source}", path.display())]
pub struct WriteError {
    /// Path the write was attempted at
    pub path: PathBuf,

    /// Underlying I/O failure
    #[source]
    pub source: std::io::Error,
}

impl WriteError {
    /// Creates a new write error for a path
    pub fn new(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for InvexError {
    fn from(err: std::io::Error) -> Self {
        InvexError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for InvexError {
    fn from(err: serde_json::Error) -> Self {
        InvexError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for InvexError {
    fn from(err: toml::de::Error) -> Self {
        InvexError::Configuration(format!("TOML parse error: {err}"))
    }
}
