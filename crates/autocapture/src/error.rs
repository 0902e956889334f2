//! Error types for autocapture.
//!
//! This module defines all error types used throughout the autocapture crate.
//! Configuration and registration errors are programmer errors and are
//! surfaced immediately; failures inside the per-event capture pipeline are
//! logged and never escape a listener.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for autocapture operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// The requested persistence kind is not recognized.
    #[error("invalid persistence type: {kind}")]
    UnknownPersistence {
        /// The kind that was requested.
        kind: String,
    },

    /// The shared persistence adapter was already created with another kind.
    #[error("persistence already initialized as '{existing}', cannot switch to '{requested}'")]
    PersistenceConflict {
        /// Kind of the existing shared adapter.
        existing: String,
        /// Kind that was requested.
        requested: String,
    },

    /// A CSS selector could not be parsed.
    #[error("invalid selector '{selector}': {message}")]
    InvalidSelector {
        /// The selector source text.
        selector: String,
        /// Description of what went wrong.
        message: String,
    },

    // === Registration Errors ===
    /// A plugin with the same key is already registered.
    #[error("plugin '{key}' is already registered")]
    DuplicatePlugin {
        /// The duplicated plugin key.
        key: String,
    },

    /// No plugin is registered under the given key.
    #[error("plugin '{key}' is not registered")]
    UnknownPlugin {
        /// The requested plugin key.
        key: String,
    },

    // === Storage Errors ===
    /// Failed to open or create the storage database.
    #[error("failed to open storage database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A storage query failed.
    #[error("storage query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run storage migrations.
    #[error("storage migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// The storage backend rejected or could not perform an operation.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for autocapture operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a new storage unavailable error.
    #[must_use]
    pub fn storage_unavailable(message: impl Into<String>) -> Self {
        Self::StorageUnavailable(message.into())
    }

    /// Create a configuration validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Create an invalid selector error.
    #[must_use]
    pub fn invalid_selector(selector: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSelector {
            selector: selector.into(),
            message: message.into(),
        }
    }

    /// Create a duplicate plugin error.
    #[must_use]
    pub fn duplicate_plugin(key: impl Into<String>) -> Self {
        Self::DuplicatePlugin { key: key.into() }
    }

    /// Create an unknown plugin error.
    #[must_use]
    pub fn unknown_plugin(key: impl Into<String>) -> Self {
        Self::UnknownPlugin { key: key.into() }
    }

    /// Check if this error is a configuration problem.
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigLoad(_)
                | Self::ConfigValidation { .. }
                | Self::UnknownPersistence { .. }
                | Self::PersistenceConflict { .. }
                | Self::InvalidSelector { .. }
        )
    }

    /// Check if this error comes from plugin registration.
    #[must_use]
    pub fn is_registration_error(&self) -> bool {
        matches!(self, Self::DuplicatePlugin { .. } | Self::UnknownPlugin { .. })
    }
}
