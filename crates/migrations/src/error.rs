//! Error types for the migration engine
//!
//! Every fallible operation in the crate returns [`MigrationResult`]. The
//! runner decides, based on its strict/silent mode, whether an error is
//! propagated to the caller or recorded as a diagnostic message.

use thiserror::Error;

/// Result type alias for migration and schema operations
pub type MigrationResult<T> = Result<T, MigrationError>;

/// Boxed error raised by a migration unit's own apply/revert logic
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error kinds surfaced by the runner, the history store and Forge
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Migrations have been loaded but are disabled or setup incorrectly.")]
    Disabled,

    #[error("{0}")]
    Usage(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("This feature is not available for the database you are using: {0}")]
    FeatureUnavailable(String),

    #[error("The migration class \"{0}\" could not be found.")]
    ClassNotFound(String),

    #[error("The migration class is missing an \"{0}\" method.")]
    MissingDirection(String),

    #[error("Migration {unit} failed: {source}")]
    MigrationFailed {
        unit: String,
        #[source]
        source: BoxError,
    },

    #[error("Target batch not found: {0}")]
    BatchNotFound(i64),

    #[error("There is a gap in the migration sequence near version number: {0}")]
    MigrationGap(String),

    #[error("Migration file not found: {0}")]
    NotFound(String),

    #[error("Duplicate migration uid \"{uid}\" found in {first} and {second}")]
    DuplicateUid {
        uid: String,
        first: String,
        second: String,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl MigrationError {
    /// Wrap an arbitrary failure from a unit's apply/revert logic
    pub fn failed(unit: impl Into<String>, source: impl Into<BoxError>) -> Self {
        MigrationError::MigrationFailed {
            unit: unit.into(),
            source: source.into(),
        }
    }

    /// Error raised when a dialect cannot express the requested DDL
    pub fn unavailable(operation: impl Into<String>) -> Self {
        MigrationError::FeatureUnavailable(operation.into())
    }
}

impl From<sqlx::Error> for MigrationError {
    fn from(err: sqlx::Error) -> Self {
        MigrationError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for MigrationError {
    fn from(err: serde_json::Error) -> Self {
        MigrationError::Configuration(err.to_string())
    }
}
