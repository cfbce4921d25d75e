//! Error types for the internal store.
//!
//! This module defines all error types using `thiserror`. Startup errors
//! (configuration, schema drift) abort bootstrap; runtime errors raised inside
//! a unit of work are passed back to the caller untouched after rollback.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Configuration error: {message}")]
    Configuration { message: String, suggestion: String },

    #[error("Schema mismatch for entity '{entity}': {message}")]
    SchemaMismatch { entity: String, message: String },

    #[error(
        "Internal store is not activated. Set 'snapadmin.enabled' to true to use the admin persistence layer."
    )]
    NotActivated,

    #[error(
        "Nested transaction rejected: run() was called from inside a running unit of work. Pass the open transaction down instead."
    )]
    NestedTransaction,

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "23505" for unique violation on PostgreSQL
        sql_state: Option<String>,
        unique_violation: bool,
        suggestion: String,
    },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl StoreError {
    /// Create a configuration error with a helpful suggestion.
    pub fn configuration(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a schema mismatch error for an entity.
    pub fn schema_mismatch(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            entity: entity.into(),
            message: message.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            unique_violation: false,
            suggestion: suggestion.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Configuration { suggestion, .. } => Some(suggestion),
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Errors that must stop process initialization.
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. } | Self::SchemaMismatch { .. }
        )
    }

    /// True if the database rejected a write because of a duplicate key.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            Self::Database {
                unique_violation: true,
                ..
            }
        )
    }
}

/// Convert sqlx errors to StoreError.
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => StoreError::configuration(
                msg.to_string(),
                "Check the internal datasource URL and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                let unique_violation = db_err.is_unique_violation();
                let suggestion = if unique_violation {
                    "A row with the same primary key already exists"
                } else {
                    "Check the statement and the internal schema"
                };
                StoreError::Database {
                    message: db_err.message().to_string(),
                    sql_state: code,
                    unique_violation,
                    suggestion: suggestion.to_string(),
                }
            }
            sqlx::Error::RowNotFound => StoreError::database(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            // Callers that know the pool's configured limit map this themselves
            sqlx::Error::PoolTimedOut => StoreError::timeout(
                "connection pool acquire",
                crate::config::DEFAULT_ACQUIRE_TIMEOUT_SECS,
            ),
            sqlx::Error::PoolClosed => StoreError::connection(
                "Connection pool is closed",
                "The internal store has been shut down",
            ),
            sqlx::Error::Io(io_err) => StoreError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => StoreError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => StoreError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => {
                StoreError::internal(format!("Column not found: {}", col))
            }
            sqlx::Error::ColumnDecode { index, source } => {
                StoreError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => {
                StoreError::internal(format!("Decode error: {}", source))
            }
            sqlx::Error::WorkerCrashed => StoreError::internal("Database worker crashed"),
            _ => StoreError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for internal store operations.
pub type StoreResult<T> = Result<T, StoreError>;
