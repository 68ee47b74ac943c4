//! Storage Error Types
//!
//! This module defines error types for storage operations, providing
//! clear error handling for connection, initialization, and query failures.

use std::path::PathBuf;
use thiserror::Error;

/// Storage operation errors
///
/// Covers all error cases for database connection, initialization,
/// and row-level operations. Tree-structural errors are handled by
/// the service-layer error type.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to establish database connection
    #[error("Failed to connect to database at {path}: {source}")]
    ConnectionFailed {
        path: PathBuf,
        source: libsql::Error,
    },

    /// Failed to initialize database schema
    #[error("Failed to initialize database schema: {0}")]
    InitializationFailed(String),

    /// Failed to create parent directory
    #[error("Failed to create parent directory for database: {0}")]
    DirectoryCreationFailed(#[from] std::io::Error),

    /// libsql operation error
    #[error("Database operation failed: {0}")]
    Libsql(#[from] libsql::Error),

    /// SQL execution error with context
    #[error("SQL execution failed: {context}")]
    SqlExecution { context: String },

    /// Row could not be decoded into a record
    #[error("Failed to decode row: {context}")]
    RowDecode { context: String },

    /// Operation requires a persisted record but none was assigned an id
    #[error("Record has no storage-assigned id")]
    MissingId,

    /// Row expected to exist has disappeared
    #[error("No row found for id {id}")]
    MissingRow { id: i64 },
}

impl StoreError {
    /// Create a connection failed error
    pub fn connection_failed(path: PathBuf, source: libsql::Error) -> Self {
        Self::ConnectionFailed { path, source }
    }

    /// Create an initialization failed error
    pub fn initialization_failed(msg: impl Into<String>) -> Self {
        Self::InitializationFailed(msg.into())
    }

    /// Create a SQL execution error with context
    pub fn sql_execution(context: impl Into<String>) -> Self {
        Self::SqlExecution {
            context: context.into(),
        }
    }

    /// Create a row decode error with context
    pub fn row_decode(context: impl Into<String>) -> Self {
        Self::RowDecode {
            context: context.into(),
        }
    }
}
