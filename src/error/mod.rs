//! Error types for the persistence engine.
//!
//! This module defines two error enums:
//! - [`StorageError`]: failures in backend initialization, individual
//!   load/save operations, and shutdown
//! - [`ConfigError`]: configuration loading and validation failures
//!
//! All errors implement `Send + Sync` for async compatibility. Storage
//! errors are `Clone` because the worker sends them through per-operation
//! completion channels.

use thiserror::Error;

/// Storage errors.
///
/// Failures are scoped: an operation failure is delivered only to the
/// completion handle of the operation that caused it and never affects
/// other queued or future operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Backend setup could not complete (schema creation, directory
    /// creation, malformed connection options). The engine is unusable
    /// until `initialize` succeeds.
    #[error("Initialization failed: {message}")]
    InitializationFailed {
        /// Description of the setup failure.
        message: String,
    },

    /// Failed to reach the backend, or an operation was issued before the
    /// backend was initialized.
    #[error("Connection failed: {message}")]
    ConnectionFailed {
        /// Description of the connection failure.
        message: String,
    },

    /// A database statement failed.
    #[error("Query failed: {query} - {message}")]
    QueryFailed {
        /// The statement that failed (may be truncated).
        query: String,
        /// Description of the failure.
        message: String,
    },

    /// A file operation failed (flat-file backend).
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O failure.
        message: String,
    },

    /// A record cannot be encoded into the persisted row shape.
    #[error("Invalid record: {message}")]
    InvalidRecord {
        /// Why the record cannot be encoded.
        message: String,
    },

    /// The bounded shutdown wait elapsed with operations still queued.
    /// Non-fatal, but some data may not have been flushed.
    #[error("Shutdown timed out with {pending} operation(s) still pending")]
    ShutdownTimedOut {
        /// Number of operations that had not completed.
        pending: usize,
    },

    /// The worker task has stopped; no further operations can be submitted.
    #[error("Storage worker has stopped")]
    WorkerStopped,
}

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Required configuration is missing.
    #[error("Missing required: {var}")]
    MissingRequired {
        /// The missing variable name.
        var: String,
    },

    /// Configuration value is invalid.
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue {
        /// The variable name.
        var: String,
        /// Why the value is invalid.
        reason: String,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;

    assert_impl_all!(StorageError: Send, Sync, std::error::Error, Clone);
    assert_impl_all!(ConfigError: Send, Sync, std::error::Error, Clone);

    #[test]
    fn test_storage_error_display_initialization_failed() {
        let err = StorageError::InitializationFailed {
            message: "schema creation failed".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Initialization failed: schema creation failed"
        );
    }

    #[test]
    fn test_storage_error_display_connection_failed() {
        let err = StorageError::ConnectionFailed {
            message: "host not found".to_string(),
        };
        assert_eq!(err.to_string(), "Connection failed: host not found");
    }

    #[test]
    fn test_storage_error_display_query_failed() {
        let err = StorageError::QueryFailed {
            query: "SELECT player_data".to_string(),
            message: "syntax error".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Query failed: SELECT player_data - syntax error"
        );
    }

    #[test]
    fn test_storage_error_display_io() {
        let err = StorageError::Io {
            message: "permission denied".to_string(),
        };
        assert_eq!(err.to_string(), "I/O error: permission denied");
    }

    #[test]
    fn test_storage_error_display_invalid_record() {
        let err = StorageError::InvalidRecord {
            message: "category id contains delimiter".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid record: category id contains delimiter"
        );
    }

    #[test]
    fn test_storage_error_display_shutdown_timed_out() {
        let err = StorageError::ShutdownTimedOut { pending: 3 };
        assert_eq!(
            err.to_string(),
            "Shutdown timed out with 3 operation(s) still pending"
        );
    }

    #[test]
    fn test_storage_error_display_worker_stopped() {
        let err = StorageError::WorkerStopped;
        assert_eq!(err.to_string(), "Storage worker has stopped");
    }

    #[test]
    fn test_config_error_display_missing_required() {
        let err = ConfigError::MissingRequired {
            var: "MYSQL_URL".to_string(),
        };
        assert_eq!(err.to_string(), "Missing required: MYSQL_URL");
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            var: "SHUTDOWN_TIMEOUT_MS".to_string(),
            reason: "must be a positive integer".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid value for SHUTDOWN_TIMEOUT_MS: must be a positive integer"
        );
    }

    #[test]
    fn test_storage_error_clone_eq() {
        let err = StorageError::ShutdownTimedOut { pending: 2 };
        let cloned = err.clone();
        assert_eq!(err, cloned);
        assert_ne!(err, StorageError::WorkerStopped);
    }

    #[test]
    fn test_config_error_clone_eq() {
        let err = ConfigError::MissingRequired {
            var: "MYSQL_URL".to_string(),
        };
        let cloned = err.clone();
        assert_eq!(err, cloned);
    }
}
