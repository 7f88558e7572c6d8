//! Error handling for the screening engine
//!
//! Every fallible operation in the crate returns [`ScreenResult`]. Variants
//! carry enough context to build a human-readable message without the
//! caller having to know which analysis raised it.

use thiserror::Error;

/// Main error type for dopant screening
#[derive(Error, Debug)]
pub enum ScreenError {
    #[error("Insufficient data for {operation}: need at least {required} points, got {actual}")]
    InsufficientData {
        operation: String,
        required: usize,
        actual: usize,
    },

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization failed: {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O operation failed: {operation}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV parsing failed: {context}")]
    Csv {
        context: String,
        #[source]
        source: csv::Error,
    },

    #[error("Resource not found: {resource} - {id}")]
    NotFound { resource: String, id: String },

    #[error("Numerical failure in {operation}: {message}")]
    Numerical { operation: String, message: String },

    #[error("Lock poisoned: {resource}")]
    MutexPoisoned { resource: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Type alias for Result with ScreenError
pub type ScreenResult<T> = Result<T, ScreenError>;

impl ScreenError {
    /// Create an insufficient data error
    pub fn insufficient_data(operation: impl Into<String>, required: usize, actual: usize) -> Self {
        Self::InsufficientData {
            operation: operation.into(),
            required,
            actual,
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            context: context.into(),
            source,
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Create a CSV error
    pub fn csv(context: impl Into<String>, source: csv::Error) -> Self {
        Self::Csv {
            context: context.into(),
            source,
        }
    }

    /// Create a not found error
    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// Create a numerical error
    pub fn numerical(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Numerical {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the caller supplied bad or too little data, as opposed to an
    /// environment or internal failure.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ScreenError::InsufficientData { .. } | ScreenError::InvalidInput { .. }
        )
    }
}

/// Helper trait for safe RwLock read operations
pub trait SafeReadLock<T: ?Sized> {
    /// Safely acquire a read lock
    fn safe_read(&self) -> ScreenResult<std::sync::RwLockReadGuard<'_, T>>;
}

impl<T: ?Sized> SafeReadLock<T> for std::sync::RwLock<T> {
    fn safe_read(&self) -> ScreenResult<std::sync::RwLockReadGuard<'_, T>> {
        self.read().map_err(|_| ScreenError::MutexPoisoned {
            resource: "rwlock_read".to_string(),
        })
    }
}

/// Helper trait for safe RwLock write operations
pub trait SafeWriteLock<T: ?Sized> {
    /// Safely acquire a write lock
    fn safe_write(&self) -> ScreenResult<std::sync::RwLockWriteGuard<'_, T>>;
}

impl<T: ?Sized> SafeWriteLock<T> for std::sync::RwLock<T> {
    fn safe_write(&self) -> ScreenResult<std::sync::RwLockWriteGuard<'_, T>> {
        self.write().map_err(|_| ScreenError::MutexPoisoned {
            resource: "rwlock_write".to_string(),
        })
    }
}

/// Convert from serde_json errors
impl From<serde_json::Error> for ScreenError {
    fn from(err: serde_json::Error) -> Self {
        ScreenError::serialization("json_operation", err)
    }
}

/// Convert from std::io errors
impl From<std::io::Error> for ScreenError {
    fn from(err: std::io::Error) -> Self {
        ScreenError::io("io_operation", err)
    }
}

/// Convert from csv errors
impl From<csv::Error> for ScreenError {
    fn from(err: csv::Error) -> Self {
        ScreenError::csv("csv_operation", err)
    }
}

/// Convert from String errors
impl From<String> for ScreenError {
    fn from(err: String) -> Self {
        ScreenError::Internal { message: err }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = ScreenError::insufficient_data("gaussian_process", 2, 1);
        assert!(err.to_string().contains("need at least 2 points, got 1"));
        assert!(err.is_input_error());

        let config_err = ScreenError::config("restarts must be >= 5");
        assert!(config_err.to_string().contains("Configuration error"));
        assert!(!config_err.is_input_error());
    }

    #[test]
    fn test_error_chaining() {
        use std::error::Error;

        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err = ScreenError::io("reading descriptors", io_err);

        assert!(err.source().is_some());
        assert!(err.to_string().contains("I/O operation failed"));
    }

    #[test]
    fn test_poisoned_lock_is_reported() {
        use std::sync::{Arc, RwLock};

        let lock = Arc::new(RwLock::new(0u32));
        let poisoner = Arc::clone(&lock);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.write().unwrap();
            panic!("poison the lock");
        })
        .join();

        let result = lock.safe_read();
        assert!(matches!(result, Err(ScreenError::MutexPoisoned { .. })));
    }
}
