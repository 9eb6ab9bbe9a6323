use thiserror::Error;

/// Main error type for the Ridgeline system
#[derive(Error, Debug)]
pub enum RidgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Dimension mismatch: expected {expected} coordinates, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Oracle failed at point {point}: {message}")]
    Oracle { point: String, message: String },

    #[error("Run interrupted: {0}")]
    Interrupted(String),

    #[error("Worker pool is shut down")]
    PoolShutdown,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Ridgeline operations
pub type RidgeResult<T> = Result<T, RidgeError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::RidgeError::Validation(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::RidgeError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::RidgeError::Config(format!($($arg)*))
    };
}
