//! Error types for the fitness_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for fitness_core operations
///
/// Invariant violations inside a running session are not errors; they are
/// reported as [`crate::session::Rejection`] values and leave the session
/// untouched.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Workout plan validation error
    #[error("Plan validation error: {0}")]
    PlanValidation(String),

    /// A requested plan or session does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A persistence collaborator failed to read or write
    #[error("Storage error: {0}")]
    Storage(String),

    /// User name that cannot be used as a directory name
    #[error("Invalid user name: {0}")]
    InvalidUser(String),

    /// Session could not be finished or resumed
    #[error("Session error: {0}")]
    Session(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
