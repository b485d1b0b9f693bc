//! Error types for Packrun.

use thiserror::Error;

/// Packrun error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Engine process lifecycle error
    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] crate::engine::supervisor::LifecycleError),

    /// Job submission or completion error
    #[error("Execution error: {0}")]
    Execute(#[from] crate::api::client::ExecuteError),

    /// A remote engine URL could not be parsed
    #[error("Invalid engine URL: {0}")]
    InvalidUrl(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Packrun operations.
pub type Result<T> = std::result::Result<T, Error>;
