//! Chat-pulse error types.
//!
//! The ingestion core never fails; these errors only surface at the edges
//! where catalog snapshots and configuration are loaded.

use thiserror::Error;

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, PulseError>;

/// Errors that can occur while loading external inputs.
#[derive(Error, Debug)]
pub enum PulseError {
    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON decoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),
}

impl PulseError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
