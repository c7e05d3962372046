//! The `error` module defines the error types used within `chatrelay`.
//!
//! `BusError` is what the broadcast bus can report on its own; `RelayError`
//! wraps it together with the failures of the surfaces built around the bus
//! (submission parsing, serialization, configuration and I/O).

use thiserror::Error;

/// Errors reported by the broadcast bus itself.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// The bus was shut down; no further registrations or publishes.
    #[error("broadcast bus is closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("malformed submission: {0}")]
    MalformedSubmission(String),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
