//! Keyboard interface error types

use thiserror::Error;
use uniwill_transport::TransportError;

/// Errors from keyboard, lightbar and charging operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyboardError {
    /// Transport layer error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Invalid parameter value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Feature not supported by this board
    #[error("Feature not supported: {0}")]
    NotSupported(String),

    /// EC returned a value with no defined meaning
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Background worker could not be started
    #[error("Worker error: {0}")]
    Worker(String),
}
