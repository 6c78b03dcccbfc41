//! Transport error types

use thiserror::Error;

/// Errors that can occur during EC register access and backend management
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Register I/O attempted while no backend is registered
    #[error("No active backend")]
    NoActiveBackend,

    /// Backend identifier is not a known transport name
    #[error("Invalid backend: {0}")]
    InvalidBackend(String),

    /// A backend with this identifier is already active
    #[error("Backend already registered: {0}")]
    AlreadyRegistered(String),

    /// A single read/write call to the backend failed
    #[error("Transport failure at 0x{address:04x} (status {status})")]
    TransportFailure { address: u16, status: u32 },

    /// Write reported success but the read-back disagrees
    #[error("Verification mismatch at 0x{address:04x}: wrote 0x{expected:02x}, read 0x{actual:02x}")]
    VerificationMismatch {
        address: u16,
        expected: u8,
        actual: u8,
    },
}
