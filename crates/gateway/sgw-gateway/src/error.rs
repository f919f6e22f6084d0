//! Error types for gateway operations

use crate::decode::DecodeError;
use sgw_auth_core::VerifyError;
use thiserror::Error;

/// Gateway-level errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The handshake credential is missing or was rejected.
    #[error("Authentication failed: {0}")]
    Unauthorized(#[from] VerifyError),

    /// An inbound payload could not be decoded.
    #[error("Decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// A dispatch handler reported a failure.
    #[error("Handler failed: {0}")]
    Handler(String),

    /// The transport failed while sending or receiving.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Convenience type alias for gateway operation results
pub type GatewayResult<T> = Result<T, GatewayError>;
