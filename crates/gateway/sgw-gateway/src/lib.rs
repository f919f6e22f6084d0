//! Real-time session gateway over WebSockets
//!
//! This crate provides the single-connection-per-user multiplexer
//! sitting between raw transport I/O and application logic: an
//! authenticated upgrade handshake, a live-session registry with
//! eviction on conflicting logins, a per-connection receive/dispatch
//! loop with idle-timeout teardown and heartbeat handling, and a
//! protocol-tag keyed dispatch table.

pub mod connection;
pub mod decode;
pub mod dispatch;
pub mod error;
pub mod registry;
pub mod service;
pub mod session;
pub mod upgrade;

pub use connection::{
    CLOSE_NORMAL, CLOSE_POLICY, ConnectionHandle, ConnectionId, REASON_SUPERSEDED,
    REASON_UNAUTHORIZED, SessionCommand,
};
pub use decode::{DecodeError, JsonTagDecoder, MessageDecoder};
pub use dispatch::{DispatchTable, TagHandler};
pub use error::{GatewayError, GatewayResult};
pub use registry::ConnectionRegistry;
pub use service::{Gateway, gateway_handler};
pub use session::{
    DEFAULT_IDLE_DEADLINE, HEARTBEAT_REQUEST, HEARTBEAT_RESPONSE, SessionLoop, sanitize,
};
pub use upgrade::GatewayUpgrade;

// Re-export the verification contract for convenience
pub use sgw_auth_core::{IdentityVerifier, VerifiedUser, VerifyError};
