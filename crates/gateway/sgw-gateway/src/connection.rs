//! Connection identity and the per-session command handle

use std::fmt;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Close code for normal closure.
pub const CLOSE_NORMAL: u16 = 1000;
/// Close code for policy-driven closes (eviction, failed handshake).
pub const CLOSE_POLICY: u16 = 1008;

/// Close reason sent to a session superseded by a newer login.
pub const REASON_SUPERSEDED: &str = "Kicked due to login in other place.";
/// Close reason sent when the handshake credential is missing or invalid.
pub const REASON_UNAUTHORIZED: &str = "Unauthorized";

/// Identity token for one admitted session. Two logins by the same
/// user get distinct ids, which is what lets a stale session loop's
/// registry removal be told apart from the live one's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Commands injected into a session loop from outside its task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Relay a text frame to the peer.
    Send(String),
    /// Run the graceful close path with the given code and reason.
    Close { code: u16, reason: String },
}

/// Cloneable handle to one live connection.
///
/// The session loop owns the socket; a handle only queues commands for
/// it. Closing through a handle is asynchronous: the owning loop picks
/// the command up, performs the close handshake, and removes itself
/// from the registry.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    commands: mpsc::UnboundedSender<SessionCommand>,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, commands: mpsc::UnboundedSender<SessionCommand>) -> Self {
        Self { id, commands }
    }

    /// Get the connection ID
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a text frame for the peer. Returns `false` if the owning
    /// session has already ended.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.commands.send(SessionCommand::Send(text.into())).is_ok()
    }

    /// Ask the owning session loop to close the connection.
    pub fn close(&self, code: u16, reason: impl Into<String>) {
        let _ = self.commands.send(SessionCommand::Close {
            code,
            reason: reason.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_ids_are_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
    }

    #[tokio::test]
    async fn handle_queues_commands_for_the_session() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = ConnectionHandle::new(ConnectionId::new(), tx);

        assert!(handle.send_text("hello"));
        handle.close(CLOSE_NORMAL, "");

        assert_eq!(rx.recv().await, Some(SessionCommand::Send("hello".to_string())));
        assert_eq!(
            rx.recv().await,
            Some(SessionCommand::Close {
                code: CLOSE_NORMAL,
                reason: String::new()
            })
        );
    }

    #[test]
    fn send_after_session_end_reports_failure() {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = ConnectionHandle::new(ConnectionId::new(), tx);
        drop(rx);

        assert!(!handle.send_text("hello"));
    }
}
