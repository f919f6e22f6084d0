//! Live-session registry enforcing at most one connection per user

use crate::connection::{
    CLOSE_NORMAL, CLOSE_POLICY, ConnectionHandle, ConnectionId, REASON_SUPERSEDED,
};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info, warn};

/// Thread-safe user-id to connection-handle map.
///
/// All read-modify-write of a single user's entry goes through the
/// DashMap entry API, so two concurrent handshakes for the same user
/// can never both believe they own the slot. Entries for different
/// users live in different shards and do not serialize against each
/// other.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<String, ConnectionHandle>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Get the number of live sessions
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Get the user ids with a live session
    pub fn user_ids(&self) -> Vec<String> {
        self.connections
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Install `handle` as the user's live session.
    ///
    /// If the user already has one, the prior handle is replaced and
    /// closed with the superseded-by-new-login reason before the entry
    /// lock is released; its own session loop observes the close and
    /// tears itself down.
    pub fn admit(&self, user_id: &str, handle: ConnectionHandle) {
        match self.connections.entry(user_id.to_string()) {
            Entry::Occupied(mut slot) => {
                let evicted = slot.insert(handle);
                evicted.close(CLOSE_POLICY, REASON_SUPERSEDED);
                info!(
                    user_id,
                    evicted = %evicted.id(),
                    "evicted previous session for new login"
                );
            }
            Entry::Vacant(slot) => {
                slot.insert(handle);
                debug!(user_id, "admitted session");
            }
        }
    }

    /// Remove the user's entry only if it still holds `handle_id`.
    ///
    /// A session loop that was evicted mid-teardown calls this after
    /// its slot has already been replaced; the identity guard makes
    /// that a no-op instead of erasing the newer session.
    pub fn remove(&self, user_id: &str, handle_id: ConnectionId) -> bool {
        let removed = self
            .connections
            .remove_if(user_id, |_, handle| handle.id() == handle_id)
            .is_some();
        if removed {
            debug!(user_id, connection = %handle_id, "removed session");
        }
        removed
    }

    /// Get the user's live handle, if any
    pub fn lookup(&self, user_id: &str) -> Option<ConnectionHandle> {
        self.connections.get(user_id).map(|entry| entry.clone())
    }

    /// Administrative disconnect: gracefully close the user's session
    /// and remove it. Returns `false` if the user has no session.
    pub fn disconnect(&self, user_id: &str) -> bool {
        let Some(handle) = self.lookup(user_id) else {
            return false;
        };
        handle.close(CLOSE_NORMAL, "");
        self.remove(user_id, handle.id());
        info!(user_id, "disconnected session");
        true
    }

    /// Best-effort relay of a text frame to the user's session.
    pub fn send_to_user(&self, user_id: &str, text: impl Into<String>) -> bool {
        match self.connections.get(user_id) {
            Some(handle) => handle.send_text(text),
            None => {
                warn!(user_id, "attempted to send to a user with no session");
                false
            }
        }
    }
}
