//! Per-connection receive/dispatch loop
//!
//! A session runs Handshaking -> Active -> Closing -> Closed. The
//! handshake happens in [`crate::service::Gateway`] before the loop
//! starts; everything from admission to teardown lives here. The idle
//! deadline is the only cancellation source, and it aborts the
//! transport without a close handshake: a peer that stopped responding
//! cannot be trusted to complete one. Eviction and administrative
//! disconnect arrive as injected [`SessionCommand::Close`] commands and
//! take the graceful path instead.

use crate::connection::{CLOSE_NORMAL, ConnectionHandle, SessionCommand};
use crate::decode::MessageDecoder;
use crate::dispatch::DispatchTable;
use crate::error::{GatewayError, GatewayResult};
use crate::registry::ConnectionRegistry;
use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Heartbeat request literal.
pub const HEARTBEAT_REQUEST: &str = "ping";
/// Heartbeat reply literal.
pub const HEARTBEAT_RESPONSE: &str = "pong";
/// Default idle deadline before an unresponsive connection is aborted.
pub const DEFAULT_IDLE_DEADLINE: Duration = Duration::from_secs(25);

/// Strip control characters (code points below 32) plus the literal
/// `%` and `?` from an inbound payload. Idempotent.
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .filter(|&c| c as u32 >= 32 && c != '%' && c != '?')
        .collect()
}

/// One connection's receive/dispatch loop, from admission to teardown.
pub struct SessionLoop<D> {
    user_id: String,
    handle: ConnectionHandle,
    registry: Arc<ConnectionRegistry>,
    dispatch: Arc<DispatchTable>,
    decoder: Arc<D>,
    idle_deadline: Duration,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
}

impl<D: MessageDecoder> SessionLoop<D> {
    pub fn new(
        user_id: String,
        handle: ConnectionHandle,
        registry: Arc<ConnectionRegistry>,
        dispatch: Arc<DispatchTable>,
        decoder: Arc<D>,
        idle_deadline: Duration,
        commands: mpsc::UnboundedReceiver<SessionCommand>,
    ) -> Self {
        Self {
            user_id,
            handle,
            registry,
            dispatch,
            decoder,
            idle_deadline,
            commands,
        }
    }

    /// Run the session to completion. The socket is owned here; every
    /// exit path removes this session's registry entry (guarded by
    /// handle identity) before returning.
    pub async fn run(mut self, mut socket: WebSocket) {
        info!(
            user_id = %self.user_id,
            connection = %self.handle.id(),
            "session active"
        );
        let mut deadline = Instant::now() + self.idle_deadline;

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    warn!(user_id = %self.user_id, "idle deadline expired, aborting connection");
                    return self.abort();
                }

                command = self.commands.recv() => {
                    match command {
                        Some(SessionCommand::Send(text)) => {
                            if let Err(e) = socket.send(Message::Text(text.into())).await {
                                error!(user_id = %self.user_id, "send failed: {}", e);
                                return self.abort();
                            }
                        }
                        Some(SessionCommand::Close { code, reason }) => {
                            return self.finish(socket, code, reason.into()).await;
                        }
                        None => {
                            return self.finish(socket, CLOSE_NORMAL, Utf8Bytes::from_static("")).await;
                        }
                    }
                }

                inbound = socket.next() => {
                    match inbound {
                        None => {
                            debug!(user_id = %self.user_id, "peer went away without close frame");
                            return self.abort();
                        }
                        Some(Err(e)) => {
                            error!(user_id = %self.user_id, "receive error: {}", e);
                            return self.abort();
                        }
                        Some(Ok(message)) => {
                            deadline = Instant::now() + self.idle_deadline;
                            match message {
                                Message::Close(frame) => {
                                    // Closing: acknowledge with the peer's own code/reason.
                                    let (code, reason) = frame
                                        .map(|f| (f.code, f.reason))
                                        .unwrap_or((CLOSE_NORMAL, Utf8Bytes::from_static("")));
                                    return self.finish(socket, code, reason).await;
                                }
                                Message::Text(text) => {
                                    if let Err(e) = self.handle_text(&mut socket, text.as_str()).await {
                                        error!(user_id = %self.user_id, "session failed: {}", e);
                                        return self.abort();
                                    }
                                }
                                Message::Binary(data) => match std::str::from_utf8(&data) {
                                    Ok(text) => {
                                        let text = text.to_owned();
                                        if let Err(e) = self.handle_text(&mut socket, &text).await {
                                            error!(user_id = %self.user_id, "session failed: {}", e);
                                            return self.abort();
                                        }
                                    }
                                    Err(_) => {
                                        warn!(user_id = %self.user_id, "ignoring non-UTF-8 binary frame");
                                    }
                                },
                                Message::Ping(payload) => {
                                    let _ = socket.send(Message::Pong(payload)).await;
                                }
                                Message::Pong(_) => {}
                            }
                        }
                    }
                }
            }
        }
    }

    /// Sanitize, classify, and handle one inbound text payload.
    async fn handle_text(&self, socket: &mut WebSocket, text: &str) -> GatewayResult<()> {
        let clean = sanitize(text);

        if clean == HEARTBEAT_REQUEST {
            socket
                .send(Message::Text(HEARTBEAT_RESPONSE.into()))
                .await
                .map_err(|e| GatewayError::Transport(e.to_string()))?;
            return Ok(());
        }

        match self.decoder.decode(&clean) {
            Ok(tag) => {
                debug!(user_id = %self.user_id, tag, "dispatching message");
                self.dispatch.invoke(&tag, &self.user_id, &clean).await;
            }
            Err(e) => {
                // Malformed input is dropped; the connection stays open.
                warn!(
                    user_id = %self.user_id,
                    payload = %clean,
                    error = %e,
                    "dropping undecodable message"
                );
            }
        }
        Ok(())
    }

    /// Graceful close: send the close frame, then remove this session.
    async fn finish(self, mut socket: WebSocket, code: u16, reason: Utf8Bytes) {
        debug!(user_id = %self.user_id, code, reason = %reason, "closing session");
        let _ = socket
            .send(Message::Close(Some(CloseFrame { code, reason })))
            .await;
        self.registry.remove(&self.user_id, self.handle.id());
    }

    /// Abrupt teardown: no close handshake is attempted; dropping the
    /// socket tears the transport down.
    fn abort(self) {
        self.registry.remove(&self.user_id, self.handle.id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_control_chars_and_reserved_punctuation() {
        assert_eq!(sanitize("he%l?lo"), "hello");
        assert_eq!(sanitize("a\u{0}b\nc\rd\te"), "abcde");
        assert_eq!(sanitize("{\"action\":\"x\"}\u{1}"), "{\"action\":\"x\"}");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let once = sanitize("p%i?ng\u{7}");
        assert_eq!(sanitize(&once), once);
    }

    #[test]
    fn sanitize_keeps_non_ascii_text() {
        assert_eq!(sanitize("héllo wörld"), "héllo wörld");
    }

    #[test]
    fn sanitized_ping_matches_heartbeat_token() {
        assert_eq!(sanitize("p%ing?"), HEARTBEAT_REQUEST);
    }
}
