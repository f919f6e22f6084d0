//! Gateway composition: handshake and session wiring

use crate::connection::{CLOSE_POLICY, ConnectionHandle, ConnectionId, REASON_UNAUTHORIZED};
use crate::decode::MessageDecoder;
use crate::dispatch::DispatchTable;
use crate::error::GatewayResult;
use crate::registry::ConnectionRegistry;
use crate::session::{DEFAULT_IDLE_DEADLINE, SessionLoop};
use crate::upgrade::GatewayUpgrade;
use axum::{
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade as AxumWebSocketUpgrade},
    },
    http::HeaderMap,
    response::Response,
};
use bon::Builder;
use sgw_auth_core::{IdentityVerifier, VerifiedUser, VerifyError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// The composition root: holds the identity verifier, message decoder,
/// connection registry, and dispatch table, all constructed once at
/// startup and shared by every session.
#[derive(Builder)]
pub struct Gateway<V, D> {
    verifier: Arc<V>,
    decoder: Arc<D>,
    registry: Arc<ConnectionRegistry>,
    dispatch: Arc<DispatchTable>,
    #[builder(default = DEFAULT_IDLE_DEADLINE)]
    idle_deadline: Duration,
}

impl<V, D> Clone for Gateway<V, D> {
    fn clone(&self) -> Self {
        Self {
            verifier: self.verifier.clone(),
            decoder: self.decoder.clone(),
            registry: self.registry.clone(),
            dispatch: self.dispatch.clone(),
            idle_deadline: self.idle_deadline,
        }
    }
}

impl<V, D> Gateway<V, D>
where
    V: IdentityVerifier,
    D: MessageDecoder,
{
    /// Get the connection registry
    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        self.registry.clone()
    }

    /// Get the dispatch table
    pub fn dispatch(&self) -> Arc<DispatchTable> {
        self.dispatch.clone()
    }

    /// Get the configured idle deadline
    pub fn idle_deadline(&self) -> Duration {
        self.idle_deadline
    }

    /// Accept a WebSocket upgrade and hand the socket to a session
    /// task. The credential is captured from the request headers
    /// before the upgrade completes.
    pub fn handle_upgrade(&self, upgrade: AxumWebSocketUpgrade, headers: HeaderMap) -> Response {
        let upgrade = GatewayUpgrade::new(upgrade, headers);
        let credential = upgrade.credential();
        let gateway = self.clone();

        upgrade.on_upgrade(move |socket| {
            Box::pin(async move {
                gateway.run_session(socket, credential).await;
            })
        })
    }

    async fn authenticate(&self, credential: Option<String>) -> GatewayResult<VerifiedUser> {
        let credential = credential.ok_or(VerifyError::CredentialRequired)?;
        Ok(self.verifier.verify(credential).await?)
    }

    /// Handshaking: resolve the credential to a user, admit the
    /// connection (evicting any prior session), then run the session
    /// loop until it terminates.
    async fn run_session(&self, mut socket: WebSocket, credential: Option<String>) {
        let user = match self.authenticate(credential).await {
            Ok(user) => user,
            Err(e) => {
                warn!("websocket handshake rejected: {}", e);
                let _ = socket
                    .send(Message::Close(Some(CloseFrame {
                        code: CLOSE_POLICY,
                        reason: REASON_UNAUTHORIZED.into(),
                    })))
                    .await;
                return;
            }
        };
        info!(user_id = %user.user_id, "websocket session authenticated");

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let handle = ConnectionHandle::new(ConnectionId::new(), commands_tx);
        self.registry.admit(&user.user_id, handle.clone());

        SessionLoop::new(
            user.user_id,
            handle,
            self.registry.clone(),
            self.dispatch.clone(),
            self.decoder.clone(),
            self.idle_deadline,
            commands_rx,
        )
        .run(socket)
        .await;
    }
}

/// Axum handler for the upgrade endpoint. Non-upgrade requests are
/// rejected by the extractor with a bad-request response.
pub async fn gateway_handler<V, D>(
    ws: AxumWebSocketUpgrade,
    headers: HeaderMap,
    State(gateway): State<Gateway<V, D>>,
) -> Response
where
    V: IdentityVerifier,
    D: MessageDecoder,
{
    gateway.handle_upgrade(ws, headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::JsonTagDecoder;
    use sgw_auth_core::VerifyFuture;

    struct StaticVerifier;

    impl IdentityVerifier for StaticVerifier {
        fn verify(&self, credential: String) -> VerifyFuture<'_> {
            Box::pin(async move {
                match credential.strip_prefix("token-") {
                    Some(user) => Ok(VerifiedUser::new(user)),
                    None => Err(VerifyError::InvalidCredential),
                }
            })
        }
    }

    fn gateway() -> Gateway<StaticVerifier, JsonTagDecoder> {
        Gateway::builder()
            .verifier(Arc::new(StaticVerifier))
            .decoder(Arc::new(JsonTagDecoder::default()))
            .registry(Arc::new(ConnectionRegistry::new()))
            .dispatch(Arc::new(DispatchTable::new()))
            .build()
    }

    #[tokio::test]
    async fn authenticate_requires_a_credential() {
        let gateway = gateway();
        assert!(gateway.authenticate(None).await.is_err());
        assert!(
            gateway
                .authenticate(Some("garbage".to_string()))
                .await
                .is_err()
        );

        let user = gateway
            .authenticate(Some("token-alice".to_string()))
            .await
            .unwrap();
        assert_eq!(user.user_id, "alice");
    }

    #[test]
    fn builder_defaults_the_idle_deadline() {
        let gateway = gateway();
        assert_eq!(gateway.idle_deadline(), DEFAULT_IDLE_DEADLINE);
        assert_eq!(gateway.registry().connection_count(), 0);
    }
}
