//! Session gateway daemon wiring
//!
//! Assembles a [`Gateway`] from daemon [`Config`], registers the built-in
//! protocol handlers, and exposes the HTTP surface: the WebSocket endpoint
//! plus a small admin API for listing and disconnecting sessions.

pub mod config;

pub use config::Config;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
};
use serde::{Deserialize, Serialize};
use sgw_gateway::{ConnectionRegistry, Gateway, GatewayError, JsonTagDecoder};
use sgw_identity_jwt::{JwtVerifier, JwtVerifierConfig};
use std::{sync::Arc, time::Duration};
use tower_http::cors::CorsLayer;
use tracing::info;

pub type AppGateway = Gateway<JwtVerifier, JsonTagDecoder>;

/// Build the gateway from daemon configuration.
pub fn build(config: &Config) -> AppGateway {
    let verifier = JwtVerifier::new(JwtVerifierConfig {
        secret: config.auth.jwt_secret.clone(),
        issuer: config.auth.issuer.clone(),
        audience: config.auth.audience.clone(),
        ..JwtVerifierConfig::default()
    });

    Gateway::builder()
        .verifier(Arc::new(verifier))
        .decoder(Arc::new(JsonTagDecoder::new(&config.session.tag_field)))
        .registry(Arc::new(ConnectionRegistry::new()))
        .dispatch(Arc::new(sgw_gateway::DispatchTable::new()))
        .idle_deadline(Duration::from_secs(config.session.idle_deadline_secs))
        .build()
}

#[derive(Debug, Deserialize)]
struct EchoRequest {
    #[serde(default)]
    body: String,
}

/// Register the built-in handlers.
///
/// `echo` sends the request body back to the sender's live session. It
/// doubles as a liveness probe for the dispatch path.
pub fn register_default_handlers(gateway: &AppGateway) {
    let registry = gateway.registry();
    gateway.dispatch().register("echo", move |user_id, raw| {
        let registry = registry.clone();
        async move {
            let request: EchoRequest =
                serde_json::from_str(&raw).map_err(|e| GatewayError::Handler(e.to_string()))?;
            if registry.send_to_user(&user_id, request.body) {
                Ok(())
            } else {
                Err(GatewayError::Handler(format!(
                    "no live session for {user_id}"
                )))
            }
        }
    });
}

/// Assemble the HTTP router: `/ws` for clients, `/sessions` and
/// `/health` for operators.
pub fn router(gateway: AppGateway) -> Router {
    let registry = gateway.registry();

    let ws_router = Router::new()
        .route(
            "/ws",
            get(sgw_gateway::gateway_handler::<JwtVerifier, JsonTagDecoder>),
        )
        .with_state(gateway);

    let admin_router = Router::new()
        .route("/sessions", get(list_sessions))
        .route("/sessions/{user_id}", delete(disconnect_session))
        .with_state(registry);

    let health_router = Router::new().route("/health", get(|| async { "OK" }));

    Router::new()
        .merge(ws_router)
        .merge(admin_router)
        .merge(health_router)
        .layer(CorsLayer::permissive())
}

/// `GET /sessions` response: the live user ids and their count.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionList {
    pub users: Vec<String>,
    pub count: usize,
}

async fn list_sessions(State(registry): State<Arc<ConnectionRegistry>>) -> Json<SessionList> {
    Json(SessionList {
        users: registry.user_ids(),
        count: registry.connection_count(),
    })
}

async fn disconnect_session(
    State(registry): State<Arc<ConnectionRegistry>>,
    Path(user_id): Path<String>,
) -> StatusCode {
    if registry.disconnect(&user_id) {
        info!(user_id = %user_id, "session disconnected by operator");
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
