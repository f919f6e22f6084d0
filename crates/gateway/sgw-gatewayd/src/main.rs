//! Session gateway daemon
//!
//! Serves a JWT-authenticated WebSocket endpoint that keeps at most one
//! live connection per user, plus an admin API for inspecting and
//! disconnecting sessions.

use anyhow::Result;
use sgw_gatewayd::{Config, build, register_default_handlers, router};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_filter())),
        )
        .with_target(false)
        .init();

    let gateway = build(&config);
    register_default_handlers(&gateway);
    let app = router(gateway);

    let addr = config.socket_addr();
    info!("gateway listening on http://{}", addr);
    info!("websocket endpoint: ws://{}/ws", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
