//! Gateway tail
//!
//! Connects a single session and logs every dispatch it receives.
//!
//! Run with:
//! ```bash
//! GATEWAY_URL=wss://gateway.example GATEWAY_TOKEN=... cargo run -p chat-sdk-gateway
//! ```
//!
//! Configuration is loaded from environment variables.

use chat_sdk_common::{try_init_tracing, ClientConfig};
use chat_sdk_gateway::{Channel, Event, GatewaySession};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    if let Err(e) = try_init_tracing() {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run().await {
        error!(error = %e, "Gateway tail failed");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = ClientConfig::from_env().map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    info!(
        env = ?config.app.env,
        url = %config.gateway.url,
        "Configuration loaded"
    );

    let session = GatewaySession::websocket(config.gateway);

    session.on(Channel::Raw, |event| {
        if let Some(dispatch) = event.as_dispatch() {
            info!(event = %dispatch.name, seq = ?dispatch.sequence, "Dispatch");
        }
    });
    session.on(Channel::Close, |event| {
        if let Some(close) = event.as_close() {
            warn!(code = close.code, reason = %close.reason, "Connection closed");
        }
    });
    session.on(Channel::Error, |event| {
        if let Event::Error(e) = event {
            warn!(error = %e, "Transport error");
        }
    });

    session.connect().await?;
    info!(status = ?session.status(), "Connected, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    session.destroy();
    session.closed().await;

    Ok(())
}
