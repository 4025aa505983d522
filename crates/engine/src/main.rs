//! Storyforge Engine binary — boots the websocket/HTTP server.
//!
//! Grounded on the teacher's `main.rs` boot sequence: `dotenvy` then
//! `tracing_subscriber` with an `EnvFilter`, load `AppConfig`, build
//! `AppState`, serve with `axum::serve` under a `tokio::select!` against
//! `ctrl_c` for graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use storyforge_engine::adapters::{UnconfiguredImage, UnconfiguredLlm, UnconfiguredMusic, UnconfiguredTts};
use storyforge_engine::config::AppConfig;
use storyforge_engine::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storyforge_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("starting storyforge engine");

    let config = AppConfig::from_env()?;
    tracing::info!(port = config.server_port, data_dir = %config.data_dir, "configuration loaded");

    let state = Arc::new(AppState::new(
        config,
        Arc::new(UnconfiguredLlm),
        Arc::new(UnconfiguredTts),
        Arc::new(UnconfiguredImage),
        Arc::new(UnconfiguredMusic),
    ));

    let app = storyforge_engine::http::router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.server_port));
    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            if let Err(err) = result {
                tracing::error!(%err, "server error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    Ok(())
}
