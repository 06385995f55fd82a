use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use doccoord_server::config::Config;
use doccoord_server::state::AppState;
use doccoord_server::{build_engine, build_router};

/// HTTP/WebSocket server exposing the document coordination engine.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to a TOML config file. Defaults to the platform config
    /// directory's `doccoord-server/config.toml`.
    #[arg(long, env = "DOCCOORD_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    install_tracing_subscriber();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref());
    let engine = build_engine(&config);

    let reaper = engine.reaper.clone();
    let cleanup_interval = config.room_cleanup_interval();
    tokio::spawn(async move {
        reaper.run(cleanup_interval).await;
    });

    let state = AppState { engine, config: Arc::new(config.clone()) };
    let app = build_router(state);

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "doccoord-server listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(err) => tracing::error!(%err, "failed to listen for shutdown signal"),
    }
}

fn install_tracing_subscriber() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
