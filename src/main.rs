//! wrd - the web remote display
//!
//! A multi-member remote display server: members share one controlled
//! surface, at most one holds exclusive control, and surface snapshots come
//! from an on-demand capture pipeline exposed over an HTTP/WebSocket API.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser as ClapParser;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wrd::{
    api,
    capture::{CaptureManager, CommandSourceFactory},
    clipboard::MemoryClipboard,
    config::Config,
    control::HostSlot,
    member::MemberRegistry,
    room::Room,
    shutdown::ShutdownCoordinator,
};

/// wrd - the web remote display
///
/// Serves one shared surface to many members over HTTP/WebSocket, with
/// host-gated control and on-demand surface snapshots.
#[derive(ClapParser, Debug)]
#[command(name = "wrd", version, about, long_about = None)]
struct Cli {
    /// Address to bind the HTTP/WebSocket API server (a configured
    /// [server].bind takes precedence)
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// Path to a TOML config file
    #[arg(long, env = "WRD_CONFIG")]
    config: Option<PathBuf>,

    /// Capture pipeline descriptor (overrides the configured one)
    #[arg(long, env = "WRD_PIPELINE")]
    pipeline: Option<String>,

    /// Disable the capture pipeline entirely
    #[arg(long)]
    disable_capture: bool,
}

#[derive(Error, Debug)]
enum WrdError {
    #[error(transparent)]
    Config(#[from] wrd::config::ConfigError),

    #[error("failed to provision member: {0}")]
    Seed(#[from] wrd::member::RegistryError),

    #[error("failed to bind {0}: {1}")]
    Bind(SocketAddr, #[source] std::io::Error),

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "wrd=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), WrdError> {
    tracing::info!("wrd server starting");

    let config = match &cli.config {
        Some(path) => Config::load(path)?.unwrap_or_else(|| {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
            Config::default()
        }),
        None => Config::default(),
    };

    let bind = config
        .server
        .as_ref()
        .and_then(|s| s.bind)
        .unwrap_or(cli.bind);
    let cors_origins = config
        .server
        .as_ref()
        .map(|s| s.cors_origins.clone())
        .unwrap_or_default();

    let mut capture_config = config.capture_config();
    if let Some(pipeline) = cli.pipeline {
        capture_config.pipeline = pipeline;
    }
    if cli.disable_capture {
        capture_config.enabled = false;
    }
    if capture_config.enabled && capture_config.pipeline.is_empty() {
        tracing::warn!("no capture pipeline configured; snapshot requests will fail");
    }

    let capture = CaptureManager::new(capture_config, Arc::new(CommandSourceFactory));

    let members = MemberRegistry::new();
    for seed in &config.members {
        let id = members.create(seed.id.clone(), seed.profile.clone())?;
        tracing::info!(member = %id, name = %seed.profile.name, "provisioned member");
    }

    let room = Room::new(
        members,
        HostSlot::new(),
        capture.clone(),
        Arc::new(MemoryClipboard::new()),
    );

    let shutdown = ShutdownCoordinator::new();
    let state = api::AppState {
        room,
        shutdown: shutdown.clone(),
    };
    let app = api::router(state, api::RouterConfig { cors_origins });

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| WrdError::Bind(bind, e))?;
    tracing::info!(addr = %bind, "HTTP/WS server listening");

    // Oneshot channel for server shutdown after Ctrl+C.
    let (server_shutdown_tx, server_shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let http_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                server_shutdown_rx.await.ok();
            })
            .await
    });

    tracing::info!("wrd server ready");

    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("received Ctrl+C");

    // Signal event streams to send close frames, then give them a moment to
    // drain before stopping the listener.
    shutdown.shutdown();
    shutdown.drain(Duration::from_secs(1)).await;

    let _ = server_shutdown_tx.send(());
    match http_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(WrdError::Serve(e)),
        Err(e) => tracing::warn!(?e, "HTTP server task panicked"),
    }

    // Tear down the capture pipeline last, once no handler can reach it.
    capture.shutdown().await;

    tracing::info!("wrd server exiting");
    Ok(())
}
