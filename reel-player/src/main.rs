//! Reel Player (reel-player) - Main entry point
//!
//! Runs the playback orchestration engine behind an HTTP/SSE control
//! surface. The presentational client renders against the event stream.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use reel_common::config::{resolve_show_file, CONFIG_ENV_VAR};
use reel_player::api::{self, AppContext};
use reel_player::audio::EventOutput;
use reel_player::config::{ConfigOverrides, ShowConfig};
use reel_player::gate::PassphraseGate;
use reel_player::loader::HttpFetcher;
use reel_player::{SharedState, ShowEngine};

/// Command-line arguments for reel-player
#[derive(Parser, Debug)]
#[command(name = "reel-player")]
#[command(about = "Playback orchestration engine for scripted audiovisual shows")]
#[command(version)]
struct Args {
    /// Show file (TOML)
    #[arg(short, long, env = "REEL_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "REEL_PORT")]
    port: Option<u16>,

    /// Base URL for relative media and dataset references
    #[arg(long, env = "REEL_BASE_URL")]
    base_url: Option<String>,

    /// Log level or filter directive
    #[arg(long, env = "REEL_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let show_file = resolve_show_file(args.config.as_deref(), CONFIG_ENV_VAR);
    let loaded = ShowConfig::load(
        show_file.as_deref(),
        ConfigOverrides {
            port: args.port,
            base_url: args.base_url.clone(),
            log_level: args.log_level.clone(),
        },
    );

    // Tracing needs the configured level, so it starts after the show file
    // is read; load problems are reported once it is up.
    let level = match &loaded {
        Ok(config) => config.logging.level.clone(),
        Err(_) => args.log_level.clone().unwrap_or_else(|| "info".to_string()),
    };
    init_tracing(&level);

    let config = loaded.context("Failed to load show file")?;
    match &show_file {
        Some(path) if path.exists() => info!("Show file: {}", path.display()),
        _ => warn!("No show file found, running the built-in show"),
    }

    info!(
        "Starting Reel Player on port {} (media from {})",
        config.port, config.base_url
    );

    let shared = Arc::new(SharedState::new());
    let fetcher = Arc::new(
        HttpFetcher::new(&config.base_url).context("Failed to create HTTP fetcher")?,
    );
    let output = Box::new(EventOutput::new(Arc::clone(&shared)));

    let (engine, engine_task) = ShowEngine::spawn(&config, fetcher, output, Arc::clone(&shared));
    info!("Show engine initialized");

    let ctx = AppContext {
        state: shared,
        engine,
        gate: Arc::new(PassphraseGate::new(&config.passphrase)),
        dashboard: Arc::new(config.dashboard.clone()),
    };

    api::run(config.port, ctx, shutdown_signal())
        .await
        .context("Server error")?;

    // Dropping the last engine handle (owned by the router) stops the engine
    if let Err(e) = engine_task.await {
        warn!("Engine task ended abnormally: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Registry + EnvFilter + fmt layer; `RUST_LOG` wins over the configured level
fn init_tracing(level: &str) {
    let directive = if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!(
            "reel_player={lvl},reel_common={lvl},tower_http={lvl}",
            lvl = level
        )
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| directive.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
