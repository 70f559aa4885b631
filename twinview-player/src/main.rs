//! Twinview paired player (twinview-player) - Demo entry point
//!
//! Drives a simulated engine pair whose secondary clock runs with a
//! configurable skew, so the sync loop's corrections can be watched in the
//! log. Prints the sync statistics as JSON on exit.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

use twinview_player::config::{Config, ConfigOverrides};
use twinview_player::playback::{LoadOptions, MediaSource, PairedPlayer, SimulatedPair};

/// Command-line arguments for twinview-player
#[derive(Parser, Debug)]
#[command(name = "twinview-player")]
#[command(about = "Paired video player sync demo")]
#[command(version)]
struct Args {
    /// Configuration file (overrides TWINVIEW_CONFIG and the platform default)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Source locator to load
    #[arg(long, default_value = "demo.mp4")]
    source: String,

    /// Simulated media duration (milliseconds)
    #[arg(long, default_value = "60000")]
    duration_ms: u64,

    /// Secondary clock speed relative to the primary
    #[arg(long, default_value = "0.97")]
    secondary_skew: f64,

    /// Loop the source on both engines
    #[arg(long)]
    looping: bool,

    /// Stop after this many seconds (Ctrl+C stops earlier)
    #[arg(long, default_value = "30")]
    run_secs: u64,

    /// Override sync.poll_interval_ms
    #[arg(long, env = "TWINVIEW_POLL_INTERVAL_MS")]
    poll_interval_ms: Option<u64>,

    /// Override logging.level
    #[arg(long, env = "TWINVIEW_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing before anything logs; RUST_LOG wins over every
    // other level source
    let from_env = std::env::var_os("RUST_LOG").is_some();
    let initial_level = args.log_level.clone().unwrap_or_else(|| "info".to_string());
    let (filter, filter_handle) = reload::Layer::new(level_filter(&initial_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting twinview-player v{}", env!("CARGO_PKG_VERSION"));

    let overrides = ConfigOverrides {
        poll_interval_ms: args.poll_interval_ms,
        log_level: args.log_level.clone(),
    };
    let config = Config::load(args.config.as_deref(), overrides)
        .await
        .context("Failed to load configuration")?;

    // The file may set a level the command line did not
    if !from_env && config.logging.level != initial_level {
        filter_handle
            .reload(level_filter(&config.logging.level))
            .context("Failed to apply configured log level")?;
    }

    info!(
        "Sync: poll every {}ms, in sync within {}ms, reposition beyond {}ms",
        config.sync.poll_interval_ms, config.sync.max_in_sync_ms, config.sync.extreme_out_of_sync_ms
    );
    info!(
        "Simulated media: {}ms, secondary skew {}",
        args.duration_ms, args.secondary_skew
    );

    let pair = Arc::new(SimulatedPair::with_secondary_skew(
        args.duration_ms,
        args.secondary_skew,
    ));
    let auto_play = config.player.auto_play_on_load;
    let player = PairedPlayer::new(pair, config).context("Failed to create player")?;

    let event_logger = tokio::spawn(log_events(player.subscribe()));

    let options = LoadOptions::default().looping(args.looping);
    player
        .load(MediaSource::new(args.source), options)
        .await
        .context("Failed to load source")?;
    if !auto_play {
        player.play().await.context("Failed to start playback")?;
    }

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(args.run_secs)) => {
            info!("Run time elapsed, stopping");
        }
        _ = shutdown_signal() => {}
    }

    player.pause().await.context("Failed to pause")?;
    let stats = player.stats();
    player.unload().await.context("Failed to unload")?;

    println!("{}", serde_json::to_string_pretty(&stats)?);

    event_logger.abort();
    info!("Shutdown complete");
    Ok(())
}

/// `RUST_LOG` if set, otherwise `level` for the twinview crates
fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("twinview_player={level},twinview_common={level}").into())
}

/// Log every player event as one JSON line
async fn log_events(mut events: tokio::sync::broadcast::Receiver<twinview_common::PlayerEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => info!("event: {}", json),
                Err(e) => warn!("Failed to serialize {} event: {}", event.event_type(), e),
            },
            Err(RecvError::Lagged(skipped)) => {
                warn!("Event logger lagged, {} events dropped", skipped);
            }
            Err(RecvError::Closed) => {
                debug!("Event stream closed");
                break;
            }
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
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
