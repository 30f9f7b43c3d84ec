//! clusterlog Daemon - serves cluster logs to the CLI

use anyhow::{Context, Result};
use clap::Parser;
use clusterlog_core::{constants, ClusterConfig};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod daemon;
mod handlers;

use daemon::Daemon;

#[derive(Parser, Debug)]
#[command(name = "clusterlogd")]
#[command(about = "Serve cluster log listing and streaming over a Unix socket")]
#[command(version)]
struct Args {
    /// Cluster config file (defaults to ./clusterlog.toml, then ~/.clusterlog/)
    #[arg(short, long, env = "CLUSTERLOG_CONFIG")]
    config: Option<PathBuf>,

    /// Socket path to listen on
    #[arg(long, env = "CLUSTERLOG_SOCKET")]
    socket: Option<PathBuf>,
}

fn load_config(explicit: Option<PathBuf>) -> Result<ClusterConfig> {
    let path = match explicit {
        Some(path) => Some(path),
        None => ClusterConfig::find(&std::env::current_dir()?),
    };

    match path {
        Some(path) => {
            let config = ClusterConfig::load(&path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            info!("Loaded cluster config from {}", path.display());
            Ok(config)
        }
        None => {
            warn!("No cluster config found, serving an empty cluster");
            Ok(ClusterConfig::default())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clusterlogd=info,clusterlog_logs=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("clusterlog daemon starting...");

    let args = Args::parse();

    let home = constants::clusterlog_home();
    if !home.exists() {
        std::fs::create_dir_all(&home)?;
        info!("Created clusterlog home directory: {}", home.display());
    }

    let config = load_config(args.config)?;

    let socket_path = args.socket.unwrap_or_else(constants::socket_path);
    if socket_path.exists() {
        // A live daemon answers; a stale socket does not
        match tokio::net::UnixStream::connect(&socket_path).await {
            Ok(_) => {
                error!("Daemon is already running");
                std::process::exit(1);
            }
            Err(_) => {
                info!("Removing stale socket file");
                std::fs::remove_file(&socket_path)?;
            }
        }
    }

    let daemon = Daemon::new(&config, &socket_path).await?;

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;

    tokio::select! {
        result = daemon.run() => {
            if let Err(e) = result {
                error!("Daemon error: {}", e);
                return Err(e.into());
            }
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down...");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down...");
        }
    }

    info!("Daemon shutdown complete");
    Ok(())
}
