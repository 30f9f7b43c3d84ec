//! clusterlog CLI - list, resolve and stream logs across cluster nodes

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod output;

use cli::{Cli, Commands};
use commands::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    output::set_json_mode(cli.json);

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // Diagnostics go to stderr so streamed log content stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("clusterlog={0},clusterlog_ipc={0}", log_level).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    let client = get_client(cli.socket, !cli.no_start);

    let result = match cli.command {
        Commands::Ping => ping::execute(&client).await,
        Commands::Nodes => nodes::execute(&client).await,
        Commands::List(args) => list::execute(&client, args).await,
        Commands::Resolve(args) => resolve::execute(&client, args).await,
        Commands::Get(args) => get::execute(&client, args).await,
        Commands::IpToNode { node_ip } => ip_to_node::execute(&client, &node_ip).await,
        Commands::NodeState { node_id, state } => {
            node_state::execute(&client, &node_id, state).await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
