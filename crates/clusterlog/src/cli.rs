//! CLI argument definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use clusterlog_core::{GetLogOptions, MediaType, DEFAULT_LIST_GLOB};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "clusterlog")]
#[command(version, about = "List, resolve and stream logs across cluster nodes")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output in JSON format instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Daemon socket path
    #[arg(long, env = "CLUSTERLOG_SOCKET", global = true)]
    pub socket: Option<PathBuf>,

    /// Do not start the daemon when it is not running
    #[arg(long, global = true)]
    pub no_start: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check daemon health
    Ping,

    /// Show registered nodes
    Nodes,

    /// List log files of a node, grouped by category
    List(ListArgs),

    /// Show which node and file a set of options refers to
    Resolve(TargetArgs),

    /// Print or follow a log
    Get(GetArgs),

    /// Look up the node id of an address
    IpToNode {
        /// Node ip address
        node_ip: String,
    },

    /// Mark a node alive or dead in the daemon's registry
    NodeState {
        /// Node id
        node_id: String,

        #[arg(value_enum)]
        state: NodeLiveness,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum NodeLiveness {
    Alive,
    Dead,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Node id
    #[arg(long, conflicts_with = "node_ip")]
    pub node_id: Option<String>,

    /// Node ip address
    #[arg(long)]
    pub node_ip: Option<String>,

    /// Only list files matching this glob
    #[arg(long, default_value = DEFAULT_LIST_GLOB)]
    pub glob: String,

    /// Listing timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Identifiers naming one log file
#[derive(Args, Debug, Default)]
pub struct TargetArgs {
    /// Node id
    #[arg(long)]
    pub node_id: Option<String>,

    /// Node ip address
    #[arg(long)]
    pub node_ip: Option<String>,

    /// Log file name on the node
    #[arg(long)]
    pub filename: Option<String>,

    /// Actor id
    #[arg(long)]
    pub actor_id: Option<String>,

    /// Task id
    #[arg(long)]
    pub task_id: Option<String>,

    /// Task attempt (defaults to 0)
    #[arg(long, requires = "task_id")]
    pub attempt_number: Option<u32>,

    /// Worker process id (needs --node-id or --node-ip)
    #[arg(long)]
    pub pid: Option<u32>,

    /// Job submission id
    #[arg(long)]
    pub submission_id: Option<String>,

    /// Worker log suffix: out or err
    #[arg(long)]
    pub suffix: Option<String>,
}

impl TargetArgs {
    pub fn options(&self) -> GetLogOptions {
        GetLogOptions {
            node_id: self.node_id.clone(),
            node_ip: self.node_ip.clone(),
            filename: self.filename.clone(),
            actor_id: self.actor_id.clone(),
            task_id: self.task_id.clone(),
            attempt_number: self.attempt_number,
            pid: self.pid,
            submission_id: self.submission_id.clone(),
            suffix: self.suffix.clone(),
            ..Default::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct GetArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Number of trailing lines to show
    #[arg(long)]
    pub lines: Option<usize>,

    /// Keep streaming appended content
    #[arg(short, long)]
    pub follow: bool,

    /// Polling interval in seconds while following
    #[arg(long, requires = "follow")]
    pub interval: Option<f64>,

    /// Timeout in seconds for bounded reads
    #[arg(long, conflicts_with = "follow")]
    pub timeout: Option<u64>,
}

impl GetArgs {
    pub fn options(&self) -> GetLogOptions {
        GetLogOptions {
            lines: self.lines,
            interval_secs: self.interval,
            timeout_secs: self.timeout,
            media_type: if self.follow {
                MediaType::Stream
            } else {
                MediaType::File
            },
            ..self.target.options()
        }
    }
}
