//! Resolve command implementation

use anyhow::Result;
use clusterlog_ipc::IpcClient;

use crate::cli::TargetArgs;
use crate::output::print_resolved;

pub async fn execute(client: &IpcClient, args: TargetArgs) -> Result<()> {
    let log = client.resolve(args.options()).await?;
    print_resolved(&log);
    Ok(())
}
