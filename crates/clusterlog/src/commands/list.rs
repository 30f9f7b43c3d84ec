//! List command implementation

use anyhow::{bail, Result};
use clusterlog_ipc::IpcClient;
use std::time::Duration;

use crate::cli::ListArgs;
use crate::output::print_log_index;

pub async fn execute(client: &IpcClient, args: ListArgs) -> Result<()> {
    if args.node_id.is_none() && args.node_ip.is_none() {
        bail!("Provide --node-id or --node-ip");
    }

    let (node_id, index) = client
        .list_logs(
            args.node_id,
            args.node_ip,
            &args.glob,
            args.timeout.map(Duration::from_secs),
        )
        .await?;

    print_log_index(&node_id, &index);
    Ok(())
}
