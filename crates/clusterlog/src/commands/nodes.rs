//! Nodes command implementation

use anyhow::Result;
use clusterlog_ipc::IpcClient;

use crate::output::print_nodes;

pub async fn execute(client: &IpcClient) -> Result<()> {
    let nodes = client.nodes().await?;
    print_nodes(&nodes);
    Ok(())
}
