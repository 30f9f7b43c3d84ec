//! Node id lookup command implementation

use anyhow::{bail, Result};
use clusterlog_ipc::IpcClient;

use crate::output::print_node_id;

pub async fn execute(client: &IpcClient, node_ip: &str) -> Result<()> {
    let node_id = client.ip_to_node_id(node_ip).await?;
    print_node_id(node_ip, node_id.as_deref());
    if node_id.is_none() {
        bail!("Unknown node ip {}", node_ip);
    }
    Ok(())
}
