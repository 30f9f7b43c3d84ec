//! Node liveness command implementation

use anyhow::Result;
use clusterlog_ipc::IpcClient;

use crate::cli::NodeLiveness;
use crate::output::print_node_state;

pub async fn execute(client: &IpcClient, node_id: &str, state: NodeLiveness) -> Result<()> {
    let alive = client
        .set_node_alive(node_id, state == NodeLiveness::Alive)
        .await?;
    print_node_state(node_id, alive);
    Ok(())
}
