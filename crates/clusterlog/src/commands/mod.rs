//! Command implementations

pub mod get;
pub mod ip_to_node;
pub mod list;
pub mod node_state;
pub mod nodes;
pub mod ping;
pub mod resolve;

use clusterlog_core::constants;
use clusterlog_ipc::IpcClient;
use std::path::PathBuf;

/// Get the IPC client
pub fn get_client(socket: Option<PathBuf>, auto_start: bool) -> IpcClient {
    let client = IpcClient::new(socket.unwrap_or_else(constants::socket_path));
    if auto_start {
        client
    } else {
        client.without_auto_start()
    }
}
