//! Ping command implementation

use anyhow::{bail, Result};
use clusterlog_ipc::IpcClient;

use crate::output::{print_error, print_success};

pub async fn execute(client: &IpcClient) -> Result<()> {
    match client.ping().await {
        Ok(true) => {
            print_success("Daemon is alive");
            Ok(())
        }
        Ok(false) => {
            print_error("Daemon is not running");
            bail!("Daemon not running")
        }
        Err(e) => {
            print_error(&format!("Daemon is not reachable: {}", e));
            bail!(e)
        }
    }
}
