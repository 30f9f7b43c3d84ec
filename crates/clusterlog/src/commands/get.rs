//! Get command implementation

use anyhow::Result;
use clusterlog_ipc::IpcClient;
use tracing::debug;

use crate::cli::GetArgs;
use crate::output::write_chunk;

pub async fn execute(client: &IpcClient, args: GetArgs) -> Result<()> {
    let options = args.options();
    debug!("Requesting log with {:?}", options);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut written = 0usize;

    client
        .stream_logs(options, |chunk| {
            written += chunk.len();
            // Stop once stdout is closed, e.g. piped into `head`
            write_chunk(&mut out, chunk)
        })
        .await?;

    debug!("Wrote {} bytes", written);
    Ok(())
}
