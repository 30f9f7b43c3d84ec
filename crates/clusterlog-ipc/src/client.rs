//! IPC Client - Unix socket client for CLI

use clusterlog_core::{Error, GetLogOptions, LogCategoryIndex, NodeInfo, ResolvedLog, Result};
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::{debug, info, warn};

use crate::protocol::{Request, Response};

const DAEMON_BINARY: &str = "clusterlogd";

/// IPC Client for CLI communication with daemon
pub struct IpcClient {
    socket_path: PathBuf,
    auto_start: bool,
}

impl IpcClient {
    /// Create a new IPC client
    pub fn new(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            auto_start: true,
        }
    }

    /// Fail instead of launching the daemon when it is not running
    pub fn without_auto_start(mut self) -> Self {
        self.auto_start = false;
        self
    }

    /// Connect to daemon (without auto-start)
    pub async fn connect(&self) -> Result<UnixStream> {
        if !self.socket_path.exists() {
            return Err(Error::DaemonNotRunning);
        }

        UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::ConnectionRefused => {
                    Error::DaemonNotRunning
                }
                _ => Error::IpcConnectionFailed(e.to_string()),
            })
    }

    /// Connect to daemon, starting it if necessary
    pub async fn connect_or_start(&self) -> Result<UnixStream> {
        match self.connect().await {
            Ok(stream) => Ok(stream),
            Err(Error::DaemonNotRunning) if self.auto_start => {
                info!("Daemon not running, starting...");
                self.start_daemon()?;

                // Up to 5 seconds
                for i in 0..50 {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    if let Ok(stream) = self.connect().await {
                        info!("Connected to daemon after {}ms", (i + 1) * 100);
                        return Ok(stream);
                    }
                }

                Err(Error::ipc("Daemon failed to start within timeout"))
            }
            Err(e) => Err(e),
        }
    }

    fn start_daemon(&self) -> Result<()> {
        // Prefer the daemon installed next to the CLI
        let exe = std::env::current_exe()?;
        let exe_dir = exe
            .parent()
            .ok_or_else(|| Error::ipc("Cannot determine executable directory"))?;

        let daemon_path = exe_dir.join(DAEMON_BINARY);
        let daemon_exe = if daemon_path.exists() {
            daemon_path
        } else {
            warn!(
                "{} not found at {}, trying PATH",
                DAEMON_BINARY,
                daemon_path.display()
            );
            PathBuf::from(DAEMON_BINARY)
        };

        info!("Starting daemon: {}", daemon_exe.display());

        Command::new(&daemon_exe)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| Error::ipc(format!("Failed to start daemon: {}", e)))?;

        Ok(())
    }

    async fn open(&self, request: &Request) -> Result<BufReader<UnixStream>> {
        let mut stream = self.connect_or_start().await?;

        let mut json = serde_json::to_string(request)?;
        json.push('\n');

        stream
            .write_all(json.as_bytes())
            .await
            .map_err(|e| Error::ipc(format!("Write error: {}", e)))?;

        stream
            .flush()
            .await
            .map_err(|e| Error::ipc(format!("Flush error: {}", e)))?;

        debug!("Sent request: {:?}", request);
        Ok(BufReader::new(stream))
    }

    /// Send a request and receive response
    pub async fn send(&self, request: &Request) -> Result<Response> {
        let mut reader = self.open(request).await?;
        let mut line = String::new();

        let read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| Error::ipc(format!("Read error: {}", e)))?;
        if read == 0 {
            return Err(Error::ipc("Daemon closed the connection without a response"));
        }

        let response: Response = serde_json::from_str(line.trim())
            .map_err(|e| Error::ipc(format!("Invalid response: {}", e)))?;

        debug!("Received response: {:?}", response);
        Ok(response)
    }

    /// Send a request and receive a stream of responses. The connection is
    /// closed as soon as the callback returns false.
    pub async fn send_streaming<F>(&self, request: &Request, mut on_response: F) -> Result<()>
    where
        F: FnMut(Response) -> bool,
    {
        let mut reader = self.open(request).await?;

        loop {
            let mut line = String::new();
            let read = reader
                .read_line(&mut line)
                .await
                .map_err(|e| Error::ipc(format!("Read error: {}", e)))?;
            if read == 0 {
                break;
            }
            let response: Response = serde_json::from_str(line.trim())
                .map_err(|e| Error::ipc(format!("Invalid response: {}", e)))?;
            if !on_response(response) {
                break;
            }
        }

        Ok(())
    }

    /// Ping the daemon
    pub async fn ping(&self) -> Result<bool> {
        match self.send(&Request::Ping).await {
            Ok(Response::Pong) => Ok(true),
            Ok(_) => Ok(false),
            Err(Error::DaemonNotRunning) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Nodes known to the daemon
    pub async fn nodes(&self) -> Result<Vec<NodeInfo>> {
        match self.send(&Request::Nodes).await?.into_result()? {
            Response::Nodes { nodes } => Ok(nodes),
            other => Err(unexpected(&other)),
        }
    }

    /// Categorized log files of a node, addressed by id or ip
    pub async fn list_logs(
        &self,
        node_id: Option<String>,
        node_ip: Option<String>,
        glob: &str,
        timeout: Option<Duration>,
    ) -> Result<(String, LogCategoryIndex)> {
        let request = Request::ListLogs {
            node_id,
            node_ip,
            glob: glob.to_string(),
            timeout_secs: timeout.map(|t| t.as_secs()),
        };
        match self.send(&request).await?.into_result()? {
            Response::Logs { node_id, index } => Ok((node_id, index)),
            other => Err(unexpected(&other)),
        }
    }

    /// Resolve options to the node and file they name
    pub async fn resolve(&self, options: GetLogOptions) -> Result<ResolvedLog> {
        match self
            .send(&Request::ResolveFilename { options })
            .await?
            .into_result()?
        {
            Response::Resolved { log } => Ok(log),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn ip_to_node_id(&self, node_ip: &str) -> Result<Option<String>> {
        let request = Request::IpToNodeId {
            node_ip: node_ip.to_string(),
        };
        match self.send(&request).await?.into_result()? {
            Response::NodeId { node_id } => Ok(node_id),
            other => Err(unexpected(&other)),
        }
    }

    /// Mark a node alive or dead in the daemon's registry
    pub async fn set_node_alive(&self, node_id: &str, alive: bool) -> Result<bool> {
        let request = Request::SetNodeAlive {
            node_id: node_id.to_string(),
            alive,
        };
        match self.send(&request).await?.into_result()? {
            Response::NodeState { alive, .. } => Ok(alive),
            other => Err(unexpected(&other)),
        }
    }

    /// Stream a log, handing each chunk to `on_chunk` until the stream
    /// ends, fails, or the callback returns false.
    pub async fn stream_logs<F>(&self, options: GetLogOptions, mut on_chunk: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> bool,
    {
        let mut failure = None;
        let mut finished = false;

        self.send_streaming(&Request::StreamLogs { options }, |response| {
            match response.into_result() {
                Ok(Response::LogChunk { data }) => {
                    if on_chunk(&data) {
                        return true;
                    }
                    finished = true;
                    false
                }
                Ok(Response::StreamEnd) => {
                    finished = true;
                    false
                }
                Ok(other) => {
                    failure = Some(unexpected(&other));
                    false
                }
                Err(e) => {
                    failure = Some(e);
                    false
                }
            }
        })
        .await?;

        if let Some(e) = failure {
            return Err(e);
        }
        if !finished {
            return Err(Error::ipc("Daemon closed the stream before it ended"));
        }
        Ok(())
    }
}

fn unexpected(response: &Response) -> Error {
    Error::ipc(format!("Unexpected response: {:?}", response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::IpcServer;
    use bytes::Bytes;
    use futures::stream;
    use tempfile::tempdir;

    #[test]
    fn test_client_creation() {
        let client = IpcClient::new(PathBuf::from("/tmp/test.sock"));
        assert_eq!(client.socket_path, PathBuf::from("/tmp/test.sock"));
        assert!(client.auto_start);
        assert!(!client.without_auto_start().auto_start);
    }

    #[tokio::test]
    async fn test_connect_no_daemon() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("nonexistent.sock");

        let client = IpcClient::new(socket_path);
        let result = client.connect().await;

        assert!(matches!(result, Err(Error::DaemonNotRunning)));
    }

    #[tokio::test]
    async fn test_ping_without_daemon() {
        let dir = tempdir().unwrap();
        let client = IpcClient::new(dir.path().join("missing.sock")).without_auto_start();
        assert!(!client.ping().await.unwrap());
    }

    #[tokio::test]
    async fn test_error_frame_becomes_error() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");
        let server = IpcServer::bind(&socket_path).await.unwrap();

        tokio::spawn(async move {
            let mut conn = server.accept().await.unwrap();
            let _ = conn.read_request().await.unwrap();
            conn.send_response(&Response::error(&Error::node_unavailable("node-9 is gone")))
                .await
                .unwrap();
            // Keep the socket file until the client is done
            let _ = conn.read_request().await;
            drop(server);
        });

        let client = IpcClient::new(socket_path).without_auto_start();
        let err = client.ip_to_node_id("10.0.0.9").await.unwrap_err();
        assert!(matches!(err, Error::NodeUnavailable(ref m) if m == "node-9 is gone"));
    }

    #[tokio::test]
    async fn test_stream_logs_collects_chunks() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");
        let server = IpcServer::bind(&socket_path).await.unwrap();

        tokio::spawn(async move {
            let mut conn = server.accept().await.unwrap();
            let request = conn.read_request().await.unwrap();
            assert!(matches!(request, Some(Request::StreamLogs { .. })));
            let source = stream::iter(vec![Ok(Bytes::from("one\n")), Ok(Bytes::from("two\n"))]);
            conn.forward_stream(source).await.unwrap();
            drop(server);
        });

        let client = IpcClient::new(socket_path).without_auto_start();
        let mut received = Vec::new();
        client
            .stream_logs(GetLogOptions::default(), |chunk| {
                received.extend_from_slice(chunk);
                true
            })
            .await
            .unwrap();
        assert_eq!(received, b"one\ntwo\n");
    }

    #[tokio::test]
    async fn test_stream_logs_surfaces_mid_stream_error() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");
        let server = IpcServer::bind(&socket_path).await.unwrap();

        tokio::spawn(async move {
            let mut conn = server.accept().await.unwrap();
            let _ = conn.read_request().await.unwrap();
            let source = stream::iter(vec![
                Ok(Bytes::from("partial\n")),
                Err(Error::timeout("Timed out streaming worker.out")),
            ]);
            conn.forward_stream(source).await.unwrap();
            drop(server);
        });

        let client = IpcClient::new(socket_path).without_auto_start();
        let mut received = Vec::new();
        let err = client
            .stream_logs(GetLogOptions::default(), |chunk| {
                received.extend_from_slice(chunk);
                true
            })
            .await
            .unwrap_err();
        assert_eq!(received, b"partial\n");
        assert!(matches!(err, Error::RemoteTimeout(_)));
    }
}
