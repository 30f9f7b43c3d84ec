//! IPC Server - Unix socket server for daemon

use bytes::Bytes;
use clusterlog_core::{Error, Result};
use futures::{Stream, StreamExt};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info};

/// Maximum IPC message size (10MB) to prevent memory exhaustion attacks
const MAX_MESSAGE_SIZE: u64 = 10 * 1024 * 1024;

use crate::protocol::{Request, Response};

/// IPC Server for daemon
pub struct IpcServer {
    socket_path: PathBuf,
    listener: UnixListener,
}

impl IpcServer {
    /// Bind to a Unix socket
    pub async fn bind(socket_path: &Path) -> Result<Self> {
        // Remove stale socket if exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path)?;
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(socket_path)
            .map_err(|e| Error::IpcError(format!("Failed to bind socket: {}", e)))?;

        // Owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| Error::IpcError(format!("Failed to set socket permissions: {}", e)))?;
        }

        info!("IPC server listening on {}", socket_path.display());

        Ok(Self {
            socket_path: socket_path.to_path_buf(),
            listener,
        })
    }

    /// Accept a new connection
    pub async fn accept(&self) -> Result<IpcConnection> {
        let (stream, _) = self
            .listener
            .accept()
            .await
            .map_err(|e| Error::IpcError(format!("Accept failed: {}", e)))?;

        debug!("Accepted IPC connection");
        Ok(IpcConnection::new(stream))
    }

    /// Get the socket path
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                error!("Failed to remove socket file: {}", e);
            }
        }
    }
}

/// How a forwarded stream finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The source ended and `StreamEnd` was sent
    Completed,
    /// The source failed and the error frame was sent
    Failed,
    /// The client hung up first
    ClientGone,
}

/// Single IPC connection
pub struct IpcConnection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl IpcConnection {
    pub fn new(stream: UnixStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        }
    }

    /// Read a request from the connection
    pub async fn read_request(&mut self) -> Result<Option<Request>> {
        // Limit read size to prevent memory exhaustion attacks
        let mut limited_reader = (&mut self.reader).take(MAX_MESSAGE_SIZE);
        let mut line = String::new();

        match limited_reader.read_line(&mut line).await {
            Ok(0) => Ok(None), // Connection closed
            Ok(_) => {
                let request: Request = serde_json::from_str(line.trim())
                    .map_err(|e| Error::IpcError(format!("Invalid request: {}", e)))?;
                debug!("Received request: {:?}", request);
                Ok(Some(request))
            }
            Err(e) => Err(Error::IpcError(format!("Read error: {}", e))),
        }
    }

    /// Send a response
    pub async fn send_response(&mut self, response: &Response) -> Result<()> {
        write_response(&mut self.writer, response).await
    }

    /// Forward a log stream as chunk frames until it ends, fails, or the
    /// client disconnects. The source is dropped on return in every case.
    pub async fn forward_stream<S>(&mut self, mut source: S) -> Result<StreamOutcome>
    where
        S: Stream<Item = Result<Bytes>> + Unpin,
    {
        loop {
            tokio::select! {
                item = source.next() => match item {
                    Some(Ok(chunk)) => {
                        let frame = Response::LogChunk { data: chunk.to_vec() };
                        if write_response(&mut self.writer, &frame).await.is_err() {
                            return Ok(StreamOutcome::ClientGone);
                        }
                    }
                    Some(Err(e)) => {
                        write_response(&mut self.writer, &Response::error(&e)).await?;
                        return Ok(StreamOutcome::Failed);
                    }
                    None => {
                        write_response(&mut self.writer, &Response::StreamEnd).await?;
                        return Ok(StreamOutcome::Completed);
                    }
                },
                _ = wait_closed(&mut self.reader) => {
                    debug!("Client closed the connection mid-stream");
                    return Ok(StreamOutcome::ClientGone);
                }
            }
        }
    }
}

async fn write_response(writer: &mut OwnedWriteHalf, response: &Response) -> Result<()> {
    let mut json = serde_json::to_string(response)?;
    json.push('\n');

    writer
        .write_all(json.as_bytes())
        .await
        .map_err(|e| Error::IpcError(format!("Write error: {}", e)))?;

    writer
        .flush()
        .await
        .map_err(|e| Error::IpcError(format!("Flush error: {}", e)))?;

    Ok(())
}

/// Resolve once the peer has closed its side
async fn wait_closed(reader: &mut BufReader<OwnedReadHalf>) {
    let mut buf = [0u8; 256];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(_) => continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_server_bind() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");

        let server = IpcServer::bind(&socket_path).await.unwrap();
        assert!(socket_path.exists());

        drop(server);
        assert!(!socket_path.exists());
    }

    #[tokio::test]
    async fn test_forward_stream_frames() {
        let (client, server) = UnixStream::pair().unwrap();
        let mut conn = IpcConnection::new(server);

        let source = stream::iter(vec![Ok(Bytes::from("a\n")), Ok(Bytes::from("b\n"))]);
        let outcome = conn.forward_stream(source).await.unwrap();
        assert_eq!(outcome, StreamOutcome::Completed);
        drop(conn);

        let mut lines = BufReader::new(client).lines();
        let mut frames = Vec::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            frames.push(serde_json::from_str::<Response>(&line).unwrap());
        }
        assert_eq!(frames.len(), 3);
        assert!(matches!(&frames[0], Response::LogChunk { data } if data == b"a\n"));
        assert!(matches!(frames[2], Response::StreamEnd));
    }

    #[tokio::test]
    async fn test_forward_stream_error_frame() {
        let (client, server) = UnixStream::pair().unwrap();
        let mut conn = IpcConnection::new(server);

        let source = stream::iter(vec![Err(Error::timeout("too slow"))]);
        let outcome = conn.forward_stream(source).await.unwrap();
        assert_eq!(outcome, StreamOutcome::Failed);
        drop(conn);

        let mut lines = BufReader::new(client).lines();
        let line = lines.next_line().await.unwrap().unwrap();
        let err = serde_json::from_str::<Response>(&line)
            .unwrap()
            .into_result()
            .unwrap_err();
        assert!(matches!(err, Error::RemoteTimeout(_)));
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_forward_stream_stops_when_client_leaves() {
        let (client, server) = UnixStream::pair().unwrap();
        let mut conn = IpcConnection::new(server);

        let dropped = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(dropped.clone());
        let source = stream::pending::<Result<Bytes>>().map(move |item| {
            let _keep = &flag;
            item
        });

        drop(client);
        let outcome = conn.forward_stream(Box::pin(source)).await.unwrap();
        assert_eq!(outcome, StreamOutcome::ClientGone);
        assert!(dropped.load(Ordering::SeqCst));
    }
}
