//! Main daemon orchestration

use clusterlog_core::{ClusterConfig, Result};
use clusterlog_ipc::{IpcConnection, IpcServer, Request, Response, StreamOutcome};
use clusterlog_logs::StaticRegistry;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::handlers::RequestHandler;

/// Main daemon struct
pub struct Daemon {
    server: IpcServer,
    handler: Arc<RequestHandler>,
}

impl Daemon {
    /// Create a daemon serving `config` on `socket_path`
    pub async fn new(config: &ClusterConfig, socket_path: &Path) -> Result<Self> {
        let registry = Arc::new(StaticRegistry::from_config(config));
        let manager = clusterlog_logs::manager_with_registry(config, registry.clone());
        info!(
            "Serving logs of {} nodes ({} actors, {} task events, {} jobs)",
            config.nodes.len(),
            config.actors.len(),
            config.tasks.len(),
            config.jobs.len()
        );

        let server = IpcServer::bind(socket_path).await?;

        Ok(Self {
            server,
            handler: Arc::new(RequestHandler::new(manager, registry)),
        })
    }

    /// Run the daemon main loop
    pub async fn run(&self) -> Result<()> {
        info!("Daemon running, waiting for connections...");

        loop {
            match self.server.accept().await {
                Ok(conn) => {
                    let handler = Arc::clone(&self.handler);
                    tokio::spawn(Self::serve(handler, conn));
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }

    async fn serve(handler: Arc<RequestHandler>, mut conn: IpcConnection) {
        loop {
            let request = match conn.read_request().await {
                Ok(Some(request)) => request,
                // Connection closed
                Ok(None) => break,
                Err(e) => {
                    error!("Error reading request: {}", e);
                    let _ = conn.send_response(&Response::error(&e)).await;
                    break;
                }
            };

            if let Request::StreamLogs { options } = request {
                let stream = match handler.open_stream(options).await {
                    Ok(stream) => stream,
                    Err(e) => {
                        if let Err(e) = conn.send_response(&Response::error(&e)).await {
                            error!("Failed to send response: {}", e);
                            break;
                        }
                        continue;
                    }
                };
                match conn.forward_stream(stream).await {
                    Ok(StreamOutcome::ClientGone) => {
                        debug!("Client left during stream");
                        break;
                    }
                    Ok(outcome) => debug!("Stream finished: {:?}", outcome),
                    Err(e) => {
                        error!("Failed to forward stream: {}", e);
                        break;
                    }
                }
                continue;
            }

            let response = Self::handle_request(&handler, request).await;
            if let Err(e) = conn.send_response(&response).await {
                error!("Failed to send response: {}", e);
                break;
            }
        }
    }

    async fn handle_request(handler: &RequestHandler, request: Request) -> Response {
        match request {
            Request::Ping => Response::Pong,
            Request::Nodes => handler.nodes().await,
            Request::ListLogs {
                node_id,
                node_ip,
                glob,
                timeout_secs,
            } => handler.list_logs(node_id, node_ip, glob, timeout_secs).await,
            Request::ResolveFilename { options } => handler.resolve(options).await,
            Request::IpToNodeId { node_ip } => handler.ip_to_node_id(&node_ip).await,
            Request::SetNodeAlive { node_id, alive } => handler.set_node_alive(node_id, alive),
            Request::StreamLogs { .. } => Response::error(&clusterlog_core::Error::ipc(
                "Stream requests are served by the stream path",
            )),
        }
    }
}
