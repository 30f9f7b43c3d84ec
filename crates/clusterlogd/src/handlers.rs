//! IPC request handlers

use clusterlog_core::{Error, GetLogOptions, NodeRef, Result};
use clusterlog_ipc::Response;
use clusterlog_logs::{LogStream, LogsManager, StaticRegistry};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Request handler for IPC commands
pub struct RequestHandler {
    manager: LogsManager,
    registry: Arc<StaticRegistry>,
}

impl RequestHandler {
    pub fn new(manager: LogsManager, registry: Arc<StaticRegistry>) -> Self {
        Self { manager, registry }
    }

    /// Handle nodes request
    pub async fn nodes(&self) -> Response {
        match self.manager.nodes().await {
            Ok(nodes) => Response::Nodes { nodes },
            Err(e) => failure("nodes", e),
        }
    }

    /// Handle list request
    pub async fn list_logs(
        &self,
        node_id: Option<String>,
        node_ip: Option<String>,
        glob: String,
        timeout_secs: Option<u64>,
    ) -> Response {
        let node = match (node_id, node_ip) {
            (Some(id), _) => NodeRef::Id(id),
            (None, Some(ip)) => NodeRef::Ip(ip),
            (None, None) => {
                return failure(
                    "list",
                    Error::invalid_request("Must provide either node_id or node_ip"),
                )
            }
        };
        info!("Handling list request for {} ({})", node, glob);

        let timeout = timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.manager.default_timeout());

        let result = async {
            let node_id = self.manager.node_id_for(&node).await?;
            let index = self.manager.list_logs(&node_id, timeout, &glob).await?;
            Ok::<_, Error>((node_id, index))
        }
        .await;

        match result {
            Ok((node_id, index)) => Response::Logs { node_id, index },
            Err(e) => failure("list", e),
        }
    }

    /// Handle resolve request
    pub async fn resolve(&self, options: GetLogOptions) -> Response {
        let result = async {
            let request = options.into_request()?;
            info!("Handling resolve request for {}", request.target);
            self.manager.resolve_filename(&request).await
        }
        .await;

        match result {
            Ok(log) => Response::Resolved { log },
            Err(e) => failure("resolve", e),
        }
    }

    /// Handle node id lookup
    pub async fn ip_to_node_id(&self, node_ip: &str) -> Response {
        match self.manager.ip_to_node_id(node_ip).await {
            Ok(node_id) => Response::NodeId { node_id },
            Err(e) => failure("ip lookup", e),
        }
    }

    /// Handle a liveness update
    pub fn set_node_alive(&self, node_id: String, alive: bool) -> Response {
        if self.registry.set_alive(&node_id, alive) {
            Response::NodeState { node_id, alive }
        } else {
            failure(
                "node state",
                Error::not_found(format!("Node {} is not registered", node_id)),
            )
        }
    }

    /// Open the stream a stream request names
    pub async fn open_stream(&self, options: GetLogOptions) -> Result<LogStream> {
        let request = options.into_request()?;
        info!(
            "Handling stream request for {} (follow: {})",
            request.target, request.follow
        );
        self.manager.stream_logs(&request).await.map_err(|e| {
            warn!("Stream request failed: {}", e);
            e
        })
    }
}

fn failure(operation: &str, e: Error) -> Response {
    match &e {
        Error::InvalidRequest(_) | Error::NotFound(_) => {
            warn!("{} request rejected: {}", operation, e)
        }
        _ => error!("{} failed: {}", operation, e),
    }
    Response::error(&e)
}
