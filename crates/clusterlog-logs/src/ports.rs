//! Collaborator boundaries consumed by the logs manager

use async_trait::async_trait;
use bytes::Bytes;
use clusterlog_core::{ActorPlacement, JobInfo, NodeInfo, Result, TaskEvent};
use futures::stream::BoxStream;
use std::collections::HashSet;
use std::time::Duration;

/// Lazy sequence of log bytes, in file order
pub type LogStream = BoxStream<'static, Result<Bytes>>;

/// Registry of node agents and their liveness
#[async_trait]
pub trait NodeRegistry: Send + Sync {
    /// Ids of agents that are registered and alive right now
    async fn alive_agent_ids(&self) -> Result<HashSet<String>>;

    /// Id of the alive node with the given address
    async fn ip_to_node_id(&self, node_ip: &str) -> Result<Option<String>>;

    /// Every registered node
    async fn nodes(&self) -> Result<Vec<NodeInfo>>;
}

#[async_trait]
pub trait ActorRegistry: Send + Sync {
    async fn get_actor(&self, actor_id: &str) -> Result<Option<ActorPlacement>>;
}

#[async_trait]
pub trait TaskEventStore: Send + Sync {
    /// All recorded attempts of a task, oldest first
    async fn task_events(&self, task_id: &str, timeout: Duration) -> Result<Vec<TaskEvent>>;
}

#[async_trait]
pub trait JobRegistry: Send + Sync {
    async fn get_job(&self, submission_id: &str) -> Result<Option<JobInfo>>;
}

/// Parameters of a single log stream
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    pub file_name: String,
    pub follow: bool,
    pub lines: Option<usize>,
    pub interval: Option<Duration>,
    pub timeout: Option<Duration>,
}

/// Client for the per-node agent that reads files from disk
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// File names on the node matching the glob
    async fn list_files(&self, node_id: &str, glob: &str, timeout: Duration) -> Result<Vec<String>>;

    /// Open a byte stream of one file. Dropping the stream releases the connection.
    async fn open_stream(&self, node_id: &str, request: StreamRequest) -> Result<LogStream>;
}
