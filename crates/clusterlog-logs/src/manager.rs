//! Log resolution and streaming across cluster nodes

use clusterlog_core::{
    constants, Error, LogCategoryIndex, LogRequest, LogTarget, NodeInfo, NodeRef, ResolvedLog,
    Result, WorkerLogFilename,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::ports::{
    ActorRegistry, AgentClient, JobRegistry, LogStream, NodeRegistry, StreamRequest,
    TaskEventStore,
};
use crate::stream::guarded;

/// Resolves log identifiers to files on nodes and streams their content.
///
/// Holds no per-request state; every call re-checks liveness and re-lists
/// files on the agent.
pub struct LogsManager {
    nodes: Arc<dyn NodeRegistry>,
    actors: Arc<dyn ActorRegistry>,
    tasks: Arc<dyn TaskEventStore>,
    jobs: Arc<dyn JobRegistry>,
    agent: Arc<dyn AgentClient>,
    default_timeout: Duration,
    default_lines: Option<usize>,
}

impl LogsManager {
    pub fn new(
        nodes: Arc<dyn NodeRegistry>,
        actors: Arc<dyn ActorRegistry>,
        tasks: Arc<dyn TaskEventStore>,
        jobs: Arc<dyn JobRegistry>,
        agent: Arc<dyn AgentClient>,
    ) -> Self {
        Self {
            nodes,
            actors,
            tasks,
            jobs,
            agent,
            default_timeout: Duration::from_secs(constants::DEFAULT_RPC_TIMEOUT_SECS),
            default_lines: None,
        }
    }

    /// Timeout used when a request does not carry one
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// History length used when a request does not carry one
    pub fn with_default_lines(mut self, lines: usize) -> Self {
        self.default_lines = Some(lines);
        self
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Resolve the node id from a given node ip, if an alive node has it
    pub async fn ip_to_node_id(&self, node_ip: &str) -> Result<Option<String>> {
        self.nodes.ip_to_node_id(node_ip).await
    }

    /// Every node known to the registry
    pub async fn nodes(&self) -> Result<Vec<NodeInfo>> {
        self.nodes.nodes().await
    }

    /// Fail unless the node is currently a registered, alive agent
    pub async fn verify_node_registered(&self, node_id: &str) -> Result<()> {
        let alive = self.nodes.alive_agent_ids().await?;
        if !alive.contains(node_id) {
            return Err(Error::node_unavailable(format!(
                "Given node id {} is not available. It's either the node is dead, \
                 or it is not registered. List the cluster nodes to see their status. \
                 If the node is registered, it is highly likely a transient issue. Try again.",
                node_id
            )));
        }
        Ok(())
    }

    /// Turn the request's node reference into a node id
    pub async fn node_id_for(&self, node: &NodeRef) -> Result<String> {
        match node {
            NodeRef::Id(id) => Ok(id.clone()),
            NodeRef::Ip(ip) => self.ip_to_node_id(ip).await?.ok_or_else(|| {
                Error::node_unavailable(format!("No alive node has ip {}", ip))
            }),
        }
    }

    /// List log files on a node, grouped by category
    pub async fn list_logs(
        &self,
        node_id: &str,
        timeout: Duration,
        glob: &str,
    ) -> Result<LogCategoryIndex> {
        self.verify_node_registered(node_id).await?;

        let files = tokio::time::timeout(timeout, self.agent.list_files(node_id, glob, timeout))
            .await
            .map_err(|_| {
                Error::timeout(format!(
                    "Listing {} on node {} took longer than {:?}",
                    glob, node_id, timeout
                ))
            })??;

        debug!("Listed {} files matching {} on {}", files.len(), glob, node_id);
        Ok(LogCategoryIndex::from_files(files))
    }

    /// Find the worker log of a worker id or pid on a node.
    ///
    /// Returns `Ok(None)` when no worker file matches.
    pub async fn match_worker_file(
        &self,
        node_id: &str,
        worker_id: Option<&str>,
        pid: Option<u32>,
        suffix: &str,
        timeout: Duration,
    ) -> Result<Option<String>> {
        let glob = match (worker_id, pid) {
            (Some(worker_id), None) => format!("*{}*{}", worker_id, suffix),
            (None, Some(pid)) => format!("*{}*{}", pid, suffix),
            (Some(worker_id), Some(pid)) => {
                return Err(Error::invalid_request(format!(
                    "Only one of worker id({}) or pid({}) should be provided.",
                    worker_id, pid
                )))
            }
            (None, None) => {
                return Err(Error::invalid_request(
                    "One of worker id or pid must be provided.",
                ))
            }
        };

        let index = self.list_logs(node_id, timeout, &glob).await?;

        let found = index.worker_files().find(|file_name| {
            match WorkerLogFilename::parse(file_name) {
                Some(parsed) => match worker_id {
                    Some(worker_id) => parsed.worker_id == worker_id,
                    None => Some(parsed.pid) == pid,
                },
                None => false,
            }
        });

        Ok(found.cloned())
    }

    /// Driver log of a submitted job
    async fn resolve_job_filename(&self, submission_id: &str) -> Result<ResolvedLog> {
        let job = self.jobs.get_job(submission_id).await?.ok_or_else(|| {
            Error::not_found(format!("Submission job ID {} not found.", submission_id))
        })?;

        let node_id = job.driver_node_id.filter(|id| !id.is_empty()).ok_or_else(|| {
            Error::invalid_request(format!(
                "Job {} has no driver node id info. The job was never scheduled.",
                submission_id
            ))
        })?;

        let file_name = constants::job_log_filename(submission_id);
        info!(
            "Resolving job {} on node {} with filename {}",
            submission_id, node_id, file_name
        );
        Ok(ResolvedLog::new(node_id, file_name))
    }

    /// Map a log request to a single file on a single node
    pub async fn resolve_filename(&self, request: &LogRequest) -> Result<ResolvedLog> {
        let timeout = request.timeout.unwrap_or(self.default_timeout);
        let suffix = request.suffix.as_str();

        let (node_id, file_name) = match &request.target {
            LogTarget::Actor { actor_id } => {
                let actor = self.actors.get_actor(actor_id).await?.ok_or_else(|| {
                    Error::invalid_request(format!("Actor ID {} not found.", actor_id))
                })?;

                // Only the latest worker of a restarted actor is known
                let worker_id = actor.worker_id.filter(|id| !id.is_empty()).ok_or_else(|| {
                    Error::invalid_request(format!(
                        "Worker ID for Actor ID {} not found. Actor is not scheduled yet.",
                        actor_id
                    ))
                })?;
                let node_id = actor.node_id.filter(|id| !id.is_empty()).ok_or_else(|| {
                    Error::invalid_request(format!(
                        "Node ID for Actor ID {} not found. Actor is not scheduled yet.",
                        actor_id
                    ))
                })?;
                self.verify_node_registered(&node_id).await?;

                let file_name = self
                    .match_worker_file(&node_id, Some(&worker_id), None, suffix, timeout)
                    .await?;
                (node_id, file_name)
            }
            LogTarget::Task {
                task_id,
                attempt_number,
            } => {
                let events = self.tasks.task_events(task_id, timeout).await?;
                if events.is_empty() {
                    return Err(Error::not_found(format!(
                        "Could not find log file for task: {} (attempt {}) with suffix: {}",
                        task_id, attempt_number, suffix
                    )));
                }

                let event = events
                    .into_iter()
                    .find(|e| e.attempt_number == *attempt_number)
                    .ok_or_else(|| {
                        Error::not_found(format!(
                            "Could not find log file for task attempt: {}({})",
                            task_id, attempt_number
                        ))
                    })?;

                let (worker_id, node_id) = match (event.worker_id, event.node_id) {
                    (Some(worker_id), Some(node_id)) => (worker_id, node_id),
                    (worker_id, node_id) => {
                        return Err(Error::not_found(format!(
                            "Could not find log file for task attempt: {}({}). \
                             Worker id = {:?}, node id = {:?}",
                            task_id, attempt_number, worker_id, node_id
                        )))
                    }
                };

                let file_name = self
                    .match_worker_file(&node_id, Some(&worker_id), None, suffix, timeout)
                    .await?;
                (node_id, file_name)
            }
            LogTarget::Submission { submission_id } => {
                let resolved = self.resolve_job_filename(submission_id).await?;
                (resolved.node_id, Some(resolved.file_name))
            }
            LogTarget::Pid { pid } => {
                let node = request.node.as_ref().ok_or_else(|| {
                    Error::invalid_request(format!(
                        "Node id needs to be specified for resolving filenames of pid {}",
                        pid
                    ))
                })?;
                let node_id = self.node_id_for(node).await?;
                self.verify_node_registered(&node_id).await?;

                let file_name = self
                    .match_worker_file(&node_id, None, Some(*pid), suffix, timeout)
                    .await?;
                (node_id, file_name)
            }
            LogTarget::File { filename } => {
                let node = request.node.as_ref().ok_or_else(|| {
                    Error::invalid_request(format!(
                        "Node id needs to be specified for reading file {}",
                        filename
                    ))
                })?;
                (self.node_id_for(node).await?, Some(filename.clone()))
            }
        };

        match file_name {
            Some(file_name) if !node_id.is_empty() && !file_name.is_empty() => {
                info!("Resolved log file: {} on node {}", file_name, node_id);
                Ok(ResolvedLog::new(node_id, file_name))
            }
            _ => Err(Error::not_found(request.supplied_options().describe())),
        }
    }

    /// Resolve the request and open a stream of the file's content.
    ///
    /// Bounded reads must finish within the request timeout. Following
    /// streams carry no deadline and run until the agent closes them or
    /// the consumer drops the stream. A timeout too large to represent as
    /// an instant means no deadline.
    pub async fn stream_logs(&self, request: &LogRequest) -> Result<LogStream> {
        let resolved = self.resolve_filename(request).await?;
        self.verify_node_registered(&resolved.node_id).await?;

        let deadline = if request.follow {
            None
        } else {
            Instant::now().checked_add(request.timeout.unwrap_or(self.default_timeout))
        };

        let stream_request = StreamRequest {
            file_name: resolved.file_name.clone(),
            follow: request.follow,
            lines: request.lines.or(self.default_lines),
            interval: request.interval,
            timeout: deadline.map(|d| d.saturating_duration_since(Instant::now())),
        };

        let open = self.agent.open_stream(&resolved.node_id, stream_request);
        let inner = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, open).await.map_err(|_| {
                Error::timeout(format!(
                    "Opening {} on node {} did not complete before the deadline",
                    resolved.file_name, resolved.node_id
                ))
            })??,
            None => open.await?,
        };

        debug!(
            "Streaming {} from {} (follow: {})",
            resolved.file_name, resolved.node_id, request.follow
        );
        Ok(guarded(inner, deadline, resolved.file_name))
    }
}
