//! Mock collaborators for testing

use async_trait::async_trait;
use bytes::Bytes;
use clusterlog_core::{ClusterConfig, ConfigFormat, Error, Result};
use futures::{stream, StreamExt};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::ports::{AgentClient, LogStream, StreamRequest};
use crate::registry::StaticRegistry;

const REGISTRY_TOML: &str = r#"
[[nodes]]
node_id = "node-1"
node_ip = "10.0.0.1"
log_dir = "/tmp/node-1"

[[nodes]]
node_id = "node-dead"
node_ip = "10.0.0.2"
log_dir = "/tmp/node-dead"
alive = false

[[actors]]
actor_id = "actor-a"
worker_id = "abc123"
node_id = "node-1"

[[actors]]
actor_id = "actor-pending"
node_id = "node-1"

[[actors]]
actor_id = "actor-no-node"
worker_id = "abc123"

[[actors]]
actor_id = "actor-dead"
worker_id = "abc123"
node_id = "node-dead"

[[tasks]]
task_id = "task-1"
attempt_number = 1
worker_id = "fff000"
node_id = "node-1"

[[tasks]]
task_id = "task-1"
attempt_number = 0
node_id = "node-1"

[[jobs]]
submission_id = "job-42"
driver_node_id = "node-1"

[[jobs]]
submission_id = "job-unscheduled"
"#;

/// Registry with a fixed cluster: node-1 alive, node-dead dead
pub fn registry() -> StaticRegistry {
    let config = ClusterConfig::parse(REGISTRY_TOML, ConfigFormat::Toml)
        .expect("mock registry config should parse");
    StaticRegistry::from_config(&config)
}

/// What an opened stream does
#[derive(Debug, Clone)]
pub enum StreamBehavior {
    /// Yield these chunks, then close
    Content(Vec<&'static str>),
    /// Open fine, never yield
    Silent,
    /// Never finish opening
    HangOnOpen,
    /// Yield a chunk after every period, forever
    Slow(Duration),
    /// Yield n chunks, then a remote error
    FailAfter(usize),
}

/// Bumps a counter when the stream holding it is dropped
struct ReleaseGuard(Arc<AtomicUsize>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// A node agent that serves a fixed file list and scripted streams
pub struct MockAgent {
    files: Vec<String>,
    stream: StreamBehavior,
    hang_list: bool,
    list_calls: AtomicUsize,
    last_glob: Mutex<Option<String>>,
    opened: AtomicUsize,
    released: Arc<AtomicUsize>,
    last_stream: Mutex<Option<StreamRequest>>,
}

impl MockAgent {
    pub fn new(files: Vec<&str>) -> Self {
        Self {
            files: files.into_iter().map(String::from).collect(),
            stream: StreamBehavior::Content(vec![]),
            hang_list: false,
            list_calls: AtomicUsize::new(0),
            last_glob: Mutex::new(None),
            opened: AtomicUsize::new(0),
            released: Arc::new(AtomicUsize::new(0)),
            last_stream: Mutex::new(None),
        }
    }

    pub fn with_stream(mut self, behavior: StreamBehavior) -> Self {
        self.stream = behavior;
        self
    }

    /// Listing never returns
    pub fn hanging_list(mut self) -> Self {
        self.hang_list = true;
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn last_glob(&self) -> Option<String> {
        self.last_glob.lock().clone()
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of streams that have been torn down
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn last_stream_request(&self) -> Option<StreamRequest> {
        self.last_stream.lock().clone()
    }
}

#[async_trait]
impl AgentClient for MockAgent {
    async fn list_files(&self, _node_id: &str, glob: &str, _timeout: Duration) -> Result<Vec<String>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_glob.lock() = Some(glob.to_string());

        if self.hang_list {
            futures::future::pending::<()>().await;
        }

        let pattern = glob::Pattern::new(glob).map_err(|e| Error::agent(e.to_string()))?;
        Ok(self
            .files
            .iter()
            .filter(|f| pattern.matches(f))
            .cloned()
            .collect())
    }

    async fn open_stream(&self, _node_id: &str, request: StreamRequest) -> Result<LogStream> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        *self.last_stream.lock() = Some(request);

        let guard = ReleaseGuard(self.released.clone());
        let stream = match self.stream.clone() {
            StreamBehavior::Content(chunks) => {
                stream::unfold((chunks.into_iter(), guard), |(mut chunks, guard)| async move {
                    let chunk = chunks.next()?;
                    Some((Ok(Bytes::from(chunk)), (chunks, guard)))
                })
                .boxed()
            }
            StreamBehavior::Silent => stream::unfold(guard, |guard| async move {
                futures::future::pending::<()>().await;
                Some((Ok(Bytes::new()), guard))
            })
            .boxed(),
            StreamBehavior::HangOnOpen => {
                futures::future::pending::<()>().await;
                unreachable!()
            }
            StreamBehavior::Slow(period) => stream::unfold((0u64, guard), move |(n, guard)| async move {
                tokio::time::sleep(period).await;
                Some((Ok(Bytes::from(format!("line {}\n", n))), (n + 1, guard)))
            })
            .boxed(),
            StreamBehavior::FailAfter(count) => {
                stream::unfold((0usize, Some(guard)), move |(n, guard)| async move {
                    let guard = guard?;
                    if n < count {
                        Some((Ok(Bytes::from(format!("line {}\n", n))), (n + 1, Some(guard))))
                    } else {
                        Some((Err(Error::agent("connection reset by node")), (n, None)))
                    }
                })
                .boxed()
            }
        };
        Ok(stream)
    }
}
