//! clusterlog logs - Log resolution, listing, and streaming across nodes

mod agent;
mod manager;
#[cfg(test)]
pub mod mock;
pub mod ports;
mod registry;
mod stream;

pub use agent::LocalAgent;
pub use manager::LogsManager;
pub use ports::{
    ActorRegistry, AgentClient, JobRegistry, LogStream, NodeRegistry, StreamRequest,
    TaskEventStore,
};
pub use registry::StaticRegistry;

use clusterlog_core::ClusterConfig;
use std::sync::Arc;

/// Build a manager serving the nodes and registry entries of a config file
pub fn manager_from_config(config: &ClusterConfig) -> LogsManager {
    manager_with_registry(config, Arc::new(StaticRegistry::from_config(config)))
}

/// Build a manager over a registry the caller keeps a handle to, so node
/// liveness can be changed while the manager serves requests
pub fn manager_with_registry(config: &ClusterConfig, registry: Arc<StaticRegistry>) -> LogsManager {
    let agent = Arc::new(LocalAgent::from_config(config));
    LogsManager::new(
        registry.clone(),
        registry.clone(),
        registry.clone(),
        registry,
        agent,
    )
    .with_default_timeout(config.default_timeout())
    .with_default_lines(config.default_lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clusterlog_core::{ConfigFormat, LogCategory, LogRequest};
    use futures::StreamExt;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_manager_from_config_end_to_end() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("worker-abc123-def456-4821.out"),
            "hello from the actor\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("job-driver-job-42.log"), "driver line\n").unwrap();
        std::fs::write(dir.path().join("gcs_server.out"), "").unwrap();

        let toml = format!(
            r#"
default_lines = 10

[[nodes]]
node_id = "node-1"
node_ip = "127.0.0.1"
log_dir = "{}"

[[actors]]
actor_id = "actor-a"
worker_id = "abc123"
node_id = "node-1"

[[jobs]]
submission_id = "job-42"
driver_node_id = "node-1"
"#,
            dir.path().display()
        );
        let config = ClusterConfig::parse(&toml, ConfigFormat::Toml).unwrap();
        let manager = manager_from_config(&config);

        let index = manager
            .list_logs("node-1", manager.default_timeout(), "*")
            .await
            .unwrap();
        assert_eq!(index.get(LogCategory::WorkerOut).len(), 1);
        assert_eq!(index.get(LogCategory::GcsServer).len(), 1);
        assert_eq!(index.get(LogCategory::Internal).len(), 1);

        let stream = manager.stream_logs(&LogRequest::actor("actor-a")).await.unwrap();
        let data: Vec<u8> = stream
            .map(|c| c.unwrap().to_vec())
            .concat()
            .await;
        assert_eq!(data, b"hello from the actor\n");

        let stream = manager
            .stream_logs(&LogRequest::submission("job-42"))
            .await
            .unwrap();
        let data: Vec<u8> = stream.map(|c| c.unwrap().to_vec()).concat().await;
        assert_eq!(data, b"driver line\n");
    }

    #[tokio::test]
    async fn test_shared_registry_drives_liveness() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("raylet.out"), "up\n").unwrap();
        let toml = format!(
            r#"
[[nodes]]
node_id = "node-1"
node_ip = "127.0.0.1"
log_dir = "{}"
"#,
            dir.path().display()
        );
        let config = ClusterConfig::parse(&toml, ConfigFormat::Toml).unwrap();
        let registry = Arc::new(StaticRegistry::from_config(&config));
        let manager = manager_with_registry(&config, registry.clone());
        let request = LogRequest::file("raylet.out").on_node("node-1");

        assert!(registry.set_alive("node-1", false));
        let err = manager.stream_logs(&request).await.err().unwrap();
        assert!(matches!(err, clusterlog_core::Error::NodeUnavailable(_)));

        assert!(registry.set_alive("node-1", true));
        assert!(manager.stream_logs(&request).await.is_ok());
    }
}
