//! Registry backed by the cluster configuration file

use async_trait::async_trait;
use clusterlog_core::{
    ActorPlacement, ClusterConfig, JobInfo, NodeInfo, Result, TaskEvent,
};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::info;

use crate::ports::{ActorRegistry, JobRegistry, NodeRegistry, TaskEventStore};

/// Node, actor, task and job metadata loaded from config.
///
/// Node liveness can be flipped at runtime; everything else is fixed.
pub struct StaticRegistry {
    nodes: RwLock<Vec<NodeInfo>>,
    actors: HashMap<String, ActorPlacement>,
    tasks: HashMap<String, Vec<TaskEvent>>,
    jobs: Vec<JobInfo>,
}

impl StaticRegistry {
    pub fn from_config(config: &ClusterConfig) -> Self {
        let actors = config
            .actors
            .iter()
            .map(|a| (a.actor_id.clone(), a.placement()))
            .collect();

        let mut tasks: HashMap<String, Vec<TaskEvent>> = HashMap::new();
        for task in &config.tasks {
            tasks.entry(task.task_id.clone()).or_default().push(task.event());
        }
        for events in tasks.values_mut() {
            events.sort_by_key(|e| e.attempt_number);
        }

        Self {
            nodes: RwLock::new(config.nodes.iter().map(|n| n.info()).collect()),
            actors,
            tasks,
            jobs: config.jobs.iter().map(|j| j.info()).collect(),
        }
    }

    /// Mark a node alive or dead. Returns false if the node is unknown.
    pub fn set_alive(&self, node_id: &str, alive: bool) -> bool {
        let mut nodes = self.nodes.write();
        match nodes.iter_mut().find(|n| n.node_id == node_id) {
            Some(node) => {
                node.alive = alive;
                info!("Node {} marked {}", node_id, if alive { "alive" } else { "dead" });
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl NodeRegistry for StaticRegistry {
    async fn alive_agent_ids(&self) -> Result<HashSet<String>> {
        Ok(self
            .nodes
            .read()
            .iter()
            .filter(|n| n.alive)
            .map(|n| n.node_id.clone())
            .collect())
    }

    async fn ip_to_node_id(&self, node_ip: &str) -> Result<Option<String>> {
        Ok(self
            .nodes
            .read()
            .iter()
            .find(|n| n.alive && n.node_ip == node_ip)
            .map(|n| n.node_id.clone()))
    }

    async fn nodes(&self) -> Result<Vec<NodeInfo>> {
        Ok(self.nodes.read().clone())
    }
}

#[async_trait]
impl ActorRegistry for StaticRegistry {
    async fn get_actor(&self, actor_id: &str) -> Result<Option<ActorPlacement>> {
        Ok(self.actors.get(actor_id).cloned())
    }
}

#[async_trait]
impl TaskEventStore for StaticRegistry {
    async fn task_events(&self, task_id: &str, _timeout: Duration) -> Result<Vec<TaskEvent>> {
        Ok(self.tasks.get(task_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl JobRegistry for StaticRegistry {
    async fn get_job(&self, submission_id: &str) -> Result<Option<JobInfo>> {
        Ok(self
            .jobs
            .iter()
            .find(|j| j.submission_id == submission_id)
            .cloned())
    }
}
