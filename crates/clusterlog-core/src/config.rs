//! Configuration file parsing for clusterlog
//!
//! Supports multiple configuration file formats:
//! - TOML (.toml)
//! - YAML (.yaml, .yml)
//! - JSON (.json)

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::*;
use crate::error::{Error, Result};
use crate::types::{ActorPlacement, JobInfo, NodeInfo, TaskEvent};

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(ConfigFormat::Toml),
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "json" => Some(ConfigFormat::Json),
            _ => None,
        }
    }

    /// Detect format from file path
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_RPC_TIMEOUT_SECS
}

fn default_lines() -> usize {
    DEFAULT_LOG_LINES
}

fn default_alive() -> bool {
    true
}

/// A node whose agent is served by this daemon
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub node_id: String,
    pub node_ip: String,
    /// Directory holding this node's log files
    pub log_dir: PathBuf,
    #[serde(default = "default_alive")]
    pub alive: bool,
}

impl NodeConfig {
    pub fn info(&self) -> NodeInfo {
        NodeInfo {
            node_id: self.node_id.clone(),
            node_ip: self.node_ip.clone(),
            alive: self.alive,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActorConfig {
    pub actor_id: String,
    pub worker_id: Option<String>,
    pub node_id: Option<String>,
}

impl ActorConfig {
    pub fn placement(&self) -> ActorPlacement {
        ActorPlacement {
            worker_id: self.worker_id.clone(),
            node_id: self.node_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    pub task_id: String,
    #[serde(default)]
    pub attempt_number: u32,
    pub worker_id: Option<String>,
    pub node_id: Option<String>,
}

impl TaskConfig {
    pub fn event(&self) -> TaskEvent {
        TaskEvent {
            attempt_number: self.attempt_number,
            worker_id: self.worker_id.clone(),
            node_id: self.node_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    pub submission_id: String,
    pub driver_node_id: Option<String>,
}

impl JobConfig {
    pub fn info(&self) -> JobInfo {
        JobInfo {
            submission_id: self.submission_id.clone(),
            driver_node_id: self.driver_node_id.clone(),
        }
    }
}

/// Cluster configuration (clusterlog.toml/yaml/json)
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterConfig {
    /// Timeout for listings and bounded reads in seconds
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,
    /// History lines returned when a request does not ask for a count
    #[serde(default = "default_lines")]
    pub default_lines: usize,
    /// Polling interval of followed streams in seconds
    pub default_interval_secs: Option<f64>,
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
    #[serde(default)]
    pub actors: Vec<ActorConfig>,
    #[serde(default)]
    pub tasks: Vec<TaskConfig>,
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: DEFAULT_RPC_TIMEOUT_SECS,
            default_lines: DEFAULT_LOG_LINES,
            default_interval_secs: None,
            nodes: Vec::new(),
            actors: Vec::new(),
            tasks: Vec::new(),
            jobs: Vec::new(),
        }
    }
}

impl ClusterConfig {
    /// Load config from file, automatically detecting format from extension
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }

        let format = ConfigFormat::from_path(path).ok_or_else(|| {
            Error::ConfigError(format!(
                "Unsupported config file extension: {}. Expected .toml, .yaml, .yml, or .json",
                path.display()
            ))
        })?;

        let content = std::fs::read_to_string(path)?;
        let config = Self::parse(&content, format)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse config content with specified format
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self> {
        let config: ClusterConfig = match format {
            ConfigFormat::Toml => toml::from_str(content)?,
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
            ConfigFormat::Json => serde_json::from_str(content)?,
        };
        Ok(config)
    }

    /// Find a config file in the given directory, then in the clusterlog home
    pub fn find(dir: &Path) -> Option<PathBuf> {
        [dir.to_path_buf(), clusterlog_home()]
            .iter()
            .flat_map(|base| CONFIG_FILES.iter().map(move |name| base.join(name)))
            .find(|path| path.exists())
    }

    /// Check node ids are present and unique
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if node.node_id.is_empty() {
                return Err(Error::config("Node entry with empty node_id"));
            }
            if !seen.insert(node.node_id.as_str()) {
                return Err(Error::config(format!(
                    "Duplicate node_id: {}",
                    node.node_id
                )));
            }
            if node.log_dir.as_os_str().is_empty() {
                return Err(Error::config(format!(
                    "Node {} has no log_dir",
                    node.node_id
                )));
            }
        }
        if let Some(secs) = self.default_interval_secs {
            if !secs.is_finite() || secs <= 0.0 {
                return Err(Error::config(format!(
                    "default_interval_secs must be positive, got {}",
                    secs
                )));
            }
        }
        Ok(())
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    pub fn default_interval(&self) -> Duration {
        self.default_interval_secs
            .map(Duration::from_secs_f64)
            .unwrap_or(Duration::from_millis(DEFAULT_FOLLOW_INTERVAL_MS))
    }
}
