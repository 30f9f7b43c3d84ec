//! Core types for clusterlog

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::constants::*;
use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Worker log grammar: worker-<worker_id>-<job_id>-<pid>.<out|err>
static WORKER_LOG_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^.*worker-([0-9a-f]+)-([0-9a-f]+)-(\d+)\.(out|err)$")
        .expect("Invalid worker log regex")
});

fn default_suffix() -> String {
    DEFAULT_LOG_SUFFIX.to_string()
}

/// How a caller addresses a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum NodeRef {
    Id(String),
    Ip(String),
}

impl std::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeRef::Id(id) => write!(f, "node id {}", id),
            NodeRef::Ip(ip) => write!(f, "node ip {}", ip),
        }
    }
}

/// The identifier that decides which log file a request refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    /// Explicit file name on a given node
    File { filename: String },
    /// Current worker of an actor
    Actor { actor_id: String },
    /// Worker that ran one attempt of a task
    Task { task_id: String, attempt_number: u32 },
    /// Worker process on a given node
    Pid { pid: u32 },
    /// Driver of a submitted job
    Submission { submission_id: String },
}

impl std::fmt::Display for LogTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogTarget::File { filename } => write!(f, "filename {}", filename),
            LogTarget::Actor { actor_id } => write!(f, "actor {}", actor_id),
            LogTarget::Task {
                task_id,
                attempt_number,
            } => write!(f, "task {} (attempt {})", task_id, attempt_number),
            LogTarget::Pid { pid } => write!(f, "pid {}", pid),
            LogTarget::Submission { submission_id } => {
                write!(f, "submission {}", submission_id)
            }
        }
    }
}

/// A fully-formed log request
#[derive(Debug, Clone)]
pub struct LogRequest {
    pub target: LogTarget,
    pub node: Option<NodeRef>,
    /// Worker log suffix ("out" or "err")
    pub suffix: String,
    /// Tail length of the history
    pub lines: Option<usize>,
    /// Polling interval hint for the agent while following
    pub interval: Option<Duration>,
    /// Deadline for bounded reads and listings
    pub timeout: Option<Duration>,
    /// Keep the stream open and tail the file
    pub follow: bool,
    /// Options as the caller sent them, kept for diagnostics
    supplied: Option<GetLogOptions>,
}

impl LogRequest {
    pub fn new(target: LogTarget) -> Self {
        Self {
            target,
            node: None,
            suffix: default_suffix(),
            lines: None,
            interval: None,
            timeout: None,
            follow: false,
            supplied: None,
        }
    }

    pub fn file(filename: impl Into<String>) -> Self {
        Self::new(LogTarget::File {
            filename: filename.into(),
        })
    }

    pub fn actor(actor_id: impl Into<String>) -> Self {
        Self::new(LogTarget::Actor {
            actor_id: actor_id.into(),
        })
    }

    pub fn task(task_id: impl Into<String>, attempt_number: u32) -> Self {
        Self::new(LogTarget::Task {
            task_id: task_id.into(),
            attempt_number,
        })
    }

    pub fn pid(pid: u32) -> Self {
        Self::new(LogTarget::Pid { pid })
    }

    pub fn submission(submission_id: impl Into<String>) -> Self {
        Self::new(LogTarget::Submission {
            submission_id: submission_id.into(),
        })
    }

    pub fn on_node(mut self, node_id: impl Into<String>) -> Self {
        self.node = Some(NodeRef::Id(node_id.into()));
        self
    }

    pub fn on_ip(mut self, node_ip: impl Into<String>) -> Self {
        self.node = Some(NodeRef::Ip(node_ip.into()));
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn with_lines(mut self, lines: usize) -> Self {
        self.lines = Some(lines);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn following(mut self) -> Self {
        self.follow = true;
        self
    }

    /// Every identifying field the caller supplied, not only the one that won
    pub fn supplied_options(&self) -> GetLogOptions {
        self.supplied
            .clone()
            .unwrap_or_else(|| GetLogOptions::from(self))
    }
}

/// How log content is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    /// Bounded one-shot read
    #[default]
    File,
    /// Live tail with no deadline
    Stream,
}

/// Flat log options as sent by callers, every identifier optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetLogOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub media_type: MediaType,
}

impl GetLogOptions {
    /// Collapse the flat options into a single-target request.
    ///
    /// Identifiers are taken in priority order: actor, task, submission,
    /// pid, then explicit filename. Empty strings count as absent.
    pub fn into_request(self) -> Result<LogRequest> {
        let non_empty = |v: &Option<String>| v.as_deref().filter(|s| !s.is_empty()).is_some();

        let target = if non_empty(&self.actor_id) {
            LogTarget::Actor {
                actor_id: self.actor_id.clone().unwrap_or_default(),
            }
        } else if non_empty(&self.task_id) {
            LogTarget::Task {
                task_id: self.task_id.clone().unwrap_or_default(),
                attempt_number: self.attempt_number.unwrap_or(0),
            }
        } else if non_empty(&self.submission_id) {
            LogTarget::Submission {
                submission_id: self.submission_id.clone().unwrap_or_default(),
            }
        } else if let Some(pid) = self.pid {
            LogTarget::Pid { pid }
        } else if non_empty(&self.filename) {
            LogTarget::File {
                filename: self.filename.clone().unwrap_or_default(),
            }
        } else {
            return Err(Error::not_found(self.describe()));
        };

        let node = match (&self.node_id, &self.node_ip) {
            (Some(id), _) if !id.is_empty() => Some(NodeRef::Id(id.clone())),
            (_, Some(ip)) if !ip.is_empty() => Some(NodeRef::Ip(ip.clone())),
            _ => None,
        };

        let interval = match self.interval_secs {
            Some(secs) => Some(
                Duration::try_from_secs_f64(secs)
                    .ok()
                    .filter(|d| !d.is_zero())
                    .ok_or_else(|| {
                        Error::invalid_request(format!(
                            "Invalid interval: {}. Must be a positive number of seconds",
                            secs
                        ))
                    })?,
            ),
            None => None,
        };

        Ok(LogRequest {
            target,
            node,
            suffix: self
                .suffix
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(default_suffix),
            lines: self.lines,
            interval,
            timeout: self.timeout_secs.map(Duration::from_secs),
            follow: self.media_type == MediaType::Stream,
            supplied: Some(self),
        })
    }

    /// Render every identifying field for diagnostics
    pub fn describe(&self) -> String {
        fn show<T: std::fmt::Display>(v: &Option<T>) -> String {
            v.as_ref().map(|v| v.to_string()).unwrap_or_else(|| "None".to_string())
        }
        format!(
            "Could not find a log file. Please make sure the given option exists in the cluster.\n\
             \tnode_id: {}\n\tnode_ip: {}\n\tfilename: {}\n\tactor_id: {}\n\ttask_id: {}\n\
             \tattempt_number: {}\n\tpid: {}\n\tsuffix: {}\n\tsubmission_id: {}",
            show(&self.node_id),
            show(&self.node_ip),
            show(&self.filename),
            show(&self.actor_id),
            show(&self.task_id),
            show(&self.attempt_number),
            show(&self.pid),
            show(&self.suffix),
            show(&self.submission_id),
        )
    }
}

impl From<&LogRequest> for GetLogOptions {
    fn from(req: &LogRequest) -> Self {
        let mut opts = GetLogOptions {
            suffix: Some(req.suffix.clone()),
            lines: req.lines,
            interval_secs: req.interval.map(|d| d.as_secs_f64()),
            timeout_secs: req.timeout.map(|d| d.as_secs()),
            media_type: if req.follow {
                MediaType::Stream
            } else {
                MediaType::File
            },
            ..Default::default()
        };
        match &req.node {
            Some(NodeRef::Id(id)) => opts.node_id = Some(id.clone()),
            Some(NodeRef::Ip(ip)) => opts.node_ip = Some(ip.clone()),
            None => {}
        }
        match &req.target {
            LogTarget::File { filename } => opts.filename = Some(filename.clone()),
            LogTarget::Actor { actor_id } => opts.actor_id = Some(actor_id.clone()),
            LogTarget::Task {
                task_id,
                attempt_number,
            } => {
                opts.task_id = Some(task_id.clone());
                opts.attempt_number = Some(*attempt_number);
            }
            LogTarget::Pid { pid } => opts.pid = Some(*pid),
            LogTarget::Submission { submission_id } => {
                opts.submission_id = Some(submission_id.clone())
            }
        }
        opts
    }
}

/// A log file pinned to a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLog {
    pub node_id: String,
    pub file_name: String,
}

impl ResolvedLog {
    pub fn new(node_id: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            file_name: file_name.into(),
        }
    }
}

/// Semantic bucket of a log file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogCategory {
    WorkerOut,
    WorkerErr,
    CoreWorker,
    Driver,
    Raylet,
    GcsServer,
    Internal,
    Autoscaler,
    Agent,
    Dashboard,
}

impl LogCategory {
    pub const ALL: [LogCategory; 10] = [
        LogCategory::WorkerOut,
        LogCategory::WorkerErr,
        LogCategory::CoreWorker,
        LogCategory::Driver,
        LogCategory::Raylet,
        LogCategory::GcsServer,
        LogCategory::Internal,
        LogCategory::Autoscaler,
        LogCategory::Agent,
        LogCategory::Dashboard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogCategory::WorkerOut => "worker_out",
            LogCategory::WorkerErr => "worker_err",
            LogCategory::CoreWorker => "core_worker",
            LogCategory::Driver => "driver",
            LogCategory::Raylet => "raylet",
            LogCategory::GcsServer => "gcs_server",
            LogCategory::Internal => "internal",
            LogCategory::Autoscaler => "autoscaler",
            LogCategory::Agent => "agent",
            LogCategory::Dashboard => "dashboard",
        }
    }

    /// Classify a file name; the first matching rule wins
    pub fn classify(file_name: &str) -> Self {
        let contains = |s: &str| file_name.contains(s);
        let ends = |s: &str| file_name.ends_with(s);

        if contains("worker") && ends(".out") {
            LogCategory::WorkerOut
        } else if contains("worker") && ends(".err") {
            LogCategory::WorkerErr
        } else if contains("core-worker") && ends(".log") {
            LogCategory::CoreWorker
        } else if contains("core-driver") && ends(".log") {
            LogCategory::Driver
        } else if contains("raylet.") {
            LogCategory::Raylet
        } else if contains("gcs_server.") {
            LogCategory::GcsServer
        } else if contains("log_monitor") {
            LogCategory::Internal
        } else if contains("monitor") {
            LogCategory::Autoscaler
        } else if contains("agent.") {
            LogCategory::Agent
        } else if contains("dashboard.") {
            LogCategory::Dashboard
        } else {
            LogCategory::Internal
        }
    }
}

impl std::fmt::Display for LogCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Log files of one node grouped by category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogCategoryIndex {
    files: BTreeMap<LogCategory, Vec<String>>,
}

impl LogCategoryIndex {
    /// Bucket the given files, keeping their order within each category
    pub fn from_files<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut index = Self::default();
        for file in files {
            let file = file.into();
            index
                .files
                .entry(LogCategory::classify(&file))
                .or_default()
                .push(file);
        }
        index
    }

    pub fn get(&self, category: LogCategory) -> &[String] {
        self.files.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Non-empty categories with their files
    pub fn iter(&self) -> impl Iterator<Item = (LogCategory, &[String])> {
        self.files.iter().map(|(c, f)| (*c, f.as_slice()))
    }

    /// Worker stdout files followed by worker stderr files
    pub fn worker_files(&self) -> impl Iterator<Item = &String> {
        self.get(LogCategory::WorkerOut)
            .iter()
            .chain(self.get(LogCategory::WorkerErr))
    }

    pub fn total(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Worker log stream kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerLogExt {
    Out,
    Err,
}

/// Decomposed worker log file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerLogFilename {
    pub worker_id: String,
    pub job_id: String,
    pub pid: u32,
    pub ext: WorkerLogExt,
}

impl WorkerLogFilename {
    /// Parse a worker log file name, `None` if it does not follow the grammar
    pub fn parse(file_name: &str) -> Option<Self> {
        let caps = WORKER_LOG_REGEX.captures(file_name)?;
        let pid = caps[3].parse().ok()?;
        let ext = match &caps[4] {
            "out" => WorkerLogExt::Out,
            _ => WorkerLogExt::Err,
        };
        Some(Self {
            worker_id: caps[1].to_string(),
            job_id: caps[2].to_string(),
            pid,
            ext,
        })
    }
}

/// Where an actor currently lives
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorPlacement {
    pub worker_id: Option<String>,
    pub node_id: Option<String>,
}

/// One recorded attempt of a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEvent {
    pub attempt_number: u32,
    pub worker_id: Option<String>,
    pub node_id: Option<String>,
}

/// Submitted job as known by the job registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInfo {
    pub submission_id: String,
    pub driver_node_id: Option<String>,
}

/// Registered node agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub node_id: String,
    pub node_ip: String,
    pub alive: bool,
}
