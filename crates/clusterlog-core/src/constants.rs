//! Constants and default values for clusterlog

use std::path::PathBuf;

/// Default clusterlog home directory name
pub const CLUSTERLOG_DIR: &str = ".clusterlog";

/// Default socket file name
pub const SOCKET_FILE: &str = "daemon.sock";

/// Default config file names to search for (in priority order)
pub const CONFIG_FILES: &[&str] = &[
    "clusterlog.toml",
    "clusterlog.yaml",
    "clusterlog.yml",
    "clusterlog.json",
];

/// Default timeout for remote calls in seconds
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 30;

/// Default number of history lines returned by a log read
pub const DEFAULT_LOG_LINES: usize = 1000;

/// Default polling interval of a following agent in milliseconds
pub const DEFAULT_FOLLOW_INTERVAL_MS: u64 = 500;

/// Default suffix used when resolving worker logs
pub const DEFAULT_LOG_SUFFIX: &str = "out";

/// Default glob for listing
pub const DEFAULT_LIST_GLOB: &str = "*";

/// Per-submission driver log file name
pub const JOB_LOGS_PATH_TEMPLATE: &str = "job-driver-{submission_id}.log";

/// Expand the driver log template for a submission id
pub fn job_log_filename(submission_id: &str) -> String {
    JOB_LOGS_PATH_TEMPLATE.replace("{submission_id}", submission_id)
}

/// Get the clusterlog home directory
pub fn clusterlog_home() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(CLUSTERLOG_DIR))
        .unwrap_or_else(|| PathBuf::from(CLUSTERLOG_DIR))
}

/// Get the socket path
pub fn socket_path() -> PathBuf {
    clusterlog_home().join(SOCKET_FILE)
}
