//! Error types for clusterlog

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// clusterlog error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Node unavailable: {0}")]
    NodeUnavailable(String),

    #[error("Remote call timed out: {0}")]
    RemoteTimeout(String),

    #[error("Agent error: {0}")]
    AgentError(String),

    #[error("Daemon not running")]
    DaemonNotRunning,

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("IPC error: {0}")]
    IpcError(String),

    #[error("IPC connection failed: {0}")]
    IpcConnectionFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// Result type alias for clusterlog
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error classification carried across the IPC boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequest,
    NotFound,
    NodeUnavailable,
    RemoteTimeout,
    Agent,
    Internal,
}

impl Error {
    pub fn invalid_request<S: Into<String>>(msg: S) -> Self {
        Error::InvalidRequest(msg.into())
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Error::NotFound(msg.into())
    }

    pub fn node_unavailable<S: Into<String>>(msg: S) -> Self {
        Error::NodeUnavailable(msg.into())
    }

    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Error::RemoteTimeout(msg.into())
    }

    pub fn agent<S: Into<String>>(msg: S) -> Self {
        Error::AgentError(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::ConfigError(msg.into())
    }

    pub fn ipc<S: Into<String>>(msg: S) -> Self {
        Error::IpcError(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::NodeUnavailable(_) => ErrorKind::NodeUnavailable,
            Error::RemoteTimeout(_) => ErrorKind::RemoteTimeout,
            Error::AgentError(_) => ErrorKind::Agent,
            _ => ErrorKind::Internal,
        }
    }

    /// Inner message without the variant prefix
    pub fn message(&self) -> String {
        match self {
            Error::InvalidRequest(m)
            | Error::NotFound(m)
            | Error::NodeUnavailable(m)
            | Error::RemoteTimeout(m)
            | Error::AgentError(m) => m.clone(),
            other => other.to_string(),
        }
    }

    /// Rebuild an error from its wire form
    pub fn from_kind(kind: ErrorKind, message: String) -> Self {
        match kind {
            ErrorKind::InvalidRequest => Error::InvalidRequest(message),
            ErrorKind::NotFound => Error::NotFound(message),
            ErrorKind::NodeUnavailable => Error::NodeUnavailable(message),
            ErrorKind::RemoteTimeout => Error::RemoteTimeout(message),
            ErrorKind::Agent => Error::AgentError(message),
            ErrorKind::Internal => Error::IpcError(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotFound("actor abc".to_string());
        assert_eq!(err.to_string(), "Not found: actor abc");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::IoError(_)));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_kind_survives_wire() {
        let err = Error::node_unavailable("node-1 is dead");
        let rebuilt = Error::from_kind(err.kind(), err.message());
        assert!(matches!(rebuilt, Error::NodeUnavailable(ref m) if m == "node-1 is dead"));
    }
}
