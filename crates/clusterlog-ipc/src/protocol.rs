//! IPC Protocol - Request/Response types

use clusterlog_core::{
    Error, ErrorKind, GetLogOptions, LogCategoryIndex, NodeInfo, ResolvedLog,
    DEFAULT_LIST_GLOB,
};
use serde::{Deserialize, Serialize};

fn default_glob() -> String {
    DEFAULT_LIST_GLOB.to_string()
}

mod chunk_encoding {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

/// IPC Request from CLI to daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Check if daemon is alive
    Ping,

    /// List registered nodes
    Nodes,

    /// List and categorize log files on a node
    ListLogs {
        #[serde(default)]
        node_id: Option<String>,
        #[serde(default)]
        node_ip: Option<String>,
        #[serde(default = "default_glob")]
        glob: String,
        #[serde(default)]
        timeout_secs: Option<u64>,
    },

    /// Resolve log options to a file on a node
    ResolveFilename { options: GetLogOptions },

    /// Stream a log file; answered by chunks then an end or error frame
    StreamLogs { options: GetLogOptions },

    /// Look up the node id of an address
    IpToNodeId { node_ip: String },

    /// Mark a registered node alive or dead
    SetNodeAlive { node_id: String, alive: bool },
}

/// IPC Response from daemon to CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Ping response
    Pong,

    /// Error with its classification
    Error { kind: ErrorKind, message: String },

    /// Registered nodes
    Nodes { nodes: Vec<NodeInfo> },

    /// Categorized log files of one node
    Logs {
        node_id: String,
        index: LogCategoryIndex,
    },

    /// Resolved log file
    Resolved { log: ResolvedLog },

    /// Node id lookup result
    NodeId { node_id: Option<String> },

    /// Liveness of a node after an update
    NodeState { node_id: String, alive: bool },

    /// Piece of a streamed file (for streaming), base64 on the wire
    LogChunk {
        #[serde(with = "chunk_encoding")]
        data: Vec<u8>,
    },

    /// The streamed file ended
    StreamEnd,
}

impl Response {
    pub fn error(err: &Error) -> Self {
        Response::Error {
            kind: err.kind(),
            message: err.message(),
        }
    }

    /// Turn an error frame back into the error it carries
    pub fn into_result(self) -> Result<Response, Error> {
        match self {
            Response::Error { kind, message } => Err(Error::from_kind(kind, message)),
            other => Ok(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialize() {
        let req = Request::StreamLogs {
            options: GetLogOptions {
                actor_id: Some("actor-a".to_string()),
                ..Default::default()
            },
        };

        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("stream_logs"));
        assert!(json.contains("actor-a"));
    }

    #[test]
    fn test_list_request_defaults() {
        let parsed: Request =
            serde_json::from_str(r#"{"type":"list_logs","node_id":"node-1"}"#).unwrap();
        match parsed {
            Request::ListLogs {
                node_id,
                node_ip,
                glob,
                timeout_secs,
            } => {
                assert_eq!(node_id.as_deref(), Some("node-1"));
                assert!(node_ip.is_none());
                assert_eq!(glob, "*");
                assert!(timeout_secs.is_none());
            }
            _ => panic!("Wrong request type"),
        }
    }

    #[test]
    fn test_error_response_keeps_kind() {
        let resp = Response::error(&Error::not_found("no such task"));
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("not_found"));

        let parsed: Response = serde_json::from_str(&json).unwrap();
        let err = parsed.into_result().unwrap_err();
        assert!(matches!(err, Error::NotFound(ref m) if m == "no such task"));
    }

    #[test]
    fn test_logs_response_serialize() {
        let resp = Response::Logs {
            node_id: "node-1".to_string(),
            index: LogCategoryIndex::from_files(["raylet.out", "worker-a-b-1.err"]),
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"type\":\"logs\""));
        assert!(json.contains("worker_err"));

        let parsed: Response = serde_json::from_str(&json).unwrap();
        match parsed {
            Response::Logs { index, .. } => assert_eq!(index.total(), 2),
            _ => panic!("Wrong response type"),
        }
    }

    #[test]
    fn test_log_chunk_is_base64_text() {
        let data = vec![0xff, 0xfe, b'\n', 0x00, 0xe2, 0x82];
        let json = serde_json::to_string(&Response::LogChunk { data: data.clone() }).unwrap();
        assert_eq!(json, r#"{"type":"log_chunk","data":"//4KAOKC"}"#);

        match serde_json::from_str::<Response>(&json).unwrap() {
            Response::LogChunk { data: parsed } => assert_eq!(parsed, data),
            _ => panic!("Wrong response type"),
        }

        let bad = serde_json::from_str::<Response>(r#"{"type":"log_chunk","data":"@@"}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_set_node_alive_request() {
        let parsed: Request = serde_json::from_str(
            r#"{"type":"set_node_alive","node_id":"node-1","alive":false}"#,
        )
        .unwrap();
        assert!(matches!(
            parsed,
            Request::SetNodeAlive { ref node_id, alive: false } if node_id == "node-1"
        ));
    }

    #[test]
    fn test_non_error_passes_through() {
        let resp = Response::StreamEnd.into_result().unwrap();
        assert!(matches!(resp, Response::StreamEnd));
    }
}
