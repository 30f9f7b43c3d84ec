//! Filesystem-backed node agent for tail and follow operations

use async_trait::async_trait;
use bytes::Bytes;
use clusterlog_core::{constants, ClusterConfig, Error, Result};
use futures::{stream, StreamExt};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::ports::{AgentClient, LogStream, StreamRequest};

/// Read granularity for tail scans and chunked delivery
const CHUNK_SIZE: usize = 64 * 1024;

/// Serves the log directories of the nodes hosted by this process
pub struct LocalAgent {
    log_dirs: HashMap<String, PathBuf>,
    default_interval: Duration,
}

impl LocalAgent {
    pub fn new() -> Self {
        Self {
            log_dirs: HashMap::new(),
            default_interval: Duration::from_millis(constants::DEFAULT_FOLLOW_INTERVAL_MS),
        }
    }

    pub fn from_config(config: &ClusterConfig) -> Self {
        let mut agent = Self::new().with_default_interval(config.default_interval());
        for node in &config.nodes {
            agent = agent.with_node(node.node_id.clone(), node.log_dir.clone());
        }
        agent
    }

    pub fn with_node(mut self, node_id: impl Into<String>, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dirs.insert(node_id.into(), log_dir.into());
        self
    }

    pub fn with_default_interval(mut self, interval: Duration) -> Self {
        self.default_interval = interval;
        self
    }

    fn log_dir(&self, node_id: &str) -> Result<&Path> {
        self.log_dirs
            .get(node_id)
            .map(PathBuf::as_path)
            .ok_or_else(|| Error::agent(format!("No agent serves node {}", node_id)))
    }
}

impl Default for LocalAgent {
    fn default() -> Self {
        Self::new()
    }
}

/// Join a relative file name onto the log dir, refusing anything that escapes it
fn safe_join(dir: &Path, file_name: &str) -> Result<PathBuf> {
    let relative = Path::new(file_name);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if file_name.is_empty() || escapes {
        return Err(Error::invalid_request(format!(
            "Log file name must be relative to the log directory: {}",
            file_name
        )));
    }
    Ok(dir.join(relative))
}

/// Files under `dir` matching `pattern`, as paths relative to `dir`
fn list_matching(dir: &Path, pattern: &str) -> Result<Vec<String>> {
    if pattern.split('/').any(|part| part == "..") || Path::new(pattern).is_absolute() {
        return Err(Error::invalid_request(format!("Invalid glob: {}", pattern)));
    }

    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let full = format!("{}/{}", escaped.trim_end_matches('/'), pattern);
    let entries =
        glob::glob(&full).map_err(|e| Error::invalid_request(format!("Invalid glob: {}", e)))?;

    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => {
                if let Ok(relative) = path.strip_prefix(dir) {
                    files.push(relative.to_string_lossy().into_owned());
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable log entry: {}", e),
        }
    }
    files.sort();
    Ok(files)
}

/// Byte offset where the last `n` lines of the file begin.
///
/// Scans backwards chunk by chunk; a trailing newline does not count
/// as the start of an empty last line.
fn tail_offset(file: &mut File, size: u64, n: usize) -> std::io::Result<u64> {
    if n == 0 {
        return Ok(size);
    }

    let mut position = size;
    let mut newlines = 0;
    let mut buffer = vec![0u8; CHUNK_SIZE];

    while position > 0 {
        let read_size = std::cmp::min(CHUNK_SIZE as u64, position);
        position -= read_size;

        file.seek(SeekFrom::Start(position))?;
        let chunk = &mut buffer[..read_size as usize];
        file.read_exact(chunk)?;

        for (i, byte) in chunk.iter().enumerate().rev() {
            let offset = position + i as u64;
            if *byte != b'\n' || offset + 1 == size {
                continue;
            }
            newlines += 1;
            if newlines == n {
                return Ok(offset + 1);
            }
        }
    }

    Ok(0)
}

/// Byte range holding the requested history: from the start of the last
/// `lines` lines (or the top of the file) to the current end.
fn history_bounds(path: &Path, lines: Option<usize>) -> Result<(u64, u64)> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();
    let start = match lines {
        Some(n) => tail_offset(&mut file, size, n)?,
        None => 0,
    };
    Ok((start, size))
}

/// At most one chunk of the file from `position`, never past `end`
fn read_range(path: &Path, position: u64, end: u64) -> Result<Vec<u8>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(position))?;
    let mut data = Vec::new();
    file.take(std::cmp::min(end.saturating_sub(position), CHUNK_SIZE as u64))
        .read_to_end(&mut data)?;
    Ok(data)
}

/// Bytes appended to the file since `position`, at most one chunk.
/// A file shorter than `position` was truncated and is re-read from the start.
fn read_appended(path: &Path, position: u64) -> Result<(Vec<u8>, u64)> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();
    let position = if size < position {
        debug!("{} was truncated, restarting from the top", path.display());
        0
    } else {
        position
    };
    if size == position {
        return Ok((Vec::new(), position));
    }

    file.seek(SeekFrom::Start(position))?;
    let mut data = Vec::new();
    file.take(std::cmp::min(size - position, CHUNK_SIZE as u64))
        .read_to_end(&mut data)?;
    let end = position + data.len() as u64;
    Ok((data, end))
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::agent(format!("Agent task failed: {}", e)))?
}

/// Deliver `start..end` one chunk per item, reading only when polled.
/// Ends early if the file shrinks underneath it.
fn history(path: PathBuf, start: u64, end: u64) -> LogStream {
    stream::unfold(Some(start), move |state| {
        let path = path.clone();
        async move {
            let position = state.filter(|p| *p < end)?;
            match blocking(move || read_range(&path, position, end)).await {
                Ok(data) if data.is_empty() => None,
                Ok(data) => {
                    let next = position + data.len() as u64;
                    Some((Ok(Bytes::from(data)), Some(next)))
                }
                Err(e) => Some((Err(e), None)),
            }
        }
    })
    .boxed()
}

/// Poll the file for appended bytes until the consumer goes away
fn follow(path: PathBuf, position: u64, interval: Duration) -> LogStream {
    stream::unfold(Some(position), move |state| {
        let path = path.clone();
        async move {
            let mut position = state?;
            loop {
                tokio::time::sleep(interval).await;
                let read_path = path.clone();
                match blocking(move || read_appended(&read_path, position)).await {
                    Ok((data, end)) if !data.is_empty() => {
                        return Some((Ok(Bytes::from(data)), Some(end)));
                    }
                    Ok((_, end)) => position = end,
                    Err(e) => return Some((Err(e), None)),
                }
            }
        }
    })
    .boxed()
}

#[async_trait]
impl AgentClient for LocalAgent {
    async fn list_files(&self, node_id: &str, glob: &str, _timeout: Duration) -> Result<Vec<String>> {
        let dir = self.log_dir(node_id)?.to_path_buf();
        let pattern = glob.to_string();
        blocking(move || list_matching(&dir, &pattern)).await
    }

    async fn open_stream(&self, node_id: &str, request: StreamRequest) -> Result<LogStream> {
        let path = safe_join(self.log_dir(node_id)?, &request.file_name)?;
        if !path.is_file() {
            return Err(Error::not_found(format!(
                "Log file {} does not exist on node {}",
                request.file_name, node_id
            )));
        }

        let bounds_path = path.clone();
        let lines = request.lines;
        let (start, end) = blocking(move || history_bounds(&bounds_path, lines)).await?;
        debug!(
            "Opened {} on {} ({} bytes of history)",
            request.file_name,
            node_id,
            end - start
        );

        let backlog = history(path.clone(), start, end);
        if !request.follow {
            return Ok(backlog);
        }

        let interval = request.interval.unwrap_or(self.default_interval);
        Ok(backlog.chain(follow(path, end, interval)).boxed())
    }
}
