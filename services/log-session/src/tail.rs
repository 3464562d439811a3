//! Poll-based tailer for the log files this session server exposes.
//!
//! The original `LogSession` attaches to a live `DebugStream`/`LogAgregator`
//! object and receives lines via a signal callback the moment they are
//! written. No such in-process log object exists in this workspace, so the
//! Rust rendition re-reads each configured file's growth on a timer instead
//! — functionally equivalent for a peer watching the stream, at the cost of
//! `tail_poll_interval` of added latency.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};

#[derive(Debug, Clone)]
pub struct LogFileConfig {
    pub name: String,
    pub path: PathBuf,
}

/// Tracks one offset per configured file and reports newly appended,
/// complete lines on each `poll`. A file that shrinks (rotated out from
/// under us) is retailed from the start.
pub struct LogTailer {
    logs: Vec<LogFileConfig>,
    offsets: HashMap<String, u64>,
}

impl LogTailer {
    pub fn new(logs: Vec<LogFileConfig>) -> Self {
        let offsets = logs.iter().map(|l| (l.name.clone(), 0)).collect();
        Self { logs, offsets }
    }

    pub fn names(&self) -> Vec<String> {
        self.logs.iter().map(|l| l.name.clone()).collect()
    }

    /// Reads every tailed file's growth since the last poll, returning
    /// complete lines prefixed with the owning log's name. A trailing
    /// partial line (no newline yet) is left for the next poll.
    pub async fn poll(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        for log in &self.logs {
            let offset = self.offsets.get(&log.name).copied().unwrap_or(0);
            match read_growth(&log.path, offset).await {
                Ok((text, new_offset)) => {
                    self.offsets.insert(log.name.clone(), new_offset);
                    for line in text.lines() {
                        out.push(format!("[{}] {line}", log.name));
                    }
                }
                Err(err) => {
                    tracing::warn!(log = %log.name, path = %log.path.display(), error = %err, "log-session: failed to tail log file");
                }
            }
        }
        out
    }
}

async fn read_growth(path: &Path, offset: u64) -> std::io::Result<(String, u64)> {
    let mut file = tokio::fs::File::open(path).await?;
    let len = file.metadata().await?.len();
    let start = if len < offset { 0 } else { offset };
    file.seek(SeekFrom::Start(start)).await?;
    let mut buf = String::new();
    file.read_to_string(&mut buf).await?;
    let new_offset = match buf.rfind('\n') {
        Some(last_nl) => {
            let keep = last_nl + 1;
            let consumed = start + keep as u64;
            buf.truncate(keep);
            consumed
        }
        None => {
            buf.clear();
            start
        }
    };
    Ok((buf, new_offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn poll_reports_complete_lines_and_holds_back_partial_ones() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        {
            let mut f = std::fs::File::create(&path).unwrap();
            writeln!(f, "first").unwrap();
            write!(f, "partial").unwrap();
        }
        let mut tailer = LogTailer::new(vec![LogFileConfig { name: "a".into(), path: path.clone() }]);
        let lines = tailer.poll().await;
        assert_eq!(lines, vec!["[a] first".to_string()]);

        {
            let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
            writeln!(f, " rest").unwrap();
        }
        let lines = tailer.poll().await;
        assert_eq!(lines, vec!["[a] partial rest".to_string()]);
    }

    #[tokio::test]
    async fn poll_is_empty_when_nothing_new_was_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.log");
        std::fs::write(&path, "one line\n").unwrap();
        let mut tailer = LogTailer::new(vec![LogFileConfig { name: "b".into(), path }]);
        assert_eq!(tailer.poll().await.len(), 1);
        assert!(tailer.poll().await.is_empty());
    }

    #[tokio::test]
    async fn names_lists_every_configured_log() {
        let tailer = LogTailer::new(vec![
            LogFileConfig { name: "a".into(), path: PathBuf::from("/dev/null") },
            LogFileConfig { name: "b".into(), path: PathBuf::from("/dev/null") },
        ]);
        assert_eq!(tailer.names(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn missing_file_is_logged_and_skipped_not_panicking() {
        let mut tailer = LogTailer::new(vec![LogFileConfig { name: "missing".into(), path: PathBuf::from("/does/not/exist") }]);
        assert!(tailer.poll().await.is_empty());
    }
}
