use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::AgentLogEntry;

pub(crate) fn log_dir_path(group_dir: &Path) -> PathBuf {
    group_dir.join("logs")
}

/// Best-effort JSONL transcript under the group folder, one file per day.
/// Disabled by default; write failures are logged and swallowed so the
/// transcript can never take a turn down with it.
pub(crate) struct TranscriptLog {
    dir: PathBuf,
    enabled: bool,
}

impl TranscriptLog {
    pub(crate) fn new(group_dir: &Path, enabled: bool) -> Self {
        TranscriptLog {
            dir: log_dir_path(group_dir),
            enabled,
        }
    }

    pub(crate) fn append(
        &self,
        session: &str,
        role: &str,
        text: &str,
        meta: Option<serde_json::Value>,
    ) {
        if !self.enabled {
            return;
        }
        let entry = AgentLogEntry {
            session: Some(session.to_string()),
            role: role.to_string(),
            text: text.to_string(),
            meta,
            ts_utc: Some(Utc::now().timestamp()),
        };
        if let Err(e) = append_log_jsonl(&self.dir, &entry) {
            eprintln!("[log] failed to write transcript: {e}");
        }
    }
}

fn append_log_jsonl(log_dir: &Path, entry: &AgentLogEntry) -> Result<(), String> {
    fs::create_dir_all(log_dir).map_err(|e| e.to_string())?;
    let filename = format!("agent-{}.jsonl", Utc::now().format("%Y-%m-%d"));
    let path = log_dir.join(filename);
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| e.to_string())?;
    let json = serde_json::to_string(entry).map_err(|e| e.to_string())?;
    writeln!(file, "{json}").map_err(|e| e.to_string())?;
    Ok(())
}
