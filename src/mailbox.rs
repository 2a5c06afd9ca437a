use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::MailboxMessage;

/// What the idle wait produced: either joined message text for the next
/// turn, or the close sentinel telling the worker to exit.
#[derive(Debug, PartialEq)]
pub(crate) enum PollOutcome {
    Input(String),
    Closed,
}

/// Filesystem mailbox shared with the host. The host writes `*.json`
/// message files; the worker reads and deletes them between turns. A
/// well-known sentinel file signals termination.
pub(crate) struct Mailbox {
    input_dir: PathBuf,
    close_sentinel: PathBuf,
    poll_interval: Duration,
}

impl Mailbox {
    pub(crate) fn new(input_dir: PathBuf, close_sentinel: PathBuf, poll_interval: Duration) -> Self {
        Mailbox {
            input_dir,
            close_sentinel,
            poll_interval,
        }
    }

    /// Block until the host supplies input or drops the close sentinel.
    /// The sentinel check always runs before the drain pass, so a pending
    /// close wins even when messages are waiting.
    pub(crate) fn wait_for_input(&self) -> PollOutcome {
        loop {
            if self.consume_close_sentinel() {
                return PollOutcome::Closed;
            }
            let texts = self.drain();
            if !texts.is_empty() {
                return PollOutcome::Input(texts.join("\n"));
            }
            thread::sleep(self.poll_interval);
        }
    }

    /// If the sentinel exists, delete it and report closure.
    pub(crate) fn consume_close_sentinel(&self) -> bool {
        if !self.close_sentinel.exists() {
            return false;
        }
        if let Err(e) = fs::remove_file(&self.close_sentinel) {
            eprintln!("[mailbox] failed to remove close sentinel: {e}");
        }
        true
    }

    /// One full drain pass: every `*.json` file currently present is read,
    /// deleted, and (when valid) collected, in filename order. Malformed
    /// entries are logged and discarded so they can never wedge the loop.
    pub(crate) fn drain(&self) -> Vec<String> {
        let entries = match fs::read_dir(&self.input_dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|x| x.to_str()) == Some("json"))
            .collect();
        files.sort_by_key(|p| p.file_name().map(|n| n.to_os_string()));

        let mut texts = Vec::new();
        for path in &files {
            match fs::read_to_string(path) {
                Ok(raw) => {
                    delete_entry(path);
                    match serde_json::from_str::<MailboxMessage>(&raw) {
                        Ok(msg) if msg.kind == "message" => {
                            if let Some(text) = msg.text {
                                texts.push(text);
                            } else {
                                eprintln!(
                                    "[mailbox] dropping message without text: {}",
                                    path.display()
                                );
                            }
                        }
                        Ok(msg) => {
                            eprintln!(
                                "[mailbox] ignoring entry with type '{}': {}",
                                msg.kind,
                                path.display()
                            );
                        }
                        Err(e) => {
                            eprintln!("[mailbox] unparsable entry {}: {e}", path.display());
                        }
                    }
                }
                Err(e) => {
                    // Treat as transient; still try to clear it so a broken
                    // file cannot block the session forever.
                    eprintln!("[mailbox] unreadable entry {}: {e}", path.display());
                    delete_entry(path);
                }
            }
        }
        texts
    }
}

fn delete_entry(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        eprintln!("[mailbox] failed to delete {}: {e}", path.display());
    }
}
