use std::path::PathBuf;
use std::time::Duration;

use crate::{env_bool, env_optional, env_path, Cli};

pub(crate) const DEFAULT_WORKSPACE_ROOT: &str = "/workspace";
pub(crate) const DEFAULT_MCP_COMMAND: &str = "host-mcp";
pub(crate) const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub(crate) const DEFAULT_MAX_STEPS: usize = 40;

/// Everything the worker needs to know about its surroundings, resolved
/// once at startup. Precedence: CLI flag, then AGENTCELL_* env, then the
/// container default.
#[derive(Debug, Clone)]
pub(crate) struct WorkerConfig {
    pub(crate) sandbox_root: PathBuf,
    pub(crate) group_dir: PathBuf,
    pub(crate) mailbox_dir: PathBuf,
    pub(crate) close_sentinel: PathBuf,
    pub(crate) global_instructions: PathBuf,
    pub(crate) group_instructions: PathBuf,
    pub(crate) poll_interval: Duration,
    pub(crate) mcp_command: String,
    pub(crate) max_steps: usize,
    pub(crate) log_transcript: bool,
}

impl WorkerConfig {
    pub(crate) fn resolve(cli: &Cli) -> Self {
        let sandbox_root = cli
            .workspace_root
            .clone()
            .or_else(|| env_path("AGENTCELL_WORKSPACE"))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_WORKSPACE_ROOT));
        let group_dir = sandbox_root.join("group");
        let ipc_dir = sandbox_root.join("ipc");
        let mailbox_dir = cli
            .mailbox_dir
            .clone()
            .or_else(|| env_path("AGENTCELL_MAILBOX_DIR"))
            .unwrap_or_else(|| ipc_dir.join("input"));
        let poll_interval_ms = cli
            .poll_interval_ms
            .or_else(|| {
                env_optional("AGENTCELL_POLL_INTERVAL_MS").and_then(|v| v.parse().ok())
            })
            .unwrap_or(DEFAULT_POLL_INTERVAL_MS);
        let mcp_command = cli
            .mcp_command
            .clone()
            .or_else(|| env_optional("AGENTCELL_MCP_COMMAND"))
            .unwrap_or_else(|| DEFAULT_MCP_COMMAND.to_string());
        let max_steps = cli
            .max_steps
            .or_else(|| env_optional("AGENTCELL_MAX_STEPS").and_then(|v| v.parse().ok()))
            .unwrap_or(DEFAULT_MAX_STEPS);

        WorkerConfig {
            close_sentinel: ipc_dir.join("close"),
            global_instructions: sandbox_root.join("instructions.md"),
            group_instructions: group_dir.join("instructions.md"),
            group_dir,
            mailbox_dir,
            poll_interval: Duration::from_millis(poll_interval_ms),
            mcp_command,
            max_steps,
            log_transcript: cli.log || env_bool("AGENTCELL_LOG", false),
            sandbox_root,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_derive_from_workspace_root() {
        let config = WorkerConfig::resolve(&Cli::default());
        assert_eq!(config.sandbox_root, PathBuf::from("/workspace"));
        assert_eq!(config.group_dir, PathBuf::from("/workspace/group"));
        assert_eq!(config.mailbox_dir, PathBuf::from("/workspace/ipc/input"));
        assert_eq!(config.close_sentinel, PathBuf::from("/workspace/ipc/close"));
        assert_eq!(
            config.global_instructions,
            PathBuf::from("/workspace/instructions.md")
        );
        assert_eq!(
            config.group_instructions,
            PathBuf::from("/workspace/group/instructions.md")
        );
        assert_eq!(config.poll_interval, Duration::from_millis(1000));
        assert_eq!(config.max_steps, DEFAULT_MAX_STEPS);
    }

    #[test]
    fn cli_flags_override_defaults() {
        let cli = Cli {
            workspace_root: Some(PathBuf::from("/tmp/sbx")),
            mailbox_dir: Some(PathBuf::from("/tmp/mbox")),
            poll_interval_ms: Some(50),
            mcp_command: Some("fake-mcp --stdio".to_string()),
            max_steps: Some(3),
            log: true,
        };
        let config = WorkerConfig::resolve(&cli);
        assert_eq!(config.sandbox_root, PathBuf::from("/tmp/sbx"));
        assert_eq!(config.group_dir, PathBuf::from("/tmp/sbx/group"));
        assert_eq!(config.mailbox_dir, PathBuf::from("/tmp/mbox"));
        assert_eq!(config.poll_interval, Duration::from_millis(50));
        assert_eq!(config.mcp_command, "fake-mcp --stdio");
        assert_eq!(config.max_steps, 3);
        assert!(config.log_transcript);
    }
}
