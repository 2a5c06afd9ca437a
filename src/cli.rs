use std::path::PathBuf;

use clap::Parser;

/// Operational overrides. The host normally launches the worker with no
/// flags and the container-default paths; these exist for local runs and
/// the test harness.
#[derive(Debug, Default, Parser)]
#[command(name = "agentcell", version, about = "Sandboxed group-chat worker")]
pub(crate) struct Cli {
    /// Sandbox root the file tools are confined to.
    #[arg(long)]
    pub(crate) workspace_root: Option<PathBuf>,

    /// Mailbox directory the host drops message files into.
    #[arg(long)]
    pub(crate) mailbox_dir: Option<PathBuf>,

    /// Idle poll interval in milliseconds.
    #[arg(long)]
    pub(crate) poll_interval_ms: Option<u64>,

    /// Command line for the host companion (MCP over stdio).
    #[arg(long)]
    pub(crate) mcp_command: Option<String>,

    /// Maximum model/tool steps per turn.
    #[arg(long)]
    pub(crate) max_steps: Option<usize>,

    /// Write a JSONL transcript under the group folder.
    #[arg(long)]
    pub(crate) log: bool,
}
