// Module declarations
mod agent_log;
mod claude;
mod cli;
mod config;
mod engine;
mod instructions;
mod mailbox;
mod mcp;
mod protocol;
mod session;
mod tool_args;
mod tool_defs;
mod tool_exec;
mod types;
mod util;

// Re-export module items at crate root so cross-module references share a
// single namespace.
#[allow(unused_imports)]
pub(crate) use agent_log::*;
#[allow(unused_imports)]
pub(crate) use cli::*;
#[allow(unused_imports)]
pub(crate) use config::*;
#[allow(unused_imports)]
pub(crate) use engine::*;
#[allow(unused_imports)]
pub(crate) use instructions::*;
#[allow(unused_imports)]
pub(crate) use mailbox::*;
#[allow(unused_imports)]
pub(crate) use mcp::*;
#[allow(unused_imports)]
pub(crate) use session::*;
#[allow(unused_imports)]
pub(crate) use tool_args::*;
#[allow(unused_imports)]
pub(crate) use tool_defs::*;
#[allow(unused_imports)]
pub(crate) use types::*;
#[allow(unused_imports)]
pub(crate) use util::*;

use std::io;
use std::process::ExitCode;

use clap::Parser;

use crate::protocol::{emit_fatal, read_container_input};

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("[agentcell] fatal: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let config = WorkerConfig::resolve(cli);

    // Startup contract: one ContainerInput JSON document on stdin.
    // Anything malformed is framed as an error block before exiting so the
    // host sees a parseable failure instead of silence.
    let input = match read_container_input(&mut io::stdin().lock()) {
        Ok(input) => input,
        Err(err) => {
            emit_fatal(err.clone());
            return Err(err);
        }
    };
    eprintln!(
        "[agentcell] starting for chat {} (main: {}, scheduled: {})",
        input.chat_jid, input.is_main, input.is_scheduled_task
    );

    let system_prompt =
        assemble_instructions(&config.global_instructions, &config.group_instructions);

    // The worker cannot serve a single turn without its toolset, so a
    // bridge failure here is a startup error, not a turn error.
    let bridge_env = BridgeEnv {
        chat_jid: input.chat_jid.clone(),
        group_folder: input.group_folder.clone(),
        is_main: input.is_main,
    };
    let bridge = match HostBridge::start(&config.mcp_command, &bridge_env) {
        Ok(bridge) => bridge,
        Err(err) => {
            emit_fatal(err.clone());
            return Err(err);
        }
    };

    let log = TranscriptLog::new(&config.group_dir, config.log_transcript);
    let engine = ClaudeEngine::new(
        system_prompt,
        bridge,
        config.group_dir.clone(),
        config.sandbox_root.clone(),
        config.max_steps,
        log,
    );
    let mut controller = SessionController::new(engine, input.session_id.clone());
    let mailbox = Mailbox::new(
        config.mailbox_dir.clone(),
        config.close_sentinel.clone(),
        config.poll_interval,
    );

    let prompt = scheduled_prompt(&input.prompt, input.is_scheduled_task);
    let mut stdout = io::stdout();
    controller.run_loop(prompt, &mailbox, &mut stdout)
}
