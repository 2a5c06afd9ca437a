use std::env;
use std::path::PathBuf;
use std::process::Command as ProcessCommand;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

pub(crate) fn env_required(name: &str) -> Result<String, String> {
    let value = env::var(name).unwrap_or_default();
    if value.trim().is_empty() {
        return Err(format!("Missing {name}"));
    }
    Ok(value)
}

pub(crate) fn env_optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

pub(crate) fn env_parse<T: FromStr>(name: &str, default: T) -> Result<T, String> {
    match env_optional(name) {
        Some(value) => value.parse::<T>().map_err(|_| format!("Invalid {name}")),
        None => Ok(default),
    }
}

pub(crate) fn env_bool(name: &str, default: bool) -> bool {
    match env_optional(name) {
        Some(value) => {
            let v = value.trim().to_ascii_lowercase();
            matches!(v.as_str(), "1" | "true" | "yes" | "y" | "on")
        }
        None => default,
    }
}

pub(crate) fn env_path(name: &str) -> Option<PathBuf> {
    env_optional(name).map(PathBuf::from)
}

/// Sub-second noise in [0, 1) used to spread out retry delays.
pub(crate) fn jitter_ratio() -> f64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos % 1000) as f64 / 1000.0
}

pub(crate) fn parse_retry_after(resp: &ureq::Response) -> Option<f64> {
    resp.header("retry-after")
        .and_then(|v| v.trim().parse::<f64>().ok())
}

pub(crate) fn command_wrapper() -> Option<Vec<String>> {
    env_optional("AGENTCELL_COMMAND_WRAPPER").map(|raw| {
        raw.split_whitespace()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
    })
}

pub(crate) fn build_external_command(program: &str, args: &[String]) -> ProcessCommand {
    let mut cmd = if let Some(wrapper) = command_wrapper() {
        let mut c = ProcessCommand::new(&wrapper[0]);
        c.args(&wrapper[1..]).arg(program).args(args);
        c
    } else {
        let mut c = ProcessCommand::new(program);
        c.args(args);
        c
    };

    // Process group isolation: the child becomes its own group leader so the
    // whole tree can be killed without touching the worker itself.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    cmd
}

/// Kill a child process and its entire process group.
/// On Unix, SIGTERM first for graceful shutdown, SIGKILL after 2 seconds.
#[cfg(unix)]
pub(crate) fn kill_process_tree(child: &mut std::process::Child) {
    let pid = child.id() as i32;
    unsafe {
        libc::kill(-pid, libc::SIGTERM);
    }
    std::thread::sleep(std::time::Duration::from_secs(2));
    match child.try_wait() {
        Ok(Some(_)) => {}
        _ => unsafe {
            libc::killpg(pid, libc::SIGKILL);
        },
    }
    let _ = child.wait();
}

#[cfg(not(unix))]
pub(crate) fn kill_process_tree(child: &mut std::process::Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Exit code value for subprocess results; reports the signal on Unix when
/// the process did not exit normally.
pub(crate) fn subprocess_exit_info(status: &std::process::ExitStatus) -> serde_json::Value {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(code) = status.code() {
            serde_json::json!(code)
        } else if let Some(sig) = status.signal() {
            serde_json::json!(format!("signal {sig}"))
        } else {
            serde_json::json!("unknown")
        }
    }
    #[cfg(not(unix))]
    {
        serde_json::json!(status.code())
    }
}

/// Primary output text for subprocess results, surfacing stderr on failure
/// so the model sees the full picture.
pub(crate) fn subprocess_output_text(stdout: &str, stderr: &str, is_error: bool) -> String {
    if is_error {
        let mut out = String::new();
        if !stdout.is_empty() {
            out.push_str(stdout);
        }
        if !stderr.is_empty() {
            if !out.is_empty() {
                out.push_str("\n--- stderr ---\n");
            }
            out.push_str(stderr);
        }
        if out.is_empty() {
            "Command failed with no output.".to_string()
        } else {
            out
        }
    } else if stdout.is_empty() && !stderr.is_empty() {
        // Some tools write informational output to stderr even on success
        stderr.to_string()
    } else if stdout.is_empty() {
        "Command executed.".to_string()
    } else {
        stdout.to_string()
    }
}
