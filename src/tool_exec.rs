use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;

use walkdir::WalkDir;

use crate::{
    build_external_command, subprocess_exit_info, subprocess_output_text, ToolExecArgs,
    ToolExecution, ToolFsListArgs, ToolFsReadArgs, ToolFsWriteArgs,
};

/// Fold `.` and `..` components without touching the filesystem, so paths
/// to files that do not exist yet can still be checked for containment.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Popping past the filesystem root is a no-op ("/.." is "/");
                // the containment check below rejects anything that escaped.
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Resolve a tool-supplied path: relative paths land in the group folder,
/// absolute paths are taken as given, and the result must stay inside the
/// sandbox root. Violations are errors, never panics.
pub(crate) fn resolve_sandbox_path(
    raw: &str,
    group_dir: &Path,
    sandbox_root: &Path,
) -> Result<PathBuf, String> {
    if raw.trim().is_empty() {
        return Err("path is empty".to_string());
    }
    let candidate = Path::new(raw);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        group_dir.join(candidate)
    };
    let resolved = normalize_lexically(&joined);
    if !resolved.starts_with(sandbox_root) {
        return Err(format!(
            "path '{raw}' escapes the sandbox root {}",
            sandbox_root.display()
        ));
    }
    Ok(resolved)
}

/// Execute one local gateway tool. Argument errors and tool failures come
/// back as `Err(String)`; the engine converts them into error results for
/// the model instead of crashing the worker.
pub(crate) fn execute_tool(
    name: &str,
    args: serde_json::Value,
    group_dir: &Path,
    sandbox_root: &Path,
) -> Result<ToolExecution, String> {
    match name {
        "exec" => {
            let parsed: ToolExecArgs =
                serde_json::from_value(args).map_err(|e| format!("args: {e}"))?;
            let cwd = match parsed.cwd {
                Some(ref dir) => resolve_sandbox_path(dir, group_dir, sandbox_root)?,
                None => group_dir.to_path_buf(),
            };
            let command = vec!["-c".to_string(), parsed.command];
            let mut cmd = build_external_command("sh", &command);
            cmd.current_dir(&cwd)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
            let output = cmd.output().map_err(|e| format!("exec spawn: {e}"))?;
            let stdout = String::from_utf8_lossy(&output.stdout).to_string();
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            let is_error = !output.status.success();
            Ok(ToolExecution {
                output: subprocess_output_text(&stdout, &stderr, is_error),
                details: serde_json::json!({
                    "exit_code": subprocess_exit_info(&output.status),
                    "stdout": stdout,
                    "stderr": stderr
                }),
                is_error,
            })
        }
        "fs_read" => {
            let parsed: ToolFsReadArgs =
                serde_json::from_value(args).map_err(|e| format!("args: {e}"))?;
            let resolved = resolve_sandbox_path(&parsed.path, group_dir, sandbox_root)?;
            let max_bytes = parsed.max_bytes.unwrap_or(200_000);
            let file = fs::File::open(&resolved).map_err(|e| format!("fs_read: {e}"))?;
            let mut buf = Vec::new();
            file.take(max_bytes as u64)
                .read_to_end(&mut buf)
                .map_err(|e| format!("fs_read: {e}"))?;
            Ok(ToolExecution {
                output: String::from_utf8_lossy(&buf).to_string(),
                details: serde_json::json!({
                    "path": resolved.display().to_string(),
                    "bytes": buf.len()
                }),
                is_error: false,
            })
        }
        "fs_write" => {
            let parsed: ToolFsWriteArgs =
                serde_json::from_value(args).map_err(|e| format!("args: {e}"))?;
            let resolved = resolve_sandbox_path(&parsed.path, group_dir, sandbox_root)?;
            if let Some(parent) = resolved.parent() {
                fs::create_dir_all(parent).map_err(|e| format!("fs_write mkdir: {e}"))?;
            }
            if parsed.append.unwrap_or(false) {
                use std::io::Write;
                let mut file = fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&resolved)
                    .map_err(|e| format!("fs_write: {e}"))?;
                file.write_all(parsed.text.as_bytes())
                    .map_err(|e| format!("fs_write: {e}"))?;
            } else {
                fs::write(&resolved, parsed.text.as_bytes()).map_err(|e| format!("fs_write: {e}"))?;
            }
            Ok(ToolExecution {
                output: format!("Wrote {} bytes.", parsed.text.len()),
                details: serde_json::json!({ "path": resolved.display().to_string() }),
                is_error: false,
            })
        }
        "fs_list" => {
            let parsed: ToolFsListArgs =
                serde_json::from_value(args).map_err(|e| format!("args: {e}"))?;
            let resolved = resolve_sandbox_path(&parsed.path, group_dir, sandbox_root)?;
            let max_entries = parsed.max_entries.unwrap_or(200);
            let mut items = Vec::new();
            if parsed.recursive.unwrap_or(false) {
                for entry in WalkDir::new(&resolved).max_depth(6) {
                    let entry = entry.map_err(|e| format!("fs_list: {e}"))?;
                    if items.len() >= max_entries {
                        break;
                    }
                    items.push(entry.path().display().to_string());
                }
            } else if resolved.is_dir() {
                for entry in fs::read_dir(&resolved).map_err(|e| format!("fs_list: {e}"))? {
                    let entry = entry.map_err(|e| format!("fs_list: {e}"))?;
                    items.push(entry.path().display().to_string());
                    if items.len() >= max_entries {
                        break;
                    }
                }
            } else if resolved.exists() {
                items.push(resolved.display().to_string());
            } else {
                return Err(format!("fs_list: no such path: {}", resolved.display()));
            }
            items.sort();
            Ok(ToolExecution {
                output: items.join("\n"),
                details: serde_json::json!({ "entries": items }),
                is_error: false,
            })
        }
        other => Err(format!("unknown tool '{other}'")),
    }
}
