use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Stdio};
use std::thread;
use std::time::Duration;

use crate::{build_external_command, kill_process_tree, ToolExecution};

/// Namespace tag for tools advertised by the host companion, so they can
/// never collide with the local gateway tools.
pub(crate) const MCP_TOOL_PREFIX: &str = "mcp__host__";

/// Conversation identity handed to the companion process as environment.
pub(crate) struct BridgeEnv {
    pub(crate) chat_jid: String,
    pub(crate) group_folder: String,
    pub(crate) is_main: bool,
}

/// Long-lived companion process speaking MCP-style JSON-RPC over stdio
/// with Content-Length framing. Spawned once at startup; any failure to
/// connect or list tools aborts session construction.
pub(crate) struct HostBridge {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: i64,
    tools: Vec<serde_json::Value>,
}

impl HostBridge {
    pub(crate) fn start(command: &str, env: &BridgeEnv) -> Result<Self, String> {
        let cmd_parts =
            shlex::split(command).ok_or_else(|| format!("bridge: malformed command '{command}'"))?;
        if cmd_parts.is_empty() {
            return Err("bridge: empty command".to_string());
        }

        let mut cmd = build_external_command(&cmd_parts[0], &cmd_parts[1..]);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("CHAT_JID", &env.chat_jid)
            .env("GROUP_FOLDER", &env.group_folder)
            .env("IS_MAIN", if env.is_main { "true" } else { "false" });

        let mut child = cmd.spawn().map_err(|e| format!("bridge spawn: {e}"))?;
        let stdin = child.stdin.take().ok_or("bridge: no stdin")?;
        let stdout = child.stdout.take().ok_or("bridge: no stdout")?;
        let reader = BufReader::new(stdout);

        // Drain companion stderr in the background to avoid pipe deadlock
        // and keep its diagnostics visible in ours.
        if let Some(stderr) = child.stderr.take() {
            thread::spawn(move || {
                let reader = BufReader::new(stderr);
                for line in reader.lines().map_while(Result::ok) {
                    eprintln!("[mcp:host:stderr] {line}");
                }
            });
        }

        let mut bridge = HostBridge {
            child,
            stdin,
            reader,
            next_id: 1,
            tools: Vec::new(),
        };

        // On handshake failure the bridge is dropped here, which tears the
        // companion down.
        bridge.handshake()?;
        Ok(bridge)
    }

    fn handshake(&mut self) -> Result<(), String> {
        let init_id = self.next_id;
        self.send_msg(&serde_json::json!({
            "jsonrpc": "2.0", "id": init_id, "method": "initialize",
            "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": { "name": "agentcell", "version": env!("CARGO_PKG_VERSION") }
            }
        }))?;
        self.next_id += 1;

        let init_resp = self.read_response(init_id)?;
        if let Some(err) = init_resp.get("error") {
            let msg = err.get("message").and_then(|m| m.as_str()).unwrap_or("unknown");
            return Err(format!("bridge initialize failed: {msg}"));
        }

        self.send_msg(&serde_json::json!({
            "jsonrpc": "2.0", "method": "notifications/initialized"
        }))?;

        let list_id = self.next_id;
        self.send_msg(&serde_json::json!({
            "jsonrpc": "2.0", "id": list_id, "method": "tools/list"
        }))?;
        self.next_id += 1;

        let list_resp = self.read_response(list_id)?;
        if let Some(err) = list_resp.get("error") {
            let msg = err.get("message").and_then(|m| m.as_str()).unwrap_or("unknown");
            return Err(format!("bridge tools/list failed: {msg}"));
        }
        let tools = list_resp
            .get("result")
            .and_then(|r| r.get("tools"))
            .and_then(|t| t.as_array())
            .ok_or("bridge tools/list: missing tools array")?;
        self.tools = tools.clone();
        eprintln!("[mcp] discovered {} host tools", self.tools.len());
        Ok(())
    }

    /// Prefixed catalog entries for the engine. The companion's own schemas
    /// are not trusted ahead of time; every bridged tool takes an open
    /// object and forwards it verbatim.
    pub(crate) fn tool_definitions(&self) -> Vec<serde_json::Value> {
        prefixed_tool_definitions(&self.tools)
    }

    /// Forward one tools/call to the companion and map its raw result.
    pub(crate) fn call_tool(
        &mut self,
        prefixed_name: &str,
        args: serde_json::Value,
    ) -> Result<ToolExecution, String> {
        let original = prefixed_name
            .strip_prefix(MCP_TOOL_PREFIX)
            .ok_or_else(|| format!("bridge: unknown tool '{prefixed_name}'"))?;

        let call_id = self.next_id;
        self.send_msg(&serde_json::json!({
            "jsonrpc": "2.0", "id": call_id, "method": "tools/call",
            "params": { "name": original, "arguments": args }
        }))?;
        self.next_id += 1;

        let resp = self.read_response(call_id)?;
        if let Some(err) = resp.get("error") {
            let msg = err.get("message").and_then(|m| m.as_str()).unwrap_or("unknown");
            let code = err.get("code").and_then(|c| c.as_i64()).unwrap_or(0);
            return Err(format!("bridge tool '{original}' error {code}: {msg}"));
        }
        let result = resp
            .get("result")
            .cloned()
            .ok_or_else(|| format!("bridge tool '{original}': response missing result"))?;
        let is_error = result
            .get("isError")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        Ok(ToolExecution {
            output: extract_content_text(&result),
            details: result,
            is_error,
        })
    }

    /// Read the response for `expected_id`, skipping id-less notifications.
    fn read_response(&mut self, expected_id: i64) -> Result<serde_json::Value, String> {
        loop {
            let msg = self.read_msg()?;
            match msg.get("id").and_then(|v| v.as_i64()) {
                None => {
                    let method = msg.get("method").and_then(|m| m.as_str()).unwrap_or("unknown");
                    eprintln!("[mcp] skipping notification: {method}");
                }
                Some(id) if id == expected_id => return Ok(msg),
                Some(id) => {
                    return Err(format!(
                        "bridge: response id mismatch (expected {expected_id}, got {id})"
                    ))
                }
            }
        }
    }

    fn send_msg(&mut self, msg: &serde_json::Value) -> Result<(), String> {
        let body = serde_json::to_string(msg).map_err(|e| e.to_string())?;
        write!(self.stdin, "Content-Length: {}\r\n\r\n{}", body.len(), body)
            .map_err(|e| format!("bridge write: {e}"))?;
        self.stdin.flush().map_err(|e| format!("bridge flush: {e}"))?;
        Ok(())
    }

    fn read_msg(&mut self) -> Result<serde_json::Value, String> {
        let mut content_length: Option<usize> = None;
        loop {
            let mut line = String::new();
            let bytes_read = self
                .reader
                .read_line(&mut line)
                .map_err(|e| format!("bridge read: {e}"))?;
            if bytes_read == 0 {
                return Err("bridge: companion closed the connection".to_string());
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                if content_length.is_some() {
                    break;
                }
                continue;
            }
            if let Some(len_str) = trimmed.strip_prefix("Content-Length:") {
                content_length = Some(
                    len_str
                        .trim()
                        .parse()
                        .map_err(|e| format!("bridge bad content-length: {e}"))?,
                );
            }
        }
        let len = content_length.ok_or("bridge: missing Content-Length")?;
        if len > 10 * 1024 * 1024 {
            return Err(format!("bridge: response too large ({len} bytes)"));
        }
        let mut body = vec![0u8; len];
        self.reader
            .read_exact(&mut body)
            .map_err(|e| format!("bridge read body: {e}"))?;
        serde_json::from_slice(&body).map_err(|e| format!("bridge parse: {e}"))
    }

    fn shutdown(&mut self) {
        let _ = self.send_msg(&serde_json::json!({
            "jsonrpc": "2.0", "id": self.next_id, "method": "shutdown"
        }));
        thread::sleep(Duration::from_millis(200));
        kill_process_tree(&mut self.child);
    }
}

impl Drop for HostBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Build catalog entries for advertised tools: prefixed name, carried
/// description, open pass-through argument schema.
pub(crate) fn prefixed_tool_definitions(tools: &[serde_json::Value]) -> Vec<serde_json::Value> {
    let mut defs = Vec::new();
    for tool in tools {
        let Some(name) = tool.get("name").and_then(|v| v.as_str()) else {
            continue;
        };
        let description = tool.get("description").and_then(|v| v.as_str()).unwrap_or("");
        defs.push(serde_json::json!({
            "name": format!("{MCP_TOOL_PREFIX}{name}"),
            "description": format!("[host] {description}"),
            "inputSchema": { "type": "object", "additionalProperties": true }
        }));
    }
    defs
}

/// Join the text parts of an MCP result's content array; fall back to the
/// raw JSON so the model always sees something.
pub(crate) fn extract_content_text(result: &serde_json::Value) -> String {
    match result.get("content").and_then(|c| c.as_array()) {
        Some(arr) => {
            let text_parts: Vec<&str> = arr
                .iter()
                .filter_map(|item| item.get("text").and_then(|t| t.as_str()))
                .collect();
            if text_parts.is_empty() {
                serde_json::to_string_pretty(result).unwrap_or_default()
            } else {
                text_parts.join("\n")
            }
        }
        None => serde_json::to_string_pretty(result).unwrap_or_default(),
    }
}
