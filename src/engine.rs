use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::claude::call_model;
use crate::tool_exec::execute_tool;
use crate::{
    tool_definitions_json, ActionNotice, AgentMessage, AgentToolCall, HostBridge, ModelRequest,
    ToolExecution, TranscriptLog, TurnEvent, MCP_TOOL_PREFIX,
};

// Tool outputs above this size get trimmed before entering the history.
const MAX_TOOL_OUTPUT_CHARS: usize = 8000;

/// The reasoning engine as the turn controller sees it: submit one user
/// turn, get back the finite event sequence for that turn. Everything else
/// (planning, tool-call selection, conversational memory) is the engine's
/// own business.
pub(crate) trait ReasoningEngine {
    fn submit_turn(&mut self, session_id: &str, text: &str) -> Result<Vec<TurnEvent>, String>;
}

/// Production engine: per-session message histories and a model/tool step
/// loop over the Messages API. Histories live for the process lifetime
/// only; the session id is just the key.
pub(crate) struct ClaudeEngine {
    system_prompt: String,
    bridge: HostBridge,
    catalog: Vec<serde_json::Value>,
    sessions: HashMap<String, Vec<AgentMessage>>,
    group_dir: PathBuf,
    sandbox_root: PathBuf,
    max_steps: usize,
    log: TranscriptLog,
}

impl ClaudeEngine {
    pub(crate) fn new(
        system_prompt: String,
        bridge: HostBridge,
        group_dir: PathBuf,
        sandbox_root: PathBuf,
        max_steps: usize,
        log: TranscriptLog,
    ) -> Self {
        let mut catalog = tool_definitions_json();
        catalog.extend(bridge.tool_definitions());
        ClaudeEngine {
            system_prompt,
            bridge,
            catalog,
            sessions: HashMap::new(),
            group_dir,
            sandbox_root,
            max_steps,
            log,
        }
    }
}

impl ReasoningEngine for ClaudeEngine {
    fn submit_turn(&mut self, session_id: &str, text: &str) -> Result<Vec<TurnEvent>, String> {
        let history = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| vec![AgentMessage::text("system", self.system_prompt.clone())]);

        history.push(AgentMessage::text("user", text));
        self.log.append(session_id, "user", text, None);

        let mut events = Vec::new();
        for step in 0..self.max_steps {
            let request = ModelRequest {
                messages: history.clone(),
                tools: self.catalog.clone(),
                session: Some(session_id.to_string()),
            };
            let message = call_model(&request)?;

            let mut actions = Vec::new();
            for call in &message.tool_calls {
                if call.id.trim().is_empty() || call.name.trim().is_empty() {
                    return Err("model requested a tool call without id or name".to_string());
                }
                actions.push(ActionNotice {
                    tool: call.name.clone(),
                    detail: format!("requested with {}", summarize_args(&call.args)),
                    is_error: false,
                });
            }
            if let Some(ref content) = message.content {
                self.log.append(session_id, "assistant", content, None);
            }
            events.push(TurnEvent {
                text: message.content.clone(),
                actions,
            });

            let calls = message.tool_calls.clone();
            history.push(message);
            if calls.is_empty() {
                return Ok(events);
            }

            for call in &calls {
                let result = truncate_tool_output(dispatch_tool(
                    &mut self.bridge,
                    &self.group_dir,
                    &self.sandbox_root,
                    call,
                ));
                self.log
                    .append(session_id, "tool", &result.output, Some(result.details.clone()));
                events.push(TurnEvent {
                    text: None,
                    actions: vec![ActionNotice {
                        tool: call.name.clone(),
                        detail: if result.is_error {
                            format!("failed: {}", first_line(&result.output))
                        } else {
                            format!("ok: {}", first_line(&result.output))
                        },
                        is_error: result.is_error,
                    }],
                });
                history.push(AgentMessage {
                    role: "tool".to_string(),
                    content: Some(result.output),
                    tool_calls: Vec::new(),
                    tool_call_id: Some(call.id.clone()),
                    is_error: Some(result.is_error),
                });
            }
            eprintln!("[engine] step {} ran {} tool call(s)", step + 1, calls.len());
        }

        eprintln!("[engine] step budget ({}) exhausted, ending turn", self.max_steps);
        Ok(events)
    }
}

/// Route one tool call: bridged names go to the companion, everything else
/// to the local gateway. Failures become error results for the model; the
/// worker itself never crashes over a tool.
fn dispatch_tool(
    bridge: &mut HostBridge,
    group_dir: &Path,
    sandbox_root: &Path,
    call: &AgentToolCall,
) -> ToolExecution {
    let result = if call.name.starts_with(MCP_TOOL_PREFIX) {
        bridge.call_tool(&call.name, call.args.clone())
    } else {
        execute_tool(&call.name, call.args.clone(), group_dir, sandbox_root)
    };
    match result {
        Ok(execution) => execution,
        Err(err) => ToolExecution {
            output: format!("Tool error: {err}"),
            details: serde_json::json!({ "error": err }),
            is_error: true,
        },
    }
}

/// Trim oversized non-error outputs so one tool cannot blow out the
/// context for the rest of the session.
fn truncate_tool_output(result: ToolExecution) -> ToolExecution {
    if result.output.chars().count() > MAX_TOOL_OUTPUT_CHARS && !result.is_error {
        let truncated: String = result.output.chars().take(MAX_TOOL_OUTPUT_CHARS).collect();
        ToolExecution {
            output: format!(
                "{truncated}\n\n[Output truncated: {} chars total, showing first {}.]",
                result.output.chars().count(),
                MAX_TOOL_OUTPUT_CHARS
            ),
            details: result.details,
            is_error: result.is_error,
        }
    } else {
        result
    }
}

fn summarize_args(args: &serde_json::Value) -> String {
    let raw = args.to_string();
    if raw.chars().count() > 120 {
        let head: String = raw.chars().take(120).collect();
        format!("{head}...")
    } else {
        raw
    }
}

fn first_line(text: &str) -> String {
    let line = text.lines().next().unwrap_or("");
    if line.chars().count() > 120 {
        let head: String = line.chars().take(120).collect();
        format!("{head}...")
    } else {
        line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_output_is_truncated_with_notice() {
        let result = truncate_tool_output(ToolExecution {
            output: "x".repeat(MAX_TOOL_OUTPUT_CHARS + 100),
            details: serde_json::json!({}),
            is_error: false,
        });
        assert!(result.output.contains("[Output truncated"));
        assert!(result.output.len() < MAX_TOOL_OUTPUT_CHARS + 200);
    }

    #[test]
    fn error_output_is_never_truncated() {
        let long = "e".repeat(MAX_TOOL_OUTPUT_CHARS + 100);
        let result = truncate_tool_output(ToolExecution {
            output: long.clone(),
            details: serde_json::json!({}),
            is_error: true,
        });
        assert_eq!(result.output, long);
    }

    #[test]
    fn arg_summary_is_bounded() {
        let args = serde_json::json!({"blob": "y".repeat(500)});
        assert!(summarize_args(&args).chars().count() <= 123);
    }
}
