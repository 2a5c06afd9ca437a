use serde::{Deserialize, Serialize};

/// Task description handed to the worker once, on stdin, at process start.
/// Field names are camelCase on the wire; the host owns this contract.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ContainerInput {
    pub(crate) prompt: String,
    #[serde(default)]
    pub(crate) session_id: Option<String>,
    pub(crate) group_folder: String,
    pub(crate) chat_jid: String,
    pub(crate) is_main: bool,
    #[serde(default)]
    pub(crate) is_scheduled_task: bool,
}

/// One framed result block per turn. `result` is always serialized (null on
/// error) so the host can rely on the field being present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ContainerOutput {
    pub(crate) status: String,
    pub(crate) result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) new_session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<String>,
}

impl ContainerOutput {
    pub(crate) fn success(result: String, session_id: &str) -> Self {
        ContainerOutput {
            status: "success".to_string(),
            result: Some(result),
            new_session_id: Some(session_id.to_string()),
            error: None,
        }
    }

    pub(crate) fn error(message: String) -> Self {
        ContainerOutput {
            status: "error".to_string(),
            result: None,
            new_session_id: None,
            error: Some(message),
        }
    }
}

/// A single file dropped into the mailbox directory by the host.
#[derive(Debug, Deserialize)]
pub(crate) struct MailboxMessage {
    #[serde(rename = "type")]
    pub(crate) kind: String,
    #[serde(default)]
    pub(crate) text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AgentMessage {
    pub(crate) role: String,
    #[serde(default)]
    pub(crate) content: Option<String>,
    #[serde(default)]
    pub(crate) tool_calls: Vec<AgentToolCall>,
    #[serde(default)]
    pub(crate) tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) is_error: Option<bool>,
}

impl AgentMessage {
    pub(crate) fn text(role: &str, content: impl Into<String>) -> Self {
        AgentMessage {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
            is_error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AgentToolCall {
    pub(crate) id: String,
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) args: serde_json::Value,
}

/// One request to the model backend: full history plus the tool catalog.
#[derive(Debug, Serialize)]
pub(crate) struct ModelRequest {
    pub(crate) messages: Vec<AgentMessage>,
    pub(crate) tools: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) session: Option<String>,
}

/// Result of one tool execution, local or bridged. `output` is what the
/// model sees; `details` is structured data for logs.
#[derive(Debug, Clone)]
pub(crate) struct ToolExecution {
    pub(crate) output: String,
    pub(crate) details: serde_json::Value,
    pub(crate) is_error: bool,
}

/// One engine step as observed by the turn controller: an optional text
/// fragment plus any side-channel action notices.
#[derive(Debug, Clone)]
pub(crate) struct TurnEvent {
    pub(crate) text: Option<String>,
    pub(crate) actions: Vec<ActionNotice>,
}

/// Tool invocations and their outcomes, surfaced for diagnostics only.
/// These never reach the framed output stream.
#[derive(Debug, Clone)]
pub(crate) struct ActionNotice {
    pub(crate) tool: String,
    pub(crate) detail: String,
    pub(crate) is_error: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AgentLogEntry {
    #[serde(default)]
    pub(crate) session: Option<String>,
    pub(crate) role: String,
    pub(crate) text: String,
    #[serde(default)]
    pub(crate) meta: Option<serde_json::Value>,
    #[serde(default)]
    pub(crate) ts_utc: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_input_parses_camel_case() {
        let raw = r#"{
            "prompt": "hello",
            "sessionId": "sess_1",
            "groupFolder": "family",
            "chatJid": "12345@g.us",
            "isMain": true,
            "isScheduledTask": true
        }"#;
        let input: ContainerInput = serde_json::from_str(raw).unwrap();
        assert_eq!(input.prompt, "hello");
        assert_eq!(input.session_id.as_deref(), Some("sess_1"));
        assert_eq!(input.group_folder, "family");
        assert_eq!(input.chat_jid, "12345@g.us");
        assert!(input.is_main);
        assert!(input.is_scheduled_task);
    }

    #[test]
    fn container_input_optionals_default() {
        let raw = r#"{
            "prompt": "hi",
            "groupFolder": "g",
            "chatJid": "1@g.us",
            "isMain": false
        }"#;
        let input: ContainerInput = serde_json::from_str(raw).unwrap();
        assert!(input.session_id.is_none());
        assert!(!input.is_scheduled_task);
    }

    #[test]
    fn success_output_omits_error_field() {
        let out = ContainerOutput::success("done".to_string(), "sess_9");
        let json = serde_json::to_string(&out).unwrap();
        assert!(json.contains("\"status\":\"success\""));
        assert!(json.contains("\"result\":\"done\""));
        assert!(json.contains("\"newSessionId\":\"sess_9\""));
        assert!(!json.contains("error"));
    }

    #[test]
    fn error_output_keeps_null_result() {
        let out = ContainerOutput::error("boom".to_string());
        let json = serde_json::to_string(&out).unwrap();
        assert!(json.contains("\"result\":null"));
        assert!(json.contains("\"error\":\"boom\""));
        assert!(!json.contains("newSessionId"));
    }

    #[test]
    fn mailbox_message_tolerates_missing_text() {
        let msg: MailboxMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(msg.kind, "ping");
        assert!(msg.text.is_none());
    }
}
