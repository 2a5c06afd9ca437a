use std::thread;
use std::time::Duration;

use crate::{
    env_bool, env_parse, env_optional, env_required, jitter_ratio, parse_retry_after,
    AgentMessage, AgentToolCall, ModelRequest,
};

pub(crate) fn collect_system_blocks(messages: &[AgentMessage]) -> Vec<String> {
    let mut blocks = Vec::new();
    for msg in messages {
        if msg.role == "system" {
            if let Some(content) = &msg.content {
                if !content.trim().is_empty() {
                    blocks.push(content.trim().to_string());
                }
            }
        }
    }
    blocks
}

/// Map internal message history to the Messages API shape. System messages
/// are lifted into the top-level system field by the caller; tool results
/// ride in user-role tool_result blocks.
pub(crate) fn to_api_messages(messages: &[AgentMessage]) -> Vec<serde_json::Value> {
    let mut out = Vec::new();
    for msg in messages {
        match msg.role.as_str() {
            "system" => continue,
            "user" => {
                let content = msg.content.clone().unwrap_or_default();
                out.push(serde_json::json!({
                    "role": "user",
                    "content": [{"type": "text", "text": content}]
                }));
            }
            "assistant" => {
                let mut blocks = Vec::new();
                if let Some(content) = &msg.content {
                    if !content.is_empty() {
                        blocks.push(serde_json::json!({"type": "text", "text": content}));
                    }
                }
                for call in &msg.tool_calls {
                    blocks.push(serde_json::json!({
                        "type": "tool_use",
                        "id": call.id.clone(),
                        "name": call.name.clone(),
                        "input": call.args.clone()
                    }));
                }
                if blocks.is_empty() {
                    blocks.push(serde_json::json!({"type": "text", "text": ""}));
                }
                out.push(serde_json::json!({"role": "assistant", "content": blocks}));
            }
            "tool" => {
                let Some(tool_id) = msg.tool_call_id.clone() else {
                    continue;
                };
                let mut block = serde_json::Map::new();
                block.insert("type".to_string(), serde_json::json!("tool_result"));
                block.insert("tool_use_id".to_string(), serde_json::json!(tool_id));
                block.insert(
                    "content".to_string(),
                    serde_json::json!(msg.content.clone().unwrap_or_default()),
                );
                if msg.is_error.unwrap_or(false) {
                    block.insert("is_error".to_string(), serde_json::json!(true));
                }
                out.push(serde_json::json!({
                    "role": "user",
                    "content": [serde_json::Value::Object(block)]
                }));
            }
            _ => {}
        }
    }
    out
}

pub(crate) fn to_api_tools(tools: &[serde_json::Value]) -> Vec<serde_json::Value> {
    let mut out = Vec::new();
    for tool in tools {
        let Some(obj) = tool.as_object() else {
            continue;
        };
        let Some(name) = obj.get("name").and_then(|v| v.as_str()) else {
            continue;
        };
        let mut entry = serde_json::Map::new();
        entry.insert("name".to_string(), serde_json::json!(name));
        if let Some(desc) = obj.get("description").and_then(|v| v.as_str()) {
            entry.insert("description".to_string(), serde_json::json!(desc));
        }
        if let Some(schema) = obj.get("inputSchema").or_else(|| obj.get("input_schema")) {
            entry.insert("input_schema".to_string(), schema.clone());
        }
        out.push(serde_json::Value::Object(entry));
    }
    out
}

/// Parse one Messages API response into an assistant message: text blocks
/// newline-joined, tool_use blocks as pending tool calls.
pub(crate) fn parse_model_response(payload: &serde_json::Value) -> Result<AgentMessage, String> {
    let content = payload
        .get("content")
        .and_then(|v| v.as_array())
        .ok_or("model response missing content")?;
    let mut text_parts = Vec::new();
    let mut tool_calls = Vec::new();

    for block in content {
        let btype = block.get("type").and_then(|v| v.as_str()).unwrap_or("");
        match btype {
            "text" => {
                if let Some(text) = block.get("text").and_then(|v| v.as_str()) {
                    if !text.is_empty() {
                        text_parts.push(text.to_string());
                    }
                }
            }
            "tool_use" => {
                let id = block
                    .get("id")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string();
                let name = block
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string();
                let args = block
                    .get("input")
                    .cloned()
                    .unwrap_or_else(|| serde_json::json!({}));
                tool_calls.push(AgentToolCall { id, name, args });
            }
            _ => {}
        }
    }

    Ok(AgentMessage {
        role: "assistant".to_string(),
        content: if text_parts.is_empty() {
            None
        } else {
            Some(text_parts.join("\n"))
        },
        tool_calls,
        tool_call_id: None,
        is_error: None,
    })
}

/// One model step over HTTP, with bounded retries for transient failures.
/// Configuration comes from the environment the host injects.
pub(crate) fn call_model(request: &ModelRequest) -> Result<AgentMessage, String> {
    let api_key = env_required("ANTHROPIC_API_KEY")?;
    let model = env_required("ANTHROPIC_MODEL")?;
    let base_url = env_optional("ANTHROPIC_BASE_URL")
        .unwrap_or_else(|| "https://api.anthropic.com/v1/messages".to_string());
    let max_tokens: u64 = env_parse("ANTHROPIC_MAX_TOKENS", 8192)?;
    let timeout: u64 = env_parse("ANTHROPIC_TIMEOUT", 600)?;
    let max_retries: usize = env_parse("ANTHROPIC_MAX_RETRIES", 2)?;
    let retry_base: f64 = env_parse("ANTHROPIC_RETRY_BASE", 0.5)?;
    let retry_max: f64 = env_parse("ANTHROPIC_RETRY_MAX", 8.0)?;
    let version = env_optional("ANTHROPIC_VERSION").unwrap_or_else(|| "2023-06-01".to_string());

    let mut payload = serde_json::json!({
        "model": model,
        "max_tokens": max_tokens,
        "messages": to_api_messages(&request.messages),
    });
    let system_blocks = collect_system_blocks(&request.messages);
    if !system_blocks.is_empty() {
        payload["system"] = serde_json::json!(system_blocks.join("\n\n"));
    }
    let tools = to_api_tools(&request.tools);
    if !tools.is_empty() {
        payload["tools"] = serde_json::json!(tools);
    }
    if env_bool("ANTHROPIC_VERBOSE", false) {
        eprintln!("[model] request: {} messages, {} tools", request.messages.len(), tools.len());
    }

    let agent = ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(timeout))
        .timeout_read(Duration::from_secs(timeout))
        .timeout_write(Duration::from_secs(timeout))
        .build();

    let retryable = |status: u16| matches!(status, 429 | 500 | 502 | 503 | 504 | 529);
    let mut last_error = String::new();

    for attempt in 0..=max_retries {
        let response = agent
            .post(&base_url)
            .set("content-type", "application/json")
            .set("x-api-key", &api_key)
            .set("anthropic-version", &version)
            .send_json(payload.clone());
        match response {
            Ok(resp) => {
                let body = resp.into_string().map_err(|e| format!("model read: {e}"))?;
                let parsed: serde_json::Value =
                    serde_json::from_str(&body).map_err(|e| format!("model parse: {e}"))?;
                return parse_model_response(&parsed);
            }
            Err(ureq::Error::Status(code, resp)) => {
                let retry_after = parse_retry_after(&resp);
                let text = resp.into_string().unwrap_or_default();
                last_error = format!("model API {code}: {text}");
                if attempt < max_retries && retryable(code) {
                    let mut delay = (retry_base * 2.0_f64.powi(attempt as i32)).min(retry_max);
                    if let Some(retry_after) = retry_after {
                        delay = delay.max(retry_after);
                    }
                    delay *= 1.0 + jitter_ratio() * 0.2;
                    eprintln!("[model] {last_error}; retrying in {delay:.1}s");
                    thread::sleep(Duration::from_secs_f64(delay));
                    continue;
                }
                break;
            }
            Err(ureq::Error::Transport(err)) => {
                last_error = format!("model transport: {err}");
                if attempt < max_retries {
                    let mut delay = (retry_base * 2.0_f64.powi(attempt as i32)).min(retry_max);
                    delay *= 1.0 + jitter_ratio() * 0.2;
                    eprintln!("[model] {last_error}; retrying in {delay:.1}s");
                    thread::sleep(Duration::from_secs_f64(delay));
                    continue;
                }
                break;
            }
        }
    }
    Err(format!("model call failed after {max_retries} retries: {last_error}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_with_text_and_tool_use_parses() {
        let payload = serde_json::json!({
            "content": [
                {"type": "text", "text": "checking"},
                {"type": "tool_use", "id": "tu_1", "name": "exec", "input": {"command": "ls"}},
                {"type": "text", "text": "now"}
            ]
        });
        let msg = parse_model_response(&payload).unwrap();
        assert_eq!(msg.role, "assistant");
        assert_eq!(msg.content.as_deref(), Some("checking\nnow"));
        assert_eq!(msg.tool_calls.len(), 1);
        assert_eq!(msg.tool_calls[0].name, "exec");
        assert_eq!(msg.tool_calls[0].args["command"], "ls");
    }

    #[test]
    fn response_without_content_is_an_error() {
        assert!(parse_model_response(&serde_json::json!({"id": "x"})).is_err());
    }

    #[test]
    fn tool_results_become_user_tool_result_blocks() {
        let messages = vec![
            AgentMessage::text("system", "persona"),
            AgentMessage::text("user", "hi"),
            AgentMessage {
                role: "tool".to_string(),
                content: Some("out".to_string()),
                tool_calls: Vec::new(),
                tool_call_id: Some("tu_9".to_string()),
                is_error: Some(true),
            },
        ];
        let api = to_api_messages(&messages);
        // System messages are lifted out of the message list entirely.
        assert_eq!(api.len(), 2);
        let block = &api[1]["content"][0];
        assert_eq!(block["type"], "tool_result");
        assert_eq!(block["tool_use_id"], "tu_9");
        assert_eq!(block["is_error"], true);
    }

    #[test]
    fn assistant_tool_calls_become_tool_use_blocks() {
        let messages = vec![AgentMessage {
            role: "assistant".to_string(),
            content: Some("doing it".to_string()),
            tool_calls: vec![AgentToolCall {
                id: "tu_1".to_string(),
                name: "fs_read".to_string(),
                args: serde_json::json!({"path": "a"}),
            }],
            tool_call_id: None,
            is_error: None,
        }];
        let api = to_api_messages(&messages);
        assert_eq!(api[0]["content"][0]["type"], "text");
        assert_eq!(api[0]["content"][1]["type"], "tool_use");
        assert_eq!(api[0]["content"][1]["name"], "fs_read");
    }

    #[test]
    fn catalog_schema_key_maps_to_api_shape() {
        let tools = vec![serde_json::json!({
            "name": "exec",
            "description": "run",
            "inputSchema": {"type": "object"}
        })];
        let api = to_api_tools(&tools);
        assert_eq!(api[0]["name"], "exec");
        assert_eq!(api[0]["input_schema"], serde_json::json!({"type": "object"}));
        assert!(api[0].get("inputSchema").is_none());
    }

    #[test]
    fn system_blocks_collect_in_order() {
        let messages = vec![
            AgentMessage::text("system", "first"),
            AgentMessage::text("user", "hi"),
            AgentMessage::text("system", "second"),
        ];
        assert_eq!(collect_system_blocks(&messages), vec!["first", "second"]);
    }
}
