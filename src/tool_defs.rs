/// Catalog of the local sandbox tools, in the JSON shape the engine
/// registers at session construction. Built once and never mutated.
pub(crate) fn tool_definitions_json() -> Vec<serde_json::Value> {
    vec![
        serde_json::json!({
            "name": "exec",
            "description": "Run a shell command inside the group workspace and capture its output.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "command": { "type": "string" },
                    "cwd": { "type": "string", "description": "Working directory, relative to the group folder." }
                },
                "required": ["command"]
            }
        }),
        serde_json::json!({
            "name": "fs_read",
            "description": "Read a file from the workspace. Paths resolve against the group folder and must stay inside /workspace.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "path": { "type": "string" },
                    "max_bytes": { "type": "integer" }
                },
                "required": ["path"]
            }
        }),
        serde_json::json!({
            "name": "fs_write",
            "description": "Write (or append to) a file in the workspace, creating parent directories as needed.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "path": { "type": "string" },
                    "text": { "type": "string" },
                    "append": { "type": "boolean" }
                },
                "required": ["path", "text"]
            }
        }),
        serde_json::json!({
            "name": "fs_list",
            "description": "List a workspace directory, optionally recursively.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "path": { "type": "string" },
                    "recursive": { "type": "boolean" },
                    "max_entries": { "type": "integer" }
                },
                "required": ["path"]
            }
        }),
    ]
}
