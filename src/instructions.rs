use std::fs;
use std::path::Path;

/// Fixed persona preamble. Instruction documents are appended after this,
/// global first, then per-group.
pub(crate) fn persona_preamble() -> String {
    [
        "You are AgentCell, a personal assistant embedded in a group chat.",
        "You run inside an isolated container. The chat platform, message delivery, and scheduling live on the host; you reach them through your mcp__host__* tools.",
        "Your workspace is mounted at /workspace. The group's own files live in /workspace/group — read and write there with your filesystem tools, and run shell commands with exec when needed.",
        "Keep replies short and conversational; this is a chat, not a document.",
        "Never invent tools. Only call tools from your catalog.",
    ]
    .join("\n")
}

/// Assemble the full instruction string: persona preamble, then the global
/// document, then the per-group document, separated by blank lines.
/// Missing or empty documents contribute nothing; absence is not an error.
pub(crate) fn assemble_instructions(global_path: &Path, group_path: &Path) -> String {
    let mut parts = vec![persona_preamble()];
    for path in [global_path, group_path] {
        if let Ok(text) = fs::read_to_string(path) {
            if !text.trim().is_empty() {
                parts.push(text.trim().to_string());
            }
        }
    }
    parts.join("\n\n")
}
