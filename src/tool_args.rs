use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct ToolExecArgs {
    pub(crate) command: String,
    #[serde(default)]
    pub(crate) cwd: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolFsReadArgs {
    pub(crate) path: String,
    #[serde(default)]
    pub(crate) max_bytes: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolFsWriteArgs {
    pub(crate) path: String,
    pub(crate) text: String,
    #[serde(default)]
    pub(crate) append: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolFsListArgs {
    pub(crate) path: String,
    #[serde(default)]
    pub(crate) recursive: Option<bool>,
    #[serde(default)]
    pub(crate) max_entries: Option<usize>,
}
