//! The structured output of one step attempt.

use serde::{Deserialize, Serialize};

/// One `(path, content)` pair extracted from an LLM response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBlock {
    pub path: String,
    pub content: String,
}

/// The output of a single agent invocation: files plus the reasoning and raw
/// text it was extracted from. Content-addressed by `(session_id, step_name,
/// attempt_index)` at the call site; this type carries no identity of its
/// own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub files: Vec<FileBlock>,
    pub thinking: Option<String>,
    pub raw: String,
    /// Set when the parser had to salvage a truncated response. A truncated
    /// artifact is still returned to the caller (so its files seed the retry
    /// prompt) but the invocation itself is reported as a retriable F3.
    pub truncated: bool,
}

impl Artifact {
    pub fn file(&self, path: &str) -> Option<&str> {
        self.files.iter().find(|f| f.path == path).map(|f| f.content.as_str())
    }
}
