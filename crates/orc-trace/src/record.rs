//! The Tool Invocation Record: one row per tool call, written through at
//! exactly three hook points (`execute_tool_plan`, the LLM boundary, and the
//! process boundary).

use chrono::{DateTime, Utc};
use orc_core::{StepName, ToolType};
use serde::{Deserialize, Serialize};

const SUMMARY_MAX_BYTES: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStatus {
    Success,
    Failure,
    Timeout,
    Aborted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocationRecord {
    pub id: u64,
    pub run_id: String,
    pub branch_id: Option<String>,
    pub decision_id: Option<String>,
    pub step: StepName,
    pub agent: String,
    pub tool_name: String,
    pub tool_type: ToolType,
    pub invocation_index: u64,
    pub called_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub input_summary: String,
    pub output_summary: String,
    pub status: InvocationStatus,
    pub error_type: Option<String>,
    pub error_message: Option<String>,
    pub tokens_used: Option<u32>,
    pub model_name: Option<String>,
    pub retries: u32,
    pub schema_version: u32,
}

pub const SCHEMA_VERSION: u32 = 1;

/// Truncate `text` to at most [`SUMMARY_MAX_BYTES`] bytes on a char boundary,
/// for the `input_summary`/`output_summary` fields.
pub fn truncate_summary(text: &str) -> String {
    if text.len() <= SUMMARY_MAX_BYTES {
        return text.to_string();
    }
    let mut end = SUMMARY_MAX_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &text[..end])
}
