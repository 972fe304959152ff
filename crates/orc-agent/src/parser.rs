//! Parses `=== path ===`-delimited file blocks out of an LLM response, and
//! the structural-completeness check salvage relies on.

use crate::artifact::FileBlock;

const THINKING_PATH: &str = "thinking";

/// Why the provider stopped generating. `Length` is the strongest truncation
/// signal; the others require inspecting the content itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Complete,
    Length,
}

/// One block as scanned from the raw text, before any completeness check.
#[derive(Debug, Clone)]
struct RawBlock {
    path: String,
    content: String,
}

fn scan_blocks(raw: &str) -> Vec<RawBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<RawBlock> = None;

    for line in raw.lines() {
        if let Some(path) = parse_marker(line) {
            if let Some(block) = current.take() {
                blocks.push(block);
            }
            current = Some(RawBlock { path, content: String::new() });
            continue;
        }
        if let Some(block) = current.as_mut() {
            if !block.content.is_empty() {
                block.content.push('\n');
            }
            block.content.push_str(line);
        }
    }
    if let Some(block) = current.take() {
        blocks.push(block);
    }
    blocks
}

fn parse_marker(line: &str) -> Option<String> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix("===")?.strip_suffix("===")?;
    let path = inner.trim();
    if path.is_empty() {
        None
    } else {
        Some(path.to_string())
    }
}

/// Whether `content` ends at a structurally complete unit: balanced braces
/// and brackets, and no unterminated code fence. A conservative heuristic,
/// not a language parser — it only needs to distinguish "finished" from
/// "cut off mid-token".
pub fn is_structurally_complete(content: &str) -> bool {
    let fence_count = content.matches("```").count();
    if fence_count % 2 != 0 {
        return false;
    }

    let mut brace_depth: i64 = 0;
    let mut bracket_depth: i64 = 0;
    let mut in_string: Option<char> = None;
    let mut escaped = false;

    for ch in content.chars() {
        if let Some(quote) = in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == quote {
                in_string = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => in_string = Some(ch),
            '{' => brace_depth += 1,
            '}' => brace_depth -= 1,
            '[' => bracket_depth += 1,
            ']' => bracket_depth -= 1,
            _ => {}
        }
        if brace_depth < 0 || bracket_depth < 0 {
            return false;
        }
    }

    in_string.is_none() && brace_depth == 0 && bracket_depth == 0
}

/// The outcome of parsing one raw response.
pub struct ParsedResponse {
    pub thinking: Option<String>,
    pub files: Vec<FileBlock>,
    /// True when `stop_reason` or the trailing block's shape indicates the
    /// response was cut off before the provider finished.
    pub truncated: bool,
    /// Files dropped because they were the incomplete tail of a truncated
    /// response. Present only when `truncated` is true.
    pub dropped: Vec<FileBlock>,
}

/// Parse `raw` into files + thinking, deciding truncation from `stop_reason`
/// and the completeness of the trailing block.
pub fn parse(raw: &str, stop_reason: StopReason) -> ParsedResponse {
    let blocks = scan_blocks(raw);

    let mut thinking = None;
    let mut files: Vec<FileBlock> = Vec::new();
    for block in &blocks {
        if block.path == THINKING_PATH {
            thinking = Some(block.content.clone());
        } else {
            files.push(FileBlock { path: block.path.clone(), content: block.content.clone() });
        }
    }

    let trailing_incomplete = files.last().is_some_and(|f| !is_structurally_complete(&f.content));
    let truncated = stop_reason == StopReason::Length || trailing_incomplete;

    if !truncated {
        return ParsedResponse { thinking, files, truncated: false, dropped: Vec::new() };
    }

    // Salvage: walk in order, keep a prefix of structurally complete blocks.
    // The first incomplete block (and everything after it) is dropped.
    let mut kept = Vec::new();
    let mut dropped = Vec::new();
    let mut salvaging = true;
    for file in files {
        if salvaging && is_structurally_complete(&file.content) {
            kept.push(file);
        } else {
            salvaging = false;
            dropped.push(file);
        }
    }

    ParsedResponse { thinking, files: kept, truncated: true, dropped }
}
