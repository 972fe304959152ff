//! Deterministic, versioned signal extraction feeding the learning store's
//! `InterpretationContext`. Pure regex matching — no LLM involvement, so the
//! same artifact always yields the same signals.

use orc_core::StepName;
use orc_memory::InterpretationContext;
use orc_session::Session;
use regex::Regex;
use std::sync::LazyLock;

/// Bumped whenever the extraction rules below change shape.
pub const EXTRACTOR_VERSION: u32 = 2;
pub const RULES_HASH: &str = "supervisor-signals-v2";

static ENDPOINT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(?:path|endpoint)"\s*:\s*"([^"]+)""#).expect("valid regex"));

static EXCEPTION_TYPE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z][A-Za-z0-9]*(?:Error|Exception|Failure|Panic))\b").expect("valid regex"));
static FILE_LINE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\w./\\-]+\.[A-Za-z0-9]{1,6}):(\d+)\b").expect("valid regex"));
static BARE_FILE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([\w./\\-]+\.(?:rs|py|js|jsx|ts|tsx|go|java|rb|c|cpp|h))\b").expect("valid regex")
});
static MISSING_IDENTIFIER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:cannot find|undefined|unresolved|unknown) (?:value|function|type|variable|identifier|symbol|name) ['"`]?([A-Za-z_][A-Za-z0-9_]*)['"`]?"#)
        .expect("valid regex")
});
static FAILED_IMPORT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:ImportError|ModuleNotFoundError|cannot find module|unresolved import)[:\s]+['"]?([A-Za-z0-9_./-]+)"#)
        .expect("valid regex")
});
static TYPE_MISMATCH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"expected `?([^,`\n]+)`?,?\s*found `?([^`\n]+)`?").expect("valid regex"));
static HTTP_STATUS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([1-5]\d{2})\b").expect("valid regex"));
static TIMEOUT_VALUE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"timed? ?out(?: after)? (\d+)\s*(ms|s|secs?|seconds|minutes|m)?").expect("valid regex"));

/// Pull the enumerated atomic signal categories (exception type, file
/// paths, line numbers, missing identifiers, failed imports, type
/// mismatches, HTTP status codes, timeout values, unified-diff +/- lines)
/// out of `raw_error`/`raw_diff` via pure regex. No LLM, no heuristics with
/// intent — the same input always produces the same signal list, in the
/// same order, byte-identically.
pub fn extract_signals(raw_error: &str, raw_diff: Option<&str>) -> Vec<String> {
    let mut signals = Vec::new();

    for capture in EXCEPTION_TYPE_PATTERN.captures_iter(raw_error) {
        signals.push(format!("exception_type:{}", &capture[1]));
    }
    for capture in FILE_LINE_PATTERN.captures_iter(raw_error) {
        signals.push(format!("file_path:{}", &capture[1]));
        signals.push(format!("line_number:{}", &capture[2]));
    }
    for capture in BARE_FILE_PATTERN.captures_iter(raw_error) {
        signals.push(format!("file_path:{}", &capture[1]));
    }
    for capture in MISSING_IDENTIFIER_PATTERN.captures_iter(raw_error) {
        signals.push(format!("missing_identifier:{}", &capture[1]));
    }
    for capture in FAILED_IMPORT_PATTERN.captures_iter(raw_error) {
        signals.push(format!("failed_import:{}", &capture[1]));
    }
    for capture in TYPE_MISMATCH_PATTERN.captures_iter(raw_error) {
        signals.push(format!("type_mismatch:expected={} found={}", capture[1].trim(), capture[2].trim()));
    }
    for capture in HTTP_STATUS_PATTERN.captures_iter(raw_error) {
        signals.push(format!("http_status:{}", &capture[1]));
    }
    for capture in TIMEOUT_VALUE_PATTERN.captures_iter(raw_error) {
        let unit = capture.get(2).map(|m| m.as_str()).unwrap_or("s");
        signals.push(format!("timeout_value:{}{}", &capture[1], unit));
    }

    if let Some(diff) = raw_diff {
        for line in diff.lines() {
            let is_added = line.starts_with('+') && !line.starts_with("+++");
            let is_removed = line.starts_with('-') && !line.starts_with("---");
            if is_added || is_removed {
                signals.push(format!("diff_line:{line}"));
            }
        }
    }

    signals
}

/// Endpoint paths declared in the contracts artifact, extracted by regex
/// rather than a JSON schema so the check stays decoupled from the exact
/// contract shape the implementer persona chose.
pub fn declared_endpoints(contracts_payload: &str) -> Vec<String> {
    ENDPOINT_PATTERN
        .captures_iter(contracts_payload)
        .map(|capture| capture[1].to_string())
        .collect()
}

/// Required-files invariant: every endpoint the contracts artifact declares
/// must be referenced somewhere in the backend implementation artifact's
/// file contents. Returns the missing endpoints, if any, as the signal list
/// for an F1 record.
pub fn missing_required_endpoints(contracts_payload: &str, implementation_files: &[String]) -> Vec<String> {
    let declared = declared_endpoints(contracts_payload);
    let joined = implementation_files.join("\n");
    declared.into_iter().filter(|endpoint| !joined.contains(endpoint.as_str())).collect()
}

/// A coarse semantic-conflict check: an entity name that the architecture
/// artifact declares but that contracts never mentions (or vice versa),
/// signalling the two steps drifted. Returns the conflicting names.
pub fn semantic_conflicts(architecture_payload: &str, contracts_payload: &str) -> Vec<String> {
    let arch_entities = capitalized_words(architecture_payload);
    let mut conflicts: Vec<String> = arch_entities
        .into_iter()
        .filter(|entity| !contracts_payload.contains(entity.as_str()))
        .collect();
    conflicts.sort();
    conflicts.dedup();
    conflicts
}

fn capitalized_words(text: &str) -> Vec<String> {
    static WORD_PATTERN: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\b[A-Z][a-zA-Z0-9]{2,}\b").expect("valid regex"));
    WORD_PATTERN.find_iter(text).map(|m| m.as_str().to_string()).collect()
}

/// Build the interpretation context current extraction rules produce. The
/// `active_invariants_hash` captures which invariant checks were active for
/// `step`, so a future rules change is visible in recorded failures even
/// when the step-local signal shape doesn't change.
pub fn current_context(step: StepName) -> InterpretationContext {
    InterpretationContext::current(EXTRACTOR_VERSION, RULES_HASH.to_string(), format!("{step}-invariants-v1"))
}

/// Render a step's prior artifacts as text, used both for required-files
/// checking and for semantic-conflict detection.
pub fn artifact_text(session: &Session, step: StepName) -> Option<String> {
    session.step_outputs.get(&step).map(|output| output.payload.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_endpoints_extracted_from_contracts() {
        let contracts = r#"{"endpoints": [{"path": "/tasks", "method": "GET"}, {"path": "/tasks/:id"}]}"#;
        let endpoints = declared_endpoints(contracts);
        assert_eq!(endpoints, vec!["/tasks", "/tasks/:id"]);
    }

    #[test]
    fn test_missing_required_endpoints_detects_gap() {
        let contracts = r#"{"endpoints": [{"path": "/tasks"}, {"path": "/tasks/:id"}]}"#;
        let files = vec!["@app.get('/tasks')\ndef list_tasks(): ...".to_string()];
        let missing = missing_required_endpoints(contracts, &files);
        assert_eq!(missing, vec!["/tasks/:id"]);
    }

    #[test]
    fn test_no_missing_endpoints_when_all_referenced() {
        let contracts = r#"{"endpoints": [{"path": "/tasks"}]}"#;
        let files = vec!["@app.get('/tasks')".to_string()];
        assert!(missing_required_endpoints(contracts, &files).is_empty());
    }

    #[test]
    fn test_semantic_conflict_detects_entity_dropped_from_contracts() {
        let architecture = "The system has a Conversation entity and a Task entity.";
        let contracts = r#"{"schemas": {"Task": {}}}"#;
        let conflicts = semantic_conflicts(architecture, contracts);
        assert!(conflicts.contains(&"Conversation".to_string()));
        assert!(!conflicts.contains(&"Task".to_string()));
    }

    #[test]
    fn test_context_is_stable_for_same_step() {
        let a = current_context(StepName::BackendImplementation);
        let b = current_context(StepName::BackendImplementation);
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_context_differs_across_steps() {
        let a = current_context(StepName::BackendImplementation);
        let b = current_context(StepName::FrontendIntegration);
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_extract_signals_pulls_exception_type_and_location() {
        let error = "ParseError at src/handlers/tasks.rs:42: unexpected token";
        let signals = extract_signals(error, None);
        assert!(signals.contains(&"exception_type:ParseError".to_string()));
        assert!(signals.contains(&"file_path:src/handlers/tasks.rs".to_string()));
        assert!(signals.contains(&"line_number:42".to_string()));
    }

    #[test]
    fn test_extract_signals_pulls_missing_identifier_and_import() {
        let error = "NameError: undefined variable `task_id`. ModuleNotFoundError: fastapi.middleware";
        let signals = extract_signals(error, None);
        assert!(signals.contains(&"missing_identifier:task_id".to_string()));
        assert!(signals.contains(&"failed_import:fastapi.middleware".to_string()));
    }

    #[test]
    fn test_extract_signals_pulls_type_mismatch_http_status_and_timeout() {
        let error = "type mismatch: expected `String`, found `i32`. request failed with 404. timed out after 30s";
        let signals = extract_signals(error, None);
        assert!(signals.contains(&"type_mismatch:expected=String found=i32".to_string()));
        assert!(signals.contains(&"http_status:404".to_string()));
        assert!(signals.contains(&"timeout_value:30s".to_string()));
    }

    #[test]
    fn test_extract_signals_pulls_diff_lines_only() {
        let diff = "--- a/src/main.rs\n+++ b/src/main.rs\n-let x = 1;\n+let x = 2;\n unchanged\n";
        let signals = extract_signals("", Some(diff));
        assert_eq!(signals, vec!["diff_line:-let x = 1;".to_string(), "diff_line:+let x = 2;".to_string()]);
    }

    #[test]
    fn test_extract_signals_is_deterministic_for_identical_input() {
        let error = "TimeoutError at src/client.rs:10: timed out after 5s, status 503";
        assert_eq!(extract_signals(error, None), extract_signals(error, None));
    }
}
