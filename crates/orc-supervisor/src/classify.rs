//! Maps engine/agent failures and supervisor rejections onto the nine-class
//! canon and ingests them into the learning store.

use orc_core::{FailureClass, OrchestratorError, StepName};
use orc_memory::{
    record_f1_invariant_violation, record_f2_parse_failure, record_f3_truncation, record_f4_quality_rejection,
    record_f5_timeout, record_f6_dependency_missing, record_f7_runtime_exception, record_f8_semantic_conflict,
    record_f9_external_failure, FailureStore,
};

use crate::signals::{current_context, extract_signals};
use crate::verdict::Verdict;

/// The class an `OrchestratorError` belongs to. Classification here mirrors
/// the canon's own variant naming — it is a direct reading, not a judgment
/// call, except for `ToolFailure` which always denotes F7 (a required tool
/// raised at runtime, not a provider-level failure).
pub fn classify_error(error: &OrchestratorError) -> Option<FailureClass> {
    match error {
        OrchestratorError::ParseFailure { .. } => Some(FailureClass::F2),
        OrchestratorError::Truncation { .. } => Some(FailureClass::F3),
        OrchestratorError::Timeout { .. } => Some(FailureClass::F5),
        OrchestratorError::DependencyMissing { .. } => Some(FailureClass::F6),
        OrchestratorError::ToolFailure { .. } => Some(FailureClass::F7),
        OrchestratorError::ExternalFailure { .. } => Some(FailureClass::F9),
        _ => None,
    }
}

/// The agent role tag stored on a failure record, matching the string the
/// trace logger stamps on a tool invocation for the same step.
fn agent_tag(step: StepName) -> String {
    format!("{:?}", step.agent_role())
}

/// Ingest `error` into the learning store under the appropriate class.
/// Errors the canon doesn't classify (session lifecycle errors, I/O, serde)
/// are not ingested — they are the engine's own concern, not a step-attempt
/// failure. `is_hard_failure` is the caller's (the engine's) own verdict on
/// whether this attempt will end the step without a further retry; it is
/// known before recording, since it only depends on the class and the
/// session's retry state, not on anything the record influences.
#[allow(clippy::too_many_arguments)]
pub fn record_error(
    store: &FailureStore,
    run_id: &str,
    step: StepName,
    retry_index: u32,
    error: &OrchestratorError,
    is_hard_failure: bool,
) -> anyhow::Result<()> {
    let context = current_context(step);
    let raw_error = error.to_string();
    let signals = extract_signals(&raw_error, None);
    let agent = agent_tag(step);
    match classify_error(error) {
        Some(FailureClass::F2) => {
            record_f2_parse_failure(store, run_id, step, &agent, retry_index, signals, context, &raw_error, None, is_hard_failure)
        }
        Some(FailureClass::F3) => {
            record_f3_truncation(store, run_id, step, &agent, retry_index, signals, context, &raw_error, None, is_hard_failure)
        }
        Some(FailureClass::F5) => {
            record_f5_timeout(store, run_id, step, &agent, retry_index, signals, context, &raw_error, None, is_hard_failure)
        }
        Some(FailureClass::F6) => {
            record_f6_dependency_missing(store, run_id, step, &agent, retry_index, signals, context, &raw_error, None, is_hard_failure)
        }
        Some(FailureClass::F7) => {
            record_f7_runtime_exception(store, run_id, step, &agent, retry_index, signals, context, &raw_error, None, is_hard_failure)
        }
        Some(FailureClass::F9) => {
            record_f9_external_failure(store, run_id, step, &agent, retry_index, signals, context, &raw_error, None, is_hard_failure)
        }
        _ => Ok(()),
    }
}

/// Ingest a supervisor rejection as F4 (entity-local: the rejected artifact
/// and its retry, not the whole step or run).
pub fn record_rejection(
    store: &FailureStore,
    run_id: &str,
    step: StepName,
    retry_index: u32,
    verdict: &Verdict,
    is_hard_failure: bool,
) -> anyhow::Result<()> {
    let Verdict::Reject { reasons, confidence } = verdict else {
        return Ok(());
    };
    let context = current_context(step);
    let raw_error = format!("rejected with confidence {confidence:.2}: {}", reasons.join("; "));
    let signals = extract_signals(&raw_error, None);
    record_f4_quality_rejection(store, run_id, step, &agent_tag(step), retry_index, signals, context, &raw_error, None, is_hard_failure)
}

/// Ingest a required-files invariant violation (F1), scoped to the specific
/// missing entities rather than the whole step.
pub fn record_invariant_violation(
    store: &FailureStore,
    run_id: &str,
    step: StepName,
    retry_index: u32,
    missing: Vec<String>,
    is_hard_failure: bool,
) -> anyhow::Result<()> {
    let context = current_context(step);
    let raw_error = format!("missing required entities: {}", missing.join(", "));
    record_f1_invariant_violation(store, run_id, step, &agent_tag(step), retry_index, missing, context, &raw_error, None, is_hard_failure)
}

/// Ingest a cross-step semantic conflict (F8).
pub fn record_semantic_conflict(
    store: &FailureStore,
    run_id: &str,
    step: StepName,
    retry_index: u32,
    conflicts: Vec<String>,
    is_hard_failure: bool,
) -> anyhow::Result<()> {
    let context = current_context(step);
    let raw_error = format!("entities dropped between steps: {}", conflicts.join(", "));
    record_f8_semantic_conflict(store, run_id, step, &agent_tag(step), retry_index, conflicts, context, &raw_error, None, is_hard_failure)
}
