//! Retry bookkeeping: the expanding-prompt hint built from a step's last
//! failed attempt, and the same-signal-hash hard-failure promotion rule.

use data_encoding::HEXLOWER;
use orc_agent::Artifact;
use orc_core::StepName;
use orc_session::Session;
use sha2::{Digest, Sha256};

/// Digest of a failure's signal text, used to detect two consecutive
/// retries failing for the identical reason.
pub fn signal_hash(message: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(message.as_bytes());
    HEXLOWER.encode(&hasher.finalize())
}

/// Build the expanding-prompt repair hint: the supervisor's rejection
/// reasons (if any) plus the raw output of the last attempt, so the next
/// invocation sees exactly what went wrong instead of repeating blind.
pub fn build_hint(last_artifact: Option<&Artifact>, rejection_reasons: &[String], failure_message: Option<&str>) -> Option<String> {
    if last_artifact.is_none() && rejection_reasons.is_empty() && failure_message.is_none() {
        return None;
    }

    let mut hint = String::new();
    if !rejection_reasons.is_empty() {
        hint.push_str("The previous attempt was rejected for these reasons:\n");
        for reason in rejection_reasons {
            hint.push_str(&format!("- {reason}\n"));
        }
    }
    if let Some(message) = failure_message {
        hint.push_str(&format!("The previous attempt failed: {message}\n"));
    }
    if let Some(artifact) = last_artifact {
        hint.push_str("\nThe previous raw output was:\n");
        hint.push_str(&artifact.raw);
        hint.push('\n');
    }
    Some(hint)
}

/// The last artifact produced for `step` on this run, if any was recorded
/// (a rejected or salvaged-truncated attempt is never written to
/// `step_outputs`, so this only has a value once the step has fully
/// succeeded — kept for symmetry with `build_hint`'s signature).
pub fn last_step_artifact<'a>(session: &'a Session, step: StepName) -> Option<&'a serde_json::Value> {
    session.step_outputs.get(&step).map(|output| &output.payload)
}
