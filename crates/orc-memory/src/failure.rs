//! The failure record and the interpretation context it was classified
//! under.

use chrono::{DateTime, Utc};
use data_encoding::HEXLOWER;
use orc_core::{FailureClass, Scope, StepName, CANON_VERSION};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use ulid::Ulid;

/// Versioned context under which a failure's class and scope were decided.
/// Two records with different contexts are never treated as duplicates,
/// even if everything else about them matches — a rule change changes the
/// meaning of the classification, not just its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpretationContext {
    pub extractor_version: u32,
    pub rules_hash: String,
    pub canon_version: u32,
    pub scope_semantics_version: u32,
    pub active_invariants_hash: String,
}

impl InterpretationContext {
    pub fn current(
        extractor_version: u32,
        rules_hash: String,
        active_invariants_hash: String,
    ) -> Self {
        Self {
            extractor_version,
            rules_hash,
            canon_version: CANON_VERSION,
            scope_semantics_version: 1,
            active_invariants_hash,
        }
    }

    /// Stable digest of the whole context, used as part of the idempotency
    /// key so re-ingesting under an unchanged context is a no-op.
    pub fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.extractor_version.to_le_bytes());
        hasher.update(self.rules_hash.as_bytes());
        hasher.update(self.canon_version.to_le_bytes());
        hasher.update(self.scope_semantics_version.to_le_bytes());
        hasher.update(self.active_invariants_hash.as_bytes());
        HEXLOWER.encode(&hasher.finalize())
    }
}

/// Schema version of [`FailureRecord`] itself. Bump when a field is added,
/// removed, or changes meaning.
pub const SCHEMA_VERSION: u32 = 1;

/// One classified failure, as ingested into the learning store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Unique per record (ULID), independent of the idempotency key — two
    /// ingests that collide on the key never produce a second row, but every
    /// row that *is* written gets its own identity.
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// The session that experienced the failure.
    pub run_id: String,
    pub step: StepName,
    /// The agent role that produced the failing attempt.
    pub agent: String,
    pub primary_class: FailureClass,
    pub scope: Scope,
    /// Raw signals extracted from the failing output (regex matches, tool
    /// exit codes, etc.), in extraction order.
    pub signals: Vec<String>,
    /// Digest of `signals`, used in the idempotency key.
    pub signals_hash: String,
    /// The verbatim error/rejection text the signal extractor ran over.
    pub raw_error: String,
    /// The unified diff associated with the attempt, if any (e.g. between a
    /// step's prior and current artifact).
    pub raw_diff: Option<String>,
    /// Which retry attempt this was (0 = first attempt).
    pub retry_index: u32,
    /// Whether this attempt ended the step without a further retry, either
    /// because the class is non-retryable or because the retry budget was
    /// spent.
    pub is_hard_failure: bool,
    pub schema_version: u32,
    pub canon_version: u32,
    pub interpretation_context: InterpretationContext,
    /// Same value as `interpretation_context.hash()`, persisted rather than
    /// recomputed so a later canon/rules change can't silently change what
    /// an already-ingested record reports.
    pub interpretation_context_hash: String,
    /// Full JSON of `interpretation_context`, stored alongside the hash per
    /// the learning store's contract of keeping both.
    pub interpretation_context_json: String,
}

impl FailureRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        run_id: String,
        step: StepName,
        agent: String,
        retry_index: u32,
        primary_class: FailureClass,
        signals: Vec<String>,
        interpretation_context: InterpretationContext,
        raw_error: String,
        raw_diff: Option<String>,
        is_hard_failure: bool,
    ) -> Self {
        let signals_hash = hash_signals(&signals);
        let interpretation_context_hash = interpretation_context.hash();
        let interpretation_context_json =
            serde_json::to_string(&interpretation_context).unwrap_or_else(|_| "{}".to_string());
        Self {
            id: Ulid::new().to_string(),
            created_at: Utc::now(),
            run_id,
            step,
            agent,
            primary_class,
            scope: primary_class.default_scope(),
            signals,
            signals_hash,
            raw_error,
            raw_diff,
            retry_index,
            is_hard_failure,
            schema_version: SCHEMA_VERSION,
            canon_version: CANON_VERSION,
            interpretation_context,
            interpretation_context_hash,
            interpretation_context_json,
        }
    }

    /// The idempotency key: `(run_id, step, retry_index, primary_class,
    /// signals_hash)`. Re-ingesting a record with the same key is a no-op.
    pub fn idempotency_key(&self) -> String {
        format!(
            "{}|{}|{}|{:?}|{}",
            self.run_id, self.step, self.retry_index, self.primary_class, self.signals_hash
        )
    }
}

fn hash_signals(signals: &[String]) -> String {
    let mut hasher = Sha256::new();
    for signal in signals {
        hasher.update(signal.as_bytes());
        hasher.update([0u8]);
    }
    HEXLOWER.encode(&hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> InterpretationContext {
        InterpretationContext::current(1, "rules-v1".into(), "invariants-v1".into())
    }

    #[test]
    fn test_idempotency_key_stable_for_same_inputs() {
        let a = FailureRecord::new(
            "run-1".into(),
            StepName::Analysis,
            "implementer".into(),
            0,
            FailureClass::F2,
            vec!["empty body".into()],
            ctx(),
            "parse failure".into(),
            None,
            false,
        );
        let b = FailureRecord::new(
            "run-1".into(),
            StepName::Analysis,
            "implementer".into(),
            0,
            FailureClass::F2,
            vec!["empty body".into()],
            ctx(),
            "parse failure (different wording)".into(),
            None,
            false,
        );
        assert_eq!(a.idempotency_key(), b.idempotency_key());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_idempotency_key_differs_on_retry_index() {
        let a = FailureRecord::new(
            "run-1".into(),
            StepName::Analysis,
            "implementer".into(),
            0,
            FailureClass::F2,
            vec![],
            ctx(),
            "x".into(),
            None,
            false,
        );
        let b = FailureRecord::new(
            "run-1".into(),
            StepName::Analysis,
            "implementer".into(),
            1,
            FailureClass::F2,
            vec![],
            ctx(),
            "x".into(),
            None,
            false,
        );
        assert_ne!(a.idempotency_key(), b.idempotency_key());
    }

    #[test]
    fn test_context_hash_changes_with_rules_hash() {
        let a = InterpretationContext::current(1, "rules-v1".into(), "inv".into());
        let b = InterpretationContext::current(1, "rules-v2".into(), "inv".into());
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_default_scope_assigned_from_class() {
        let record = FailureRecord::new(
            "run-1".into(),
            StepName::SystemIntegration,
            "implementer".into(),
            0,
            FailureClass::F6,
            vec![],
            ctx(),
            "dependency missing".into(),
            None,
            true,
        );
        assert_eq!(record.scope, Scope::CrossStep);
        assert!(record.is_hard_failure);
    }

    #[test]
    fn test_new_stamps_schema_and_context_metadata() {
        let record = FailureRecord::new(
            "run-1".into(),
            StepName::Analysis,
            "implementer".into(),
            0,
            FailureClass::F5,
            vec!["timeout after 30s".into()],
            ctx(),
            "timed out".into(),
            Some("--- a\n+++ b\n".into()),
            false,
        );
        assert_eq!(record.schema_version, SCHEMA_VERSION);
        assert_eq!(record.canon_version, CANON_VERSION);
        assert_eq!(record.interpretation_context_hash, record.interpretation_context.hash());
        assert!(record.interpretation_context_json.contains("rules-v1"));
        assert_eq!(record.raw_diff.as_deref(), Some("--- a\n+++ b\n"));
    }
}
