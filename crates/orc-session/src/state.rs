//! Session state: the persisted record of one orchestration run.

use chrono::{DateTime, Utc};
use orc_core::StepName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A run of the fixed step graph against one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// ULID identifier (26 characters, Crockford Base32).
    pub session_id: String,

    /// Caller-supplied project identifier. Unique among non-terminal
    /// sessions — `orc-engine` refuses to start a second `running` session
    /// for the same project.
    pub project_id: String,

    /// Human-readable description of the generation task.
    pub description: String,

    /// Lifecycle status.
    #[serde(default)]
    pub status: SessionStatus,

    /// The step currently executing, or the step that will run next.
    /// `None` once every step has completed.
    pub current_step: Option<StepName>,

    /// Steps that have produced an approved artifact.
    #[serde(default)]
    pub completed_steps: Vec<StepName>,

    /// Per-step artifact, keyed by step. Populated on approval; steps in
    /// `completed_steps` always have an entry here.
    #[serde(default)]
    pub step_outputs: BTreeMap<StepName, StepOutput>,

    /// Retry attempts spent so far, per step.
    #[serde(default)]
    pub retry_counters: BTreeMap<StepName, u32>,

    /// Signal hash of the most recent retryable failure on each step. Two
    /// consecutive retries with an unchanged hash promote the step to a
    /// hard failure immediately, without spending the remaining budget.
    #[serde(default)]
    pub last_signal_hash: BTreeMap<StepName, String>,

    /// The expanding-prompt repair hint built from a step's most recent
    /// failed attempt (rejection reasons, failure message, prior raw
    /// output). Persisted so the hint survives a process restart between
    /// retries instead of living only in engine memory.
    #[serde(default)]
    pub retry_hints: BTreeMap<StepName, String>,

    pub created_at: DateTime<Utc>,

    /// Bumped on every persisted mutation. Used as the optimistic-concurrency
    /// token: a writer that started from a stale `updated_at` must reload
    /// and retry rather than overwrite.
    pub updated_at: DateTime<Utc>,
}

/// The artifact a step produced, stored opaquely — `orc-session` persists
/// it but does not interpret its shape; that is `orc-agent`'s and
/// `orc-planner`'s job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutput {
    pub kind: orc_core::ArtifactKind,
    pub payload: serde_json::Value,
    pub produced_at: DateTime<Utc>,
}

/// Session lifecycle status.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Running,
    Paused,
    Completed,
    Failed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Events that trigger session status transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Operator requested a pause between steps.
    PauseRequested,
    /// Operator requested resumption of a paused or failed session.
    ResumeRequested,
    /// The final step in the catalog was approved.
    AllStepsCompleted,
    /// A step exhausted its retries, or hit a non-retryable failure class.
    UnretryableFailure,
}

impl SessionStatus {
    /// Attempt a status transition driven by `event`.
    ///
    /// ```text
    ///   Running --PauseRequested------> Paused
    ///   Running --AllStepsCompleted---> Completed
    ///   Running --UnretryableFailure--> Failed
    ///   Paused  --ResumeRequested------> Running
    ///   Failed  --ResumeRequested------> Running
    /// ```
    ///
    /// `Completed` is terminal. All other combinations are invalid.
    pub fn transition(&self, event: &SessionEvent) -> Result<SessionStatus, String> {
        use SessionEvent::*;
        use SessionStatus::*;
        match (self, event) {
            (Running, PauseRequested) => Ok(Paused),
            (Running, AllStepsCompleted) => Ok(Completed),
            (Running, UnretryableFailure) => Ok(Failed),
            (Paused, ResumeRequested) => Ok(Running),
            (Failed, ResumeRequested) => Ok(Running),
            (current, event) => Err(format!(
                "invalid session status transition: {current:?} + {event:?}"
            )),
        }
    }

    /// Whether a session in this status may be resumed.
    pub fn is_resumable(&self) -> bool {
        matches!(self, SessionStatus::Paused | SessionStatus::Failed)
    }

    /// Whether this status is terminal (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed)
    }
}

impl Session {
    pub fn new(session_id: String, project_id: String, description: String) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            project_id,
            description,
            status: SessionStatus::Running,
            current_step: Some(StepName::ALL[0]),
            completed_steps: Vec::new(),
            step_outputs: BTreeMap::new(),
            retry_counters: BTreeMap::new(),
            last_signal_hash: BTreeMap::new(),
            retry_hints: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Retry count already spent on `step`.
    pub fn retries_spent(&self, step: StepName) -> u32 {
        self.retry_counters.get(&step).copied().unwrap_or(0)
    }

    /// Record one more retry attempt on `step`.
    pub fn record_retry(&mut self, step: StepName) {
        *self.retry_counters.entry(step).or_insert(0) += 1;
        self.touch();
    }

    /// Record `hash` as the signal hash of `step`'s most recent failure,
    /// returning whether it matches the previously recorded hash — the
    /// trigger for promoting a retryable failure to a hard failure.
    pub fn record_signal_hash(&mut self, step: StepName, hash: String) -> bool {
        let repeated = self.last_signal_hash.get(&step) == Some(&hash);
        self.last_signal_hash.insert(step, hash);
        self.touch();
        repeated
    }

    /// Whether `hash` matches `step`'s previously recorded signal hash,
    /// without recording it. Used to decide whether an about-to-be-ingested
    /// failure record will turn out to be a hard failure before the engine
    /// has actually committed to that decision.
    pub fn signal_hash_repeats(&self, step: StepName, hash: &str) -> bool {
        self.last_signal_hash.get(&step).is_some_and(|existing| existing == hash)
    }

    /// Clear the retry bookkeeping for `step`, called on a fresh approval so
    /// a later re-entry to the step (should the graph ever allow it) starts
    /// clean.
    pub fn clear_retry_state(&mut self, step: StepName) {
        self.retry_counters.remove(&step);
        self.last_signal_hash.remove(&step);
        self.retry_hints.remove(&step);
    }

    /// The persisted repair hint for `step`'s next attempt, if one was left
    /// by a previous failed attempt.
    pub fn retry_hint(&self, step: StepName) -> Option<&str> {
        self.retry_hints.get(&step).map(String::as_str)
    }

    /// Persist the repair hint for `step`'s next attempt.
    pub fn set_retry_hint(&mut self, step: StepName, hint: String) {
        self.retry_hints.insert(step, hint);
        self.touch();
    }

    /// Record an approved artifact for `step` and advance bookkeeping.
    pub fn record_step_output(&mut self, step: StepName, output: StepOutput) {
        self.step_outputs.insert(step, output);
        if !self.completed_steps.contains(&step) {
            self.completed_steps.push(step);
        }
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Apply a status transition in place.
    pub fn apply_event(&mut self, event: &SessionEvent) -> Result<(), String> {
        self.status = self.status.transition(event)?;
        self.touch();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new("01TESTSESSIONID0000000000".into(), "proj-1".into(), "desc".into())
    }

    #[test]
    fn test_new_session_starts_running_at_first_step() {
        let s = session();
        assert_eq!(s.status, SessionStatus::Running);
        assert_eq!(s.current_step, Some(StepName::Analysis));
        assert!(s.completed_steps.is_empty());
    }

    #[test]
    fn test_running_pause_becomes_paused() {
        assert_eq!(
            SessionStatus::Running.transition(&SessionEvent::PauseRequested),
            Ok(SessionStatus::Paused)
        );
    }

    #[test]
    fn test_running_all_steps_completed_becomes_completed() {
        assert_eq!(
            SessionStatus::Running.transition(&SessionEvent::AllStepsCompleted),
            Ok(SessionStatus::Completed)
        );
    }

    #[test]
    fn test_running_unretryable_failure_becomes_failed() {
        assert_eq!(
            SessionStatus::Running.transition(&SessionEvent::UnretryableFailure),
            Ok(SessionStatus::Failed)
        );
    }

    #[test]
    fn test_paused_and_failed_resume_to_running() {
        assert_eq!(
            SessionStatus::Paused.transition(&SessionEvent::ResumeRequested),
            Ok(SessionStatus::Running)
        );
        assert_eq!(
            SessionStatus::Failed.transition(&SessionEvent::ResumeRequested),
            Ok(SessionStatus::Running)
        );
    }

    #[test]
    fn test_completed_is_terminal() {
        assert!(SessionStatus::Completed
            .transition(&SessionEvent::ResumeRequested)
            .is_err());
        assert!(SessionStatus::Completed
            .transition(&SessionEvent::PauseRequested)
            .is_err());
        assert!(SessionStatus::Completed.is_terminal());
    }

    #[test]
    fn test_paused_cannot_pause_again() {
        assert!(SessionStatus::Paused
            .transition(&SessionEvent::PauseRequested)
            .is_err());
    }

    #[test]
    fn test_is_resumable() {
        assert!(SessionStatus::Paused.is_resumable());
        assert!(SessionStatus::Failed.is_resumable());
        assert!(!SessionStatus::Running.is_resumable());
        assert!(!SessionStatus::Completed.is_resumable());
    }

    #[test]
    fn test_record_retry_increments_and_touches() {
        let mut s = session();
        let before = s.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(2));
        s.record_retry(StepName::Analysis);
        assert_eq!(s.retries_spent(StepName::Analysis), 1);
        assert!(s.updated_at > before);
    }

    #[test]
    fn test_record_step_output_adds_to_completed_once() {
        let mut s = session();
        let output = StepOutput {
            kind: orc_core::ArtifactKind::FileSet,
            payload: serde_json::json!({"files": []}),
            produced_at: Utc::now(),
        };
        s.record_step_output(StepName::Analysis, output.clone());
        s.record_step_output(StepName::Analysis, output);
        assert_eq!(
            s.completed_steps.iter().filter(|s| **s == StepName::Analysis).count(),
            1
        );
        assert!(s.step_outputs.contains_key(&StepName::Analysis));
    }

    #[test]
    fn test_record_signal_hash_first_occurrence_is_not_repeated() {
        let mut s = session();
        assert!(!s.record_signal_hash(StepName::Analysis, "abc".into()));
    }

    #[test]
    fn test_record_signal_hash_detects_repeat() {
        let mut s = session();
        s.record_signal_hash(StepName::Analysis, "abc".into());
        assert!(s.record_signal_hash(StepName::Analysis, "abc".into()));
    }

    #[test]
    fn test_record_signal_hash_different_hash_is_not_repeated() {
        let mut s = session();
        s.record_signal_hash(StepName::Analysis, "abc".into());
        assert!(!s.record_signal_hash(StepName::Analysis, "def".into()));
    }

    #[test]
    fn test_clear_retry_state_removes_both_maps() {
        let mut s = session();
        s.record_retry(StepName::Analysis);
        s.record_signal_hash(StepName::Analysis, "abc".into());
        s.set_retry_hint(StepName::Analysis, "retry with fixes".into());
        s.clear_retry_state(StepName::Analysis);
        assert_eq!(s.retries_spent(StepName::Analysis), 0);
        assert!(!s.last_signal_hash.contains_key(&StepName::Analysis));
        assert!(s.retry_hint(StepName::Analysis).is_none());
    }

    #[test]
    fn test_retry_hint_roundtrip() {
        let mut s = session();
        assert!(s.retry_hint(StepName::Analysis).is_none());
        s.set_retry_hint(StepName::Analysis, "fix the schema".into());
        assert_eq!(s.retry_hint(StepName::Analysis), Some("fix the schema"));
    }

    #[test]
    fn test_session_toml_roundtrip() {
        let mut s = session();
        s.apply_event(&SessionEvent::PauseRequested).unwrap();
        let toml_str = toml::to_string_pretty(&s).expect("serialize");
        let loaded: Session = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(loaded.session_id, s.session_id);
        assert_eq!(loaded.status, SessionStatus::Paused);
    }

    #[test]
    fn test_display() {
        assert_eq!(SessionStatus::Running.to_string(), "running");
        assert_eq!(SessionStatus::Paused.to_string(), "paused");
        assert_eq!(SessionStatus::Completed.to_string(), "completed");
        assert_eq!(SessionStatus::Failed.to_string(), "failed");
    }
}
