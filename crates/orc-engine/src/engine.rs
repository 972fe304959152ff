//! The workflow engine: `start`/`advance`/`pause`/`resume`/`progress`,
//! implementing the fixed step graph's scheduling, retry, and persistence
//! contract in one place. Every mutation to a `Session` is persisted before
//! `advance` returns — a crash between steps loses at most the in-flight
//! attempt, never committed progress.

use std::path::PathBuf;
use std::sync::Arc;

use orc_agent::provider::LlmProvider;
use orc_agent::{Agent, Artifact};
use orc_config::OrchestratorConfig;
use orc_core::{FailureClass, OrchestratorError, Result, StepName};
use orc_memory::FailureStore;
use orc_planner::PlanExecutor;
use orc_session::{
    manager, session_dir, EventWriter, OrchestratorEvent, Session, SessionEvent, SessionStatus, StepOutput,
};
use orc_supervisor::{
    classify_error, discover_entity, record_error, record_invariant_violation, record_rejection,
    record_semantic_conflict, Supervisor, Verdict,
};
use orc_trace::TraceLogger;

use crate::progress::Progress;
use crate::{retry, scheduler};

/// How `start` should treat an existing session for the same project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Always begin a new run. Blocked only by a currently-running session.
    Fresh,
    /// Continue the most recent paused-or-failed session. Fails if none exists.
    Resume,
    /// Resume the most recent session if one is resumable (or already
    /// running, left untouched); otherwise start fresh.
    Auto,
}

/// What one `advance` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    StepApproved { step: StepName },
    StepRetried { step: StepName, attempt: u32 },
    StepFailed { step: StepName },
    SessionCompleted,
    /// `advance` was called on a session that is not presently running
    /// (paused, completed, or already failed) — a no-op.
    SessionNotRunning(SessionStatus),
}

pub struct Engine {
    operational_store_dir: PathBuf,
    executor: PlanExecutor,
    supervisor: Supervisor,
    failure_store: FailureStore,
    retry_max_per_step: u32,
}

impl Engine {
    pub fn new(config: &OrchestratorConfig, provider: Arc<dyn LlmProvider>) -> Self {
        let operational_store_dir = config.operational_store_dir();
        let agent = Arc::new(Agent::new(provider.clone(), config.tokens.clone()));
        let trace = Arc::new(TraceLogger::new(operational_store_dir.clone()));
        Self {
            executor: PlanExecutor::new(agent, trace),
            supervisor: Supervisor::new(provider, config.supervisor_confidence_threshold),
            failure_store: FailureStore::new(config.learning_store_dir()),
            retry_max_per_step: config.retry_max_per_step,
            operational_store_dir,
        }
    }

    /// Start or resume a run for `project_id`, per `mode`'s semantics.
    pub fn start(&self, project_id: &str, description: &str, mode: StartMode) -> Result<Session> {
        let existing = manager::latest_session_for_project(&self.operational_store_dir, project_id)?;
        match mode {
            StartMode::Fresh => {
                if let Some(session) = &existing {
                    if session.status == SessionStatus::Running {
                        return Err(OrchestratorError::ConcurrentStart(project_id.to_string()));
                    }
                }
                self.create_fresh(project_id, description)
            }
            StartMode::Resume => {
                let session = existing.ok_or_else(|| OrchestratorError::SessionNotFound(project_id.to_string()))?;
                if !session.status.is_resumable() {
                    return Err(OrchestratorError::NotResumable(session.session_id.clone(), session.status.to_string()));
                }
                self.resume_existing(session)
            }
            StartMode::Auto => match existing {
                Some(session) if session.status == SessionStatus::Running => Ok(session),
                Some(session) if session.status.is_resumable() => self.resume_existing(session),
                _ => self.create_fresh(project_id, description),
            },
        }
    }

    /// Run the one currently eligible step, persisting the outcome before
    /// returning. Call repeatedly until `SessionCompleted`/`StepFailed`.
    pub async fn advance(&self, session_id: &str) -> Result<AdvanceOutcome> {
        let mut session = manager::load_session(&self.operational_store_dir, session_id)?;
        if session.status != SessionStatus::Running {
            return Ok(AdvanceOutcome::SessionNotRunning(session.status));
        }

        let Some(step) = scheduler::next_eligible_step(&session) else {
            return self.finish_or_deadlock(session);
        };

        session.current_step = Some(step);
        let retry_index = session.retries_spent(step);
        let retry_hint = session.retry_hint(step).map(str::to_string);

        let mut writer = self.event_writer(session_id);
        writer.append(&OrchestratorEvent::StepStarted { step });

        let attempt = self
            .executor
            .execute_tool_plan(step, &session, session_id, retry_index, retry_hint.as_deref())
            .await;

        let outcome = match attempt {
            Ok(artifact) if artifact.truncated => self.retry_or_fail(
                &mut session,
                &mut writer,
                step,
                FailureClass::F3,
                "response truncated; salvaged partial output".to_string(),
                Some(&artifact),
                &[],
            )?,
            Ok(artifact) => self.review_and_record(&mut session, &mut writer, session_id, step, retry_index, artifact).await?,
            Err(error) => {
                let message = error.to_string();
                let class = classify_error(&error).unwrap_or(FailureClass::F7);
                let is_hard_failure = self.will_hard_fail(&session, step, class, &message);
                record_error(&self.failure_store, session_id, step, retry_index, &error, is_hard_failure).ok();
                self.retry_or_fail(&mut session, &mut writer, step, class, message, None, &[])?
            }
        };

        writer.flush();
        Ok(outcome)
    }

    /// Cooperative pause: takes effect immediately, since this engine has no
    /// in-flight step to wait out between `advance` calls.
    pub fn pause(&self, session_id: &str) -> Result<Session> {
        let mut session = manager::load_session(&self.operational_store_dir, session_id)?;
        let expected = session.updated_at;
        session
            .apply_event(&SessionEvent::PauseRequested)
            .map_err(OrchestratorError::InvalidTransition)?;
        manager::save_session_conditional(&self.operational_store_dir, &session, expected)?;
        let mut writer = self.event_writer(session_id);
        writer.append(&OrchestratorEvent::SessionPaused);
        writer.flush();
        Ok(session)
    }

    /// Resume a paused or failed session. `user_message`, if given, is
    /// folded into the current step's retry hint as operator guidance for
    /// the next attempt.
    pub fn resume(&self, session_id: &str, user_message: Option<&str>) -> Result<Session> {
        let mut session = manager::load_session(&self.operational_store_dir, session_id)?;
        if !session.status.is_resumable() {
            return Err(OrchestratorError::NotResumable(session.session_id.clone(), session.status.to_string()));
        }
        let expected = session.updated_at;
        session
            .apply_event(&SessionEvent::ResumeRequested)
            .map_err(OrchestratorError::InvalidTransition)?;
        if let (Some(message), Some(step)) = (user_message, session.current_step) {
            session.set_retry_hint(step, format!("Operator guidance on resume: {message}"));
        }
        manager::save_session_conditional(&self.operational_store_dir, &session, expected)?;
        let mut writer = self.event_writer(session_id);
        writer.append(&OrchestratorEvent::SessionResumed);
        writer.flush();
        Ok(session)
    }

    /// The latest session's progress for `project_id`, if one exists.
    pub fn progress(&self, project_id: &str) -> Result<Option<Progress>> {
        let Some(session) = manager::latest_session_for_project(&self.operational_store_dir, project_id)? else {
            return Ok(None);
        };
        Ok(Some(Progress::from_status(session.completed_steps.clone(), session.current_step, session.status)))
    }

    /// Discard the latest session for `project_id` so a later `start` begins
    /// from a clean slate. Refuses while a session is running — the caller
    /// must pause it first.
    pub fn clear_progress(&self, project_id: &str) -> Result<()> {
        let Some(session) = manager::latest_session_for_project(&self.operational_store_dir, project_id)? else {
            return Ok(());
        };
        if session.status == SessionStatus::Running {
            return Err(OrchestratorError::ConcurrentStart(project_id.to_string()));
        }
        let dir = session_dir(&self.operational_store_dir, &session.session_id);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }
        Ok(())
    }

    fn create_fresh(&self, project_id: &str, description: &str) -> Result<Session> {
        let session = Session::new(orc_core::new_session_id(), project_id.to_string(), description.to_string());
        manager::write_session(&self.operational_store_dir, &session)?;
        Ok(session)
    }

    fn resume_existing(&self, mut session: Session) -> Result<Session> {
        let expected = session.updated_at;
        session
            .apply_event(&SessionEvent::ResumeRequested)
            .map_err(OrchestratorError::InvalidTransition)?;
        manager::save_session_conditional(&self.operational_store_dir, &session, expected)?;
        let mut writer = self.event_writer(&session.session_id);
        writer.append(&OrchestratorEvent::SessionResumed);
        writer.flush();
        Ok(session)
    }

    async fn review_and_record(
        &self,
        session: &mut Session,
        writer: &mut EventWriter,
        session_id: &str,
        step: StepName,
        retry_index: u32,
        artifact: Artifact,
    ) -> Result<AdvanceOutcome> {
        match self.supervisor.review(step, &artifact, session).await {
            Ok(Verdict::Approve) => self.record_approval(session, writer, session_id, step, artifact),
            Ok(Verdict::Reject { reasons, confidence }) => {
                if let Some(entity) = extract_missing_entity(&reasons) {
                    return match discover_entity(&entity, step, session) {
                        Ok(_) => {
                            // Healing resolved the entity from a prior artifact: the
                            // rejection was a false alarm about ambiguity, not a real
                            // quality problem. No failure record; approve as-is.
                            self.record_approval(session, writer, session_id, step, artifact)
                        }
                        Err(OrchestratorError::DependencyMissing { step, entity }) => {
                            let error = OrchestratorError::DependencyMissing { step, entity };
                            let message = error.to_string();
                            let is_hard_failure = self.will_hard_fail(session, step, FailureClass::F6, &message);
                            record_error(&self.failure_store, session_id, step, retry_index, &error, is_hard_failure).ok();
                            self.retry_or_fail(session, writer, step, FailureClass::F6, message, Some(&artifact), &reasons)
                        }
                        Err(error) => Err(error),
                    };
                }

                let missing_files = extract_missing_required_files(&reasons, &artifact);
                if !missing_files.is_empty() {
                    let message = format!("required-files invariant violated: missing {}", missing_files.join(", "));
                    let is_hard_failure = self.will_hard_fail(session, step, FailureClass::F1, &message);
                    record_invariant_violation(&self.failure_store, session_id, step, retry_index, missing_files.clone(), is_hard_failure).ok();
                    return self.retry_or_fail(session, writer, step, FailureClass::F1, message, Some(&artifact), &reasons);
                }

                let conflicts = extract_semantic_conflicts(&reasons);
                if !conflicts.is_empty() {
                    let message = format!("entities dropped between steps: {}", conflicts.join(", "));
                    let is_hard_failure = self.will_hard_fail(session, step, FailureClass::F8, &message);
                    record_semantic_conflict(&self.failure_store, session_id, step, retry_index, conflicts.clone(), is_hard_failure).ok();
                    return self.retry_or_fail(session, writer, step, FailureClass::F8, message, Some(&artifact), &reasons);
                }

                let verdict = Verdict::Reject { reasons: reasons.clone(), confidence };
                let message = format!("rejected with confidence {confidence:.2}: {}", reasons.join("; "));
                let is_hard_failure = self.will_hard_fail(session, step, FailureClass::F4, &message);
                record_rejection(&self.failure_store, session_id, step, retry_index, &verdict, is_hard_failure).ok();
                self.retry_or_fail(session, writer, step, FailureClass::F4, message, Some(&artifact), &reasons)
            }
            Err(error) => {
                let message = error.to_string();
                let class = classify_error(&error).unwrap_or(FailureClass::F7);
                let is_hard_failure = self.will_hard_fail(session, step, class, &message);
                record_error(&self.failure_store, session_id, step, retry_index, &error, is_hard_failure).ok();
                self.retry_or_fail(session, writer, step, class, message, Some(&artifact), &[])
            }
        }
    }

    fn record_approval(
        &self,
        session: &mut Session,
        writer: &mut EventWriter,
        _session_id: &str,
        step: StepName,
        artifact: Artifact,
    ) -> Result<AdvanceOutcome> {
        let expected = session.updated_at;
        session.record_step_output(
            step,
            StepOutput {
                kind: step.produces(),
                payload: serde_json::json!({ "files": artifact.files, "thinking": artifact.thinking }),
                produced_at: chrono::Utc::now(),
            },
        );
        session.clear_retry_state(step);
        manager::save_session_conditional(&self.operational_store_dir, session, expected)?;
        writer.append(&OrchestratorEvent::StepApproved { step });
        Ok(AdvanceOutcome::StepApproved { step })
    }

    /// Whether a failure of `class` on `step` with this `message` will turn
    /// out to be a hard (non-retryable, session-failing) failure under
    /// `retry_or_fail`'s policy, computed without mutating `session` so
    /// callers can stamp a failure record's `is_hard_failure` before the
    /// engine has actually committed to the outcome.
    fn will_hard_fail(&self, session: &Session, step: StepName, class: FailureClass, message: &str) -> bool {
        if !class.retryable() {
            return true;
        }
        let hash = retry::signal_hash(message);
        session.signal_hash_repeats(step, &hash) || session.retries_spent(step) >= self.retry_max_per_step
    }

    /// Apply the retry policy for a failure of `class` on `step`: retry with
    /// an expanding prompt while budget and signal novelty allow it,
    /// otherwise promote to a hard, session-failing failure.
    #[allow(clippy::too_many_arguments)]
    fn retry_or_fail(
        &self,
        session: &mut Session,
        writer: &mut EventWriter,
        step: StepName,
        class: FailureClass,
        message: String,
        artifact_for_hint: Option<&Artifact>,
        rejection_reasons: &[String],
    ) -> Result<AdvanceOutcome> {
        let expected = session.updated_at;

        if !class.retryable() {
            return self.hard_fail(session, writer, step, expected, class);
        }

        let repeated = session.record_signal_hash(step, retry::signal_hash(&message));
        if let Some(hint) = retry::build_hint(artifact_for_hint, rejection_reasons, Some(&message)) {
            session.set_retry_hint(step, hint);
        }

        if repeated || session.retries_spent(step) >= self.retry_max_per_step {
            return self.hard_fail(session, writer, step, expected, class);
        }

        session.record_retry(step);
        manager::save_session_conditional(&self.operational_store_dir, session, expected)?;
        let attempt = session.retries_spent(step);
        writer.append(&OrchestratorEvent::StepRetried { step, attempt });
        Ok(AdvanceOutcome::StepRetried { step, attempt })
    }

    fn hard_fail(
        &self,
        session: &mut Session,
        writer: &mut EventWriter,
        step: StepName,
        expected_updated_at: chrono::DateTime<chrono::Utc>,
        class: FailureClass,
    ) -> Result<AdvanceOutcome> {
        session.current_step = None;
        session
            .apply_event(&SessionEvent::UnretryableFailure)
            .map_err(OrchestratorError::InvalidTransition)?;
        manager::save_session_conditional(&self.operational_store_dir, session, expected_updated_at)?;
        writer.append(&OrchestratorEvent::StepFailed { step, class });
        writer.append(&OrchestratorEvent::SessionFailed { step });
        Ok(AdvanceOutcome::StepFailed { step })
    }

    fn finish_or_deadlock(&self, mut session: Session) -> Result<AdvanceOutcome> {
        let session_id = session.session_id.clone();
        let mut writer = self.event_writer(&session_id);

        if scheduler::all_steps_completed(&session) {
            let expected = session.updated_at;
            session.current_step = None;
            session
                .apply_event(&SessionEvent::AllStepsCompleted)
                .map_err(OrchestratorError::InvalidTransition)?;
            manager::save_session_conditional(&self.operational_store_dir, &session, expected)?;
            writer.append(&OrchestratorEvent::SessionCompleted);
            writer.flush();
            return Ok(AdvanceOutcome::SessionCompleted);
        }

        let step = session.current_step.unwrap_or(StepName::Analysis);
        let expected = session.updated_at;
        let outcome = self.hard_fail(&mut session, &mut writer, step, expected, FailureClass::F6)?;
        writer.flush();
        Ok(outcome)
    }

    fn event_writer(&self, session_id: &str) -> EventWriter {
        let path = session_dir(&self.operational_store_dir, session_id).join("events.jsonl");
        EventWriter::new(&path)
    }
}

/// Marcus flags an unambiguous-entity rejection with a `missing entity: <name>`
/// reason rather than a free-form complaint, so healing knows exactly what to
/// search prior artifacts for. The first such reason wins.
fn extract_missing_entity(reasons: &[String]) -> Option<String> {
    reasons.iter().find_map(|reason| reason.strip_prefix("missing entity:").map(|rest| rest.trim().to_string()))
}

/// Likewise, a cross-step semantic conflict is flagged with a
/// `semantic conflict: <entity>` reason per dropped entity.
fn extract_semantic_conflicts(reasons: &[String]) -> Vec<String> {
    reasons.iter().filter_map(|reason| reason.strip_prefix("semantic conflict:").map(|rest| rest.trim().to_string())).collect()
}

/// A `missing required file: <path>` reason names a path the artifact was
/// contractually supposed to produce. Confirmed against the artifact itself
/// (not just trusted from the reason) before it's treated as an invariant
/// violation rather than an ordinary quality rejection.
fn extract_missing_required_files(reasons: &[String], artifact: &Artifact) -> Vec<String> {
    reasons
        .iter()
        .filter_map(|reason| reason.strip_prefix("missing required file:").map(|rest| rest.trim().to_string()))
        .filter(|path| !artifact.files.iter().any(|file| &file.path == path))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use orc_agent::provider::{CompletionResponse, ProviderError};
    use orc_agent::StopReason;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct ScriptedProvider {
        responses: Mutex<Vec<Result<CompletionResponse, ProviderError>>>,
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn complete(&self, _prompt: &str, _max_tokens: u32) -> std::result::Result<CompletionResponse, ProviderError> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Ok(CompletionResponse { content: "=== ok.md ===\nok\n".into(), stop_reason: StopReason::Complete });
            }
            responses.remove(0)
        }
    }

    fn config(dir: &std::path::Path) -> OrchestratorConfig {
        let mut config = OrchestratorConfig::default();
        config.operational_store_path = Some(dir.join("sessions"));
        config.learning_store_path = Some(dir.join("learning"));
        config
    }

    fn engine_with(dir: &std::path::Path, responses: Vec<Result<CompletionResponse, ProviderError>>) -> Engine {
        let provider = Arc::new(ScriptedProvider { responses: Mutex::new(responses) });
        Engine::new(&config(dir), provider)
    }

    fn approve(content: &str) -> Result<CompletionResponse, ProviderError> {
        Ok(CompletionResponse { content: content.to_string(), stop_reason: StopReason::Complete })
    }

    fn verdict(json: &str) -> Result<CompletionResponse, ProviderError> {
        Ok(CompletionResponse { content: json.to_string(), stop_reason: StopReason::Complete })
    }

    #[test]
    fn test_fresh_start_creates_running_session_at_analysis() {
        let dir = tempdir().unwrap();
        let engine = engine_with(dir.path(), vec![]);
        let session = engine.start("proj-1", "a todo app", StartMode::Fresh).unwrap();
        assert_eq!(session.status, SessionStatus::Running);
        assert_eq!(session.current_step, Some(StepName::Analysis));
    }

    #[test]
    fn test_fresh_start_blocked_by_running_session() {
        let dir = tempdir().unwrap();
        let engine = engine_with(dir.path(), vec![]);
        engine.start("proj-1", "a todo app", StartMode::Fresh).unwrap();
        let err = engine.start("proj-1", "a todo app", StartMode::Fresh).unwrap_err();
        assert!(matches!(err, OrchestratorError::ConcurrentStart(_)));
    }

    #[test]
    fn test_resume_requires_existing_resumable_session() {
        let dir = tempdir().unwrap();
        let engine = engine_with(dir.path(), vec![]);
        let err = engine.start("proj-1", "a todo app", StartMode::Resume).unwrap_err();
        assert!(matches!(err, OrchestratorError::SessionNotFound(_)));
    }

    #[test]
    fn test_auto_start_goes_fresh_when_nothing_exists() {
        let dir = tempdir().unwrap();
        let engine = engine_with(dir.path(), vec![]);
        let session = engine.start("proj-1", "a todo app", StartMode::Auto).unwrap();
        assert_eq!(session.status, SessionStatus::Running);
    }

    #[tokio::test]
    async fn test_advance_approves_step_and_moves_current_step_forward() {
        let dir = tempdir().unwrap();
        let engine = engine_with(
            dir.path(),
            vec![approve("=== analysis.md ===\nok\n"), verdict(r#"{"approve": true, "reasons": [], "confidence": 0.9}"#)],
        );
        let session = engine.start("proj-1", "a todo app", StartMode::Fresh).unwrap();
        let outcome = engine.advance(&session.session_id).await.unwrap();
        assert_eq!(outcome, AdvanceOutcome::StepApproved { step: StepName::Analysis });

        let reloaded = manager::load_session(&config(dir.path()).operational_store_dir(), &session.session_id).unwrap();
        assert!(reloaded.completed_steps.contains(&StepName::Analysis));
        assert_eq!(reloaded.current_step, Some(StepName::Analysis));
    }

    #[tokio::test]
    async fn test_advance_on_paused_session_is_a_no_op() {
        let dir = tempdir().unwrap();
        let engine = engine_with(dir.path(), vec![]);
        let session = engine.start("proj-1", "a todo app", StartMode::Fresh).unwrap();
        engine.pause(&session.session_id).unwrap();
        let outcome = engine.advance(&session.session_id).await.unwrap();
        assert_eq!(outcome, AdvanceOutcome::SessionNotRunning(SessionStatus::Paused));
    }

    #[tokio::test]
    async fn test_rejection_retries_then_hard_fails_after_budget_exhausted() {
        // Each rejection cites a different reason, so the same-signal-hash
        // fast-fail never triggers and the step spends its full retry budget.
        let dir = tempdir().unwrap();
        let reject_as = |reason: &str| verdict(&format!(r#"{{"approve": false, "reasons": ["{reason}"], "confidence": 0.9}}"#));
        let engine = engine_with(
            dir.path(),
            vec![
                approve("=== analysis.md ===\nok\n"),
                reject_as("missing endpoint A"),
                approve("=== analysis.md ===\nok v2\n"),
                reject_as("missing endpoint B"),
                approve("=== analysis.md ===\nok v3\n"),
                reject_as("missing endpoint C"),
                approve("=== analysis.md ===\nok v4\n"),
                reject_as("missing endpoint D"),
            ],
        );
        let session = engine.start("proj-1", "a todo app", StartMode::Fresh).unwrap();

        let mut last = AdvanceOutcome::SessionCompleted;
        for _ in 0..4 {
            last = engine.advance(&session.session_id).await.unwrap();
        }
        assert_eq!(last, AdvanceOutcome::StepFailed { step: StepName::Analysis });

        let reloaded = manager::load_session(&config(dir.path()).operational_store_dir(), &session.session_id).unwrap();
        assert_eq!(reloaded.status, SessionStatus::Failed);
        assert_eq!(reloaded.current_step, None);
    }

    #[tokio::test]
    async fn test_repeated_rejection_reason_promotes_to_hard_failure_immediately() {
        // Same rejection reason twice in a row is a repeated signal hash:
        // the step fails hard on the second attempt, without waiting out
        // its full retry budget.
        let dir = tempdir().unwrap();
        let reject = || verdict(r#"{"approve": false, "reasons": ["missing endpoint"], "confidence": 0.9}"#);
        let engine = engine_with(
            dir.path(),
            vec![approve("=== analysis.md ===\nok\n"), reject(), approve("=== analysis.md ===\nok v2\n"), reject()],
        );
        let session = engine.start("proj-1", "a todo app", StartMode::Fresh).unwrap();

        let first = engine.advance(&session.session_id).await.unwrap();
        assert_eq!(first, AdvanceOutcome::StepRetried { step: StepName::Analysis, attempt: 1 });

        let second = engine.advance(&session.session_id).await.unwrap();
        assert_eq!(second, AdvanceOutcome::StepFailed { step: StepName::Analysis });
    }

    #[tokio::test]
    async fn test_pause_then_resume_allows_advance_again() {
        let dir = tempdir().unwrap();
        let engine = engine_with(
            dir.path(),
            vec![approve("=== analysis.md ===\nok\n"), verdict(r#"{"approve": true, "reasons": [], "confidence": 0.9}"#)],
        );
        let session = engine.start("proj-1", "a todo app", StartMode::Fresh).unwrap();
        engine.pause(&session.session_id).unwrap();
        let resumed = engine.resume(&session.session_id, Some("please fix the schema")).unwrap();
        assert_eq!(resumed.status, SessionStatus::Running);
        assert_eq!(resumed.retry_hint(StepName::Analysis), Some("Operator guidance on resume: please fix the schema"));

        let outcome = engine.advance(&session.session_id).await.unwrap();
        assert_eq!(outcome, AdvanceOutcome::StepApproved { step: StepName::Analysis });
    }

    #[test]
    fn test_progress_reports_none_for_unknown_project() {
        let dir = tempdir().unwrap();
        let engine = engine_with(dir.path(), vec![]);
        assert!(engine.progress("no-such-project").unwrap().is_none());
    }

    #[test]
    fn test_clear_progress_removes_session_so_progress_is_none() {
        let dir = tempdir().unwrap();
        let engine = engine_with(dir.path(), vec![]);
        engine.start("proj-1", "a todo app", StartMode::Fresh).unwrap();
        engine.pause(&manager::latest_session_for_project(&config(dir.path()).operational_store_dir(), "proj-1").unwrap().unwrap().session_id).unwrap();

        engine.clear_progress("proj-1").unwrap();
        assert!(engine.progress("proj-1").unwrap().is_none());
    }

    #[test]
    fn test_clear_progress_refuses_while_running() {
        let dir = tempdir().unwrap();
        let engine = engine_with(dir.path(), vec![]);
        engine.start("proj-1", "a todo app", StartMode::Fresh).unwrap();
        let err = engine.clear_progress("proj-1").unwrap_err();
        assert!(matches!(err, OrchestratorError::ConcurrentStart(_)));
    }

    #[tokio::test]
    async fn test_progress_reflects_session_state() {
        let dir = tempdir().unwrap();
        let engine = engine_with(
            dir.path(),
            vec![approve("=== analysis.md ===\nok\n"), verdict(r#"{"approve": true, "reasons": [], "confidence": 0.9}"#)],
        );
        let session = engine.start("proj-1", "a todo app", StartMode::Fresh).unwrap();
        engine.advance(&session.session_id).await.unwrap();

        let progress = engine.progress("proj-1").unwrap().unwrap();
        assert!(progress.completed_steps.contains(&StepName::Analysis));
        assert!(progress.is_running);
        assert!(!progress.is_resumable);
    }

    #[tokio::test]
    async fn test_missing_required_file_rejection_is_an_invariant_violation_and_retries() {
        let dir = tempdir().unwrap();
        let engine = engine_with(
            dir.path(),
            vec![approve("=== analysis.md ===\nok\n"), verdict(r#"{"approve": false, "reasons": ["missing required file: routers.py"], "confidence": 0.9}"#)],
        );
        let session = engine.start("proj-1", "a todo app", StartMode::Fresh).unwrap();
        let outcome = engine.advance(&session.session_id).await.unwrap();
        assert_eq!(outcome, AdvanceOutcome::StepRetried { step: StepName::Analysis, attempt: 1 });
    }

    #[tokio::test]
    async fn test_rejection_naming_a_file_already_present_is_not_an_invariant_violation() {
        // The artifact already contains analysis.md, so the reason doesn't
        // confirm against the artifact and falls through to an ordinary F4
        // quality rejection instead of F1.
        let dir = tempdir().unwrap();
        let engine = engine_with(
            dir.path(),
            vec![approve("=== analysis.md ===\nok\n"), verdict(r#"{"approve": false, "reasons": ["missing required file: analysis.md"], "confidence": 0.9}"#)],
        );
        let session = engine.start("proj-1", "a todo app", StartMode::Fresh).unwrap();
        let outcome = engine.advance(&session.session_id).await.unwrap();
        assert_eq!(outcome, AdvanceOutcome::StepRetried { step: StepName::Analysis, attempt: 1 });
    }

    #[tokio::test]
    async fn test_missing_entity_rejection_resolved_by_healing_approves_without_failure() {
        let dir = tempdir().unwrap();
        let engine = engine_with(
            dir.path(),
            vec![approve("=== analysis.md ===\nok\n"), verdict(r#"{"approve": false, "reasons": ["missing entity: Widget"], "confidence": 0.9}"#)],
        );
        let session = engine.start("proj-1", "a todo app", StartMode::Fresh).unwrap();

        // Seed a prior Contracts artifact that mentions the entity Marcus
        // flagged as ambiguous, so healing's search finds it.
        let store_dir = config(dir.path()).operational_store_dir();
        let mut seeded = manager::load_session(&store_dir, &session.session_id).unwrap();
        seeded.step_outputs.insert(
            StepName::Contracts,
            StepOutput { kind: orc_core::ArtifactKind::FileSet, payload: serde_json::json!({"entity": "Widget"}), produced_at: chrono::Utc::now() },
        );
        manager::write_session(&store_dir, &seeded).unwrap();

        let outcome = engine.advance(&session.session_id).await.unwrap();
        assert_eq!(outcome, AdvanceOutcome::StepApproved { step: StepName::Analysis });
    }

    #[tokio::test]
    async fn test_missing_entity_rejection_unresolved_by_healing_hard_fails_with_dependency_missing() {
        let dir = tempdir().unwrap();
        let engine = engine_with(
            dir.path(),
            vec![approve("=== analysis.md ===\nok\n"), verdict(r#"{"approve": false, "reasons": ["missing entity: Widget"], "confidence": 0.9}"#)],
        );
        let session = engine.start("proj-1", "a todo app", StartMode::Fresh).unwrap();

        let outcome = engine.advance(&session.session_id).await.unwrap();
        assert_eq!(outcome, AdvanceOutcome::StepFailed { step: StepName::Analysis });

        let reloaded = manager::load_session(&config(dir.path()).operational_store_dir(), &session.session_id).unwrap();
        assert_eq!(reloaded.status, SessionStatus::Failed);
    }

    #[tokio::test]
    async fn test_semantic_conflict_rejection_is_retryable() {
        let dir = tempdir().unwrap();
        let engine = engine_with(
            dir.path(),
            vec![approve("=== analysis.md ===\nok\n"), verdict(r#"{"approve": false, "reasons": ["semantic conflict: Widget"], "confidence": 0.9}"#)],
        );
        let session = engine.start("proj-1", "a todo app", StartMode::Fresh).unwrap();

        let outcome = engine.advance(&session.session_id).await.unwrap();
        assert_eq!(outcome, AdvanceOutcome::StepRetried { step: StepName::Analysis, attempt: 1 });
    }
}
