//! Linear executor: walks a `ToolPlan` in order, calling each tool exactly
//! once. No loops, no retries, no self-healing — retries belong to the
//! workflow engine, at the step level.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use orc_agent::{Agent, Artifact};
use orc_core::{OrchestratorError, Result, StepName, ToolType};
use orc_session::Session;
use orc_trace::{truncate_summary, InvocationStatus, ToolInvocationRecord, TraceLogger, SCHEMA_VERSION};
use tracing::error;

use crate::capability::CORE_TOOL_NAME;
use crate::plan::{self, ToolInvocationPlan};

/// Executes capability plans for one run, recording every tool call to the
/// tool-invocation trace.
pub struct PlanExecutor {
    agent: Arc<Agent>,
    trace: Arc<TraceLogger>,
}

impl PlanExecutor {
    pub fn new(agent: Arc<Agent>, trace: Arc<TraceLogger>) -> Self {
        Self { agent, trace }
    }

    /// Run the full plan for `step` and return the artifact produced by the
    /// core invocation. `run_id`/`retry_index` are carried into every trace
    /// record; `retry_hint` is forwarded to the core tool only.
    pub async fn execute_tool_plan(
        &self,
        step: StepName,
        session: &Session,
        run_id: &str,
        retry_index: u32,
        retry_hint: Option<&str>,
    ) -> Result<Artifact> {
        let tool_plan = plan::plan(step, session);
        let mut core_artifact: Option<Artifact> = None;

        for entry in tool_plan.entries() {
            let invocation_index = self.trace.next_invocation_index(run_id);
            let called_at = Utc::now();
            let started = Instant::now();

            let outcome = if entry.tool_name == CORE_TOOL_NAME {
                self.run_core(step, session, retry_hint).await
            } else {
                run_checked_tool(entry, step, session, core_artifact.as_ref())
            };

            let duration_ms = started.elapsed().as_millis() as u64;

            let record = ToolInvocationRecord {
                id: 0,
                run_id: run_id.to_string(),
                branch_id: None,
                decision_id: None,
                step,
                agent: format!("{:?}", step.agent_role()),
                tool_name: entry.tool_name.clone(),
                tool_type: if entry.tool_name == CORE_TOOL_NAME { ToolType::Llm } else { ToolType::PlanInvocation },
                invocation_index,
                called_at,
                duration_ms,
                input_summary: truncate_summary(&entry.reason),
                output_summary: truncate_summary(&outcome.output_summary()),
                status: outcome.status(),
                error_type: outcome.error_type(),
                error_message: outcome.error_message(),
                tokens_used: None,
                model_name: None,
                retries: retry_index,
                schema_version: SCHEMA_VERSION,
            };
            self.trace.log(record);

            match outcome {
                ToolOutcome::CoreSuccess(artifact) => core_artifact = Some(artifact),
                ToolOutcome::CheckSuccess(_) => {}
                ToolOutcome::Failure(error) => {
                    if entry.required {
                        error!(%step, tool = %entry.tool_name, %error, "required tool failed, stopping plan execution");
                        // The core invocation's error already carries its own
                        // canon class (timeout, parse failure, ...); wrapping
                        // it as ToolFailure would flatten every one of those
                        // into F7 and make them all non-retryable. Checked
                        // pre/post tools have no class of their own, so those
                        // do get wrapped.
                        if entry.tool_name == CORE_TOOL_NAME {
                            return Err(error);
                        }
                        return Err(OrchestratorError::ToolFailure {
                            step,
                            tool: entry.tool_name.clone(),
                            message: error.to_string(),
                        });
                    }
                }
            }
        }

        core_artifact.ok_or_else(|| OrchestratorError::ToolFailure {
            step,
            tool: CORE_TOOL_NAME.to_string(),
            message: "plan completed without a core invocation result".into(),
        })
    }

    async fn run_core(&self, step: StepName, session: &Session, retry_hint: Option<&str>) -> ToolOutcome {
        match self.agent.invoke(step, session, retry_hint).await {
            Ok(artifact) => ToolOutcome::CoreSuccess(artifact),
            Err(error) => ToolOutcome::Failure(error),
        }
    }
}

enum ToolOutcome {
    CoreSuccess(Artifact),
    CheckSuccess(String),
    Failure(OrchestratorError),
}

impl ToolOutcome {
    fn status(&self) -> InvocationStatus {
        match self {
            ToolOutcome::CoreSuccess(_) | ToolOutcome::CheckSuccess(_) => InvocationStatus::Success,
            ToolOutcome::Failure(OrchestratorError::Timeout { .. }) => InvocationStatus::Timeout,
            ToolOutcome::Failure(_) => InvocationStatus::Failure,
        }
    }

    fn output_summary(&self) -> String {
        match self {
            ToolOutcome::CoreSuccess(artifact) => format!("{} file(s) produced", artifact.files.len()),
            ToolOutcome::CheckSuccess(summary) => summary.clone(),
            ToolOutcome::Failure(error) => error.to_string(),
        }
    }

    fn error_type(&self) -> Option<String> {
        match self {
            ToolOutcome::Failure(error) => Some(classify_tool_error(error)),
            _ => None,
        }
    }

    fn error_message(&self) -> Option<String> {
        match self {
            ToolOutcome::Failure(error) => Some(error.to_string()),
            _ => None,
        }
    }
}

fn classify_tool_error(error: &OrchestratorError) -> String {
    match error {
        OrchestratorError::Timeout { .. } => "timeout".into(),
        OrchestratorError::ExternalFailure { .. } => "external_failure".into(),
        OrchestratorError::ParseFailure { .. } => "parse_failure".into(),
        OrchestratorError::Truncation { .. } => "truncation".into(),
        _ => "tool_failure".into(),
    }
}

/// Pre/post tools are deterministic checks against already-known session
/// state: they verify declared dependencies are present rather than
/// touching a real filesystem or sandbox, since artifacts in this
/// orchestrator are opaque JSON payloads, not files on disk.
fn run_checked_tool(
    entry: &ToolInvocationPlan,
    step: StepName,
    session: &Session,
    core_artifact: Option<&Artifact>,
) -> ToolOutcome {
    match entry.tool_name.as_str() {
        "environment_guard" => {
            if session.project_id.trim().is_empty() {
                ToolOutcome::Failure(OrchestratorError::ToolFailure {
                    step,
                    tool: entry.tool_name.clone(),
                    message: "session has no project_id".into(),
                })
            } else {
                ToolOutcome::CheckSuccess("environment ok".into())
            }
        }
        "file_reader" | "file_lister" | "code_viewer" | "db_schema_reader" => {
            let deps = step.depends_on();
            let missing: Vec<String> = deps
                .iter()
                .filter(|dep| !session.step_outputs.contains_key(dep))
                .map(|dep| dep.to_string())
                .collect();
            if missing.is_empty() || deps.is_empty() {
                ToolOutcome::CheckSuccess(format!("{} dependency artifact(s) available", deps.len()))
            } else {
                ToolOutcome::Failure(OrchestratorError::ToolFailure {
                    step,
                    tool: entry.tool_name.clone(),
                    message: format!("missing dependency artifacts: {}", missing.join(", ")),
                })
            }
        }
        "static_code_validator" | "syntax_validator" => match core_artifact {
            Some(artifact) => {
                let unbalanced: Vec<&str> = artifact
                    .files
                    .iter()
                    .filter(|file| !is_brace_balanced(&file.content))
                    .map(|file| file.path.as_str())
                    .collect();
                if unbalanced.is_empty() {
                    ToolOutcome::CheckSuccess(format!("{} file(s) validated", artifact.files.len()))
                } else {
                    ToolOutcome::Failure(OrchestratorError::ToolFailure {
                        step,
                        tool: entry.tool_name.clone(),
                        message: format!("unbalanced braces in: {}", unbalanced.join(", ")),
                    })
                }
            }
            None => ToolOutcome::Failure(OrchestratorError::ToolFailure {
                step,
                tool: entry.tool_name.clone(),
                message: "validator ran before the core invocation produced an artifact".into(),
            }),
        },
        other => ToolOutcome::Failure(OrchestratorError::ToolFailure {
            step,
            tool: other.to_string(),
            message: "no registered handler for this tool".into(),
        }),
    }
}

fn is_brace_balanced(content: &str) -> bool {
    let mut depth: i64 = 0;
    for ch in content.chars() {
        match ch {
            '{' => depth += 1,
            '}' => depth -= 1,
            _ => {}
        }
        if depth < 0 {
            return false;
        }
    }
    depth == 0
}
