//! Pure, deterministic expansion of "run step X" into an ordered tool plan.

use orc_core::StepName;
use orc_session::Session;
use serde_json::json;

use crate::capability::{self, ToolPhase, CORE_TOOL_NAME};

/// One entry in a [`ToolPlan`]. Never mutated once the plan is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocationPlan {
    pub tool_name: String,
    pub args: serde_json::Value,
    pub reason: String,
    pub required: bool,
}

/// An immutable ordered sequence of tool invocations for one step, produced
/// by [`plan`]. Consumed by the executor; never reordered or mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPlan {
    entries: Vec<ToolInvocationPlan>,
}

impl ToolPlan {
    pub fn entries(&self) -> &[ToolInvocationPlan] {
        &self.entries
    }
}

/// Expand `step`'s declared capabilities into an ordered `ToolPlan`.
///
/// Pure function of `step` and `session`'s current step/project identity —
/// no LLM call, no history-based reordering. Called twice with equal inputs
/// returns an equal plan.
pub fn plan(step: StepName, session: &Session) -> ToolPlan {
    let capabilities = step.required_capabilities();

    let mut pre = Vec::new();
    let mut post = Vec::new();

    for capability in capabilities {
        let entry = ToolInvocationPlan {
            tool_name: capability::tool_name(*capability).to_string(),
            args: json!({
                "step": step.as_str(),
                "project_id": session.project_id,
            }),
            reason: format!("declared capability {capability:?} for step {step}"),
            required: true,
        };
        match capability::phase(*capability) {
            Some(ToolPhase::Pre) => pre.push(entry),
            Some(ToolPhase::Post) => post.push(entry),
            None => {}
        }
    }

    let core = ToolInvocationPlan {
        tool_name: CORE_TOOL_NAME.to_string(),
        args: json!({
            "step": step.as_str(),
            "project_id": session.project_id,
        }),
        reason: format!("core agent invocation for step {step}"),
        required: true,
    };

    let mut entries = pre;
    entries.push(core);
    entries.extend(post);

    ToolPlan { entries }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new("s".into(), "proj-1".into(), "a todo app".into())
    }

    #[test]
    fn test_plan_places_pre_tools_before_core_before_post() {
        let tool_plan = plan(StepName::BackendImplementation, &session());
        let names: Vec<&str> = tool_plan.entries().iter().map(|e| e.tool_name.as_str()).collect();
        let core_idx = names.iter().position(|n| *n == "subagent_caller").unwrap();
        assert!(names[..core_idx].contains(&"file_reader"));
        assert!(names[core_idx + 1..].contains(&"static_code_validator"));
    }

    #[test]
    fn test_core_tool_always_present_even_without_declared_tag() {
        // Analysis declares no SubagentCaller capability, but the core
        // invocation is implicit in every plan.
        let tool_plan = plan(StepName::Analysis, &session());
        assert!(tool_plan.entries().iter().any(|e| e.tool_name == "subagent_caller"));
    }

    #[test]
    fn test_plan_is_deterministic_across_calls() {
        let a = plan(StepName::SystemIntegration, &session());
        let b = plan(StepName::SystemIntegration, &session());
        assert_eq!(a, b);
    }

    #[test]
    fn test_all_entries_are_required() {
        let tool_plan = plan(StepName::TestingBackend, &session());
        assert!(tool_plan.entries().iter().all(|e| e.required));
    }
}
