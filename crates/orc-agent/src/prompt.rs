//! Prompt assembly: persona + static rules + dynamic context + retry hint.

use orc_core::StepName;
use orc_session::Session;

use crate::persona::{persona_text, static_rules, step_instruction};

/// Steps whose artifact is always inlined in full, never just referenced.
/// Downstream implementers need the exact contract, not a summary of it.
const ALWAYS_FULL: &[StepName] = &[StepName::Architecture, StepName::Contracts];

/// Build the complete prompt for one invocation of `step` against `session`.
/// `retry_hint` carries supervisor rejection reasons or salvaged-file context
/// from a prior truncated attempt.
pub fn assemble(step: StepName, session: &Session, retry_hint: Option<&str>) -> String {
    let mut prompt = String::new();

    prompt.push_str(persona_text(step.agent_role()));
    prompt.push_str("\n\n");
    prompt.push_str(static_rules());
    prompt.push_str("\n\n");
    prompt.push_str(step_instruction(step));
    prompt.push_str("\n\nProject description:\n");
    prompt.push_str(&session.description);
    prompt.push('\n');

    for full_step in ALWAYS_FULL {
        if let Some(output) = session.step_outputs.get(full_step) {
            prompt.push_str(&format!("\n=== prior artifact: {full_step} (full) ===\n"));
            prompt.push_str(&output.payload.to_string());
            prompt.push('\n');
        }
    }

    for dep in step.depends_on() {
        if ALWAYS_FULL.contains(&dep) {
            continue;
        }
        if let Some(output) = session.step_outputs.get(&dep) {
            prompt.push_str(&format!(
                "\n=== prior artifact reference: {dep} ===\nproduced at {}, {} bytes (ask for specific files by path if needed)\n",
                output.produced_at,
                output.payload.to_string().len(),
            ));
        }
    }

    if let Some(hint) = retry_hint {
        prompt.push_str("\n=== retry feedback ===\n");
        prompt.push_str(hint);
        prompt.push('\n');
    }

    prompt
}
