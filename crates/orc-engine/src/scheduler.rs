//! Eligible-step computation: every step whose dependencies are already
//! satisfied and that has not yet completed, tie-broken lexicographically
//! on step name when more than one is eligible.

use std::collections::BTreeSet;

use orc_core::StepName;
use orc_session::Session;

pub fn eligible_steps(session: &Session) -> Vec<StepName> {
    let completed: BTreeSet<StepName> = session.completed_steps.iter().copied().collect();
    StepName::ALL
        .iter()
        .copied()
        .filter(|step| !completed.contains(step) && step.depends_on().is_subset(&completed))
        .collect()
}

/// The unique step `advance` should run next, or `None` if no step is
/// presently eligible (either the run is complete, or it is deadlocked).
pub fn next_eligible_step(session: &Session) -> Option<StepName> {
    eligible_steps(session).into_iter().min_by_key(|step| step.as_str())
}

pub fn all_steps_completed(session: &Session) -> bool {
    StepName::ALL.iter().all(|step| session.completed_steps.contains(step))
}
