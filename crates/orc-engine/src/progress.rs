//! The read-only view `progress(project_id)` returns to a caller.

use orc_core::StepName;
use orc_session::SessionStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub completed_steps: Vec<StepName>,
    pub current_step: Option<StepName>,
    pub is_running: bool,
    pub is_resumable: bool,
}

impl Progress {
    pub fn from_status(completed_steps: Vec<StepName>, current_step: Option<StepName>, status: SessionStatus) -> Self {
        Self {
            completed_steps,
            current_step,
            is_running: status == SessionStatus::Running,
            is_resumable: status.is_resumable(),
        }
    }
}
