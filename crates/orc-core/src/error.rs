use crate::canon::FailureClass;
use crate::types::StepName;

#[derive(thiserror::Error, Debug)]
pub enum OrchestratorError {
    #[error("session '{0}' not found")]
    SessionNotFound(String),

    #[error("a running session already exists for project '{0}'")]
    ConcurrentStart(String),

    #[error("resume requires a paused or failed session, but '{0}' has status {1}")]
    NotResumable(String, String),

    #[error("session '{0}' was concurrently modified; reload and retry")]
    ConcurrentModification(String),

    #[error("invalid session transition: {0}")]
    InvalidTransition(String),

    #[error("step '{step}' failed: {class} ({message})")]
    StepFailure {
        step: StepName,
        class: FailureClass,
        message: String,
    },

    #[error("dependency deadlock: no eligible step and not all steps completed")]
    DependencyDeadlock,

    #[error("parse failure on step '{step}': {message}")]
    ParseFailure { step: StepName, message: String },

    #[error("truncated output on step '{step}' with no salvageable block")]
    Truncation { step: StepName },

    #[error("timed out waiting on the LLM provider for step '{step}' after {seconds}s")]
    Timeout { step: StepName, seconds: u64 },

    #[error("external provider failure on step '{step}': {message}")]
    ExternalFailure { step: StepName, message: String },

    #[error("required tool '{tool}' failed during step '{step}': {message}")]
    ToolFailure {
        step: StepName,
        tool: String,
        message: String,
    },

    #[error("entity discovery exhausted all sources for '{entity}' needed by step '{step}'")]
    DependencyMissing { step: StepName, entity: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
