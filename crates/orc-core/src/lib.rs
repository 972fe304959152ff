//! Shared types for the code-generation orchestrator: the step catalog, the
//! nine-class failure canon, and the error taxonomy the rest of the
//! workspace translates internal failures into.

pub mod canon;
pub mod error;
pub mod ids;
pub mod types;

pub use canon::{FailureClass, Scope, CANON_VERSION};
pub use error::{OrchestratorError, Result};
pub use ids::{looks_like_session_id, new_session_id, validate_session_id};
pub use types::{AgentRole, ArtifactKind, Capability, StepName, ToolType};
