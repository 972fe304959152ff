//! The nine-class failure taxonomy (F1..F9) and its blast-radius scopes.
//!
//! The canon is code-defined and versioned as a whole via [`CANON_VERSION`].
//! Nothing about a failure's class or scope is inferred after the fact —
//! both are fixed at the moment `orc-memory` ingests the record.

use serde::{Deserialize, Serialize};

/// Canon schema version. Bump when class membership or scope defaults change.
pub const CANON_VERSION: u32 = 1;

/// One of the nine canonical failure classes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum FailureClass {
    /// Invariant violation (e.g. required-files contract broken).
    F1,
    /// Parse failure: structurally unparseable output.
    F2,
    /// Truncation: stop_reason=length or unterminated structure.
    F3,
    /// Quality rejection by the supervisor.
    F4,
    /// Timeout waiting on the LLM provider.
    F5,
    /// Dependency missing: healing exhausted all sources.
    F6,
    /// Runtime exception inside a required tool.
    F7,
    /// Semantic conflict between steps.
    F8,
    /// External failure (provider HTTP error).
    F9,
}

impl FailureClass {
    pub fn name(&self) -> &'static str {
        match self {
            Self::F1 => "invariant_violation",
            Self::F2 => "parse_failure",
            Self::F3 => "truncation",
            Self::F4 => "quality_rejection",
            Self::F5 => "timeout",
            Self::F6 => "dependency_missing",
            Self::F7 => "runtime_exception",
            Self::F8 => "semantic_conflict",
            Self::F9 => "external_failure",
        }
    }

    /// Whether the engine may retry the step after a failure of this class.
    pub fn retryable(&self) -> bool {
        !matches!(self, Self::F6 | Self::F7)
    }

    /// Default blast-radius scope for this class.
    pub fn default_scope(&self) -> Scope {
        match self {
            Self::F1 => Scope::EntityLocal,
            Self::F2 => Scope::StepLocal,
            Self::F3 => Scope::StepLocal,
            Self::F4 => Scope::EntityLocal,
            Self::F5 => Scope::Systemic,
            Self::F6 => Scope::CrossStep,
            Self::F7 => Scope::Systemic,
            Self::F8 => Scope::CrossStep,
            Self::F9 => Scope::Systemic,
        }
    }

    pub const ALL: &'static [FailureClass] = &[
        Self::F1,
        Self::F2,
        Self::F3,
        Self::F4,
        Self::F5,
        Self::F6,
        Self::F7,
        Self::F8,
        Self::F9,
    ];
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Blast radius of a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    EntityLocal,
    StepLocal,
    CrossStep,
    Systemic,
}
