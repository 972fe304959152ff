//! Step catalog and artifact types shared across the orchestrator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The fixed catalog of generation steps.
///
/// Order here is the canonical topological order used for deterministic
/// tie-breaks in the scheduler (`orc_engine::scheduler`).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    Analysis,
    Architecture,
    FrontendMock,
    ScreenshotVerify,
    Contracts,
    BackendImplementation,
    SystemIntegration,
    TestingBackend,
    FrontendIntegration,
    TestingFrontend,
    Preview,
}

impl StepName {
    /// All steps in catalog (== topological) order.
    pub const ALL: &'static [StepName] = &[
        StepName::Analysis,
        StepName::Architecture,
        StepName::FrontendMock,
        StepName::ScreenshotVerify,
        StepName::Contracts,
        StepName::BackendImplementation,
        StepName::SystemIntegration,
        StepName::TestingBackend,
        StepName::FrontendIntegration,
        StepName::TestingFrontend,
        StepName::Preview,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Architecture => "architecture",
            Self::FrontendMock => "frontend_mock",
            Self::ScreenshotVerify => "screenshot_verify",
            Self::Contracts => "contracts",
            Self::BackendImplementation => "backend_implementation",
            Self::SystemIntegration => "system_integration",
            Self::TestingBackend => "testing_backend",
            Self::FrontendIntegration => "frontend_integration",
            Self::TestingFrontend => "testing_frontend",
            Self::Preview => "preview",
        }
    }

    /// Static dependency set for this step.
    pub fn depends_on(&self) -> BTreeSet<StepName> {
        use StepName::*;
        match self {
            Analysis => [].into(),
            Architecture => [Analysis].into(),
            FrontendMock => [Architecture].into(),
            ScreenshotVerify => [FrontendMock].into(),
            Contracts => [Architecture].into(),
            BackendImplementation => [Contracts].into(),
            SystemIntegration => [BackendImplementation, ScreenshotVerify].into(),
            TestingBackend => [SystemIntegration].into(),
            FrontendIntegration => [SystemIntegration].into(),
            TestingFrontend => [FrontendIntegration].into(),
            Preview => [TestingBackend, TestingFrontend].into(),
        }
    }

    /// Per-step retry budget. Uniform per §4.1, kept as a method so a future
    /// per-step override has one place to land.
    pub fn max_retries(&self) -> u32 {
        3
    }

    /// Whether this step may be skipped without failing the run.
    ///
    /// Open Question (§9): the source treats screenshot verification as
    /// optional in some runs. We keep it mandatory but expose the flag so
    /// callers can opt into skip semantics without a schema change.
    pub fn skippable(&self) -> bool {
        matches!(self, StepName::ScreenshotVerify)
    }

    /// Agent persona used to produce this step's artifact.
    pub fn agent_role(&self) -> AgentRole {
        match self {
            StepName::ScreenshotVerify => AgentRole::Verifier,
            _ => AgentRole::Implementer,
        }
    }

    /// Declared capability tags, expanded by the planner into concrete tools.
    pub fn required_capabilities(&self) -> &'static [Capability] {
        use Capability::*;
        match self {
            StepName::Analysis => &[EnvironmentGuard, FileReader],
            StepName::Architecture => &[EnvironmentGuard, FileReader, CodeViewer],
            StepName::FrontendMock => &[FileReader, FileLister, CodeViewer, SubagentCaller],
            StepName::ScreenshotVerify => &[FileReader, SubagentCaller],
            StepName::Contracts => &[FileReader, CodeViewer, SubagentCaller],
            StepName::BackendImplementation => &[
                FileReader,
                FileLister,
                CodeViewer,
                DbSchemaReader,
                SubagentCaller,
                StaticCodeValidator,
            ],
            StepName::SystemIntegration => {
                &[FileReader, FileLister, CodeViewer, SubagentCaller, SyntaxValidator]
            }
            StepName::TestingBackend => &[FileReader, CodeViewer, SubagentCaller, StaticCodeValidator],
            StepName::FrontendIntegration => {
                &[FileReader, FileLister, CodeViewer, SubagentCaller, SyntaxValidator]
            }
            StepName::TestingFrontend => &[FileReader, CodeViewer, SubagentCaller, StaticCodeValidator],
            StepName::Preview => &[FileReader, SubagentCaller],
        }
    }

    pub fn produces(&self) -> ArtifactKind {
        match self {
            StepName::ScreenshotVerify => ArtifactKind::VerificationReport,
            StepName::Preview => ArtifactKind::PreviewManifest,
            _ => ArtifactKind::FileSet,
        }
    }
}

impl std::fmt::Display for StepName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Capability tag declared by a step, expanded by the planner (`orc-planner`)
/// into a concrete registered tool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    EnvironmentGuard,
    FileReader,
    FileLister,
    CodeViewer,
    DbSchemaReader,
    SubagentCaller,
    StaticCodeValidator,
    SyntaxValidator,
}

/// Which prompt persona an agent invocation uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Author of a producing step's artifact.
    Implementer,
    /// The screenshot-verification persona.
    Verifier,
    /// Marcus: the quality-review persona (`orc-supervisor`).
    Marcus,
}

/// The kind of artifact a step produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    FileSet,
    VerificationReport,
    PreviewManifest,
}

/// A tool invocation's type, for `ToolInvocationRecord::tool_type`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolType {
    PlanInvocation,
    Llm,
    Process,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_catalog_has_eleven_steps() {
        assert_eq!(StepName::ALL.len(), 11);
    }

    #[test]
    fn test_dependency_graph_is_acyclic_topological() {
        // Every step's deps must appear strictly before it in ALL.
        for (idx, step) in StepName::ALL.iter().enumerate() {
            for dep in step.depends_on() {
                let dep_idx = StepName::ALL.iter().position(|s| *s == dep).unwrap();
                assert!(
                    dep_idx < idx,
                    "{step} depends on {dep} which is not earlier in catalog order"
                );
            }
        }
    }

    #[test]
    fn test_analysis_has_no_dependencies() {
        assert!(StepName::Analysis.depends_on().is_empty());
    }

    #[test]
    fn test_preview_depends_on_both_testing_steps() {
        let deps = StepName::Preview.depends_on();
        assert!(deps.contains(&StepName::TestingBackend));
        assert!(deps.contains(&StepName::TestingFrontend));
    }

    #[test]
    fn test_only_screenshot_verify_is_skippable() {
        for step in StepName::ALL {
            assert_eq!(step.skippable(), *step == StepName::ScreenshotVerify);
        }
    }

    #[test]
    fn test_display_matches_as_str() {
        for step in StepName::ALL {
            assert_eq!(step.to_string(), step.as_str());
        }
    }

    #[test]
    fn test_max_retries_is_three_for_all_steps() {
        for step in StepName::ALL {
            assert_eq!(step.max_retries(), 3);
        }
    }
}
