//! Maps a step's declared capability tags onto registered tool names and
//! execution phases.

use orc_core::Capability;

/// Where in the plan a tool runs relative to the core invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolPhase {
    Pre,
    Post,
}

/// The registered tool name for a capability tag.
pub fn tool_name(capability: Capability) -> &'static str {
    use Capability::*;
    match capability {
        EnvironmentGuard => "environment_guard",
        FileReader => "file_reader",
        FileLister => "file_lister",
        CodeViewer => "code_viewer",
        DbSchemaReader => "db_schema_reader",
        SubagentCaller => "subagent_caller",
        StaticCodeValidator => "static_code_validator",
        SyntaxValidator => "syntax_validator",
    }
}

/// Every non-core capability is either a pre-tool (check or read) or a
/// post-tool (validator). `SubagentCaller` is excluded — it never appears as
/// a pre/post tool, only as the implicit core invocation (see `plan::plan`).
pub fn phase(capability: Capability) -> Option<ToolPhase> {
    use Capability::*;
    match capability {
        EnvironmentGuard | FileReader | FileLister | CodeViewer | DbSchemaReader => Some(ToolPhase::Pre),
        StaticCodeValidator | SyntaxValidator => Some(ToolPhase::Post),
        SubagentCaller => None,
    }
}

/// The tool name of the core invocation, always present in every plan.
pub const CORE_TOOL_NAME: &str = "subagent_caller";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subagent_caller_has_no_pre_post_phase() {
        assert_eq!(phase(Capability::SubagentCaller), None);
    }

    #[test]
    fn test_file_reader_is_pre_phase() {
        assert_eq!(phase(Capability::FileReader), Some(ToolPhase::Pre));
    }

    #[test]
    fn test_static_code_validator_is_post_phase() {
        assert_eq!(phase(Capability::StaticCodeValidator), Some(ToolPhase::Post));
    }

    #[test]
    fn test_tool_name_is_stable_snake_case() {
        assert_eq!(tool_name(Capability::DbSchemaReader), "db_schema_reader");
    }
}
