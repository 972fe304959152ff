//! Multi-source entity discovery: when a downstream step needs an entity
//! name the producing step didn't emit unambiguously, search a fixed order
//! of prior artifacts before giving up.

use orc_core::{OrchestratorError, StepName};
use orc_session::Session;

/// Search order, per source: (1) the step's own artifact, (2) contracts,
/// (3) architecture. The first artifact whose content contains `entity`
/// wins. Never guess, never fall back to a placeholder.
pub fn discover_entity(entity: &str, step: StepName, session: &Session) -> Result<String, OrchestratorError> {
    let search_order = [Some(step), Some(StepName::Contracts), Some(StepName::Architecture)];

    for source in search_order.into_iter().flatten() {
        if let Some(output) = session.step_outputs.get(&source) {
            let haystack = output.payload.to_string();
            if haystack.contains(entity) {
                return Ok(entity.to_string());
            }
        }
    }

    Err(OrchestratorError::DependencyMissing { step, entity: entity.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_core::ArtifactKind;
    use orc_session::StepOutput;

    fn session_with(step: StepName, payload: serde_json::Value) -> Session {
        let mut session = Session::new("s".into(), "p".into(), "desc".into());
        session.step_outputs.insert(
            step,
            StepOutput { kind: ArtifactKind::FileSet, payload, produced_at: chrono::Utc::now() },
        );
        session
    }

    #[test]
    fn test_finds_entity_in_step_own_artifact() {
        let session = session_with(StepName::TestingBackend, serde_json::json!({"entity": "Conversation"}));
        let result = discover_entity("Conversation", StepName::TestingBackend, &session);
        assert_eq!(result.unwrap(), "Conversation");
    }

    #[test]
    fn test_falls_back_to_contracts_artifact() {
        let session = session_with(StepName::Contracts, serde_json::json!({"schemas": ["Conversation"]}));
        let result = discover_entity("Conversation", StepName::TestingBackend, &session);
        assert_eq!(result.unwrap(), "Conversation");
    }

    #[test]
    fn test_falls_back_to_architecture_artifact() {
        let session = session_with(StepName::Architecture, serde_json::json!({"entities": ["Conversation"]}));
        let result = discover_entity("Conversation", StepName::TestingBackend, &session);
        assert_eq!(result.unwrap(), "Conversation");
    }

    #[test]
    fn test_no_match_anywhere_raises_dependency_missing() {
        let session = Session::new("s".into(), "p".into(), "desc".into());
        let result = discover_entity("Conversation", StepName::TestingBackend, &session);
        assert!(matches!(result, Err(OrchestratorError::DependencyMissing { .. })));
    }
}
