//! Session identifiers: ULIDs, generated once at `start` and carried
//! everywhere else as an opaque string.

use crate::error::{OrchestratorError, Result};

/// Generate a new session ID.
pub fn new_session_id() -> String {
    ulid::Ulid::new().to_string()
}

/// Validate that a string is a well-formed session ID (26-char Crockford
/// Base32 ULID). Callers that only need a cheap shape check without the
/// full ULID parse should use [`looks_like_session_id`] instead.
pub fn validate_session_id(id: &str) -> Result<()> {
    if id.len() != 26 {
        return Err(OrchestratorError::SessionNotFound(id.to_string()));
    }
    ulid::Ulid::from_string(id).map_err(|_| OrchestratorError::SessionNotFound(id.to_string()))?;
    Ok(())
}

/// Cheap length-only check, for prefix matching in CLI argument parsing
/// before a full lookup is attempted.
pub fn looks_like_session_id(candidate: &str) -> bool {
    candidate.len() == 26 && candidate.chars().all(|c| c.is_ascii_alphanumeric())
}
