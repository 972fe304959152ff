//! Session persistence: one TOML file per session under
//! `{store_dir}/sessions/{session_id}/state.toml`.

use crate::state::Session;
use orc_core::{OrchestratorError, Result};
use std::fs;
use std::path::{Path, PathBuf};

const STATE_FILE_NAME: &str = "state.toml";

/// The directory a session's state file and event stream live under.
pub fn session_dir(store_dir: &Path, session_id: &str) -> PathBuf {
    store_dir.join("sessions").join(session_id)
}

/// Start a new session for `project_id`.
///
/// Fails with [`OrchestratorError::ConcurrentStart`] if a non-terminal
/// session already exists for the same project — the engine only ever runs
/// one active session per project at a time.
pub fn create_session(store_dir: &Path, project_id: &str, description: &str) -> Result<Session> {
    for existing in list_sessions(store_dir)? {
        if existing.project_id == project_id && !existing.status.is_terminal() {
            return Err(OrchestratorError::ConcurrentStart(project_id.to_string()));
        }
    }

    let session_id = orc_core::new_session_id();
    let session = Session::new(session_id, project_id.to_string(), description.to_string());
    write_session(store_dir, &session)?;
    Ok(session)
}

/// Load a session by ID.
pub fn load_session(store_dir: &Path, session_id: &str) -> Result<Session> {
    let path = session_dir(store_dir, session_id).join(STATE_FILE_NAME);
    if !path.exists() {
        return Err(OrchestratorError::SessionNotFound(session_id.to_string()));
    }
    let contents = fs::read_to_string(&path)?;
    let session: Session = toml::from_str(&contents)
        .map_err(|e| OrchestratorError::ParseFailure {
            step: orc_core::StepName::Analysis,
            message: format!("corrupt session state at {}: {e}", path.display()),
        })?;
    Ok(session)
}

/// Persist `session`, first verifying no other writer has mutated it since
/// `expected_updated_at` was read. This is the optimistic-concurrency gate:
/// two concurrent advances of the same session race to this check and
/// exactly one wins.
pub fn save_session_conditional(
    store_dir: &Path,
    session: &Session,
    expected_updated_at: chrono::DateTime<chrono::Utc>,
) -> Result<()> {
    if let Ok(current) = load_session(store_dir, &session.session_id) {
        if current.updated_at != expected_updated_at {
            return Err(OrchestratorError::ConcurrentModification(
                session.session_id.clone(),
            ));
        }
    }
    write_session(store_dir, session)
}

/// Persist `session` unconditionally. Used right after [`create_session`]
/// and by tests; the engine's advance loop always goes through
/// [`save_session_conditional`].
pub fn write_session(store_dir: &Path, session: &Session) -> Result<()> {
    let dir = session_dir(store_dir, &session.session_id);
    fs::create_dir_all(&dir)?;
    let path = dir.join(STATE_FILE_NAME);
    let contents = toml::to_string_pretty(session).map_err(|e| OrchestratorError::ParseFailure {
        step: orc_core::StepName::Analysis,
        message: format!("failed to serialize session state: {e}"),
    })?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)?;
    fs::rename(&tmp_path, &path)?;
    Ok(())
}

/// All sessions currently persisted under `store_dir`, in no particular order.
pub fn list_sessions(store_dir: &Path) -> Result<Vec<Session>> {
    let sessions_dir = store_dir.join("sessions");
    if !sessions_dir.exists() {
        return Ok(Vec::new());
    }
    let mut sessions = Vec::new();
    for entry in fs::read_dir(&sessions_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let session_id = entry.file_name().to_string_lossy().to_string();
        if let Ok(session) = load_session(store_dir, &session_id) {
            sessions.push(session);
        }
    }
    Ok(sessions)
}

/// The most recent session (by `created_at`) for `project_id`, if any.
pub fn latest_session_for_project(store_dir: &Path, project_id: &str) -> Result<Option<Session>> {
    let mut matches: Vec<Session> = list_sessions(store_dir)?
        .into_iter()
        .filter(|s| s.project_id == project_id)
        .collect();
    matches.sort_by_key(|s| s.created_at);
    Ok(matches.into_iter().next_back())
}
