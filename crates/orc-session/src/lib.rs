//! Session state and persistence: the `Session` record, its status state
//! machine, the append-only event stream, and the store that backs both.

pub mod event_writer;
pub mod manager;
pub mod state;

pub use event_writer::{EventWriteStats, EventWriter, OrchestratorEvent};
pub use manager::{
    create_session, latest_session_for_project, list_sessions, load_session,
    save_session_conditional, session_dir, write_session,
};
pub use state::{Session, SessionEvent, SessionStatus, StepOutput};
