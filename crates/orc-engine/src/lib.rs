//! The workflow engine: the fixed step graph's scheduler, retry policy, and
//! the `Engine` that drives one session's run forward one step at a time.

pub mod engine;
pub mod progress;
pub mod retry;
pub mod scheduler;

pub use engine::{AdvanceOutcome, Engine, StartMode};
pub use progress::Progress;
