//! Supervision, healing, and failure classification: reviews a step's
//! artifact for quality and contract adherence, discovers missing entities
//! across prior artifacts, and classifies every observed failure into the
//! nine-class canon before it reaches the learning store.

pub mod classify;
pub mod healing;
pub mod signals;
pub mod verdict;

pub use classify::{classify_error, record_error, record_invariant_violation, record_rejection, record_semantic_conflict};
pub use healing::discover_entity;
pub use verdict::{Supervisor, Verdict};
