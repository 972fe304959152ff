//! The learning store: failure records, classified once and appended
//! forever. See `store` for the hard write/read isolation rule.

mod failure;
pub mod store;

pub use failure::{FailureRecord, InterpretationContext};
pub use store::{
    record_f1_invariant_violation, record_f2_parse_failure, record_f3_truncation,
    record_f4_quality_rejection, record_f5_timeout, record_f6_dependency_missing,
    record_f7_runtime_exception, record_f8_semantic_conflict, record_f9_external_failure,
    FailureStore,
};

#[cfg(feature = "inspect")]
pub use store::inspect::FailureFilter;
