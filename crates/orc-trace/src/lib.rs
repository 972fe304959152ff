//! The Tool Invocation Trace: a durable, append-only record of every tool
//! call made while executing a capability plan, written through at exactly
//! three hook points — the plan executor, the LLM boundary, and the process
//! boundary.

pub mod logger;
pub mod record;

pub use logger::{TraceLogger, DISABLE_ENV_VAR};
pub use record::{truncate_summary, InvocationStatus, ToolInvocationRecord, SCHEMA_VERSION};
