//! The agent invocation layer: prompt assembly, LLM dispatch over HTTP,
//! output parsing, and truncation salvage.

pub mod artifact;
pub mod invoke;
pub mod logging;
pub mod parser;
pub mod persona;
pub mod prompt;
pub mod provider;

pub use artifact::{Artifact, FileBlock};
pub use invoke::Agent;
pub use logging::create_session_log_writer;
pub use parser::StopReason;
pub use provider::{CompletionResponse, HttpLlmProvider, LlmProvider, ProviderError};
