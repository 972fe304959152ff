//! Ties prompt assembly, provider dispatch, and output parsing into the
//! single `invoke` entry point the engine calls per step attempt.

use std::sync::Arc;
use std::time::Instant;

use orc_core::{OrchestratorError, Result, StepName};
use orc_config::TokenPolicyTable;
use orc_session::Session;
use tracing::warn;

use crate::artifact::Artifact;
use crate::parser;
use crate::prompt;
use crate::provider::{LlmProvider, ProviderError};

/// The agent invocation layer. One instance is shared across a whole run;
/// it carries no session-specific state.
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    tokens: TokenPolicyTable,
}

impl Agent {
    pub fn new(provider: Arc<dyn LlmProvider>, tokens: TokenPolicyTable) -> Self {
        Self { provider, tokens }
    }

    /// Call the LLM for `step` against `session`'s current context, parse the
    /// response, and salvage on truncation. `retry_hint` carries supervisor
    /// rejection reasons on a healing retry.
    ///
    /// The token budget always comes from the policy table; callers cannot
    /// override it.
    pub async fn invoke(&self, step: StepName, session: &Session, retry_hint: Option<&str>) -> Result<Artifact> {
        let max_tokens = self.tokens.budget_for(step);
        let prompt_text = prompt::assemble(step, session, retry_hint);

        let started = Instant::now();
        let response = self
            .provider
            .complete(&prompt_text, max_tokens)
            .await
            .map_err(|error| match error {
                ProviderError::Timeout => OrchestratorError::Timeout { step, seconds: started.elapsed().as_secs() },
                ProviderError::Http(message) => OrchestratorError::ExternalFailure { step, message },
            })?;

        if response.content.trim().is_empty() {
            return Err(OrchestratorError::ParseFailure { step, message: "empty response body".into() });
        }

        let parsed = parser::parse(&response.content, response.stop_reason);

        if parsed.truncated {
            if parsed.files.is_empty() {
                warn!(%step, "truncated response with no salvageable block");
                return Err(OrchestratorError::Truncation { step });
            }
            warn!(%step, salvaged = parsed.files.len(), dropped = parsed.dropped.len(), "salvaged a truncated response");
            return Ok(Artifact {
                files: parsed.files,
                thinking: parsed.thinking,
                raw: response.content,
                truncated: true,
            });
        }

        if parsed.files.is_empty() {
            return Err(OrchestratorError::ParseFailure { step, message: "no file blocks found in response".into() });
        }

        Ok(Artifact { files: parsed.files, thinking: parsed.thinking, raw: response.content, truncated: false })
    }
}
