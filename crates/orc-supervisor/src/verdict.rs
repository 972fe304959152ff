//! The supervisor's review contract: `review(step, artifact, session)` ->
//! `Verdict`, implemented as a second LLM call under the Marcus persona.

use std::sync::Arc;

use orc_agent::persona::persona_text;
use orc_agent::provider::{LlmProvider, ProviderError};
use orc_agent::Artifact;
use orc_core::{AgentRole, OrchestratorError, StepName};
use orc_session::Session;
use serde::Deserialize;

/// Fixed token budget for the review call. Not part of the per-step policy
/// table — that table governs producing-step output size, not review size.
const REVIEW_MAX_TOKENS: u32 = 2000;

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Approve,
    Reject { reasons: Vec<String>, confidence: f64 },
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    approve: bool,
    #[serde(default)]
    reasons: Vec<String>,
    #[serde(default = "default_confidence")]
    confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

pub struct Supervisor {
    provider: Arc<dyn LlmProvider>,
    confidence_threshold: f64,
}

impl Supervisor {
    pub fn new(provider: Arc<dyn LlmProvider>, confidence_threshold: f64) -> Self {
        Self { provider, confidence_threshold }
    }

    /// Review `artifact`, produced for `step` against `session`'s context.
    /// Confidence below the threshold auto-approves to avoid reject/retry
    /// oscillation on a marginal call.
    pub async fn review(&self, step: StepName, artifact: &Artifact, session: &Session) -> Result<Verdict, OrchestratorError> {
        let prompt = build_review_prompt(step, artifact, session);

        let response = self
            .provider
            .complete(&prompt, REVIEW_MAX_TOKENS)
            .await
            .map_err(|error| match error {
                ProviderError::Timeout => OrchestratorError::Timeout { step, seconds: 0 },
                ProviderError::Http(message) => OrchestratorError::ExternalFailure { step, message },
            })?;

        let raw: RawVerdict = serde_json::from_str(response.content.trim())
            .map_err(|error| OrchestratorError::ParseFailure { step, message: format!("unparseable verdict: {error}") })?;

        if raw.approve {
            return Ok(Verdict::Approve);
        }
        if raw.confidence < self.confidence_threshold {
            return Ok(Verdict::Approve);
        }
        Ok(Verdict::Reject { reasons: raw.reasons, confidence: raw.confidence })
    }
}

fn build_review_prompt(step: StepName, artifact: &Artifact, session: &Session) -> String {
    let mut prompt = String::new();
    prompt.push_str(persona_text(AgentRole::Marcus));
    prompt.push_str("\n\nRespond with strict JSON: {\"approve\": bool, \"reasons\": [string], \"confidence\": number between 0 and 1}.\n");
    prompt.push_str(&format!("\nStep under review: {step}\nProject description: {}\n", session.description));
    prompt.push_str("\n=== artifact under review ===\n");
    for file in &artifact.files {
        prompt.push_str(&format!("=== {} ===\n{}\n", file.path, file.content));
    }
    prompt
}
