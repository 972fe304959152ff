//! Wires an `Engine` from `config.toml` plus the handful of environment
//! variables that carry the LLM provider's connection details. The CLI
//! never bakes an API key into a config file on disk.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use orc_agent::provider::HttpLlmProvider;
use orc_config::OrchestratorConfig;
use orc_engine::Engine;

const DEFAULT_BASE_URL: &str = "http://localhost:11434/v1";
const DEFAULT_MODEL: &str = "default";

pub fn load_config() -> Result<OrchestratorConfig> {
    let config_dir = orc_config::paths::config_dir().unwrap_or_else(orc_config::paths::state_dir_fallback);
    OrchestratorConfig::load(&config_dir).context("failed to load orchestrator config")
}

pub fn build_engine(config: &OrchestratorConfig) -> Engine {
    let base_url = std::env::var("ORC_LLM_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
    let api_key = std::env::var("ORC_LLM_API_KEY").unwrap_or_default();
    let model = std::env::var("ORC_LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
    let timeout = Duration::from_secs(config.llm_timeout_seconds);

    let provider = Arc::new(HttpLlmProvider::new(base_url, api_key, model, timeout));
    Engine::new(config, provider)
}
