//! Orchestrator configuration: the fixed per-step token policy plus the
//! handful of tunables the engine and agent layer consult at every
//! invocation (`config.toml`, loaded once per process).

use anyhow::Result;
use orc_core::StepName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Per-step `max_tokens` ceiling handed to the LLM provider. Fixed by the
/// table below; callers cannot override a step's budget at invocation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPolicyTable {
    budgets: BTreeMap<String, u32>,
}

impl TokenPolicyTable {
    pub fn budget_for(&self, step: StepName) -> u32 {
        *self
            .budgets
            .get(step.as_str())
            .unwrap_or_else(|| panic!("no token budget configured for step '{step}'"))
    }
}

impl Default for TokenPolicyTable {
    fn default() -> Self {
        let mut budgets = BTreeMap::new();
        budgets.insert(StepName::Analysis.as_str().to_string(), 8_000);
        budgets.insert(StepName::Architecture.as_str().to_string(), 12_000);
        budgets.insert(StepName::FrontendMock.as_str().to_string(), 12_000);
        budgets.insert(StepName::ScreenshotVerify.as_str().to_string(), 4_000);
        budgets.insert(StepName::Contracts.as_str().to_string(), 8_000);
        budgets.insert(
            StepName::BackendImplementation.as_str().to_string(),
            20_000,
        );
        budgets.insert(StepName::SystemIntegration.as_str().to_string(), 6_000);
        budgets.insert(StepName::TestingBackend.as_str().to_string(), 8_000);
        budgets.insert(
            StepName::FrontendIntegration.as_str().to_string(),
            12_000,
        );
        budgets.insert(StepName::TestingFrontend.as_str().to_string(), 8_000);
        budgets.insert(StepName::Preview.as_str().to_string(), 2_000);
        Self { budgets }
    }
}

/// Top-level orchestrator configuration. Everything here is process-wide;
/// nothing in it varies per session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub tokens: TokenPolicyTable,
    #[serde(default = "default_retry_max_per_step")]
    pub retry_max_per_step: u32,
    #[serde(default = "default_llm_timeout_seconds")]
    pub llm_timeout_seconds: u64,
    #[serde(default = "default_true")]
    pub tit_enabled: bool,
    #[serde(default = "default_true")]
    pub salvage_enabled: bool,
    #[serde(default = "default_supervisor_confidence_threshold")]
    pub supervisor_confidence_threshold: f64,
    /// Directory for operational state: sessions, traces.
    #[serde(default)]
    pub operational_store_path: Option<std::path::PathBuf>,
    /// Directory for the learning store. Always distinct from
    /// `operational_store_path` so the failure canon stays hard-isolated
    /// from anything the engine reads at runtime.
    #[serde(default)]
    pub learning_store_path: Option<std::path::PathBuf>,
}

fn default_retry_max_per_step() -> u32 {
    3
}

fn default_llm_timeout_seconds() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

fn default_supervisor_confidence_threshold() -> f64 {
    0.5
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            tokens: TokenPolicyTable::default(),
            retry_max_per_step: default_retry_max_per_step(),
            llm_timeout_seconds: default_llm_timeout_seconds(),
            tit_enabled: default_true(),
            salvage_enabled: default_true(),
            supervisor_confidence_threshold: default_supervisor_confidence_threshold(),
            operational_store_path: None,
            learning_store_path: None,
        }
    }
}

impl OrchestratorConfig {
    /// Load `config.toml` from `config_dir`. Returns the default config if
    /// the file does not exist yet.
    pub fn load(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join("config.toml");
        if !config_path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&config_path)?;
        let config: OrchestratorConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, config_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(config_dir)?;
        let config_path = config_dir.join("config.toml");
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    /// Resolved operational-store root, falling back to the standard state
    /// directory with a `sessions` subdirectory.
    pub fn operational_store_dir(&self) -> std::path::PathBuf {
        self.operational_store_path
            .clone()
            .unwrap_or_else(|| crate::paths::resolved_state_dir().join("sessions"))
    }

    /// Resolved learning-store root. Always a sibling of, never nested
    /// under, the operational store.
    pub fn learning_store_dir(&self) -> std::path::PathBuf {
        self.learning_store_path
            .clone()
            .unwrap_or_else(|| crate::paths::resolved_state_dir().join("learning"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_token_table_covers_all_eleven_steps() {
        let table = TokenPolicyTable::default();
        for step in StepName::ALL {
            let budget = table.budget_for(*step);
            assert!(budget > 0, "{step} should have a positive budget");
        }
    }

    #[test]
    fn test_token_table_matches_spec_values() {
        let table = TokenPolicyTable::default();
        assert_eq!(table.budget_for(StepName::Analysis), 8_000);
        assert_eq!(table.budget_for(StepName::BackendImplementation), 20_000);
        assert_eq!(table.budget_for(StepName::Preview), 2_000);
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let dir = tempdir().unwrap();
        let config = OrchestratorConfig::load(dir.path()).unwrap();
        assert_eq!(config.retry_max_per_step, 3);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let mut config = OrchestratorConfig::default();
        config.retry_max_per_step = 5;
        config.tit_enabled = false;
        config.save(dir.path()).unwrap();

        let loaded = OrchestratorConfig::load(dir.path()).unwrap();
        assert_eq!(loaded.retry_max_per_step, 5);
        assert!(!loaded.tit_enabled);
    }

    #[test]
    fn test_operational_and_learning_stores_never_collide() {
        let config = OrchestratorConfig::default();
        assert_ne!(config.operational_store_dir(), config.learning_store_dir());
    }

    #[test]
    fn test_explicit_paths_are_respected() {
        let mut config = OrchestratorConfig::default();
        config.operational_store_path = Some("/tmp/op".into());
        config.learning_store_path = Some("/tmp/learn".into());
        assert_eq!(config.operational_store_dir(), std::path::PathBuf::from("/tmp/op"));
        assert_eq!(config.learning_store_dir(), std::path::PathBuf::from("/tmp/learn"));
    }
}
