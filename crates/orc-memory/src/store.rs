//! The learning store: an append-only JSONL log of classified failures.
//!
//! Hard isolation from the runtime: this module's write path
//! (`FailureStore::ingest`, and the nine `record_f*` wrappers) is always
//! compiled in, but every read function lives behind the `inspect` feature.
//! `orc-engine`, `orc-supervisor` and `orc-planner` depend on this crate
//! with default features — the read API does not exist in their
//! dependency closure. Only `orc-cli`'s offline inspector enables
//! `inspect`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

use crate::failure::{FailureRecord, InterpretationContext};
use orc_core::{FailureClass, StepName};

const LEARNING_FILE_NAME: &str = "failures.jsonl";

#[derive(Debug, Clone)]
pub struct FailureStore {
    base_dir: PathBuf,
    file_path: PathBuf,
}

impl FailureStore {
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            file_path: base_dir.join(LEARNING_FILE_NAME),
            base_dir,
        }
    }

    /// Ingest `record`, skipping the append if a record with the same
    /// idempotency key is already present. Corrupt lines encountered while
    /// checking for duplicates are skipped, never fatal — the learning
    /// store must never be the reason a run fails.
    pub fn ingest(&self, record: FailureRecord) -> Result<()> {
        if self.contains_key(&record.idempotency_key())? {
            return Ok(());
        }
        self.append(&record)
    }

    fn append(&self, record: &FailureRecord) -> Result<()> {
        self.ensure_storage_dir()?;

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.file_path)
            .with_context(|| format!("failed to open learning store: {}", self.file_path.display()))?;
        set_file_mode_600(&self.file_path)?;

        let line = serde_json::to_string(record).context("failed to serialize failure record")?;
        writeln!(file, "{line}").context("failed to append failure record")?;
        file.flush().context("failed to flush failure record append")?;
        Ok(())
    }

    fn contains_key(&self, key: &str) -> Result<bool> {
        Ok(self.load_all_fallible()?.iter().any(|r| r.idempotency_key() == key))
    }

    /// Private even without the `inspect` feature — used only for the
    /// idempotency check above, never exposed to callers.
    fn load_all_fallible(&self) -> Result<Vec<FailureRecord>> {
        if !self.file_path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.file_path)
            .with_context(|| format!("failed to read learning store: {}", self.file_path.display()))?;

        let mut records = Vec::new();
        for (idx, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<FailureRecord>(line) {
                Ok(record) => records.push(record),
                Err(error) => {
                    warn!(
                        path = %self.file_path.display(),
                        line_number = idx + 1,
                        %error,
                        "skipping corrupt failure record"
                    );
                }
            }
        }
        Ok(records)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn ensure_storage_dir(&self) -> Result<()> {
        let dir_exists = self.base_dir.exists();
        std::fs::create_dir_all(&self.base_dir)
            .with_context(|| format!("failed to create learning store dir: {}", self.base_dir.display()))?;
        if !dir_exists {
            set_dir_mode_700(&self.base_dir)?;
        }
        Ok(())
    }
}

/// Ingest a failure of class `class`, computing its idempotency key from
/// `(run_id, step, retry_index, class, signals)`.
#[allow(clippy::too_many_arguments)]
fn record(
    store: &FailureStore,
    class: FailureClass,
    run_id: &str,
    step: StepName,
    agent: &str,
    retry_index: u32,
    signals: Vec<String>,
    context: InterpretationContext,
    raw_error: &str,
    raw_diff: Option<&str>,
    is_hard_failure: bool,
) -> Result<()> {
    let record = FailureRecord::new(
        run_id.to_string(),
        step,
        agent.to_string(),
        retry_index,
        class,
        signals,
        context,
        raw_error.to_string(),
        raw_diff.map(str::to_string),
        is_hard_failure,
    );
    store.ingest(record)
}

macro_rules! failure_wrapper {
    ($name:ident, $class:expr) => {
        #[allow(clippy::too_many_arguments)]
        pub fn $name(
            store: &FailureStore,
            run_id: &str,
            step: StepName,
            agent: &str,
            retry_index: u32,
            signals: Vec<String>,
            context: InterpretationContext,
            raw_error: &str,
            raw_diff: Option<&str>,
            is_hard_failure: bool,
        ) -> Result<()> {
            record(store, $class, run_id, step, agent, retry_index, signals, context, raw_error, raw_diff, is_hard_failure)
        }
    };
}

failure_wrapper!(record_f1_invariant_violation, FailureClass::F1);
failure_wrapper!(record_f2_parse_failure, FailureClass::F2);
failure_wrapper!(record_f3_truncation, FailureClass::F3);
failure_wrapper!(record_f4_quality_rejection, FailureClass::F4);
failure_wrapper!(record_f5_timeout, FailureClass::F5);
failure_wrapper!(record_f6_dependency_missing, FailureClass::F6);
failure_wrapper!(record_f7_runtime_exception, FailureClass::F7);
failure_wrapper!(record_f8_semantic_conflict, FailureClass::F8);
failure_wrapper!(record_f9_external_failure, FailureClass::F9);

#[cfg(unix)]
fn set_dir_mode_700(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .with_context(|| format!("failed to chmod 700: {}", path.display()))
}

#[cfg(not(unix))]
fn set_dir_mode_700(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn set_file_mode_600(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .with_context(|| format!("failed to chmod 600: {}", path.display()))
}

#[cfg(not(unix))]
fn set_file_mode_600(_path: &Path) -> Result<()> {
    Ok(())
}

/// Read access to the learning store, gated behind the `inspect` feature so
/// the write path (the only one the running engine/supervisor/planner can
/// see) can never accidentally grow a read dependency.
#[cfg(feature = "inspect")]
pub mod inspect {
    use super::*;

    #[derive(Debug, Clone, Default)]
    pub struct FailureFilter {
        pub run_id: Option<String>,
        pub step: Option<StepName>,
        pub class: Option<FailureClass>,
    }

    impl FailureStore {
        pub fn list(&self, filter: &FailureFilter) -> Result<Vec<FailureRecord>> {
            let mut records: Vec<FailureRecord> = self
                .load_all_fallible()?
                .into_iter()
                .filter(|r| filter.run_id.as_deref().is_none_or(|id| id == r.run_id))
                .filter(|r| filter.step.is_none_or(|s| s == r.step))
                .filter(|r| filter.class.is_none_or(|c| c == r.primary_class))
                .collect();
            records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(records)
        }

        /// A coarse signal of context drift: distinct interpretation-context
        /// hashes seen across all records for `step`.
        pub fn context_hashes_for_step(&self, step: StepName) -> Result<Vec<String>> {
            let mut hashes: Vec<String> = self
                .load_all_fallible()?
                .into_iter()
                .filter(|r| r.step == step)
                .map(|r| r.interpretation_context_hash.clone())
                .collect();
            hashes.sort();
            hashes.dedup();
            Ok(hashes)
        }
    }
}
