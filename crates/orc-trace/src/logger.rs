//! Write-through trace logger: one JSONL line per tool invocation, appended
//! with no buffering. Fail-safe — a write error is logged and swallowed,
//! never propagated, because tracing must never be the reason a step fails.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tracing::warn;

use crate::record::ToolInvocationRecord;

const TRACE_FILE_NAME: &str = "tool_invocations.jsonl";
/// Set to any value to disable TIT entirely for a run.
pub const DISABLE_ENV_VAR: &str = "ORC_TRACE_DISABLE";

pub struct TraceLogger {
    file_path: PathBuf,
    enabled: bool,
    next_id: AtomicU64,
    next_invocation_index: Mutex<HashMap<String, u64>>,
}

impl TraceLogger {
    /// Opens (or creates) `store_dir/tool_invocations.jsonl` and recovers
    /// `next_id` (monotonic across the whole file, every run) and each run's
    /// `next_invocation_index` (monotonic within that run) by scanning
    /// whatever the file already holds, the same way
    /// `orc_session::EventWriter` recovers its sequence number on reopen.
    /// Without this, a process that constructs a fresh `TraceLogger` for a
    /// run already in progress — which is every CLI invocation after the
    /// first, since each subcommand builds its own `Engine` — would reset
    /// both counters to zero and start writing duplicate ids and
    /// invocation indices into a file that already holds them.
    pub fn new(store_dir: PathBuf) -> Self {
        let file_path = store_dir.join(TRACE_FILE_NAME);
        let recovered = recover_counters(&file_path);
        Self {
            file_path,
            enabled: std::env::var(DISABLE_ENV_VAR).is_err(),
            next_id: AtomicU64::new(recovered.next_id),
            next_invocation_index: Mutex::new(recovered.next_invocation_index_by_run),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Reserve the next `invocation_index` for `run_id`. Callers building a
    /// `ToolInvocationRecord` call this once per tool call, in call order,
    /// scoped to the run the call belongs to.
    pub fn next_invocation_index(&self, run_id: &str) -> u64 {
        let mut counters = self.next_invocation_index.lock().expect("trace logger mutex poisoned");
        let entry = counters.entry(run_id.to_string()).or_insert(0);
        let index = *entry;
        *entry += 1;
        index
    }

    /// Write `record` through immediately. Assigns `record.id`. Never
    /// returns an error to the caller — failures are logged via `tracing`
    /// and otherwise ignored.
    pub fn log(&self, mut record: ToolInvocationRecord) {
        if !self.enabled {
            return;
        }
        record.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        if let Err(error) = self.append(&record) {
            warn!(%error, tool = %record.tool_name, "failed to write tool invocation record");
        }
    }

    fn append(&self, record: &ToolInvocationRecord) -> anyhow::Result<()> {
        if let Some(parent) = self.file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().append(true).create(true).open(&self.file_path)?;
        set_file_mode_600(&self.file_path)?;
        let line = serde_json::to_string(record)?;
        writeln!(file, "{line}")?;
        file.flush()?;
        Ok(())
    }

    #[cfg(test)]
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

struct RecoveredCounters {
    next_id: u64,
    next_invocation_index_by_run: HashMap<String, u64>,
}

/// Scan the existing trace file, if any, for the highest `id` overall and
/// the highest `invocation_index` seen per `run_id`. Corrupt or partial
/// lines are skipped, matching the learning store's skip-and-warn behavior
/// rather than failing construction outright.
fn recover_counters(path: &Path) -> RecoveredCounters {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return RecoveredCounters { next_id: 0, next_invocation_index_by_run: HashMap::new() }
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read existing tool invocation trace for recovery");
            return RecoveredCounters { next_id: 0, next_invocation_index_by_run: HashMap::new() };
        }
    };

    let mut max_id: Option<u64> = None;
    let mut max_index_by_run: HashMap<String, u64> = HashMap::new();

    for line in contents.lines() {
        let Ok(record) = serde_json::from_str::<ToolInvocationRecord>(line) else {
            continue;
        };
        max_id = Some(max_id.map_or(record.id, |current| current.max(record.id)));
        let slot = max_index_by_run.entry(record.run_id).or_insert(record.invocation_index);
        *slot = (*slot).max(record.invocation_index);
    }

    let next_invocation_index_by_run = max_index_by_run.into_iter().map(|(run_id, max_index)| (run_id, max_index + 1)).collect();

    RecoveredCounters { next_id: max_id.map_or(0, |id| id + 1), next_invocation_index_by_run }
}

#[cfg(unix)]
fn set_file_mode_600(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_file_mode_600(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}
