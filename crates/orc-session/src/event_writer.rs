//! Append-only JSONL event stream for one session.
//!
//! Every step transition, retry, approval and status change is appended
//! here as it happens, independent of (and in addition to) the session's
//! own `state.toml` snapshot. A reader can replay the stream to reconstruct
//! a run's history without touching the operational store's current state.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::SecondsFormat;
use orc_core::{FailureClass, StepName};
use serde::{Deserialize, Serialize};
use tracing::warn;

const STREAM_SCHEMA_VERSION: u8 = 1;
const FLUSH_SIZE_BYTES: usize = 64 * 1024;
const FLUSH_INTERVAL: Duration = Duration::from_millis(100);

/// One event in a session's lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    StepStarted { step: StepName },
    StepApproved { step: StepName },
    StepRejected { step: StepName, reasons: Vec<String> },
    StepRetried { step: StepName, attempt: u32 },
    StepFailed { step: StepName, class: FailureClass },
    SessionPaused,
    SessionResumed,
    SessionCompleted,
    SessionFailed { step: StepName },
}

#[derive(Debug, Clone, Copy, Default)]
struct ResumeState {
    next_seq: u64,
    existing_lines: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventWriteStats {
    pub lines_written: u64,
    pub bytes_written: u64,
    pub write_failures: u64,
}

#[derive(Debug)]
pub struct EventWriter {
    output_path: PathBuf,
    writer: Option<BufWriter<File>>,
    pending: Vec<u8>,
    pending_lines: u64,
    seq: u64,
    lines_written: u64,
    bytes_written: u64,
    write_failures: u64,
    last_flush: Instant,
}

#[derive(Serialize)]
struct JsonlEvent<'a> {
    v: u8,
    seq: u64,
    ts: String,
    #[serde(flatten)]
    data: &'a OrchestratorEvent,
}

#[derive(Deserialize)]
struct JsonlSeq {
    seq: u64,
}

impl EventWriter {
    pub fn new(output_path: &Path) -> Self {
        let resume_state = match load_resume_state(output_path) {
            Ok(state) => state,
            Err(err) => {
                warn!(
                    path = %output_path.display(),
                    error = %err,
                    "failed to inspect existing session event stream"
                );
                ResumeState::default()
            }
        };

        let (writer, write_failures) = match open_stream_file(output_path) {
            Ok(mut file) => match truncate_partial_trailing_line(output_path, &mut file) {
                Ok(()) => (Some(BufWriter::new(file)), 0),
                Err(err) => {
                    warn!(
                        path = %output_path.display(),
                        error = %err,
                        "failed to truncate partial trailing event line"
                    );
                    (None, 1)
                }
            },
            Err(err) => {
                warn!(
                    path = %output_path.display(),
                    error = %err,
                    "failed to initialize session event writer"
                );
                (None, 1)
            }
        };

        Self {
            output_path: output_path.to_path_buf(),
            writer,
            pending: Vec::new(),
            pending_lines: 0,
            seq: resume_state.next_seq,
            lines_written: resume_state.existing_lines,
            bytes_written: 0,
            write_failures,
            last_flush: Instant::now(),
        }
    }

    pub fn append(&mut self, event: &OrchestratorEvent) {
        let payload = JsonlEvent {
            v: STREAM_SCHEMA_VERSION,
            seq: self.seq,
            ts: chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            data: event,
        };

        match serde_json::to_vec(&payload) {
            Ok(mut line) => {
                self.seq = self.seq.saturating_add(1);
                line.push(b'\n');
                self.pending.extend_from_slice(&line);
                self.pending_lines = self.pending_lines.saturating_add(1);
                if self.should_flush() {
                    self.flush_internal();
                }
            }
            Err(err) => {
                self.write_failures = self.write_failures.saturating_add(1);
                warn!(
                    path = %self.output_path.display(),
                    seq = self.seq,
                    error = %err,
                    "failed to serialize session event"
                );
            }
        }
    }

    pub fn flush(&mut self) {
        self.flush_internal();
    }

    pub fn stats(&self) -> EventWriteStats {
        EventWriteStats {
            lines_written: self.lines_written,
            bytes_written: self.bytes_written,
            write_failures: self.write_failures,
        }
    }

    fn should_flush(&self) -> bool {
        self.pending.len() >= FLUSH_SIZE_BYTES || self.last_flush.elapsed() >= FLUSH_INTERVAL
    }

    fn flush_internal(&mut self) {
        if self.pending.is_empty() {
            self.last_flush = Instant::now();
            return;
        }

        let Some(writer) = self.writer.as_mut() else {
            self.write_failures = self.write_failures.saturating_add(1);
            self.pending.clear();
            self.pending_lines = 0;
            self.last_flush = Instant::now();
            warn!(
                path = %self.output_path.display(),
                "dropping buffered session events because writer is unavailable"
            );
            return;
        };

        let pending_bytes = self.pending.len() as u64;
        let pending_lines = self.pending_lines;
        let write_result = writer.write_all(&self.pending).and_then(|_| writer.flush());

        self.last_flush = Instant::now();
        match write_result {
            Ok(()) => {
                self.bytes_written = self.bytes_written.saturating_add(pending_bytes);
                self.lines_written = self.lines_written.saturating_add(pending_lines);
            }
            Err(err) => {
                self.write_failures = self.write_failures.saturating_add(1);
                warn!(
                    path = %self.output_path.display(),
                    error = %err,
                    "failed to flush session event buffer"
                );
            }
        }

        self.pending.clear();
        self.pending_lines = 0;
    }
}

impl Drop for EventWriter {
    fn drop(&mut self) {
        self.flush_internal();
    }
}

fn open_stream_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .read(true)
        .open(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(file)
}

fn truncate_partial_trailing_line(path: &Path, file: &mut File) -> std::io::Result<()> {
    let file_len = file.metadata()?.len();
    if file_len == 0 {
        return Ok(());
    }

    file.seek(SeekFrom::End(-1))?;
    let mut last_byte = [0_u8; 1];
    file.read_exact(&mut last_byte)?;

    if last_byte[0] == b'\n' {
        file.seek(SeekFrom::End(0))?;
        return Ok(());
    }

    let bytes = std::fs::read(path)?;
    let truncate_len = bytes
        .iter()
        .rposition(|byte| *byte == b'\n')
        .map_or(0_u64, |pos| pos as u64 + 1);

    file.set_len(truncate_len)?;
    file.seek(SeekFrom::End(0))?;
    Ok(())
}

fn load_resume_state(path: &Path) -> std::io::Result<ResumeState> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(ResumeState::default()),
        Err(err) => return Err(err),
    };

    if file.metadata()?.len() == 0 {
        return Ok(ResumeState::default());
    }

    let mut reader = BufReader::new(file);
    let mut line_buf = Vec::new();
    let mut existing_lines = 0_u64;
    let mut last_valid_next_seq: Option<u64> = None;

    loop {
        line_buf.clear();
        let read_bytes = reader.read_until(b'\n', &mut line_buf)?;
        if read_bytes == 0 {
            break;
        }

        let Some(last_byte) = line_buf.last() else {
            continue;
        };
        if *last_byte != b'\n' {
            continue;
        }

        existing_lines = existing_lines.saturating_add(1);
        let complete_line = &line_buf[..line_buf.len() - 1];
        if let Ok(parsed) = serde_json::from_slice::<JsonlSeq>(complete_line) {
            last_valid_next_seq = Some(parsed.seq.saturating_add(1));
        }
    }

    let next_seq = last_valid_next_seq.unwrap_or(0);

    Ok(ResumeState {
        next_seq,
        existing_lines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_persists_jsonl_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("events.jsonl");
        let mut writer = EventWriter::new(&path);
        writer.append(&OrchestratorEvent::StepStarted {
            step: StepName::Analysis,
        });
        writer.append(&OrchestratorEvent::StepApproved {
            step: StepName::Analysis,
        });
        writer.flush();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"seq\":0"));
        assert!(lines[0].contains("\"type\":\"step_started\""));
        assert!(lines[1].contains("\"seq\":1"));

        let stats = writer.stats();
        assert_eq!(stats.lines_written, 2);
        assert_eq!(stats.write_failures, 0);
    }

    #[test]
    fn test_writer_flushes_on_drop() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("events.jsonl");
        {
            let mut writer = EventWriter::new(&path);
            writer.append(&OrchestratorEvent::SessionPaused);
        }
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn test_writer_resumes_seq_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("events.jsonl");

        {
            let mut first = EventWriter::new(&path);
            first.append(&OrchestratorEvent::StepStarted {
                step: StepName::Analysis,
            });
            first.append(&OrchestratorEvent::StepApproved {
                step: StepName::Analysis,
            });
            first.flush();
        }

        let mut resumed = EventWriter::new(&path);
        resumed.append(&OrchestratorEvent::SessionCompleted);
        resumed.flush();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[2].contains("\"seq\":2"));
    }

    #[test]
    fn test_writer_truncates_partial_trailing_line_before_appending() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("events.jsonl");

        {
            let mut first = EventWriter::new(&path);
            first.append(&OrchestratorEvent::StepStarted {
                step: StepName::Analysis,
            });
            first.flush();
        }

        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(br#"{"v":1,"seq":999,"type":"PARTIAL-DO-NOT-KEEP""#)
                .unwrap();
        }

        let mut resumed = EventWriter::new(&path);
        resumed.append(&OrchestratorEvent::SessionCompleted);
        resumed.flush();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("PARTIAL-DO-NOT-KEEP"));
        assert_eq!(content.lines().count(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_writer_sets_strict_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("events.jsonl");
        let mut writer = EventWriter::new(&path);
        writer.append(&OrchestratorEvent::SessionCompleted);
        writer.flush();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
