//! Captures a spawned instance's stdout/stderr into a rotating log file,
//! one active file plus one `.1` backup per instance. A dedicated reader
//! thread per stream, line-buffered, forwards into a single writer.
//!
//! There is exactly one destination here (the instance's own log file), so
//! the reader thread writes directly through a shared, mutex-guarded
//! handle. Rotation replaces the handle behind the same mutex, so from the
//! writer thread's perspective the swap is atomic.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::model::ids::InstanceId;
use crate::util::threads::spawn_named_thread;

const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// Parses `line` as a JSON object and extracts a `level`/`lvl`/`severity`
/// field, upper-cased, so structured logs from the supervised binary carry
/// their level into the captured file. Returns `None` for plain-text lines
/// or JSON without a recognizable level field; the raw line is then written
/// unchanged.
fn parse_json_level(line: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(line.trim()).ok()?;
    let level = value
        .get("level")
        .or_else(|| value.get("lvl"))
        .or_else(|| value.get("severity"))?;
    level.as_str().map(str::to_uppercase)
}

struct RotatingWriter {
    path: PathBuf,
    file: File,
    written: u64,
}

impl RotatingWriter {
    fn open(path: PathBuf) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata().map(|m| m.len()).unwrap_or(0);
        Ok(Self {
            path,
            file,
            written,
        })
    }

    fn write_line(&mut self, line: &str) {
        if self.written >= MAX_LOG_BYTES {
            self.rotate();
        }
        let formatted = match parse_json_level(line) {
            Some(level) => format!("[{level}] {line}"),
            None => line.to_string(),
        };
        if let Err(err) = writeln!(self.file, "{formatted}") {
            warn!(path = %self.path.display(), %err, "failed to write instance log line");
            return;
        }
        self.written += formatted.len() as u64 + 1;
    }

    fn rotate(&mut self) {
        let backup = self.path.with_extension("1");
        if let Err(err) = fs::rename(&self.path, &backup) {
            warn!(path = %self.path.display(), %err, "failed to rotate instance log");
            return;
        }
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
        {
            Ok(file) => {
                self.file = file;
                self.written = 0;
            }
            Err(err) => warn!(path = %self.path.display(), %err, "failed to reopen rotated log"),
        }
    }
}

#[derive(Clone)]
pub struct LogCapture {
    log_dir: PathBuf,
}

impl LogCapture {
    pub fn new(log_dir: PathBuf) -> Self {
        Self { log_dir }
    }

    fn path_for(&self, instance_id: &InstanceId, stream: &str) -> PathBuf {
        self.log_dir.join(format!("{instance_id}.{stream}.log"))
    }

    /// Every log file (active and rotated backup) that might exist for
    /// `instance_id`, used by `DeleteInstance` to clean up on-disk state
    /// (see DESIGN.md for the decision to remove log files on delete).
    pub fn log_files_for(&self, instance_id: &InstanceId) -> Vec<PathBuf> {
        ["stdout", "stderr"]
            .iter()
            .flat_map(|stream| {
                let active = self.path_for(instance_id, stream);
                let backup = active.with_extension("1");
                [active, backup]
            })
            .collect()
    }

    pub fn spawn_readers(
        &self,
        instance_id: InstanceId,
        stdout: impl Read + Send + 'static,
        stderr: impl Read + Send + 'static,
    ) {
        self.spawn_one(instance_id.clone(), "stdout", stdout);
        self.spawn_one(instance_id, "stderr", stderr);
    }

    fn spawn_one(&self, instance_id: InstanceId, stream: &'static str, handle: impl Read + Send + 'static) {
        let path = self.path_for(&instance_id, stream);
        let writer = match RotatingWriter::open(path.clone()) {
            Ok(writer) => Arc::new(Mutex::new(writer)),
            Err(err) => {
                warn!(path = %path.display(), %err, "could not open instance log file, logs will not be captured");
                return;
            }
        };

        spawn_named_thread(&format!("log-capture-{instance_id}-{stream}"), move || {
            let reader = BufReader::new(handle);
            for line in reader.lines() {
                let Ok(line) = line else { break };
                writer
                    .lock()
                    .expect("log writer mutex poisoned")
                    .write_line(&line);
            }
        });
    }
}

pub fn ensure_log_dir(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_creates_backup_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rotating.log");
        let mut writer = RotatingWriter::open(path.clone()).unwrap();
        writer.written = MAX_LOG_BYTES;
        writer.write_line("triggers rotation");

        assert!(path.with_extension("1").exists());
        assert!(path.exists());
    }

    #[test]
    fn json_line_with_level_field_is_tagged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("json.log");
        let mut writer = RotatingWriter::open(path.clone()).unwrap();
        writer.write_line(r#"{"level":"warn","msg":"disk almost full"}"#);

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("[WARN] "));
        assert!(contents.contains("disk almost full"));
    }

    #[test]
    fn raw_line_is_written_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.log");
        let mut writer = RotatingWriter::open(path.clone()).unwrap();
        writer.write_line("plain text, not json");

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "plain text, not json\n");
    }

    #[test]
    fn json_without_level_field_falls_back_to_raw() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-level.log");
        let mut writer = RotatingWriter::open(path.clone()).unwrap();
        writer.write_line(r#"{"msg":"no level here"}"#);

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "{\"msg\":\"no level here\"}\n");
    }
}
