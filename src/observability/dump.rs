//! Failure dump: a rotating JSON-lines log of actions that failed.
//!
//! The dispatcher never swallows action errors, but when a dump file is
//! configured it appends one [`FailureReport`] per failure before handing the
//! error back to the host. Files rotate by size and keep a fixed number of
//! backups, so a noisy action cannot fill the disk.

use crate::domain::{Event, Result, State};
use serde::Serialize;
use std::cell::RefCell;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Maximum file size before rotation (10 MB).
const MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;

/// Number of backup files to retain after rotation.
const MAX_BACKUP_FILES: usize = 3;

/// One failed dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureReport {
    /// RFC 3339 time of the failure.
    pub timestamp: String,
    /// Event as delivered by the host.
    pub event: Event,
    /// Key of the rule that matched (differs from `event` for wildcard keys).
    pub matched: Event,
    /// State the dispatch started from.
    pub from: Option<State>,
    /// Current state when the failure surfaced.
    pub state: Option<State>,
    /// Diagnostic names of the handlers in the failing rule.
    pub actions: Vec<String>,
    pub error: String,
}

impl FailureReport {
    /// Stamps a report with the current time.
    #[must_use]
    pub fn now(
        event: Event,
        matched: Event,
        from: Option<State>,
        state: Option<State>,
        actions: Vec<String>,
        error: String,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            event,
            matched,
            from,
            state,
            actions,
            error,
        }
    }
}

/// Size-rotating writer for failure reports.
///
/// The file is opened lazily on the first write. When it grows past 10 MB it is
/// renamed to `<name>.<unix_timestamp>` and only the three newest backups are
/// kept.
///
/// # Example
///
/// ```no_run
/// use statewire::observability::{DumpWriter, FailureReport};
///
/// let writer = DumpWriter::new("/tmp/statewire-dump.jsonl");
/// let report = FailureReport::now(
///     "coin".into(), "coin".into(), None, None, vec![], "jammed".to_string(),
/// );
/// writer.write_report(&report)?;
/// # Ok::<(), statewire::StatewireError>(())
/// ```
pub struct DumpWriter {
    file_path: PathBuf,
    writer: RefCell<Option<fs::File>>,
}

impl DumpWriter {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            writer: RefCell::new(None),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Serializes `report` as one JSON line and appends it.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization, rotation, opening or writing fails.
    pub fn write_report(&self, report: &FailureReport) -> Result<()> {
        let line = serde_json::to_string(report)?;
        self.write_line(&line)?;
        Ok(())
    }

    /// Appends a single line, rotating first if the file is too large.
    ///
    /// # Errors
    ///
    /// Fails on filesystem errors.
    ///
    /// # Panics
    ///
    /// Panics if called re-entrantly on the same writer.
    pub fn write_line(&self, line: &str) -> std::io::Result<()> {
        let mut writer = self.writer.borrow_mut();

        self.check_and_rotate(&mut writer)?;

        if writer.is_none() {
            if let Some(parent) = self.file_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.file_path)?;
            *writer = Some(file);
        }

        let file = writer
            .as_mut()
            .ok_or_else(|| std::io::Error::other("No file available"))?;

        writeln!(file, "{line}")?;
        file.flush()?;
        drop(writer);

        Ok(())
    }

    fn check_and_rotate(&self, writer: &mut Option<fs::File>) -> std::io::Result<()> {
        if let Ok(metadata) = fs::metadata(&self.file_path) {
            if metadata.len() > MAX_FILE_SIZE_BYTES {
                *writer = None;
                self.rotate_files()?;
            }
        }
        Ok(())
    }

    fn rotate_files(&self) -> std::io::Result<()> {
        let timestamp = chrono::Utc::now().timestamp();
        let mut backup = self.file_path.clone().into_os_string();
        backup.push(format!(".{timestamp}"));

        if self.file_path.exists() {
            fs::rename(&self.file_path, PathBuf::from(backup))?;
        }

        self.cleanup_old_backups()
    }

    /// Keeps the newest `MAX_BACKUP_FILES` backups; deletion errors are ignored.
    fn cleanup_old_backups(&self) -> std::io::Result<()> {
        let parent_dir = self
            .file_path
            .parent()
            .ok_or_else(|| std::io::Error::other("No parent directory"))?;

        let file_name = self
            .file_path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| std::io::Error::other("Invalid file name"))?;
        let prefix = format!("{file_name}.");

        let mut backups: Vec<PathBuf> = fs::read_dir(parent_dir)?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(&prefix))
            })
            .collect();

        backups.sort_by(|a, b| {
            let a_time = fs::metadata(a).and_then(|m| m.modified()).ok();
            let b_time = fs::metadata(b).and_then(|m| m.modified()).ok();
            b_time.cmp(&a_time)
        });

        for old_backup in backups.iter().skip(MAX_BACKUP_FILES) {
            let _ = fs::remove_file(old_backup);
        }

        Ok(())
    }
}

impl std::fmt::Debug for DumpWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DumpWriter")
            .field("file_path", &self.file_path)
            .finish_non_exhaustive()
    }
}
