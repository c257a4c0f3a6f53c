use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, Local, Utc};
use indexmap::IndexMap;
use log::debug;
use regex::Regex;
use tempfile::NamedTempFile;

use crate::io::recovery::{log_note_deletion, log_unwritten};
use crate::model::config::NotebookConfig;
use crate::model::record::{DayFile, Record, WriteBack};
use crate::parse::{merge_day, parse_day, serialize_record};

/// Name of the optional per-notebook config file
pub const CONFIG_FILE: &str = "notebook.toml";

/// Error type for notebook storage operations
#[derive(Debug, thiserror::Error)]
pub enum NotebookError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse notebook.toml: {0}")]
    ConfigParseError(#[from] toml::de::Error),
    #[error("could not serialize notebook.toml: {0}")]
    ConfigSerializeError(#[from] toml::ser::Error),
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

/// `YYYY_MM_DD` stem of a day file
static DAY_STEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}_\d{2}_\d{2}$").expect("day stem pattern is valid"));

// ---------------------------------------------------------------------------
// Day file naming
// ---------------------------------------------------------------------------

/// The day file a note belongs in: its creation day in local time.
pub fn day_file_name(timestamp: i64, extension: &str) -> String {
    let utc = DateTime::<Utc>::from_timestamp(timestamp, 0).unwrap_or_default();
    format!(
        "{}.{}",
        utc.with_timezone(&Local).format("%Y_%m_%d"),
        extension
    )
}

/// True for `YYYY_MM_DD.<extension>`
pub fn is_day_file_name(name: &str, extension: &str) -> bool {
    name.strip_suffix(extension)
        .and_then(|stem| stem.strip_suffix('.'))
        .is_some_and(|stem| DAY_STEM_RE.is_match(stem))
}

/// Day files in `dir`, sorted by name (and so by date).
/// A missing directory holds no day files.
pub fn list_day_files(dir: &Path, extension: &str) -> Result<Vec<String>, NotebookError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(NotebookError::ReadError {
                path: dir.to_path_buf(),
                source: e,
            });
        }
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str()
            && is_day_file_name(name, extension)
        {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

// ---------------------------------------------------------------------------
// Reading and writing day files
// ---------------------------------------------------------------------------

/// Read a day file's text. A missing file reads as empty.
fn read_day_text(path: &Path) -> Result<String, NotebookError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(NotebookError::ReadError {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Parse one day file. A missing file has no records.
pub fn read_day_file(dir: &Path, name: &str) -> Result<DayFile, NotebookError> {
    let text = read_day_text(&dir.join(name))?;
    Ok(parse_day(&text))
}

/// What writing one day file did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    /// The merged text equals what was on disk; nothing was written
    pub unchanged: bool,
    /// The file was left with no records and was removed
    pub removed_file: bool,
    /// Timestamps dropped from the file
    pub dropped: Vec<i64>,
}

/// Merge `updates` into the day file `name` and write it back atomically.
///
/// Once the file is written or removed, dropped records are copied to the
/// recovery log. When nothing is left the file is removed. A failed write logs the unwritten text to the recovery
/// log before returning the error.
pub fn write_day_file(
    dir: &Path,
    name: &str,
    updates: IndexMap<i64, WriteBack>,
) -> Result<WriteOutcome, NotebookError> {
    let path = dir.join(name);
    let existing = read_day_text(&path)?;
    let merged = merge_day(&existing, updates);

    let mut outcome = WriteOutcome {
        dropped: merged.dropped.iter().map(|r| r.timestamp).collect(),
        ..WriteOutcome::default()
    };

    if merged.is_empty() {
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("removed empty day file {}", name);
                log_dropped(dir, name, &merged.dropped);
                outcome.removed_file = true;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => outcome.unchanged = true,
            Err(e) => return Err(NotebookError::WriteError { path, source: e }),
        }
        return Ok(outcome);
    }

    if merged.text == existing {
        outcome.unchanged = true;
        return Ok(outcome);
    }

    if let Err(e) = atomic_write(&path, merged.text.as_bytes()) {
        log_unwritten(dir, name, &e, &merged.text);
        return Err(NotebookError::WriteError { path, source: e });
    }
    debug!("wrote {} ({} notes)", name, merged.record_count);
    log_dropped(dir, name, &merged.dropped);
    Ok(outcome)
}

/// Copy records that are now gone from disk to the recovery log
fn log_dropped(dir: &Path, name: &str, dropped: &[Record]) {
    for record in dropped {
        log_note_deletion(dir, record.timestamp, name, &record_source(record));
    }
}

/// Replace `path` with `content` through a temp file in the same directory
pub fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// The text a record had on disk, or its canonical form
fn record_source(record: &Record) -> String {
    match record.source_text {
        Some(ref lines) => lines.join("\n"),
        None => serialize_record(record).join("\n"),
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Load `notebook.toml`. A missing file gives the defaults.
pub fn load_config(dir: &Path) -> Result<NotebookConfig, NotebookError> {
    let path = dir.join(CONFIG_FILE);
    match fs::read_to_string(&path) {
        Ok(text) => Ok(toml::from_str(&text)?),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(NotebookConfig::default()),
        Err(e) => Err(NotebookError::ReadError { path, source: e }),
    }
}

/// Write `notebook.toml`
pub fn save_config(dir: &Path, config: &NotebookConfig) -> Result<(), NotebookError> {
    let path = dir.join(CONFIG_FILE);
    let text = toml::to_string_pretty(config)?;
    atomic_write(&path, text.as_bytes())
        .map_err(|e| NotebookError::WriteError { path, source: e })
}
