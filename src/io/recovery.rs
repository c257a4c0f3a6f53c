use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::warn;
use serde::Serialize;

use crate::io::notebook_io::atomic_write;

/// Entries older than this are removed by a plain `prune`
pub const PRUNE_AGE_DAYS: i64 = 30;

const LOG_HEADER: &str = "<!-- cardbox recovery log. List: cardbox recovery. Prune: cardbox recovery prune. -->\n";

/// Why text ended up in the recovery log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryKind {
    /// A note removed from its day file
    Deleted,
    /// A record skipped on load because its timestamp was already taken
    Duplicate,
    /// A day file whose new text could not be written
    Unwritten,
}

impl fmt::Display for RecoveryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecoveryKind::Deleted => "deleted",
            RecoveryKind::Duplicate => "duplicate",
            RecoveryKind::Unwritten => "unwritten",
        })
    }
}

impl RecoveryKind {
    fn from_word(word: &str) -> Option<Self> {
        match word {
            "deleted" => Some(RecoveryKind::Deleted),
            "duplicate" => Some(RecoveryKind::Duplicate),
            "unwritten" => Some(RecoveryKind::Unwritten),
            _ => None,
        }
    }
}

/// One saved piece of notebook text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryEntry {
    pub logged_at: DateTime<Utc>,
    pub kind: RecoveryKind,
    /// The note concerned; `None` for a whole day file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<i64>,
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Record source, or the file text that was not written
    pub text: String,
}

impl RecoveryEntry {
    fn new(kind: RecoveryKind, note: Option<i64>, file: &str, text: &str) -> Self {
        RecoveryEntry {
            logged_at: Utc::now(),
            kind,
            note,
            file: file.to_string(),
            error: None,
            text: text.trim_end().to_string(),
        }
    }

    pub fn summary(&self) -> String {
        match (self.kind, self.note) {
            (RecoveryKind::Deleted, Some(ts)) => format!("note {} deleted", ts),
            (RecoveryKind::Duplicate, Some(ts)) => format!("duplicate note {} skipped", ts),
            _ => format!("could not write {}", self.file),
        }
    }

    /// Human-readable form for `cardbox recovery`
    pub fn display(&self) -> String {
        let mut out = format!(
            "{}  {}  ({})\n",
            self.logged_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.summary(),
            self.file
        );
        if let Some(ref error) = self.error {
            out.push_str(&format!("    error: {}\n", error));
        }
        for line in self.text.lines() {
            out.push_str("    ");
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
        out
    }

    /// `## <time> <kind> <note|-> <file>`, then the text in a backtick fence
    /// longer than any backtick run inside it
    fn to_log_text(&self) -> String {
        let note = self.note.map_or_else(|| "-".to_string(), |ts| ts.to_string());
        let mut out = format!(
            "\n## {} {} {} {}\n",
            self.logged_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            self.kind,
            note,
            self.file
        );
        if let Some(ref error) = self.error {
            out.push_str(&format!("error: {}\n", error.replace('\n', " ")));
        }
        let fence = "`".repeat(longest_backtick_run(&self.text).max(2) + 1);
        out.push_str(&fence);
        out.push('\n');
        if !self.text.is_empty() {
            out.push_str(&self.text);
            out.push('\n');
        }
        out.push_str(&fence);
        out.push('\n');
        out
    }
}

fn longest_backtick_run(text: &str) -> usize {
    text.split(|c| c != '`').map(str::len).max().unwrap_or(0)
}

pub fn recovery_log_path(notebook_dir: &Path) -> PathBuf {
    notebook_dir.join(".recovery.log")
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Append an entry. A log that cannot be written is reported, not fatal.
fn append(notebook_dir: &Path, entry: &RecoveryEntry) {
    let path = recovery_log_path(notebook_dir);
    let result = (|| -> io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if file.metadata()?.len() == 0 {
            file.write_all(LOG_HEADER.as_bytes())?;
        }
        file.write_all(entry.to_log_text().as_bytes())
    })();
    if let Err(e) = result {
        warn!("could not write to {}: {}", path.display(), e);
    }
}

/// Save a note that was removed from `file_name`
pub fn log_note_deletion(notebook_dir: &Path, timestamp: i64, file_name: &str, source: &str) {
    let entry = RecoveryEntry::new(RecoveryKind::Deleted, Some(timestamp), file_name, source);
    append(notebook_dir, &entry);
}

/// Save a record that lost its timestamp to an earlier one
pub fn log_duplicate(notebook_dir: &Path, timestamp: i64, file_name: &str, source: &str) {
    let entry = RecoveryEntry::new(RecoveryKind::Duplicate, Some(timestamp), file_name, source);
    append(notebook_dir, &entry);
}

/// Save the text a day file should have had
pub fn log_unwritten(notebook_dir: &Path, file_name: &str, error: &io::Error, text: &str) {
    let mut entry = RecoveryEntry::new(RecoveryKind::Unwritten, None, file_name, text);
    entry.error = Some(error.to_string());
    append(notebook_dir, &entry);
}

// ---------------------------------------------------------------------------
// Reading and pruning
// ---------------------------------------------------------------------------

/// Entries in the log, newest first, at most `limit` of them
pub fn read_recovery_entries(notebook_dir: &Path, limit: Option<usize>) -> Vec<RecoveryEntry> {
    let content = fs::read_to_string(recovery_log_path(notebook_dir)).unwrap_or_default();
    let mut entries = parse_log(&content);
    entries.reverse();
    if let Some(n) = limit {
        entries.truncate(n);
    }
    entries
}

/// Remove entries logged before `before` (default: `PRUNE_AGE_DAYS` ago),
/// or every entry with `all`. Returns how many were removed.
pub fn prune_recovery(
    notebook_dir: &Path,
    before: Option<DateTime<Utc>>,
    all: bool,
) -> io::Result<usize> {
    let path = recovery_log_path(notebook_dir);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let entries = parse_log(&content);
    let cutoff = before.unwrap_or_else(|| Utc::now() - chrono::Duration::days(PRUNE_AGE_DAYS));
    let kept: Vec<&RecoveryEntry> = entries
        .iter()
        .filter(|e| !all && e.logged_at >= cutoff)
        .collect();
    if kept.len() == entries.len() {
        return Ok(0);
    }

    let mut text = LOG_HEADER.to_string();
    for entry in &kept {
        text.push_str(&entry.to_log_text());
    }
    atomic_write(&path, text.as_bytes())?;
    Ok(entries.len() - kept.len())
}

/// Parse the log, oldest first. Unreadable headers are skipped with their text.
fn parse_log(content: &str) -> Vec<RecoveryEntry> {
    let mut entries = Vec::new();
    let mut lines = content.lines().peekable();

    while let Some(line) = lines.next() {
        let Some(mut entry) = line.strip_prefix("## ").and_then(parse_heading) else {
            continue;
        };

        // Optional error line, then the fenced text
        let mut fence = None;
        while let Some(&next) = lines.peek() {
            if next.starts_with("## ") {
                break;
            }
            lines.next();
            if let Some(error) = next.strip_prefix("error: ") {
                entry.error = Some(error.to_string());
            } else if next.len() >= 3 && next.bytes().all(|b| b == b'`') {
                fence = Some(next);
                break;
            }
        }

        if let Some(fence) = fence {
            let mut body = Vec::new();
            for line in lines.by_ref() {
                if line == fence {
                    break;
                }
                body.push(line);
            }
            entry.text = body.join("\n");
        }
        entries.push(entry);
    }

    entries
}

/// `<time> <kind> <note|-> <file>`
fn parse_heading(heading: &str) -> Option<RecoveryEntry> {
    let mut words = heading.split_whitespace();
    let logged_at = DateTime::parse_from_rfc3339(words.next()?)
        .ok()?
        .with_timezone(&Utc);
    let kind = RecoveryKind::from_word(words.next()?)?;
    let note = match words.next()? {
        "-" => None,
        ts => Some(ts.parse().ok()?),
    };
    let file = words.next()?.to_string();
    Some(RecoveryEntry {
        logged_at,
        kind,
        note,
        file,
        error: None,
        text: String::new(),
    })
}
