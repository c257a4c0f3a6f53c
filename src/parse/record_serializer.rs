use indexmap::IndexMap;

use crate::model::record::{DayFile, Record, WriteBack};
use crate::parse::record_parser::parse_day;

/// Result of merging pending writes into a day file
#[derive(Debug, Clone)]
pub struct MergedDay {
    /// The new file text (empty when nothing is left)
    pub text: String,
    /// Records that were on disk and have been dropped
    pub dropped: Vec<Record>,
    /// Number of records in the new text
    pub record_count: usize,
}

impl MergedDay {
    /// True when the file should be removed rather than written
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Serialize a single record in canonical form, ending with a blank line.
pub fn serialize_record(record: &Record) -> Vec<String> {
    let mut lines = vec![format!("@[{}]", record.timestamp)];
    if let Some(ref color) = record.color {
        lines.push(format!("[color:{}]", color));
    }
    if record.prefer_idx > 0 {
        lines.push(format!("[idx:{}]", record.prefer_idx));
    }
    if !record.tags.is_empty() {
        lines.push(
            record
                .tags
                .iter()
                .map(|t| format!("#{}", t))
                .collect::<Vec<_>>()
                .join(" "),
        );
    }
    if !record.labels.is_empty() {
        lines.push(
            record
                .labels
                .iter()
                .map(|l| format!("@{}", l))
                .collect::<Vec<_>>()
                .join(" "),
        );
    }
    if !record.content.is_empty() {
        lines.extend(record.content.lines().map(|l| l.to_string()));
    }
    lines.push(String::new());
    lines
}

/// Serialize a day file back to text.
/// Records with source text are emitted verbatim; others in canonical form.
pub fn serialize_day(day: &DayFile) -> String {
    let mut lines: Vec<String> = day.preamble.clone();
    let mut ends_canonical = false;

    for record in &day.records {
        ends_canonical = record.source_text.is_none();
        match record.source_text {
            Some(ref source) => lines.extend(source.iter().cloned()),
            None => {
                // Keep records separated when the previous one had no trailing blank
                if lines.last().is_some_and(|l| !l.trim().is_empty()) {
                    lines.push(String::new());
                }
                lines.extend(serialize_record(record));
            }
        }
    }

    if lines.iter().all(|l| l.trim().is_empty()) {
        return String::new();
    }
    // The canonical record separator is not needed at the end of the file
    while ends_canonical && lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

/// Merge pending writes into an existing day file's text.
///
/// Records whose timestamp has a pending write are replaced in place (or
/// dropped when `keep` is false); all other records are re-emitted exactly
/// as they were. Pending writes for records not in the file are appended in
/// queue order.
pub fn merge_day(source: &str, mut updates: IndexMap<i64, WriteBack>) -> MergedDay {
    let parsed = parse_day(source);
    let mut dropped = Vec::new();
    let mut records = Vec::with_capacity(parsed.records.len());

    for record in parsed.records {
        match updates.shift_remove(&record.timestamp) {
            Some(update) if update.keep => records.push(without_source(update.record)),
            Some(_) => dropped.push(record),
            None => records.push(record),
        }
    }

    for (_, update) in updates {
        if update.keep {
            records.push(without_source(update.record));
        }
    }

    let record_count = records.len();
    let text = serialize_day(&DayFile {
        preamble: parsed.preamble,
        records,
    });
    MergedDay {
        text,
        dropped,
        record_count,
    }
}

fn without_source(mut record: Record) -> Record {
    record.source_text = None;
    record
}
