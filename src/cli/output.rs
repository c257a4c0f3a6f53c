use std::collections::BTreeMap;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::model::note::{Deletion, Note};
use crate::ops::reconcile::RefreshReport;
use crate::util::unicode::{display_width, one_line_preview};

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct NoteJson {
    pub timestamp: i64,
    pub position: usize,
    pub content: String,
    pub tags: Vec<String>,
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<i64>,
    pub deletion: Deletion,
}

#[derive(Serialize)]
pub struct NoteListJson {
    pub notes: Vec<NoteJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_error: Option<String>,
}

#[derive(Serialize)]
pub struct CountJson {
    pub name: String,
    pub count: usize,
}

#[derive(Serialize)]
pub struct RefreshJson {
    pub loaded: usize,
    pub queued: usize,
    pub files_written: usize,
    pub files_removed: usize,
    pub files_unchanged: usize,
    pub notes_dropped: usize,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// `position` is 1-based
pub fn note_to_json(note: &Note, position: usize) -> NoteJson {
    NoteJson {
        timestamp: note.timestamp(),
        position,
        content: note.content().to_string(),
        tags: note.tags().iter().cloned().collect(),
        labels: note.labels().iter().cloned().collect(),
        color: note.color().map(|c| c.to_string()),
        links: note.links().to_vec(),
        deletion: note.deletion(),
    }
}

pub fn counts_to_json(counts: &BTreeMap<String, usize>) -> Vec<CountJson> {
    counts
        .iter()
        .map(|(name, &count)| CountJson {
            name: name.clone(),
            count,
        })
        .collect()
}

pub fn refresh_to_json(report: &RefreshReport) -> RefreshJson {
    RefreshJson {
        loaded: report.loaded,
        queued: report.queued,
        files_written: report.push.files_written,
        files_removed: report.push.files_removed,
        files_unchanged: report.push.files_unchanged,
        notes_dropped: report.push.notes_dropped,
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

/// Creation time in local time, `YYYY-MM-DD HH:MM`
pub fn format_created(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "????-??-?? ??:??".to_string())
}

fn metadata_suffix(note: &Note) -> String {
    let mut parts: Vec<String> = note.tags().iter().map(|t| format!("#{}", t)).collect();
    parts.extend(note.labels().iter().map(|l| format!("@{}", l)));
    if parts.is_empty() {
        String::new()
    } else {
        format!("  {}", parts.join(" "))
    }
}

/// `<timestamp>  <preview>  #tags @labels`, with a `x` marker for notes
/// waiting to be deleted
pub fn format_note_line(note: &Note, preview_width: usize) -> String {
    let marker = if note.is_pending_delete() { 'x' } else { ' ' };
    format!(
        "{} {}  {}{}",
        marker,
        note.timestamp(),
        one_line_preview(note.content(), preview_width),
        metadata_suffix(note)
    )
}

/// Detailed note view
pub fn format_note_detail(note: &Note, position: usize) -> Vec<String> {
    let mut lines = vec![format!(
        "@[{}]  #{}  {}",
        note.timestamp(),
        position,
        format_created(note.timestamp())
    )];
    if let Some(color) = note.color() {
        lines.push(format!("color: {}", color));
    }
    if !note.tags().is_empty() {
        lines.push(format!(
            "tags: {}",
            note.tags().iter().cloned().collect::<Vec<_>>().join(", ")
        ));
    }
    if !note.labels().is_empty() {
        lines.push(format!(
            "labels: {}",
            note.labels().iter().cloned().collect::<Vec<_>>().join(", ")
        ));
    }
    if !note.links().is_empty() {
        lines.push(format!(
            "links: {}",
            note.links()
                .iter()
                .map(|l| l.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }
    if note.is_pending_delete() {
        lines.push("(marked for deletion)".to_string());
    }
    lines.push(String::new());
    lines.extend(note.content().lines().map(|l| l.to_string()));
    lines
}

/// `name  count` rows, counts aligned
pub fn format_counts(counts: &BTreeMap<String, usize>) -> Vec<String> {
    let width = counts.keys().map(|k| display_width(k)).max().unwrap_or(0);
    counts
        .iter()
        .map(|(name, count)| {
            let pad = " ".repeat(width - display_width(name));
            format!("{}{}  {}", name, pad, count)
        })
        .collect()
}

pub fn format_refresh(report: &RefreshReport) -> String {
    format!(
        "loaded {} notes, wrote {} files, removed {} files",
        report.loaded, report.push.files_written, report.push.files_removed
    )
}
