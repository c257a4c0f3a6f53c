use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use super::record::{Record, normalize_color, normalize_labels, normalize_tags};
use crate::parse::extract_links;

/// Deletion state of a note within an edit session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Deletion {
    #[default]
    Live,
    /// Marked for deletion; still visible until a purging sync removes it
    PendingDelete,
}

/// A note held by a [`Notebook`](super::Notebook).
///
/// Fields are only changed through notebook operations so that the tag and
/// label aggregates stay consistent with the note sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    timestamp: i64,
    content: String,
    tags: IndexSet<String>,
    labels: IndexSet<String>,
    color: Option<String>,
    links: Vec<i64>,
    prefer_idx: usize,
    dirty: bool,
    deletion: Deletion,
    /// Day file the note was last read from
    file: Option<String>,
}

impl Note {
    pub(crate) fn from_record(record: Record, dirty: bool) -> Self {
        Note {
            timestamp: record.timestamp,
            content: record.content,
            tags: record.tags,
            labels: record.labels,
            color: record.color,
            links: record.links,
            prefer_idx: record.prefer_idx,
            dirty,
            deletion: Deletion::Live,
            file: None,
        }
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn tags(&self) -> &IndexSet<String> {
        &self.tags
    }

    pub fn labels(&self) -> &IndexSet<String> {
        &self.labels
    }

    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    pub fn links(&self) -> &[i64] {
        &self.links
    }

    pub fn prefer_idx(&self) -> usize {
        self.prefer_idx
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn deletion(&self) -> Deletion {
        self.deletion
    }

    pub fn is_pending_delete(&self) -> bool {
        self.deletion == Deletion::PendingDelete
    }

    /// The day file this note was loaded from, if any
    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    /// The record that would be written for this note right now
    pub fn snapshot(&self) -> Record {
        Record {
            timestamp: self.timestamp,
            color: self.color.clone(),
            prefer_idx: self.prefer_idx,
            tags: self.tags.clone(),
            labels: self.labels.clone(),
            content: self.content.clone(),
            links: self.links.clone(),
            source_text: None,
        }
    }

    pub(crate) fn set_prefer_idx(&mut self, prefer_idx: usize) {
        self.prefer_idx = prefer_idx;
    }

    pub(crate) fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    pub(crate) fn set_file(&mut self, file: impl Into<String>) {
        self.file = Some(file.into());
    }

    pub(crate) fn set_deletion(&mut self, deletion: Deletion) {
        self.deletion = deletion;
    }

    /// Overwrite every persisted field from a record (the timestamp stays)
    pub(crate) fn overwrite(&mut self, record: Record) {
        self.content = record.content;
        self.tags = record.tags;
        self.labels = record.labels;
        self.color = record.color;
        self.links = record.links;
        self.prefer_idx = record.prefer_idx;
    }

    pub(crate) fn apply(&mut self, update: NoteUpdate) {
        if let Some(content) = update.content {
            self.links = extract_links(&content);
            self.content = content;
        }
        if let Some(tags) = update.tags {
            self.tags = normalize_tags(tags);
        }
        if let Some(labels) = update.labels {
            self.labels = normalize_labels(labels);
        }
        if let Some(color) = update.color {
            self.color = color.and_then(|c| normalize_color(&c));
        }
        if let Some(prefer_idx) = update.prefer_idx {
            self.prefer_idx = prefer_idx;
        }
    }
}

/// An edit to the persisted fields of a note. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteUpdate {
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub labels: Option<Vec<String>>,
    /// `Some(None)` clears the color, as does a token `normalize_color` rejects
    pub color: Option<Option<String>>,
    pub prefer_idx: Option<usize>,
}

impl NoteUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// An update replacing every persisted field with the record's values
    pub fn from_record(record: &Record) -> Self {
        NoteUpdate {
            content: Some(record.content.clone()),
            tags: Some(record.tags.iter().cloned().collect()),
            labels: Some(record.labels.iter().cloned().collect()),
            color: Some(record.color.clone()),
            prefer_idx: Some(record.prefer_idx),
        }
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = Some(labels.into_iter().map(Into::into).collect());
        self
    }

    pub fn color(mut self, color: Option<String>) -> Self {
        self.color = Some(color);
        self
    }

    pub fn prefer_idx(mut self, prefer_idx: usize) -> Self {
        self.prefer_idx = Some(prefer_idx);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == NoteUpdate::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_record_and_snapshot() {
        let record = Record::new(100, "hello [[7]]")
            .with_tags(["a"])
            .with_labels(["x/y"])
            .with_color("red")
            .with_prefer_idx(3);
        let note = Note::from_record(record.clone(), false);
        assert_eq!(note.timestamp(), 100);
        assert_eq!(note.links(), &[7]);
        assert!(!note.is_dirty());
        assert_eq!(note.deletion(), Deletion::Live);
        assert_eq!(note.snapshot(), record);
    }

    #[test]
    fn test_apply_update_normalizes() {
        let mut note = Note::from_record(Record::new(1, "old"), false);
        note.apply(
            NoteUpdate::new()
                .content("new [[2]]")
                .tags(["Work", "#Home"])
                .labels(["Proj/Alpha"])
                .color(Some("blue".into())),
        );
        assert_eq!(note.content(), "new [[2]]");
        assert_eq!(note.links(), &[2]);
        assert!(note.tags().contains("work"));
        assert!(note.tags().contains("home"));
        assert!(note.labels().contains("proj/alpha"));
        assert_eq!(note.color(), Some("blue"));
    }

    #[test]
    fn test_empty_update_changes_nothing() {
        let record = Record::new(1, "same").with_tags(["t"]);
        let mut note = Note::from_record(record.clone(), false);
        let update = NoteUpdate::new();
        assert!(update.is_empty());
        note.apply(update);
        assert_eq!(note.snapshot(), record);
    }

    #[test]
    fn test_clear_color() {
        let mut note = Note::from_record(Record::new(1, "c").with_color("red"), false);
        note.apply(NoteUpdate::new().color(None));
        assert_eq!(note.color(), None);
    }
}
