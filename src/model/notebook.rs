use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use log::warn;

use super::config::NotebookConfig;
use super::label_tree::LabelTree;
use super::note::{Deletion, Note, NoteUpdate};
use super::record::Record;

/// Error type for notebook model operations
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum NoteError {
    #[error("note not found: {0}")]
    NotFound(i64),
    #[error("note index out of range: {0}")]
    IndexOutOfRange(usize),
    #[error("a note with timestamp {0} already exists")]
    DuplicateTimestamp(i64),
}

/// How a caller refers to a note: by position in the list or by timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteRef {
    Index(usize),
    Timestamp(i64),
}

/// The in-memory notebook: an ordered note list plus its tag and label
/// aggregates.
///
/// Every insertion and removal updates the list and both aggregates
/// together; nothing outside this type can change one without the others.
#[derive(Debug, Clone)]
pub struct Notebook {
    path: PathBuf,
    config: NotebookConfig,
    notes: Vec<Note>,
    tags: BTreeMap<String, usize>,
    labels: LabelTree,
}

impl Notebook {
    /// An empty notebook stored in `path`. Nothing is read until a refresh.
    pub fn new(path: impl Into<PathBuf>, config: NotebookConfig) -> Self {
        Notebook {
            path: path.into(),
            config,
            notes: Vec::new(),
            tags: BTreeMap::new(),
            labels: LabelTree::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &NotebookConfig {
        &self.config
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Tag -> number of notes carrying it
    pub fn tags(&self) -> &BTreeMap<String, usize> {
        &self.tags
    }

    pub fn labels(&self) -> &LabelTree {
        &self.labels
    }

    /// `"path" -> count` for every node of the label tree
    pub fn labels_flatten(&self) -> BTreeMap<String, usize> {
        self.labels.flatten()
    }

    pub fn position(&self, timestamp: i64) -> Option<usize> {
        self.notes.iter().position(|n| n.timestamp() == timestamp)
    }

    pub fn find(&self, timestamp: i64) -> Option<&Note> {
        self.notes.iter().find(|n| n.timestamp() == timestamp)
    }

    /// Resolve a [`NoteRef`] to a position in the list
    pub fn resolve(&self, target: NoteRef) -> Result<usize, NoteError> {
        match target {
            NoteRef::Index(idx) if idx < self.notes.len() => Ok(idx),
            NoteRef::Index(idx) => Err(NoteError::IndexOutOfRange(idx)),
            NoteRef::Timestamp(ts) => self.position(ts).ok_or(NoteError::NotFound(ts)),
        }
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Add a note built from `record`. Returns its position.
    ///
    /// New notes from the caller are usually dirty; notes loaded from disk
    /// are not.
    pub fn add_note(&mut self, record: Record, set_dirty: bool) -> Result<usize, NoteError> {
        if self.position(record.timestamp).is_some() {
            return Err(NoteError::DuplicateTimestamp(record.timestamp));
        }
        Ok(self.insert(Note::from_record(record, set_dirty)))
    }

    /// Apply `update` to a note, keeping the aggregates in step.
    /// Returns the note's position afterwards.
    pub fn update_note(
        &mut self,
        target: NoteRef,
        update: NoteUpdate,
        set_dirty: bool,
    ) -> Result<usize, NoteError> {
        let idx = self.resolve(target)?;
        let old_prefer = self.notes[idx].prefer_idx();

        self.count_out(idx);
        let note = &mut self.notes[idx];
        note.apply(update);
        if set_dirty {
            note.set_dirty(true);
        }
        self.count_in(idx);

        Ok(self.relocate_if_moved(idx, old_prefer))
    }

    /// Remove a note outright (no deletion is written to disk)
    pub fn remove_note(&mut self, timestamp: i64) -> Option<Note> {
        let idx = self.position(timestamp)?;
        Some(self.remove_at(idx))
    }

    /// Mark a note as edited so the next sync writes it
    pub fn mark_dirty(&mut self, timestamp: i64) -> Result<(), NoteError> {
        let idx = self.position(timestamp).ok_or(NoteError::NotFound(timestamp))?;
        self.notes[idx].set_dirty(true);
        Ok(())
    }

    /// Mark a note for deletion. It stays visible until a purging sync.
    pub fn mark_deleted(&mut self, timestamp: i64) -> Result<(), NoteError> {
        let idx = self.position(timestamp).ok_or(NoteError::NotFound(timestamp))?;
        let note = &mut self.notes[idx];
        note.set_deletion(Deletion::PendingDelete);
        note.set_dirty(true);
        Ok(())
    }

    /// Cancel a pending deletion
    pub fn unmark_deleted(&mut self, timestamp: i64) -> Result<(), NoteError> {
        let idx = self.position(timestamp).ok_or(NoteError::NotFound(timestamp))?;
        self.notes[idx].set_deletion(Deletion::Live);
        Ok(())
    }

    /// Exchange the positions of two notes. Both get their new 1-based
    /// positions as `prefer_idx` and are marked dirty.
    pub fn swap(&mut self, a: NoteRef, b: NoteRef) -> Result<(), NoteError> {
        let ia = self.resolve(a)?;
        let ib = self.resolve(b)?;
        if ia == ib {
            return Ok(());
        }
        self.notes.swap(ia, ib);
        for idx in [ia, ib] {
            let note = &mut self.notes[idx];
            note.set_prefer_idx(idx + 1);
            note.set_dirty(true);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Crate-internal helpers for reconciliation
    // -----------------------------------------------------------------------

    /// Insert at the ordered position for the note's `prefer_idx`
    pub(crate) fn insert(&mut self, note: Note) -> usize {
        let idx = self.insert_position(note.prefer_idx());
        self.notes.insert(idx, note);
        self.count_in(idx);
        idx
    }

    pub(crate) fn remove_at(&mut self, idx: usize) -> Note {
        self.count_out(idx);
        self.notes.remove(idx)
    }

    /// Replace a clean note's persisted fields with the disk version.
    /// Returns the note's position afterwards.
    pub(crate) fn overwrite_at(&mut self, idx: usize, record: Record) -> usize {
        let old_prefer = self.notes[idx].prefer_idx();
        self.count_out(idx);
        self.notes[idx].overwrite(record);
        self.count_in(idx);
        self.relocate_if_moved(idx, old_prefer)
    }

    pub(crate) fn set_prefer_idx_at(&mut self, idx: usize, prefer_idx: usize) {
        self.notes[idx].set_prefer_idx(prefer_idx);
    }

    pub(crate) fn set_dirty_at(&mut self, idx: usize, dirty: bool) {
        self.notes[idx].set_dirty(dirty);
    }

    pub(crate) fn set_file_at(&mut self, idx: usize, file: &str) {
        self.notes[idx].set_file(file);
    }

    /// First position whose note has no `prefer_idx` or one not below
    /// `prefer_idx`. Unset (0) goes to the end.
    fn insert_position(&self, prefer_idx: usize) -> usize {
        if prefer_idx == 0 {
            return self.notes.len();
        }
        self.notes
            .iter()
            .position(|n| n.prefer_idx() == 0 || n.prefer_idx() >= prefer_idx)
            .unwrap_or(self.notes.len())
    }

    /// Move a note whose `prefer_idx` changed to a new value that disagrees
    /// with its position. Aggregates are unaffected by a move.
    fn relocate_if_moved(&mut self, idx: usize, old_prefer: usize) -> usize {
        let prefer = self.notes[idx].prefer_idx();
        if prefer == 0 || prefer == old_prefer || prefer == idx + 1 {
            return idx;
        }
        let note = self.notes.remove(idx);
        let new_idx = self.insert_position(prefer);
        self.notes.insert(new_idx, note);
        new_idx
    }

    fn count_in(&mut self, idx: usize) {
        let note = &self.notes[idx];
        for tag in note.tags() {
            *self.tags.entry(tag.clone()).or_insert(0) += 1;
        }
        let contribution = LabelTree::from_paths(note.labels());
        self.labels = std::mem::take(&mut self.labels).merge(&contribution);
    }

    fn count_out(&mut self, idx: usize) {
        let note = &self.notes[idx];
        subtract_tags(&mut self.tags, note.tags());
        let contribution = LabelTree::from_paths(note.labels());
        self.labels = std::mem::take(&mut self.labels).subtract(&contribution);
    }
}

fn subtract_tags(counts: &mut BTreeMap<String, usize>, tags: &IndexSet<String>) {
    for tag in tags {
        debug_assert!(counts.contains_key(tag), "tag count underflow on '{}'", tag);
        match counts.get_mut(tag) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                counts.remove(tag);
            }
            None => warn!("tag count underflow on '{}'", tag),
        }
    }
}
