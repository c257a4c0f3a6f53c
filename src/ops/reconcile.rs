use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use indexmap::IndexMap;
use log::{debug, info, warn};

use crate::io::notebook_io::{
    NotebookError, day_file_name, list_day_files, load_config, read_day_file, write_day_file,
};
use crate::io::recovery::log_duplicate;
use crate::model::note::{Deletion, Note};
use crate::model::notebook::Notebook;
use crate::model::record::{Record, WriteBack};

/// Pending day-file writes: file name -> timestamp -> record to write.
///
/// Within a file, entries keep the order they were queued in; records that
/// are new to the file are appended in that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteQueue {
    files: BTreeMap<String, IndexMap<i64, WriteBack>>,
}

impl WriteQueue {
    pub fn new() -> Self {
        WriteQueue::default()
    }

    /// Queue `record` for `file`, replacing any earlier entry for the same
    /// note in that file
    pub fn enqueue(&mut self, file: &str, record: Record, keep: bool) {
        self.files
            .entry(file.to_string())
            .or_default()
            .insert(record.timestamp, WriteBack { record, keep });
    }

    /// Queue `record` in whichever file already has an entry for it, or in
    /// `default_file`. A note is never queued for two files.
    pub fn upsert(&mut self, default_file: &str, record: Record, keep: bool) {
        let ts = record.timestamp;
        if let Some(entries) = self.files.values_mut().find(|e| e.contains_key(&ts)) {
            entries.insert(ts, WriteBack { record, keep });
            return;
        }
        self.enqueue(default_file, record, keep);
    }

    pub fn is_empty(&self) -> bool {
        self.files.values().all(|e| e.is_empty())
    }

    /// Number of queued records across all files
    pub fn len(&self) -> usize {
        self.files.values().map(|e| e.len()).sum()
    }

    pub fn get(&self, file: &str) -> Option<&IndexMap<i64, WriteBack>> {
        self.files.get(file)
    }

    /// The queued write for a note, whatever file it is in
    pub fn find(&self, timestamp: i64) -> Option<(&str, &WriteBack)> {
        self.files
            .iter()
            .find_map(|(file, e)| e.get(&timestamp).map(|wb| (file.as_str(), wb)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &IndexMap<i64, WriteBack>)> {
        self.files.iter()
    }
}

impl IntoIterator for WriteQueue {
    type Item = (String, IndexMap<i64, WriteBack>);
    type IntoIter = std::collections::btree_map::IntoIter<String, IndexMap<i64, WriteBack>>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}

/// What Sync does with notes marked for deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Remove them from the notebook and queue their removal from disk
    Purge,
    /// Leave them in place, visible and dirty, for a later purging pass
    Defer,
}

/// Summary of one Push
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushReport {
    pub files_written: usize,
    pub files_removed: usize,
    pub files_unchanged: usize,
    pub notes_dropped: usize,
}

/// Summary of one Refresh
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Notes loaded from disk that were not in memory
    pub loaded: usize,
    /// Records queued by Pull and Sync together
    pub queued: usize,
    pub push: PushReport,
}

// ---------------------------------------------------------------------------
// Pull
// ---------------------------------------------------------------------------

/// Load every day file into the notebook.
///
/// Disk wins for clean notes; dirty notes win over disk and are queued for
/// write-back into the file they were found in. Pending deletes are left to
/// Sync. A record whose timestamp was already seen in this pass is skipped
/// and copied to the recovery log.
pub fn pull(notebook: &mut Notebook) -> Result<WriteQueue, NotebookError> {
    let dir = notebook.path().to_path_buf();
    let extension = notebook.config().storage.extension.clone();
    let mut queue = WriteQueue::new();
    let mut seen = HashSet::new();

    for name in list_day_files(&dir, &extension)? {
        let day = read_day_file(&dir, &name)?;
        for record in day.records {
            if !seen.insert(record.timestamp) {
                warn!(
                    "duplicate note {} in {}; keeping the first one",
                    record.timestamp, name
                );
                let source = record.source_text.as_deref().unwrap_or_default().join("\n");
                log_duplicate(&dir, record.timestamp, &name, &source);
                continue;
            }

            match notebook.position(record.timestamp) {
                None => {
                    let mut note = Note::from_record(record, false);
                    note.set_file(&name);
                    notebook.insert(note);
                }
                Some(idx) if !notebook.notes()[idx].is_dirty() => {
                    let idx = notebook.overwrite_at(idx, record);
                    notebook.set_file_at(idx, &name);
                }
                Some(idx) => {
                    notebook.set_file_at(idx, &name);
                    if notebook.notes()[idx].is_pending_delete() {
                        continue;
                    }
                    debug!("note {} is dirty; keeping the in-memory version", record.timestamp);
                    notebook.set_prefer_idx_at(idx, idx + 1);
                    queue.enqueue(&name, notebook.notes()[idx].snapshot(), true);
                }
            }
        }
    }

    Ok(queue)
}

// ---------------------------------------------------------------------------
// Sync
// ---------------------------------------------------------------------------

/// Turn in-memory edits into queued writes.
///
/// Every note that is dirty, or whose `prefer_idx` disagrees with its
/// position, is re-stamped with its 1-based position, marked clean and
/// queued for the file it was loaded from (new notes: the day file of their
/// timestamp). Pending deletes follow `policy`. Returns the number of records
/// queued; a second call with no edits in between returns 0.
pub fn sync(notebook: &mut Notebook, queue: &mut WriteQueue, policy: DeletePolicy) -> usize {
    let extension = notebook.config().storage.extension.clone();
    let mut queued = 0;
    let mut idx = 0;

    while idx < notebook.len() {
        let note = &notebook.notes()[idx];
        let file = match note.file() {
            Some(file) => file.to_string(),
            None => day_file_name(note.timestamp(), &extension),
        };

        if note.is_pending_delete() {
            match policy {
                DeletePolicy::Purge => {
                    let removed = notebook.remove_at(idx);
                    queue.upsert(&file, removed.snapshot(), false);
                    queued += 1;
                }
                DeletePolicy::Defer => idx += 1,
            }
            continue;
        }

        if note.is_dirty() || note.prefer_idx() != idx + 1 {
            notebook.set_prefer_idx_at(idx, idx + 1);
            notebook.set_dirty_at(idx, false);
            queue.upsert(&file, notebook.notes()[idx].snapshot(), true);
            queued += 1;
        }
        idx += 1;
    }

    queued
}

// ---------------------------------------------------------------------------
// Push
// ---------------------------------------------------------------------------

/// Write every queued file. Each file is replaced atomically; a failure
/// stops the push with earlier files already written.
///
/// Notes queued for a file that was not written are handed back to the
/// notebook: kept notes are marked dirty again, purged ones are restored as
/// pending deletes, so the next Refresh retries them.
pub fn push(notebook: &mut Notebook, queue: WriteQueue) -> Result<PushReport, NotebookError> {
    let dir = notebook.path().to_path_buf();
    let mut report = PushReport::default();
    if queue.is_empty() {
        return Ok(report);
    }

    let mut files: Vec<(String, IndexMap<i64, WriteBack>)> = queue.into_iter().collect();
    if let Err(e) = std::fs::create_dir_all(&dir) {
        requeue(notebook, files);
        return Err(NotebookError::WriteError {
            path: dir,
            source: e,
        });
    }

    for idx in 0..files.len() {
        let (name, updates) = &files[idx];
        if updates.is_empty() {
            continue;
        }
        let outcome = match write_day_file(&dir, name, updates.clone()) {
            Ok(outcome) => outcome,
            Err(e) => {
                requeue(notebook, files.split_off(idx));
                return Err(e);
            }
        };
        report.notes_dropped += outcome.dropped.len();
        if outcome.removed_file {
            report.files_removed += 1;
        } else if outcome.unchanged {
            report.files_unchanged += 1;
        } else {
            report.files_written += 1;
        }
    }

    info!(
        "push: {} written, {} removed, {} unchanged, {} notes dropped",
        report.files_written, report.files_removed, report.files_unchanged, report.notes_dropped
    );
    Ok(report)
}

/// Put unwritten queue entries back into the notebook as pending work
fn requeue(notebook: &mut Notebook, files: Vec<(String, IndexMap<i64, WriteBack>)>) {
    for (name, updates) in files {
        for (ts, update) in updates {
            match notebook.position(ts) {
                Some(idx) => notebook.set_dirty_at(idx, true),
                None if !update.keep => {
                    let mut note = Note::from_record(update.record, true);
                    note.set_file(&name);
                    note.set_deletion(Deletion::PendingDelete);
                    notebook.insert(note);
                }
                None => {}
            }
            warn!("note {} not written to {}; will retry", ts, name);
        }
    }
}

// ---------------------------------------------------------------------------
// Refresh
// ---------------------------------------------------------------------------

/// Pull, Sync and Push in one go
pub fn refresh(
    notebook: &mut Notebook,
    policy: DeletePolicy,
) -> Result<RefreshReport, NotebookError> {
    let before = notebook.len();
    let mut queue = pull(notebook)?;
    let loaded = notebook.len().saturating_sub(before);
    sync(notebook, &mut queue, policy);
    let queued = queue.len();
    let push = push(notebook, queue)?;
    Ok(RefreshReport {
        loaded,
        queued,
        push,
    })
}

impl Notebook {
    /// Read the notebook stored in `dir` without writing anything back
    pub fn load(dir: &Path) -> Result<Notebook, NotebookError> {
        let config = load_config(dir)?;
        let mut notebook = Notebook::new(dir, config);
        pull(&mut notebook)?;
        Ok(notebook)
    }

    /// Open the notebook stored in `dir`: read its config and load it.
    pub fn open(dir: &Path) -> Result<Notebook, NotebookError> {
        let config = load_config(dir)?;
        let mut notebook = Notebook::new(dir, config);
        refresh(&mut notebook, DeletePolicy::Defer)?;
        Ok(notebook)
    }

    /// Refresh using the configured deletion policy
    pub fn refresh(&mut self) -> Result<RefreshReport, NotebookError> {
        let policy = if self.config().storage.purge_on_refresh {
            DeletePolicy::Purge
        } else {
            DeletePolicy::Defer
        };
        refresh(self, policy)
    }

    pub fn refresh_with(&mut self, policy: DeletePolicy) -> Result<RefreshReport, NotebookError> {
        refresh(self, policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::NotebookConfig;
    use crate::model::note::NoteUpdate;
    use crate::model::notebook::NoteRef;
    use tempfile::TempDir;

    fn notebook_in(tmp: &TempDir) -> Notebook {
        Notebook::new(tmp.path(), NotebookConfig::default())
    }

    fn order(nb: &Notebook) -> Vec<i64> {
        nb.notes().iter().map(|n| n.timestamp()).collect()
    }

    #[test]
    fn test_enqueue_replaces_same_note() {
        let mut queue = WriteQueue::new();
        queue.enqueue("a.md", Record::new(1, "old"), true);
        queue.enqueue("a.md", Record::new(1, "new"), true);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.get("a.md").unwrap()[&1].record.content, "new");
    }

    #[test]
    fn test_upsert_prefers_existing_file() {
        let mut queue = WriteQueue::new();
        queue.enqueue("found.md", Record::new(1, "from pull"), true);
        queue.upsert("canonical.md", Record::new(1, "from sync"), true);
        queue.upsert("canonical.md", Record::new(2, "other"), true);

        assert_eq!(queue.len(), 2);
        let (file, wb) = queue.find(1).unwrap();
        assert_eq!(file, "found.md");
        assert_eq!(wb.record.content, "from sync");
        assert!(queue.get("canonical.md").unwrap().contains_key(&2));
    }

    #[test]
    fn test_sync_stamps_positions_and_clears_dirty() {
        let tmp = TempDir::new().unwrap();
        let mut nb = notebook_in(&tmp);
        nb.add_note(Record::new(10, "a"), true).unwrap();
        nb.add_note(Record::new(20, "b"), true).unwrap();

        let mut queue = WriteQueue::new();
        assert_eq!(sync(&mut nb, &mut queue, DeletePolicy::Purge), 2);
        assert_eq!(nb.notes()[0].prefer_idx(), 1);
        assert_eq!(nb.notes()[1].prefer_idx(), 2);
        assert!(nb.notes().iter().all(|n| !n.is_dirty()));
        assert_eq!(queue.find(20).unwrap().1.record.prefer_idx, 2);
    }

    #[test]
    fn test_sync_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let mut nb = notebook_in(&tmp);
        for ts in [3, 1, 2] {
            nb.add_note(Record::new(ts, "x"), true).unwrap();
        }
        let mut first = WriteQueue::new();
        sync(&mut nb, &mut first, DeletePolicy::Purge);
        assert_eq!(first.len(), 3);

        let mut second = WriteQueue::new();
        assert_eq!(sync(&mut nb, &mut second, DeletePolicy::Purge), 0);
        assert!(second.is_empty());
    }

    #[test]
    fn test_sync_purge_removes_and_restamps_followers() {
        let tmp = TempDir::new().unwrap();
        let mut nb = notebook_in(&tmp);
        for ts in 1..=3 {
            nb.add_note(Record::new(ts, "x").with_tags(["t"]), true).unwrap();
        }
        let mut queue = WriteQueue::new();
        sync(&mut nb, &mut queue, DeletePolicy::Purge);

        nb.mark_deleted(1).unwrap();
        let mut queue = WriteQueue::new();
        assert_eq!(sync(&mut nb, &mut queue, DeletePolicy::Purge), 3);

        assert_eq!(order(&nb), vec![2, 3]);
        assert_eq!(nb.tags().get("t"), Some(&2));
        assert!(!queue.find(1).unwrap().1.keep);
        assert_eq!(queue.find(2).unwrap().1.record.prefer_idx, 1);
        assert_eq!(queue.find(3).unwrap().1.record.prefer_idx, 2);
    }

    #[test]
    fn test_sync_defer_keeps_pending_delete() {
        let tmp = TempDir::new().unwrap();
        let mut nb = notebook_in(&tmp);
        nb.add_note(Record::new(1, "x"), false).unwrap();
        nb.mark_deleted(1).unwrap();

        let mut queue = WriteQueue::new();
        assert_eq!(sync(&mut nb, &mut queue, DeletePolicy::Defer), 0);
        let note = nb.find(1).unwrap();
        assert!(note.is_pending_delete());
        assert!(note.is_dirty());
    }

    #[test]
    fn test_pull_loads_and_disk_wins_for_clean_notes() {
        let tmp = TempDir::new().unwrap();
        let file = day_file_name(100, "md");
        std::fs::write(tmp.path().join(&file), "@[100]\n#a\nfrom disk\n").unwrap();

        let mut nb = notebook_in(&tmp);
        let queue = pull(&mut nb).unwrap();
        assert!(queue.is_empty());
        assert_eq!(nb.find(100).unwrap().content(), "from disk");
        assert!(!nb.find(100).unwrap().is_dirty());

        std::fs::write(tmp.path().join(&file), "@[100]\n#b\nchanged on disk\n").unwrap();
        pull(&mut nb).unwrap();
        assert_eq!(nb.find(100).unwrap().content(), "changed on disk");
        assert!(!nb.tags().contains_key("a"));
        assert_eq!(nb.tags().get("b"), Some(&1));
    }

    #[test]
    fn test_pull_dirty_note_wins_over_disk() {
        let tmp = TempDir::new().unwrap();
        let file = day_file_name(100, "md");
        std::fs::write(tmp.path().join(&file), "@[100]\noriginal\n").unwrap();

        let mut nb = notebook_in(&tmp);
        pull(&mut nb).unwrap();
        nb.update_note(NoteRef::Timestamp(100), NoteUpdate::new().content("edited"), true)
            .unwrap();
        std::fs::write(tmp.path().join(&file), "@[100]\nexternal edit\n").unwrap();

        let queue = pull(&mut nb).unwrap();
        assert_eq!(nb.find(100).unwrap().content(), "edited");
        let (queued_file, wb) = queue.find(100).unwrap();
        assert_eq!(queued_file, file);
        assert_eq!(wb.record.content, "edited");
        assert_eq!(wb.record.prefer_idx, 1);
    }

    #[test]
    fn test_pull_skips_duplicates_first_wins() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("2020_01_01.md"), "@[5]\nfirst\n").unwrap();
        std::fs::write(tmp.path().join("2020_01_02.md"), "@[5]\nsecond\n").unwrap();

        let mut nb = notebook_in(&tmp);
        pull(&mut nb).unwrap();
        assert_eq!(nb.len(), 1);
        assert_eq!(nb.find(5).unwrap().content(), "first");

        let entries = crate::io::recovery::read_recovery_entries(tmp.path(), None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "@[5]\nsecond");
    }

    #[test]
    fn test_pull_restores_persisted_order() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("2020_01_01.md"),
            "@[1]\n[idx:3]\none\n\n@[2]\n[idx:1]\ntwo\n",
        )
        .unwrap();
        std::fs::write(tmp.path().join("2020_01_02.md"), "@[3]\n[idx:2]\nthree\n").unwrap();

        let mut nb = notebook_in(&tmp);
        pull(&mut nb).unwrap();
        assert_eq!(order(&nb), vec![2, 3, 1]);
    }

    #[test]
    fn test_loaded_note_is_written_back_to_its_own_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("2020_01_05.md"), "@[1700000000]\nmisfiled\n").unwrap();

        let mut nb = notebook_in(&tmp);
        nb.refresh().unwrap();
        assert_eq!(nb.notes()[0].file(), Some("2020_01_05.md"));
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("2020_01_05.md")).unwrap(),
            "@[1700000000]\n[idx:1]\nmisfiled\n"
        );
        assert!(!tmp.path().join(day_file_name(1_700_000_000, "md")).exists());
    }

    #[test]
    fn test_refresh_round_trip_and_second_refresh_is_quiet() {
        let tmp = TempDir::new().unwrap();
        let mut nb = notebook_in(&tmp);
        nb.add_note(Record::new(1_700_000_000, "hello").with_tags(["x"]), true)
            .unwrap();
        let report = nb.refresh().unwrap();
        assert_eq!(report.queued, 1);
        assert_eq!(report.push.files_written, 1);

        let report = nb.refresh().unwrap();
        assert_eq!(report.queued, 0);
        assert_eq!(report.push, PushReport::default());

        let reopened = Notebook::open(tmp.path()).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.notes()[0].content(), "hello");
        assert_eq!(reopened.tags().get("x"), Some(&1));
    }

    #[test]
    fn test_refresh_purges_deleted_note_and_file() {
        let tmp = TempDir::new().unwrap();
        let mut nb = notebook_in(&tmp);
        nb.add_note(Record::new(1_700_000_000, "short-lived"), true).unwrap();
        nb.refresh().unwrap();
        let file = tmp.path().join(day_file_name(1_700_000_000, "md"));
        assert!(file.exists());

        nb.mark_deleted(1_700_000_000).unwrap();
        let report = nb.refresh().unwrap();
        assert!(nb.is_empty());
        assert!(!file.exists());
        assert_eq!(report.push.files_removed, 1);
    }

    #[test]
    fn test_open_defers_deletions() {
        let tmp = TempDir::new().unwrap();
        let nb = Notebook::open(tmp.path()).unwrap();
        assert!(nb.is_empty());
        assert!(!tmp.path().join("notebook.toml").exists());
    }
}
