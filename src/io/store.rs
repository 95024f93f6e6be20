use std::fs;
use std::io::ErrorKind;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::io::atomic::atomic_write;
use crate::io::lock::{FileLock, LockError};
use crate::model::entry::{Block, Entry};
use crate::model::field::FieldKind;
use crate::parse::{
    CONTENT_PREFIX, header_timestamp, is_continuation_line, parse_block, parse_entries,
    render_block, serialize_entry,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("knowledge base not found at {path}")]
    NotFound { path: PathBuf },
    #[error("an entry with timestamp {0} already exists")]
    DuplicateTimestamp(String),
    #[error("{0} lines can't be upserted")]
    NotUpsertable(String),
    #[error("could not access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Lock(#[from] LockError),
}

impl StoreError {
    /// Absent file; read paths treat this as an empty store.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Result of [`Store::delete_entry`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub deleted: bool,
    /// Side-file paths referenced inside the removed lines, for the caller to unlink
    pub removed_side_files: Vec<String>,
}

/// The knowledge-base markdown file.
///
/// Every operation re-reads the whole file and every mutation rewrites it,
/// all under one whole-store lock: an in-process mutex plus an advisory
/// file lock in the project root for other processes.
pub struct Store {
    root: PathBuf,
    path: PathBuf,
    guard: Mutex<()>,
    lock_timeout: Duration,
}

struct StoreGuard<'a> {
    _local: MutexGuard<'a, ()>,
    _file: FileLock,
}

impl Store {
    pub fn new(root: &Path, file_name: &str, lock_timeout: Duration) -> Self {
        Store {
            root: root.to_path_buf(),
            path: root.join(file_name),
            guard: Mutex::new(()),
            lock_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn lock(&self) -> Result<StoreGuard<'_>, StoreError> {
        let local = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let file = FileLock::acquire(&self.root, self.lock_timeout)?;
        Ok(StoreGuard {
            _local: local,
            _file: file,
        })
    }

    fn read_text(&self) -> Result<String, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(text.replace("\r\n", "\n")),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound {
                path: self.path.clone(),
            }),
            Err(e) => Err(StoreError::Io {
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    fn read_lines(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.read_text()?.split('\n').map(str::to_string).collect())
    }

    fn write_text(&self, text: &str) -> Result<(), StoreError> {
        atomic_write(&self.path, text.as_bytes()).map_err(|e| StoreError::Io {
            path: self.path.clone(),
            source: e,
        })
    }

    /// All entries in file order. Fails with `NotFound` if the file is absent.
    pub fn load(&self) -> Result<Vec<Entry>, StoreError> {
        let _guard = self.lock()?;
        Ok(parse_entries(&self.read_text()?))
    }

    /// Like [`Store::load`], with an absent file read as an empty store.
    pub fn load_or_empty(&self) -> Result<Vec<Entry>, StoreError> {
        match self.load() {
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            other => other,
        }
    }

    pub fn find_entry(&self, timestamp: &str) -> Result<Option<Entry>, StoreError> {
        Ok(self
            .load_or_empty()?
            .into_iter()
            .find(|e| e.timestamp == timestamp))
    }

    /// Write `entry` above everything already in the file.
    ///
    /// Any side files the entry references must already be on disk.
    pub fn prepend(&self, entry: &Entry) -> Result<(), StoreError> {
        self.begin_prepend(&entry.timestamp)?.commit(entry)
    }

    /// Take the store lock and reserve `timestamp` for a new entry.
    ///
    /// The lock is held until the returned [`PendingPrepend`] is dropped, so
    /// side files for the entry can be written (and removed on failure)
    /// without another writer claiming the same timestamp.
    pub fn begin_prepend(&self, timestamp: &str) -> Result<PendingPrepend<'_>, StoreError> {
        let guard = self.lock()?;
        let existing = match self.read_text() {
            Ok(text) => text,
            Err(e) if e.is_not_found() => String::new(),
            Err(e) => return Err(e),
        };
        if has_entry(&existing, timestamp) {
            return Err(StoreError::DuplicateTimestamp(timestamp.to_string()));
        }
        Ok(PendingPrepend {
            store: self,
            existing,
            _guard: guard,
        })
    }

    /// Line range of the entry with `timestamp`: its header through the last
    /// non-blank line before the next header.
    pub fn find_entry_line_range(&self, timestamp: &str) -> Result<Option<Range<usize>>, StoreError> {
        let _guard = self.lock()?;
        let lines = self.read_lines()?;
        Ok(entry_line_range(&lines, timestamp))
    }

    /// Replace the entry's line of the block's kind, or insert it at its
    /// canonical position. Returns `false` if no entry has `timestamp`.
    pub fn upsert_field(&self, timestamp: &str, block: &Block) -> Result<bool, StoreError> {
        self.upsert_fields(timestamp, std::slice::from_ref(block))
    }

    /// Upsert several blocks in one read-modify-write.
    pub fn upsert_fields(&self, timestamp: &str, blocks: &[Block]) -> Result<bool, StoreError> {
        self.mutate_fields(timestamp, blocks, true)
    }

    /// Insert the block only if the entry has no line of its kind yet.
    pub fn seed_field(&self, timestamp: &str, block: &Block) -> Result<bool, StoreError> {
        self.mutate_fields(timestamp, std::slice::from_ref(block), false)
    }

    fn mutate_fields(
        &self,
        timestamp: &str,
        blocks: &[Block],
        replace: bool,
    ) -> Result<bool, StoreError> {
        for block in blocks {
            upsertable_kind(block)?;
        }

        let _guard = self.lock()?;
        let mut lines = match self.read_lines() {
            Ok(lines) => lines,
            Err(e) if e.is_not_found() => return Ok(false),
            Err(e) => return Err(e),
        };

        let mut changed = false;
        for block in blocks {
            let Some(range) = entry_line_range(&lines, timestamp) else {
                return Ok(false);
            };
            changed |= upsert_in_range(&mut lines, range, block, replace);
        }

        if changed {
            self.write_text(&lines.join("\n"))?;
            tracing::debug!(%timestamp, fields = blocks.len(), "entry fields written");
        }
        Ok(true)
    }

    /// Remove the entry's lines and the blank separator after them.
    pub fn delete_entry(&self, timestamp: &str) -> Result<DeleteOutcome, StoreError> {
        let _guard = self.lock()?;
        let mut lines = match self.read_lines() {
            Ok(lines) => lines,
            Err(e) if e.is_not_found() => return Ok(DeleteOutcome::default()),
            Err(e) => return Err(e),
        };

        let Some(range) = entry_line_range(&lines, timestamp) else {
            return Ok(DeleteOutcome::default());
        };

        let removed_side_files = lines[range.clone()]
            .iter()
            .filter_map(|line| line.strip_prefix(CONTENT_PREFIX))
            .filter_map(|content| parse_block(content).side_file().map(str::to_string))
            .collect();

        let mut end = range.end;
        while end < lines.len() && lines[end].trim().is_empty() {
            end += 1;
        }
        if end == lines.len() {
            // Last entry: the lines before it already end with a blank separator
            lines.truncate(range.start);
            if !lines.is_empty() {
                lines.push(String::new());
            }
        } else {
            lines.drain(range.start..end);
        }

        self.write_text(&lines.join("\n"))?;
        tracing::debug!(%timestamp, "entry deleted");
        Ok(DeleteOutcome {
            deleted: true,
            removed_side_files,
        })
    }
}

/// A new entry's slot at the top of the file, holding the store lock
pub struct PendingPrepend<'a> {
    store: &'a Store,
    existing: String,
    _guard: StoreGuard<'a>,
}

impl PendingPrepend<'_> {
    /// Write `entry` above the existing content. The lock stays held until
    /// `self` is dropped.
    pub fn commit(&mut self, entry: &Entry) -> Result<(), StoreError> {
        if has_entry(&self.existing, &entry.timestamp) {
            return Err(StoreError::DuplicateTimestamp(entry.timestamp.clone()));
        }
        let mut text = serialize_entry(entry);
        text.push_str(&self.existing);
        self.store.write_text(&text)?;
        tracing::debug!(timestamp = %entry.timestamp, path = %self.store.path.display(), "entry prepended");
        self.existing = text;
        Ok(())
    }
}

fn has_entry(text: &str, timestamp: &str) -> bool {
    text.lines()
        .any(|line| header_timestamp(line).as_deref() == Some(timestamp))
}

fn upsertable_kind(block: &Block) -> Result<FieldKind, StoreError> {
    match block.kind() {
        Some(kind) if !kind.is_repeatable() => Ok(kind),
        Some(kind) => Err(StoreError::NotUpsertable(kind.label().to_string())),
        None => Err(StoreError::NotUpsertable("plain content".to_string())),
    }
}

/// Find the entry's lines: from its header to the next header or blank line.
pub fn entry_line_range<S: AsRef<str>>(lines: &[S], timestamp: &str) -> Option<Range<usize>> {
    let start = lines
        .iter()
        .position(|line| header_timestamp(line.as_ref()).as_deref() == Some(timestamp))?;
    let mut end = lines[start + 1..]
        .iter()
        .position(|line| header_timestamp(line.as_ref()).is_some())
        .map_or(lines.len(), |offset| start + 1 + offset);
    // Blank lines inside an entry belong to it; the ones before the next header don't
    while end > start + 1 && lines[end - 1].as_ref().trim().is_empty() {
        end -= 1;
    }
    Some(start..end)
}

/// Kind of a content line, if it is a recognized field line
fn line_kind(line: &str) -> Option<FieldKind> {
    line.strip_prefix(CONTENT_PREFIX)
        .and_then(|content| parse_block(content).kind())
}

/// Apply one block to the entry occupying `range`. Returns whether any line changed.
fn upsert_in_range(lines: &mut Vec<String>, range: Range<usize>, block: &Block, replace: bool) -> bool {
    let Some(kind) = block.kind() else {
        return false;
    };
    let rendered = render_block(block);

    let existing = (range.start + 1..range.end).find(|&i| line_kind(&lines[i]) == Some(kind));

    if let Some(at) = existing {
        if !replace {
            return false;
        }
        let mut end = at + 1;
        if kind.has_continuation() {
            while end < range.end && is_continuation_line(&lines[end]) {
                end += 1;
            }
        }
        if lines[at..end] == rendered[..] {
            return false;
        }
        lines.splice(at..end, rendered);
        return true;
    }

    if rendered.is_empty() {
        return false;
    }

    let at = (range.start + 1..range.end)
        .find(|&i| line_kind(&lines[i]).is_some_and(|k| k.rank() > kind.rank()))
        .unwrap_or(range.end);
    lines.splice(at..at, rendered);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::entry::EntityKind;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const SAMPLE: &str = "\
- `note` | `widget` | `2024-01-02 10:00:00` | Second
  - Notes: second entry
    more notes
  - Topics: rust

- `note` | `widget` | `2024-01-01 10:00:00` | First
  - Notes: first entry

";

    fn store_with(text: &str) -> (TempDir, Store) {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("kb.md"), text).unwrap();
        let store = Store::new(tmp.path(), "kb.md", Duration::from_secs(1));
        (tmp, store)
    }

    fn contents(store: &Store) -> String {
        fs::read_to_string(store.path()).unwrap()
    }

    #[test]
    fn test_load_missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path(), "kb.md", Duration::from_secs(1));
        assert!(store.load().unwrap_err().is_not_found());
        assert!(store.load_or_empty().unwrap().is_empty());
    }

    #[test]
    fn test_entry_line_range() {
        let lines: Vec<&str> = SAMPLE.split('\n').collect();
        assert_eq!(entry_line_range(&lines, "2024-01-02 10:00:00"), Some(0..4));
        assert_eq!(entry_line_range(&lines, "2024-01-01 10:00:00"), Some(5..7));
        assert_eq!(entry_line_range(&lines, "2030-01-01 00:00:00"), None);
    }

    #[test]
    fn test_range_ends_at_next_header_without_blank() {
        let lines = [
            "- `note` | `w` | `2024-01-02 10:00:00` | A",
            "  - Notes: a",
            "- `note` | `w` | `2024-01-01 10:00:00` | B",
        ];
        assert_eq!(entry_line_range(&lines[..], "2024-01-02 10:00:00"), Some(0..2));
    }

    #[test]
    fn test_range_spans_blank_lines_inside_entry() {
        let lines = [
            "- `note` | `w` | `2024-01-02 10:00:00` | B",
            "  - Notes: b",
            "",
            "  - ![Screenshot](screenshots/screenshot_2024-01-02_10-00-00.png)",
            "",
            "",
            "- `note` | `w` | `2024-01-01 10:00:00` | A",
        ];
        assert_eq!(entry_line_range(&lines[..], "2024-01-02 10:00:00"), Some(0..4));
        assert_eq!(entry_line_range(&lines[..], "2024-01-01 10:00:00"), Some(6..7));
    }

    #[test]
    fn test_delete_takes_lines_after_inner_blank() {
        let (_tmp, store) = store_with(
            "- `note` | `w` | `2024-01-02 10:00:00` | B\n  - Notes: b\n\n  - ![Screenshot](screenshots/screenshot_2024-01-02_10-00-00.png)\n\n- `note` | `w` | `2024-01-01 10:00:00` | A\n  - Notes: a\n\n",
        );
        let outcome = store.delete_entry("2024-01-02 10:00:00").unwrap();
        assert_eq!(
            outcome.removed_side_files,
            vec!["screenshots/screenshot_2024-01-02_10-00-00.png".to_string()]
        );
        let entries = store.load().unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].side_files().is_empty());
        assert_eq!(contents(&store), "- `note` | `w` | `2024-01-01 10:00:00` | A\n  - Notes: a\n\n");
    }

    #[test]
    fn test_upsert_empty_list_is_idempotent() {
        let (_tmp, store) = store_with(SAMPLE);
        let ts = "2024-01-01 10:00:00";
        assert!(store.upsert_field(ts, &Block::Related(Vec::new())).unwrap());
        let once = contents(&store);
        assert!(store.upsert_field(ts, &Block::Related(Vec::new())).unwrap());
        assert_eq!(contents(&store), once);
        assert_eq!(once.matches("  - Related: \n").count(), 1);
    }

    #[test]
    fn test_prepend_creates_file_and_rejects_duplicates() {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path(), "kb.md", Duration::from_secs(1));
        let entry = Entry::new("note", "widget", "2024-01-01 10:00:00", "Hello");

        store.prepend(&entry).unwrap();
        assert_eq!(store.load().unwrap(), vec![entry.clone()]);
        assert!(matches!(
            store.prepend(&entry),
            Err(StoreError::DuplicateTimestamp(_))
        ));
    }

    #[test]
    fn test_upsert_inserts_at_canonical_position() {
        let (_tmp, store) = store_with(SAMPLE);
        assert!(
            store
                .upsert_field("2024-01-02 10:00:00", &Block::Entity(EntityKind::Task))
                .unwrap()
        );
        let text = contents(&store);
        assert!(text.starts_with(
            "- `note` | `widget` | `2024-01-02 10:00:00` | Second\n  - Notes: second entry\n    more notes\n  - Entity: task\n  - Topics: rust\n"
        ));
    }

    #[test]
    fn test_upsert_replaces_notes_with_continuations() {
        let (_tmp, store) = store_with(SAMPLE);
        store
            .upsert_field("2024-01-02 10:00:00", &Block::Notes("rewritten".into()))
            .unwrap();
        let entries = store.load().unwrap();
        assert_eq!(entries[0].notes(), Some("rewritten"));
        assert!(!contents(&store).contains("more notes"));
    }

    #[test]
    fn test_upsert_missing_entry_returns_false() {
        let (_tmp, store) = store_with(SAMPLE);
        let before = contents(&store);
        assert!(
            !store
                .upsert_field("2030-01-01 00:00:00", &Block::Status("done".into()))
                .unwrap()
        );
        assert_eq!(contents(&store), before);
    }

    #[test]
    fn test_upsert_rejects_quotes_and_plain() {
        let (_tmp, store) = store_with(SAMPLE);
        assert!(matches!(
            store.upsert_field("2024-01-01 10:00:00", &Block::Quote("x".into())),
            Err(StoreError::NotUpsertable(_))
        ));
        assert!(matches!(
            store.upsert_field("2024-01-01 10:00:00", &Block::Plain("x".into())),
            Err(StoreError::NotUpsertable(_))
        ));
    }

    #[test]
    fn test_seed_field_keeps_existing() {
        let (_tmp, store) = store_with(SAMPLE);
        let ts = "2024-01-01 10:00:00";
        store.seed_field(ts, &Block::Status("not-started".into())).unwrap();
        store.upsert_field(ts, &Block::Status("doing".into())).unwrap();
        store.seed_field(ts, &Block::Status("not-started".into())).unwrap();
        assert_eq!(store.find_entry(ts).unwrap().unwrap().status(), Some("doing"));
    }

    #[test]
    fn test_delete_middle_and_last() {
        let text = format!(
            "{}- `note` | `widget` | `2023-12-31 10:00:00` | Zeroth\n  - ![Screenshot](screenshots/screenshot_2023-12-31_10-00-00.png)\n\n",
            SAMPLE
        );
        let (_tmp, store) = store_with(&text);

        let outcome = store.delete_entry("2024-01-01 10:00:00").unwrap();
        assert!(outcome.deleted);
        assert!(outcome.removed_side_files.is_empty());
        assert_eq!(store.load().unwrap().len(), 2);

        let outcome = store.delete_entry("2023-12-31 10:00:00").unwrap();
        assert_eq!(
            outcome.removed_side_files,
            vec!["screenshots/screenshot_2023-12-31_10-00-00.png".to_string()]
        );
        assert_eq!(
            contents(&store),
            "- `note` | `widget` | `2024-01-02 10:00:00` | Second\n  - Notes: second entry\n    more notes\n  - Topics: rust\n\n"
        );
    }

    #[test]
    fn test_delete_only_entry_empties_file() {
        let (_tmp, store) = store_with("- `note` | `w` | `2024-01-01 10:00:00` | Only\n  - Notes: x\n\n");
        assert!(store.delete_entry("2024-01-01 10:00:00").unwrap().deleted);
        assert_eq!(contents(&store), "");
    }

    #[test]
    fn test_delete_missing_is_noop() {
        let (_tmp, store) = store_with(SAMPLE);
        let outcome = store.delete_entry("2030-01-01 00:00:00").unwrap();
        assert!(!outcome.deleted);
        assert_eq!(contents(&store), SAMPLE);
    }
}
