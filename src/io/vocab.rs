use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::io::atomic::atomic_write;

/// A known-names registry stored as `{"<key>": [..]}` in the project root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VocabKind {
    Topics,
    People,
}

impl VocabKind {
    pub fn file_name(self) -> &'static str {
        match self {
            VocabKind::Topics => "topics.json",
            VocabKind::People => "entities.json",
        }
    }

    fn key(self) -> &'static str {
        match self {
            VocabKind::Topics => "topics",
            VocabKind::People => "entities",
        }
    }
}

/// Topic and people names seen so far, passed to the classifier so it
/// reuses existing spellings.
pub struct Vocabulary {
    root: PathBuf,
    guard: Mutex<()>,
}

impl Vocabulary {
    pub fn new(root: &Path) -> Self {
        Vocabulary {
            root: root.to_path_buf(),
            guard: Mutex::new(()),
        }
    }

    pub fn topics(&self) -> Vec<String> {
        self.list(VocabKind::Topics)
    }

    pub fn people(&self) -> Vec<String> {
        self.list(VocabKind::People)
    }

    /// Names in the registry. A missing or unreadable file reads as empty.
    pub fn list(&self, kind: VocabKind) -> Vec<String> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        self.read(kind)
    }

    /// Add names to the registry, deduplicated and sorted.
    /// Returns how many names were new.
    pub fn merge(&self, kind: VocabKind, names: &[String]) -> std::io::Result<usize> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let mut all: BTreeSet<String> = self.read(kind).into_iter().collect();
        let before = all.len();
        all.extend(
            names
                .iter()
                .map(|n| n.trim())
                .filter(|n| !n.is_empty())
                .map(str::to_string),
        );
        let added = all.len() - before;
        if added == 0 {
            return Ok(0);
        }

        let doc = serde_json::json!({ kind.key(): all });
        let text = serde_json::to_string_pretty(&doc)?;
        atomic_write(&self.root.join(kind.file_name()), text.as_bytes())?;
        Ok(added)
    }

    fn read(&self, kind: VocabKind) -> Vec<String> {
        let path = self.root.join(kind.file_name());
        let Ok(text) = fs::read_to_string(&path) else {
            return Vec::new();
        };
        let value: serde_json::Value = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring malformed vocabulary file");
                return Vec::new();
            }
        };
        value
            .get(kind.key())
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let vocab = Vocabulary::new(tmp.path());
        assert!(vocab.topics().is_empty());
        assert!(vocab.people().is_empty());
    }

    #[test]
    fn test_merge_dedupes_and_sorts() {
        let tmp = TempDir::new().unwrap();
        let vocab = Vocabulary::new(tmp.path());
        let added = vocab
            .merge(VocabKind::Topics, &["rust".into(), "cli".into(), "rust".into()])
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(
            vocab.merge(VocabKind::Topics, &["cli".into(), " ".into()]).unwrap(),
            0
        );
        assert_eq!(vocab.topics(), vec!["cli".to_string(), "rust".to_string()]);

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(tmp.path().join("topics.json")).unwrap())
                .unwrap();
        assert_eq!(raw["topics"][0], "cli");
    }

    #[test]
    fn test_people_live_in_entities_json() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("entities.json"), r#"{"entities": ["Ada (CTO)"]}"#).unwrap();
        let vocab = Vocabulary::new(tmp.path());
        vocab.merge(VocabKind::People, &["Grace".into()]).unwrap();
        assert_eq!(vocab.people(), vec!["Ada (CTO)".to_string(), "Grace".to_string()]);
    }

    #[test]
    fn test_malformed_file_reads_empty() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("topics.json"), "not json").unwrap();
        assert!(Vocabulary::new(tmp.path()).topics().is_empty());
    }
}
