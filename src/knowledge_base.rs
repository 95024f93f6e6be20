use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::enrich::activity::ActivityLog;
use crate::enrich::capability::Capabilities;
use crate::enrich::pipeline::{Pipeline, PipelineReport};
use crate::io::config_io::{ConfigError, read_config};
use crate::io::side_store::{SideFileError, SideFileKind, SideStore};
use crate::io::store::{DeleteOutcome, Store, StoreError};
use crate::io::vocab::Vocabulary;
use crate::model::config::KbConfig;
use crate::model::entry::{Block, Entry};
use crate::ops::capture::CaptureRequest;
use crate::ops::validate::{ValidationError, validate_project_folder};

#[derive(Debug, thiserror::Error)]
pub enum KbError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    SideFile(#[from] SideFileError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A knowledge base rooted in a project folder: the markdown store, its
/// side files and vocabularies, and the enrichment that follows a capture.
pub struct KnowledgeBase {
    root: PathBuf,
    config: KbConfig,
    store: Arc<Store>,
    side: SideStore,
    vocab: Arc<Vocabulary>,
    activity: Arc<ActivityLog>,
    capabilities: Capabilities,
}

impl KnowledgeBase {
    /// Open the knowledge base in `folder`, reading `kb.toml` if present.
    pub fn open(folder: &Path) -> Result<Self, KbError> {
        let root = validate_project_folder(folder)?;
        let config = read_config(&root)?;
        Ok(Self::with_config(root, config))
    }

    /// Open with an explicit config; `root` is trusted as-is.
    pub fn with_config(root: PathBuf, config: KbConfig) -> Self {
        let store = Store::new(&root, &config.store.file, config.store.lock_timeout());
        KnowledgeBase {
            side: SideStore::new(&root),
            vocab: Arc::new(Vocabulary::new(&root)),
            activity: Arc::new(ActivityLog::new(config.activity.capacity)),
            store: Arc::new(store),
            capabilities: Capabilities::none(),
            root,
            config,
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &KbConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Recent capability calls
    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    pub fn topics(&self) -> Vec<String> {
        self.vocab.topics()
    }

    pub fn people(&self) -> Vec<String> {
        self.vocab.people()
    }

    /// Persist a capture: validate it, write its side files, then prepend
    /// the entry. Returns the entry as written. No enrichment happens here.
    pub fn capture(&self, request: &CaptureRequest) -> Result<Entry, KbError> {
        // Reject invalid captures before any side file is written
        request.to_entry(None, None)?;
        let timestamp = request.captured.trim();
        // Holds the store lock until the entry is written or its side files
        // are removed again. Fails on a duplicate before any side file exists.
        let mut pending = self.store.begin_prepend(timestamp)?;

        let mut written: Vec<String> = Vec::new();
        let saved = self.save_side_files(request, timestamp, &mut written);
        let result = saved.and_then(|(screenshot, attachment)| {
            let entry = request.to_entry(screenshot.as_deref(), attachment.as_deref())?;
            pending.commit(&entry)?;
            Ok(entry)
        });

        match result {
            Ok(entry) => {
                tracing::info!(timestamp = %entry.timestamp, entry_type = %entry.entry_type, "entry captured");
                Ok(entry)
            }
            Err(e) => {
                for path in &written {
                    self.remove_side_file(path);
                }
                Err(e)
            }
        }
    }

    fn save_side_files(
        &self,
        request: &CaptureRequest,
        timestamp: &str,
        written: &mut Vec<String>,
    ) -> Result<(Option<String>, Option<String>), KbError> {
        let mut screenshot = None;
        if let Some(data) = request.screenshot_payload() {
            let path = self
                .side
                .save_binary(SideFileKind::Screenshot, data, None, timestamp)?;
            written.push(path.clone());
            screenshot = Some(path);
        }

        let mut attachment = None;
        if let Some(data) = request.file_payload() {
            let path = self.side.save_binary(
                SideFileKind::File,
                data,
                Some(request.attachment_name()),
                timestamp,
            )?;
            written.push(path.clone());
            attachment = Some(path);
        }
        Ok((screenshot, attachment))
    }

    fn remove_side_file(&self, path: &str) {
        if let Err(error) = self.side.delete_binary(path) {
            tracing::warn!(%path, %error, "could not remove side file");
        }
    }

    /// Capture, then start enrichment in the background.
    pub fn capture_and_enrich(&self, request: &CaptureRequest) -> Result<Entry, KbError> {
        let entry = self.capture(request)?;
        self.enrich_in_background(&entry.timestamp);
        Ok(entry)
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(
            Arc::clone(&self.store),
            self.side.clone(),
            Arc::clone(&self.vocab),
            Arc::clone(&self.activity),
            self.capabilities.clone(),
            self.config.enrich.clone(),
        )
    }

    /// Run enrichment for one entry to completion.
    pub async fn enrich(&self, timestamp: &str) -> PipelineReport {
        self.pipeline().run(timestamp).await
    }

    /// Spawn enrichment on the current tokio runtime. Returns `None` (and
    /// skips enrichment) when called outside a runtime.
    pub fn enrich_in_background(&self, timestamp: &str) -> Option<JoinHandle<PipelineReport>> {
        let Ok(handle) = Handle::try_current() else {
            tracing::warn!(%timestamp, "no async runtime; skipping enrichment");
            return None;
        };
        let pipeline = self.pipeline();
        let ts = timestamp.to_string();
        Some(handle.spawn(async move { pipeline.run(&ts).await }))
    }

    /// All entries, newest first. An absent store file reads as empty.
    pub fn entries(&self) -> Result<Vec<Entry>, KbError> {
        Ok(self.store.load_or_empty()?)
    }

    pub fn entry(&self, timestamp: &str) -> Result<Option<Entry>, KbError> {
        Ok(self.store.find_entry(timestamp)?)
    }

    /// Delete an entry and unlink the side files it referenced.
    pub fn delete(&self, timestamp: &str) -> Result<DeleteOutcome, KbError> {
        let outcome = self.store.delete_entry(timestamp)?;
        for path in &outcome.removed_side_files {
            self.remove_side_file(path);
        }
        if outcome.deleted {
            tracing::info!(%timestamp, side_files = outcome.removed_side_files.len(), "entry deleted");
        }
        Ok(outcome)
    }

    /// Move an entry to a kanban column. Returns `false` if there is no such entry.
    pub fn set_status(&self, timestamp: &str, status: &str) -> Result<bool, KbError> {
        let status = status.trim();
        if status.is_empty() {
            return Err(ValidationError::EmptyField("status").into());
        }
        if status.contains(['\n', '\r']) {
            return Err(ValidationError::IllegalCharacter {
                field: "status",
                value: status.to_string(),
            }
            .into());
        }
        Ok(self
            .store
            .upsert_field(timestamp, &Block::Status(status.to_string()))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;
    use tempfile::TempDir;

    fn request(json: &str) -> CaptureRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_capture_screenshot_then_delete() {
        let tmp = TempDir::new().unwrap();
        let kb = KnowledgeBase::open(tmp.path()).unwrap();
        let entry = kb
            .capture(&request(
                r#"{"type": "screenshot", "source": "browser", "captured": "2024-01-01 10:00:00",
                    "title": "Dashboard", "screenshot": "data:image/png;base64,aGVsbG8="}"#,
            ))
            .unwrap();
        let shot = kb.root().join("screenshots/screenshot_2024-01-01_10-00-00.png");
        assert!(shot.exists());
        assert_eq!(kb.entries().unwrap(), vec![entry]);

        let outcome = kb.delete("2024-01-01 10:00:00").unwrap();
        assert!(outcome.deleted);
        assert!(!shot.exists());
        assert!(kb.entries().unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_capture_keeps_existing_side_files() {
        let tmp = TempDir::new().unwrap();
        let kb = KnowledgeBase::open(tmp.path()).unwrap();
        let req = request(
            r#"{"type": "pdf", "source": "widget", "captured": "2024-01-01 10:00:00",
                "title": "report.pdf", "fileData": "data:application/pdf;base64,aGVsbG8="}"#,
        );
        kb.capture(&req).unwrap();

        let err = kb.capture(&req).unwrap_err();
        assert!(matches!(err, KbError::Store(StoreError::DuplicateTimestamp(_))));
        assert!(kb.root().join("files/report_2024-01-01_10-00-00.pdf").exists());
        assert_eq!(kb.entries().unwrap().len(), 1);
    }

    #[test]
    fn test_concurrent_duplicate_captures_keep_winner_side_file() {
        let req = request(
            r#"{"type": "screenshot", "source": "browser", "captured": "2024-01-01 10:00:00",
                "title": "Dashboard", "screenshot": "data:image/png;base64,aGVsbG8="}"#,
        );
        for _ in 0..10 {
            let tmp = TempDir::new().unwrap();
            let kb = KnowledgeBase::open(tmp.path()).unwrap();
            let barrier = Barrier::new(2);

            let results: Vec<Result<Entry, KbError>> = thread::scope(|s| {
                let handles: Vec<_> = (0..2)
                    .map(|_| {
                        s.spawn(|| {
                            barrier.wait();
                            kb.capture(&req)
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });

            assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
            assert!(results.iter().any(|r| matches!(
                r,
                Err(KbError::Store(StoreError::DuplicateTimestamp(_)))
            )));
            let entries = kb.entries().unwrap();
            assert_eq!(entries.len(), 1);
            for path in entries[0].side_files() {
                assert!(kb.root().join(path).exists(), "missing {}", path);
            }
        }
    }

    #[test]
    fn test_invalid_capture_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let kb = KnowledgeBase::open(tmp.path()).unwrap();
        let err = kb
            .capture(&request(
                r#"{"type": "screenshot", "source": "browser", "captured": "bad",
                    "screenshot": "data:image/png;base64,aGVsbG8="}"#,
            ))
            .unwrap_err();
        assert!(matches!(err, KbError::Validation(ValidationError::BadTimestamp(_))));
        assert!(!tmp.path().join("screenshots").exists());
        assert!(!tmp.path().join("kb.md").exists());
    }

    #[test]
    fn test_set_status() {
        let tmp = TempDir::new().unwrap();
        let kb = KnowledgeBase::open(tmp.path()).unwrap();
        kb.capture(&request(
            r#"{"type": "note", "source": "widget", "captured": "2024-01-01 10:00:00", "notes": "ship it"}"#,
        ))
        .unwrap();
        assert!(kb.set_status("2024-01-01 10:00:00", "in-progress").unwrap());
        assert!(!kb.set_status("2030-01-01 10:00:00", "done").unwrap());
        assert!(kb.set_status("2024-01-01 10:00:00", " ").is_err());
        let entry = kb.entry("2024-01-01 10:00:00").unwrap().unwrap();
        assert_eq!(entry.status(), Some("in-progress"));
    }

    #[test]
    fn test_background_enrichment_needs_runtime() {
        let tmp = TempDir::new().unwrap();
        let kb = KnowledgeBase::open(tmp.path()).unwrap();
        assert!(kb.enrich_in_background("2024-01-01 10:00:00").is_none());
    }
}
