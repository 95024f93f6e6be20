use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};

use crate::io::atomic::atomic_write;

/// Longest file name kept by [`sanitize_filename`]
const MAX_FILENAME_LEN: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum SideFileError {
    #[error("could not decode data URL: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("refusing side-file path outside the project: {0}")]
    UnsafePath(String),
    #[error("could not write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Which subdirectory a binary goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideFileKind {
    Screenshot,
    File,
}

impl SideFileKind {
    pub fn dir(self) -> &'static str {
        match self {
            SideFileKind::Screenshot => "screenshots",
            SideFileKind::File => "files",
        }
    }
}

/// Binary artifacts (screenshots, uploads) stored next to the knowledge base
/// and referenced from entries by relative path.
#[derive(Debug, Clone)]
pub struct SideStore {
    root: PathBuf,
}

impl SideStore {
    pub fn new(root: &Path) -> Self {
        SideStore {
            root: root.to_path_buf(),
        }
    }

    /// Decode a base64 data URL and write it under the kind's directory.
    /// Returns the path relative to the project root, as recorded in the entry.
    pub fn save_binary(
        &self,
        kind: SideFileKind,
        data_url: &str,
        original_name: Option<&str>,
        timestamp: &str,
    ) -> Result<String, SideFileError> {
        let bytes = decode_data_url(data_url)?;
        let slug = timestamp_slug(timestamp);
        let file_name = match kind {
            SideFileKind::Screenshot => format!("screenshot_{}.png", slug),
            SideFileKind::File => {
                let safe = sanitize_filename(original_name.unwrap_or_default());
                match safe.rsplit_once('.') {
                    Some((base, ext)) => format!("{}_{}.{}", base, slug, ext),
                    None => format!("{}_{}", safe, slug),
                }
            }
        };

        let dir = self.root.join(kind.dir());
        fs::create_dir_all(&dir).map_err(|e| SideFileError::Io {
            path: dir.clone(),
            source: e,
        })?;
        let path = dir.join(&file_name);
        atomic_write(&path, &bytes).map_err(|e| SideFileError::Io {
            path: path.clone(),
            source: e,
        })?;

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "side file saved");
        Ok(format!("{}/{}", kind.dir(), file_name))
    }

    /// Unlink a side file. A missing file is not an error; returns whether
    /// anything was removed.
    pub fn delete_binary(&self, relative: &str) -> Result<bool, SideFileError> {
        let path = self.resolve(relative)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SideFileError::Io { path, source: e }),
        }
    }

    /// Absolute path of a relative side-file reference, rejecting anything
    /// that could escape the project root.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, SideFileError> {
        let rel = Path::new(relative);
        let escapes = relative.is_empty()
            || relative.contains("://")
            || rel
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(SideFileError::UnsafePath(relative.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

/// Decode `data:<mime>;base64,<payload>`, or a bare base64 payload.
pub fn decode_data_url(data_url: &str) -> Result<Vec<u8>, SideFileError> {
    let payload = data_url
        .split_once(',')
        .map_or(data_url, |(_, payload)| payload);
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    Ok(BASE64.decode(compact)?)
}

/// `2024-01-01 10:00:00` -> `2024-01-01_10-00-00`
pub fn timestamp_slug(timestamp: &str) -> String {
    timestamp.replace(' ', "_").replace(':', "-")
}

/// Reduce an untrusted name to a safe single file name: base name only, no
/// leading dots, `[A-Za-z0-9._ -]` only, at most 200 characters with the
/// extension preserved.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let base = base.replace('\0', "");
    let base = base.trim_start_matches('.');

    let mut safe: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();

    // Only ASCII remains, so byte lengths are character counts
    if safe.len() > MAX_FILENAME_LEN {
        safe = match safe.rsplit_once('.') {
            Some((stem, ext)) => {
                format!("{}.{}", &stem[..stem.len().min(190)], &ext[..ext.len().min(10)])
            }
            None => safe[..MAX_FILENAME_LEN].to_string(),
        };
    }

    if safe.is_empty() || safe == "." {
        return "unnamed_file".to_string();
    }
    safe
}
