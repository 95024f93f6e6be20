use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::model::entry::{Entry, parse_timestamp};

/// Title used when a capture has none
pub const DEFAULT_TITLE: &str = "Untitled";

/// Directories a knowledge base may never live in (compared lowercased)
const BLOCKED_PATHS: [&str; 9] = [
    "c:\\windows",
    "c:\\program files",
    "c:\\program files (x86)",
    "c:\\programdata",
    "/etc",
    "/usr",
    "/bin",
    "/sbin",
    "/var",
];

static TIMESTAMP_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}$").expect("timestamp pattern compiles")
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    EmptyField(&'static str),
    #[error("invalid timestamp format: {0}")]
    BadTimestamp(String),
    #[error("{field} may not contain backticks, pipes or line breaks: {value}")]
    IllegalCharacter { field: &'static str, value: String },
    #[error("invalid project folder {path}: {reason}")]
    InvalidProjectPath { path: String, reason: String },
}

/// Check an entry before it is persisted.
pub fn validate_entry(entry: &Entry) -> Result<(), ValidationError> {
    header_token("type", &entry.entry_type)?;
    header_token("source", &entry.source)?;
    validate_timestamp(&entry.timestamp)
}

/// `YYYY-MM-DD HH:MM:SS`, and a real date-time
pub fn validate_timestamp(timestamp: &str) -> Result<(), ValidationError> {
    if timestamp.is_empty() {
        return Err(ValidationError::EmptyField("captured"));
    }
    if !TIMESTAMP_SHAPE.is_match(timestamp) || parse_timestamp(timestamp).is_none() {
        return Err(ValidationError::BadTimestamp(timestamp.to_string()));
    }
    Ok(())
}

/// A value written between backticks in the header line
fn header_token(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    if value.contains(['`', '|', '\n', '\r']) {
        return Err(ValidationError::IllegalCharacter {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Collapse a title onto one line; blank titles become [`DEFAULT_TITLE`].
pub fn normalize_title(title: Option<&str>) -> String {
    let collapsed = title
        .unwrap_or_default()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if collapsed.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        collapsed
    }
}

/// Resolve a project folder and make sure it is safe to write into.
pub fn validate_project_folder(folder: &Path) -> Result<PathBuf, ValidationError> {
    let raw = folder.to_string_lossy();
    let invalid = |reason: &str| ValidationError::InvalidProjectPath {
        path: raw.to_string(),
        reason: reason.to_string(),
    };

    if raw.trim().is_empty() {
        return Err(invalid("path is empty"));
    }
    if raw.contains("..") {
        return Err(invalid("path may not contain '..'"));
    }

    let resolved = folder
        .canonicalize()
        .map_err(|_| invalid("folder does not exist"))?;
    if !resolved.is_dir() {
        return Err(invalid("not a directory"));
    }

    let lowered = resolved.to_string_lossy().to_lowercase();
    if BLOCKED_PATHS
        .iter()
        .any(|blocked| Path::new(&lowered).starts_with(blocked))
    {
        return Err(invalid("system directories can't hold a knowledge base"));
    }

    Ok(resolved)
}
