use serde::Serialize;

use crate::io::store::DeleteOutcome;
use crate::model::entry::{Block, Entry};
use crate::parse::{CONTENT_PREFIX, render_block};

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct EntryLineJson {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub source: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
}

#[derive(Serialize)]
pub struct DeleteJson {
    pub timestamp: String,
    pub deleted: bool,
    pub removed_side_files: Vec<String>,
}

#[derive(Serialize)]
pub struct StatusJson {
    pub timestamp: String,
    pub status: String,
    pub updated: bool,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn entry_to_json(entry: &Entry) -> EntryLineJson {
    EntryLineJson {
        timestamp: entry.timestamp.clone(),
        entry_type: entry.entry_type.clone(),
        source: entry.source.clone(),
        title: entry.title.clone(),
        url: entry.url.clone(),
        entity: entry.entity().map(|e| e.as_str().to_string()),
        status: entry.status().map(str::to_string),
        topics: entry.topics().to_vec(),
    }
}

pub fn delete_to_json(timestamp: &str, outcome: &DeleteOutcome) -> DeleteJson {
    DeleteJson {
        timestamp: timestamp.to_string(),
        deleted: outcome.deleted,
        removed_side_files: outcome.removed_side_files.clone(),
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

/// Format an entry as a one-line summary
pub fn format_entry_line(entry: &Entry) -> String {
    let status_str = entry
        .status()
        .map(|s| format!(" ({})", s))
        .unwrap_or_default();
    let topics_str = if entry.topics().is_empty() {
        String::new()
    } else {
        format!(
            " {}",
            entry
                .topics()
                .iter()
                .map(|t| format!("#{}", t.replace(' ', "-")))
                .collect::<Vec<_>>()
                .join(" ")
        )
    };
    format!(
        "{}  [{}] {}{}{}",
        entry.timestamp, entry.entry_type, entry.title, status_str, topics_str
    )
}

/// Format detailed entry view
pub fn format_entry_detail(entry: &Entry) -> Vec<String> {
    let mut lines = vec![
        entry.title.clone(),
        format!("  type:      {}", entry.entry_type),
        format!("  source:    {}", entry.source),
        format!("  captured:  {}", entry.timestamp),
    ];
    if let Some(url) = &entry.url {
        lines.push(format!("  url:       {}", url));
    }
    if let Some(group) = &entry.tab_group {
        lines.push(format!("  group:     {} ({})", group.name, group.color));
    }

    if !entry.blocks.is_empty() {
        lines.push(String::new());
    }
    for block in &entry.blocks {
        match block {
            // Keep paragraph breaks that the stored form flattens
            Block::Notes(text) => {
                lines.push("  Notes:".to_string());
                for line in text.lines() {
                    lines.push(format!("    {}", line));
                }
            }
            other => {
                for line in render_block(other) {
                    lines.push(format!("  {}", line.trim_start_matches(CONTENT_PREFIX)));
                }
            }
        }
    }
    lines
}

/// Format the result of a delete
pub fn format_delete(timestamp: &str, outcome: &DeleteOutcome) -> Vec<String> {
    if !outcome.deleted {
        return vec![format!("no entry at {}", timestamp)];
    }
    let mut lines = vec![format!("deleted {}", timestamp)];
    for path in &outcome.removed_side_files {
        lines.push(format!("  removed {}", path));
    }
    lines
}
