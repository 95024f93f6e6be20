use serde::{Deserialize, Serialize};

use crate::model::entry::{Block, Entry, TabGroup};
use crate::ops::validate::{ValidationError, normalize_title, validate_entry};

/// Longest description kept from page metadata
const MAX_DESCRIPTION_CHARS: usize = 200;

/// A capture as sent by the browser extension or desktop widget
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureRequest {
    #[serde(rename = "type")]
    pub entry_type: String,
    pub source: String,
    /// Creation timestamp, `YYYY-MM-DD HH:MM:SS`; becomes the entry key
    pub captured: String,
    pub title: Option<String>,
    pub url: Option<String>,
    pub tab_group: Option<CaptureTabGroup>,
    pub selected_text: Option<String>,
    pub notes: Option<String>,
    pub page_metadata: Option<PageMetadata>,
    /// Screenshot as a data URL (only used for `type == "screenshot"`)
    pub screenshot: Option<String>,
    /// Uploaded file as a data URL
    pub file_data: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureTabGroup {
    pub group_name: String,
    pub group_color: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageMetadata {
    pub description: String,
    pub og_image: String,
    pub author: String,
    pub published_date: String,
    pub reading_time: Option<u32>,
}

impl CaptureRequest {
    /// Screenshot payload to save, if this capture carries one
    pub fn screenshot_payload(&self) -> Option<&str> {
        if self.entry_type != "screenshot" {
            return None;
        }
        self.screenshot.as_deref().filter(|s| !s.is_empty())
    }

    pub fn file_payload(&self) -> Option<&str> {
        self.file_data.as_deref().filter(|s| !s.is_empty())
    }

    /// Base name for a saved upload (the title, as the widget sends the file name there)
    pub fn attachment_name(&self) -> &str {
        self.title.as_deref().unwrap_or_default()
    }

    /// Build and validate the entry. Side-file paths come from the caller,
    /// after the binaries have been written.
    pub fn to_entry(
        &self,
        screenshot: Option<&str>,
        attachment: Option<&str>,
    ) -> Result<Entry, ValidationError> {
        let mut entry = Entry::new(
            self.entry_type.trim(),
            self.source.trim(),
            self.captured.trim(),
            normalize_title(self.title.as_deref()),
        );
        validate_entry(&entry)?;

        entry.url = self
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string);
        entry.tab_group = self.tab_group.as_ref().and_then(|g| {
            let name = g.group_name.trim();
            let color = g.group_color.trim();
            (!name.is_empty() || !color.is_empty()).then(|| TabGroup {
                name: name.to_string(),
                color: color.to_string(),
            })
        });

        for line in clean_lines(self.selected_text.as_deref()) {
            entry.blocks.push(Block::Quote(line.to_string()));
        }
        if let Some(path) = screenshot {
            entry.blocks.push(Block::Screenshot(path.to_string()));
        }
        if let Some(path) = attachment {
            entry.blocks.push(Block::Attachment {
                label: "Attachment".to_string(),
                path: path.to_string(),
            });
        }
        let notes = clean_lines(self.notes.as_deref());
        if !notes.is_empty() {
            entry.blocks.push(Block::Notes(notes.join("\n")));
        }

        if let Some(meta) = &self.page_metadata {
            let description = meta.description.trim();
            if !description.is_empty() {
                entry.blocks.push(Block::Description(truncate_description(description)));
            }
            if !meta.og_image.trim().is_empty() {
                entry.blocks.push(Block::Image(meta.og_image.trim().to_string()));
            }
            if !meta.author.trim().is_empty() {
                entry.blocks.push(Block::Author(meta.author.trim().to_string()));
            }
            if !meta.published_date.trim().is_empty() {
                entry
                    .blocks
                    .push(Block::Published(meta.published_date.trim().to_string()));
            }
            if let Some(minutes) = meta.reading_time.filter(|&m| m > 0) {
                entry.blocks.push(Block::ReadTime(minutes));
            }
        }

        Ok(entry)
    }
}

/// Trimmed, non-blank lines of a free-text field
fn clean_lines(text: Option<&str>) -> Vec<&str> {
    text.unwrap_or_default()
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect()
}

/// Over 200 characters: the first 197 plus `...`
fn truncate_description(description: &str) -> String {
    let one_line = description.split_whitespace().collect::<Vec<_>>().join(" ");
    if one_line.chars().count() <= MAX_DESCRIPTION_CHARS {
        return one_line;
    }
    let mut cut: String = one_line.chars().take(MAX_DESCRIPTION_CHARS - 3).collect();
    cut.push_str("...");
    cut
}
