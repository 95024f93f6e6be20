use std::path::PathBuf;

use serde::Serialize;

use crate::model::entry::Entry;

/// How an entry gets summarized, chosen from its type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryStrategy {
    /// Vision analysis of the screenshot or image file
    Image,
    /// Web research seeded by the notes
    Research,
    /// Transcription of the audio file
    Audio,
    /// Text extraction from the attached document
    Document,
    /// Reading the linked page
    Link,
    /// Summarizing the entry's own text
    Text,
    /// Not summarized
    Skip,
}

impl SummaryStrategy {
    pub fn for_type(entry_type: &str) -> SummaryStrategy {
        match entry_type {
            "screenshot" | "image" => SummaryStrategy::Image,
            "long-note" => SummaryStrategy::Research,
            "audio" => SummaryStrategy::Audio,
            "pdf" | "markdown" | "ms-word" | "ms-excel" | "ms-powerpoint" | "ms-onenote" => {
                SummaryStrategy::Document
            }
            "link" | "chatgpt" | "claude" | "perplexity" | "notion" => SummaryStrategy::Link,
            "snippet" | "note" | "para" | "idea" => SummaryStrategy::Text,
            "video" => SummaryStrategy::Skip,
            _ => SummaryStrategy::Text,
        }
    }

    /// Strategies that read a screenshot or attachment
    pub fn needs_side_file(self) -> bool {
        matches!(
            self,
            SummaryStrategy::Image | SummaryStrategy::Audio | SummaryStrategy::Document
        )
    }
}

/// Everything a summarizer gets
#[derive(Debug, Clone)]
pub struct SummaryRequest {
    pub strategy: SummaryStrategy,
    pub entry: Entry,
    /// Absolute path of the entry's screenshot or attachment
    pub side_file: Option<PathBuf>,
}

/// Why no summary is requested for an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummarySkip {
    NotSummarized,
    MissingSideFile,
    MissingNotes,
}

impl std::fmt::Display for SummarySkip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SummarySkip::NotSummarized => write!(f, "type is not summarized"),
            SummarySkip::MissingSideFile => write!(f, "no side file to read"),
            SummarySkip::MissingNotes => write!(f, "no notes to research"),
        }
    }
}

/// Build the summarizer request for an entry, or say why there is none.
pub fn plan_summary(entry: &Entry, side_file: Option<PathBuf>) -> Result<SummaryRequest, SummarySkip> {
    let strategy = SummaryStrategy::for_type(&entry.entry_type);
    match strategy {
        SummaryStrategy::Skip => return Err(SummarySkip::NotSummarized),
        s if s.needs_side_file() && side_file.is_none() => return Err(SummarySkip::MissingSideFile),
        SummaryStrategy::Research if entry.notes().is_none_or(|n| n.trim().is_empty()) => {
            return Err(SummarySkip::MissingNotes);
        }
        _ => {}
    }
    Ok(SummaryRequest {
        strategy,
        entry: entry.clone(),
        side_file,
    })
}

/// Summaries are stored on a single line
pub fn single_line(summary: &str) -> String {
    summary.split_whitespace().collect::<Vec<_>>().join(" ")
}
