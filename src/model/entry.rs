use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::model::field::FieldKind;

/// Format of entry timestamps, e.g. `2024-01-01 10:00:00`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse an entry timestamp. Returns `None` for anything malformed.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT).ok()
}

/// What an entry is about, as decided by classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Project,
    Task,
    Knowledge,
    Unclassified,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Project => "project",
            EntityKind::Task => "task",
            EntityKind::Knowledge => "knowledge",
            EntityKind::Unclassified => "unclassified",
        }
    }

    pub fn parse(s: &str) -> Option<EntityKind> {
        match s.trim().to_ascii_lowercase().as_str() {
            "project" => Some(EntityKind::Project),
            "task" => Some(EntityKind::Task),
            "knowledge" => Some(EntityKind::Knowledge),
            "unclassified" => Some(EntityKind::Unclassified),
            _ => None,
        }
    }
}

/// Work/personal split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Work,
    Personal,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Work => "work",
            Category::Personal => "personal",
        }
    }

    pub fn parse(s: &str) -> Option<Category> {
        match s.trim().to_ascii_lowercase().as_str() {
            "work" => Some(Category::Work),
            "personal" => Some(Category::Personal),
            _ => None,
        }
    }
}

/// Browser tab group the page was captured from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabGroup {
    pub name: String,
    pub color: String,
}

/// `Related: <timestamp> (<type>)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedRef {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub entry_type: String,
}

/// `Similar: <timestamp> (<score>)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarRef {
    pub timestamp: String,
    pub score: f32,
}

impl SimilarRef {
    /// Scores are kept at two decimals, the precision written to disk.
    pub fn new(timestamp: impl Into<String>, score: f32) -> Self {
        SimilarRef {
            timestamp: timestamp.into(),
            score: (score.clamp(0.0, 1.0) * 100.0).round() / 100.0,
        }
    }
}

/// One content line (or multi-line block) of an entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum Block {
    /// `> quoted text` (one per line of selected text)
    Quote(String),
    /// `![Screenshot](screenshots/...)`
    Screenshot(String),
    /// `[Attachment](files/...)`
    Attachment { label: String, path: String },
    /// `Notes:` followed by optional 4-space continuation lines
    Notes(String),
    ParentId(String),
    Related(Vec<RelatedRef>),
    Similar(Vec<SimilarRef>),
    Description(String),
    Image(String),
    Author(String),
    Published(String),
    /// `ReadTime: 5 min`
    ReadTime(u32),
    Entity(EntityKind),
    /// Kanban column id
    Status(String),
    Topics(Vec<String>),
    People(Vec<String>),
    Category(Category),
    /// `AI Summary:`
    Summary(String),
    /// A content line the grammar doesn't recognize, kept verbatim
    Plain(String),
}

impl Block {
    /// The field kind of this block, or `None` for opaque content.
    pub fn kind(&self) -> Option<FieldKind> {
        Some(match self {
            Block::Quote(_) => FieldKind::Quote,
            Block::Screenshot(_) => FieldKind::Screenshot,
            Block::Attachment { .. } => FieldKind::Attachment,
            Block::Notes(_) => FieldKind::Notes,
            Block::ParentId(_) => FieldKind::ParentId,
            Block::Related(_) => FieldKind::Related,
            Block::Similar(_) => FieldKind::Similar,
            Block::Description(_) => FieldKind::Description,
            Block::Image(_) => FieldKind::Image,
            Block::Author(_) => FieldKind::Author,
            Block::Published(_) => FieldKind::Published,
            Block::ReadTime(_) => FieldKind::ReadTime,
            Block::Entity(_) => FieldKind::Entity,
            Block::Status(_) => FieldKind::Status,
            Block::Topics(_) => FieldKind::Topics,
            Block::People(_) => FieldKind::People,
            Block::Category(_) => FieldKind::Category,
            Block::Summary(_) => FieldKind::Summary,
            Block::Plain(_) => return None,
        })
    }

    /// Relative path of the side file this block references, if any
    pub fn side_file(&self) -> Option<&str> {
        match self {
            Block::Screenshot(path) | Block::Attachment { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// A knowledge-base entry. The timestamp is its only stable key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    #[serde(rename = "type")]
    pub entry_type: String,
    pub source: String,
    pub timestamp: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab_group: Option<TabGroup>,
    /// Content blocks in file order
    pub blocks: Vec<Block>,
}

impl Entry {
    pub fn new(
        entry_type: impl Into<String>,
        source: impl Into<String>,
        timestamp: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Entry {
            entry_type: entry_type.into(),
            source: source.into(),
            timestamp: timestamp.into(),
            title: title.into(),
            url: None,
            tab_group: None,
            blocks: Vec::new(),
        }
    }

    /// Set a block, keeping blocks in canonical order.
    ///
    /// Replaces an existing block of the same kind (unless the kind is
    /// repeatable), otherwise inserts before the first block that ranks after
    /// it. Opaque blocks are appended.
    pub fn set_block(&mut self, block: Block) {
        let Some(kind) = block.kind() else {
            self.blocks.push(block);
            return;
        };

        if !kind.is_repeatable()
            && let Some(existing) = self.blocks.iter_mut().find(|b| b.kind() == Some(kind))
        {
            *existing = block;
            return;
        }

        let pos = self
            .blocks
            .iter()
            .position(|b| b.kind().is_some_and(|k| k.rank() > kind.rank()))
            .unwrap_or(self.blocks.len());
        self.blocks.insert(pos, block);
    }

    /// Builder-style [`Entry::set_block`]
    pub fn with_block(mut self, block: Block) -> Self {
        self.set_block(block);
        self
    }

    pub fn block(&self, kind: FieldKind) -> Option<&Block> {
        self.blocks.iter().find(|b| b.kind() == Some(kind))
    }

    pub fn notes(&self) -> Option<&str> {
        self.blocks.iter().find_map(|b| match b {
            Block::Notes(n) => Some(n.as_str()),
            _ => None,
        })
    }

    /// Selected text, one quote line per text line
    pub fn selected_text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                Block::Quote(q) => Some(q.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn summary(&self) -> Option<&str> {
        self.blocks.iter().find_map(|b| match b {
            Block::Summary(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn description(&self) -> Option<&str> {
        self.blocks.iter().find_map(|b| match b {
            Block::Description(d) => Some(d.as_str()),
            _ => None,
        })
    }

    pub fn entity(&self) -> Option<EntityKind> {
        self.blocks.iter().find_map(|b| match b {
            Block::Entity(e) => Some(*e),
            _ => None,
        })
    }

    pub fn status(&self) -> Option<&str> {
        self.blocks.iter().find_map(|b| match b {
            Block::Status(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn category(&self) -> Option<Category> {
        self.blocks.iter().find_map(|b| match b {
            Block::Category(c) => Some(*c),
            _ => None,
        })
    }

    pub fn topics(&self) -> &[String] {
        self.blocks
            .iter()
            .find_map(|b| match b {
                Block::Topics(t) => Some(t.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn people(&self) -> &[String] {
        self.blocks
            .iter()
            .find_map(|b| match b {
                Block::People(p) => Some(p.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn related(&self) -> &[RelatedRef] {
        self.blocks
            .iter()
            .find_map(|b| match b {
                Block::Related(r) => Some(r.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn similar(&self) -> &[SimilarRef] {
        self.blocks
            .iter()
            .find_map(|b| match b {
                Block::Similar(s) => Some(s.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    /// Relative paths of every screenshot or attachment this entry references
    pub fn side_files(&self) -> Vec<&str> {
        self.blocks.iter().filter_map(Block::side_file).collect()
    }

    /// Whether there is anything to compare for similarity:
    /// notes, selected text, or a generated summary.
    pub fn has_content(&self) -> bool {
        self.notes().is_some_and(|n| !n.trim().is_empty())
            || self.blocks.iter().any(|b| matches!(b, Block::Quote(_)))
            || self.summary().is_some_and(|s| !s.trim().is_empty())
    }

    pub fn parsed_timestamp(&self) -> Option<NaiveDateTime> {
        parse_timestamp(&self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_block_keeps_canonical_order() {
        let mut entry = Entry::new("note", "widget", "2024-01-01 10:00:00", "Title");
        entry.set_block(Block::Summary("sum".into()));
        entry.set_block(Block::Topics(vec!["rust".into()]));
        entry.set_block(Block::Notes("hello".into()));
        entry.set_block(Block::Entity(EntityKind::Task));

        let kinds: Vec<_> = entry.blocks.iter().filter_map(Block::kind).collect();
        assert_eq!(
            kinds,
            vec![
                FieldKind::Notes,
                FieldKind::Entity,
                FieldKind::Topics,
                FieldKind::Summary
            ]
        );
    }

    #[test]
    fn test_set_block_replaces_single_valued() {
        let mut entry = Entry::new("note", "widget", "2024-01-01 10:00:00", "Title");
        entry.set_block(Block::Status("not-started".into()));
        entry.set_block(Block::Status("done".into()));
        assert_eq!(entry.blocks.len(), 1);
        assert_eq!(entry.status(), Some("done"));
    }

    #[test]
    fn test_set_block_appends_quotes_in_order() {
        let mut entry = Entry::new("snippet", "browser", "2024-01-01 10:00:00", "Title");
        entry.set_block(Block::Notes("n".into()));
        entry.set_block(Block::Quote("one".into()));
        entry.set_block(Block::Quote("two".into()));
        assert_eq!(entry.selected_text(), "one\ntwo");
        assert_eq!(entry.blocks.last(), Some(&Block::Notes("n".into())));
    }

    #[test]
    fn test_similar_ref_rounds_and_clamps() {
        assert_eq!(SimilarRef::new("t", 0.8567).score, 0.86);
        assert_eq!(SimilarRef::new("t", 1.7).score, 1.0);
        assert_eq!(SimilarRef::new("t", -0.2).score, 0.0);
    }

    #[test]
    fn test_has_content() {
        let entry = Entry::new("link", "browser", "2024-01-01 10:00:00", "Title");
        assert!(!entry.has_content());
        assert!(entry.clone().with_block(Block::Summary("x".into())).has_content());
        assert!(entry.with_block(Block::Quote("x".into())).has_content());
    }
}
