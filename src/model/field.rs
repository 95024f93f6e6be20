use serde::{Deserialize, Serialize};

/// The kind of a content line (`  - ...`) inside an entry.
///
/// The text right after `  - ` identifies the kind; no two kinds share a
/// prefix. Unrecognized lines have no kind and are kept as opaque content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    Quote,
    Screenshot,
    Attachment,
    Notes,
    ParentId,
    Related,
    Similar,
    Description,
    Image,
    Author,
    Published,
    ReadTime,
    Entity,
    Status,
    Topics,
    People,
    Category,
    Summary,
}

/// Canonical order of fields within an entry.
///
/// Every writer consults this table to find where a new field goes: a field
/// is inserted before the first existing field that ranks after it.
pub const FIELD_ORDER: [FieldKind; 18] = [
    FieldKind::Quote,
    FieldKind::Screenshot,
    FieldKind::Attachment,
    FieldKind::Notes,
    FieldKind::ParentId,
    FieldKind::Related,
    FieldKind::Similar,
    FieldKind::Description,
    FieldKind::Image,
    FieldKind::Author,
    FieldKind::Published,
    FieldKind::ReadTime,
    FieldKind::Entity,
    FieldKind::Status,
    FieldKind::Topics,
    FieldKind::People,
    FieldKind::Category,
    FieldKind::Summary,
];

impl FieldKind {
    /// Position in [`FIELD_ORDER`]
    pub fn rank(self) -> usize {
        FIELD_ORDER
            .iter()
            .position(|&k| k == self)
            .unwrap_or(FIELD_ORDER.len())
    }

    /// The literal text that starts a line of this kind (after `  - `)
    pub fn prefix(self) -> &'static str {
        match self {
            FieldKind::Quote => "> ",
            FieldKind::Screenshot => "![Screenshot](",
            FieldKind::Attachment => "[",
            FieldKind::Notes => "Notes: ",
            FieldKind::ParentId => "ParentId: ",
            FieldKind::Related => "Related: ",
            FieldKind::Similar => "Similar: ",
            FieldKind::Description => "Description: ",
            FieldKind::Image => "Image: ",
            FieldKind::Author => "Author: ",
            FieldKind::Published => "Published: ",
            FieldKind::ReadTime => "ReadTime: ",
            FieldKind::Entity => "Entity: ",
            FieldKind::Status => "Status: ",
            FieldKind::Topics => "Topics: ",
            FieldKind::People => "People: ",
            FieldKind::Category => "Category: ",
            FieldKind::Summary => "AI Summary: ",
        }
    }

    /// Quote lines may appear many times in one entry; every other kind at most once.
    pub fn is_repeatable(self) -> bool {
        matches!(self, FieldKind::Quote)
    }

    /// Notes may continue on following 4-space-indented lines.
    pub fn has_continuation(self) -> bool {
        matches!(self, FieldKind::Notes)
    }

    pub fn label(self) -> &'static str {
        match self {
            FieldKind::Quote => "quote",
            FieldKind::Screenshot => "screenshot",
            FieldKind::Attachment => "attachment",
            FieldKind::Notes => "notes",
            FieldKind::ParentId => "parent id",
            FieldKind::Related => "related",
            FieldKind::Similar => "similar",
            FieldKind::Description => "description",
            FieldKind::Image => "image",
            FieldKind::Author => "author",
            FieldKind::Published => "published",
            FieldKind::ReadTime => "read time",
            FieldKind::Entity => "entity",
            FieldKind::Status => "status",
            FieldKind::Topics => "topics",
            FieldKind::People => "people",
            FieldKind::Category => "category",
            FieldKind::Summary => "ai summary",
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranks_follow_table() {
        for (i, kind) in FIELD_ORDER.iter().enumerate() {
            assert_eq!(kind.rank(), i);
        }
        assert!(FieldKind::Notes.rank() < FieldKind::Related.rank());
        assert!(FieldKind::Entity.rank() < FieldKind::Topics.rank());
        assert!(FieldKind::Category.rank() < FieldKind::Summary.rank());
    }

    #[test]
    fn test_prefixes_are_unambiguous() {
        for a in FIELD_ORDER {
            for b in FIELD_ORDER {
                if a != b {
                    assert!(
                        !a.prefix().starts_with(b.prefix()),
                        "{:?} prefix shadows {:?}",
                        b,
                        a
                    );
                }
            }
        }
    }
}
