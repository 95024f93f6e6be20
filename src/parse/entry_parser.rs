use std::sync::LazyLock;

use regex::Regex;

use crate::model::entry::{
    Block, Category, EntityKind, Entry, RelatedRef, SimilarRef, TabGroup,
};
use crate::parse::{CONTENT_PREFIX, CONTINUATION_INDENT, is_continuation_line, is_linkable_url};

/// Current format: - `type` | `source` | `timestamp` | Title [| `group: name (color)`]
static CURRENT_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^- `([^`]+)` \| `([^`]+)` \| `([^`]+)` \| (.+?)(?: \| `group: ([^`]*)`)?$")
        .expect("current header pattern compiles")
});

/// Legacy format: - **[Title](url)** - `type` - `timestamp` [- `group: name`]
static LEGACY_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^- \*\*(?:\[([^\]]+)\]\(([^)]+)\)|([^*]+))\*\* - `([^`]+)` - `([^`]+)`+(?: - `group: ([^`]+)`+)?\s*$",
    )
    .expect("legacy header pattern compiles")
});

/// Source assumed for legacy entries, which predate the source column
pub const LEGACY_SOURCE: &str = "browser";

/// The header line of an entry, before any content blocks are attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub entry_type: String,
    pub source: String,
    pub timestamp: String,
    pub title: String,
    pub url: Option<String>,
    pub tab_group: Option<TabGroup>,
    /// Parsed from the legacy bold-title format
    pub legacy: bool,
}

impl Header {
    fn into_entry(self) -> Entry {
        Entry {
            entry_type: self.entry_type,
            source: self.source,
            timestamp: self.timestamp,
            title: self.title,
            url: self.url,
            tab_group: self.tab_group,
            blocks: Vec::new(),
        }
    }
}

/// Parse a whole knowledge-base file into entries, in file order.
///
/// Never fails: lines that are neither a header nor a content line of an
/// open entry are skipped.
pub fn parse_entries(source: &str) -> Vec<Entry> {
    let mut entries = Vec::new();
    let mut current: Option<Entry> = None;
    // Whether the last block of `current` is a Notes block that may continue
    let mut in_notes = false;

    for line in source.lines() {
        if let Some(header) = parse_header(line) {
            if let Some(done) = current.take() {
                entries.push(done);
            }
            current = Some(header.into_entry());
            in_notes = false;
            continue;
        }

        let Some(entry) = current.as_mut() else {
            continue;
        };

        if in_notes && is_continuation_line(line) {
            if let Some(Block::Notes(notes)) = entry.blocks.last_mut() {
                notes.push('\n');
                notes.push_str(line.strip_prefix(CONTINUATION_INDENT).unwrap_or(line));
            }
            continue;
        }

        match parse_content_line(line) {
            Some(block) => {
                in_notes = matches!(block, Block::Notes(_));
                entry.blocks.push(block);
            }
            None => in_notes = false,
        }
    }

    if let Some(done) = current {
        entries.push(done);
    }

    entries
}

/// Parse an entry header line in either format.
pub fn parse_header(line: &str) -> Option<Header> {
    if let Some(caps) = CURRENT_HEADER.captures(line) {
        let (title, url) = split_linked_title(caps[4].trim());
        return Some(Header {
            entry_type: caps[1].to_string(),
            source: caps[2].to_string(),
            timestamp: caps[3].to_string(),
            title,
            url,
            tab_group: caps.get(5).and_then(|g| parse_tab_group(g.as_str())),
            legacy: false,
        });
    }

    let caps = LEGACY_HEADER.captures(line)?;
    let title = caps
        .get(1)
        .or_else(|| caps.get(3))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();
    Some(Header {
        entry_type: caps[4].to_string(),
        source: LEGACY_SOURCE.to_string(),
        timestamp: caps[5].to_string(),
        title,
        url: caps.get(2).map(|m| m.as_str().to_string()),
        tab_group: caps.get(6).and_then(|g| parse_tab_group(g.as_str())),
        legacy: true,
    })
}

/// The timestamp of a header line, if the line is a header.
pub fn header_timestamp(line: &str) -> Option<String> {
    parse_header(line).map(|h| h.timestamp)
}

/// Parse a `  - ...` content line into a block.
/// Returns `None` if the line is not a content line at all.
pub fn parse_content_line(line: &str) -> Option<Block> {
    let content = line.strip_prefix(CONTENT_PREFIX)?;
    if content.is_empty() {
        return None;
    }
    Some(parse_block(content))
}

/// Parse the text after `  - ` into a typed block, falling back to
/// [`Block::Plain`] when the text is not a well-formed field.
pub fn parse_block(content: &str) -> Block {
    parse_typed_block(content).unwrap_or_else(|| Block::Plain(content.to_string()))
}

fn parse_typed_block(content: &str) -> Option<Block> {
    if let Some(rest) = content.strip_prefix("> ") {
        return Some(Block::Quote(rest.to_string()));
    }
    if let Some(rest) = content.strip_prefix("![Screenshot](") {
        let path = rest.strip_suffix(')')?;
        if path.is_empty() || path.contains(')') {
            return None;
        }
        return Some(Block::Screenshot(path.to_string()));
    }
    if content.starts_with('[') {
        let (label, path) = parse_link(content)?;
        return Some(Block::Attachment { label, path });
    }

    // An editor may have stripped the space after an empty value
    let (key, value) = content
        .split_once(": ")
        .or_else(|| content.strip_suffix(':').map(|key| (key, "")))?;
    let block = match key {
        "Notes" => Block::Notes(value.to_string()),
        "ParentId" => Block::ParentId(value.trim().to_string()),
        "Related" => Block::Related(parse_related(value)?),
        "Similar" => Block::Similar(parse_similar(value)?),
        "Description" => Block::Description(value.to_string()),
        "Image" => Block::Image(value.to_string()),
        "Author" => Block::Author(value.to_string()),
        "Published" => Block::Published(value.to_string()),
        "ReadTime" => Block::ReadTime(value.strip_suffix(" min")?.trim().parse().ok()?),
        "Entity" => Block::Entity(EntityKind::parse(value)?),
        "Status" => Block::Status(value.to_string()),
        "Topics" => Block::Topics(split_list(value)),
        "People" => Block::People(split_list(value)),
        "Category" => Block::Category(Category::parse(value)?),
        "AI Summary" => Block::Summary(value.to_string()),
        _ => return None,
    };
    Some(block)
}

/// Split `[Title](url)` into its parts when the url is one the serializer
/// links; anything else is a plain title.
fn split_linked_title(s: &str) -> (String, Option<String>) {
    if let Some((title, url)) = parse_link(s)
        && is_linkable_url(&url)
    {
        return (title, Some(url));
    }
    match s.strip_prefix('\\') {
        Some(rest) if rest.starts_with(['[', '\\']) => (rest.to_string(), None),
        _ => (s.to_string(), None),
    }
}

/// `[label](target)` spanning the whole string, unescaped. Brackets in the
/// label and parentheses in the target may nest or be backslash-escaped.
fn parse_link(s: &str) -> Option<(String, String)> {
    let rest = s.strip_prefix('[')?;
    let (label, rest) = scan_delimited(rest, '[', ']')?;
    let rest = rest.strip_prefix('(')?;
    let (target, rest) = scan_delimited(rest, '(', ')')?;
    if !rest.is_empty() || target.is_empty() {
        return None;
    }
    Some((label, target))
}

/// Read up to the `close` that balances an already consumed `open`.
/// Returns the unescaped text and whatever follows `close`.
fn scan_delimited(s: &str, open: char, close: char) -> Option<(String, &str)> {
    let mut text = String::new();
    let mut depth = 0usize;
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.peek() {
                Some(&(_, next)) if next.is_ascii_punctuation() => {
                    text.push(next);
                    chars.next();
                }
                _ => text.push(c),
            },
            c if c == open => {
                depth += 1;
                text.push(c);
            }
            c if c == close => {
                if depth == 0 {
                    return Some((text, &s[i + c.len_utf8()..]));
                }
                depth -= 1;
                text.push(c);
            }
            c => text.push(c),
        }
    }
    None
}

/// Parse `name (color)`, `(color)`, or a bare `name`.
fn parse_tab_group(s: &str) -> Option<TabGroup> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(inner) = s.strip_suffix(')') {
        if let Some(color) = inner.strip_prefix('(') {
            return Some(TabGroup {
                name: String::new(),
                color: color.to_string(),
            });
        }
        if let Some((name, color)) = inner.rsplit_once(" (") {
            return Some(TabGroup {
                name: name.trim().to_string(),
                color: color.to_string(),
            });
        }
    }
    Some(TabGroup {
        name: s.to_string(),
        color: String::new(),
    })
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split `a (x), b (y)` into `(a, x)` pairs. Any malformed item fails the
/// whole list; an empty value is an empty list.
fn split_annotated(s: &str) -> Option<Vec<(String, String)>> {
    let mut items = Vec::new();
    for item in s.split(',').map(str::trim).filter(|i| !i.is_empty()) {
        let (key, rest) = item.rsplit_once(" (")?;
        let note = rest.strip_suffix(')')?;
        if key.trim().is_empty() {
            return None;
        }
        items.push((key.trim().to_string(), note.trim().to_string()));
    }
    Some(items)
}

fn parse_related(s: &str) -> Option<Vec<RelatedRef>> {
    Some(
        split_annotated(s)?
            .into_iter()
            .map(|(timestamp, entry_type)| RelatedRef {
                timestamp,
                entry_type,
            })
            .collect(),
    )
}

fn parse_similar(s: &str) -> Option<Vec<SimilarRef>> {
    split_annotated(s)?
        .into_iter()
        .map(|(timestamp, score)| {
            score
                .parse::<f32>()
                .ok()
                .map(|score| SimilarRef { timestamp, score })
        })
        .collect()
}
