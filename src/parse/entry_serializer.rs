use crate::model::entry::{Block, Entry, TabGroup};
use crate::parse::{CONTENT_PREFIX, CONTINUATION_INDENT, escape_markdown};

/// URL schemes that are rendered as a markdown link in the header
const LINKABLE_SCHEMES: [&str; 4] = ["http://", "https://", "file://", "chrome-extension://"];

/// Whether a URL gets rendered as `[title](url)` rather than dropped
pub fn is_linkable_url(url: &str) -> bool {
    LINKABLE_SCHEMES.iter().any(|scheme| url.starts_with(scheme))
}

/// Serialize one entry as a text block terminated by exactly one blank line.
pub fn serialize_entry(entry: &Entry) -> String {
    let mut out = render_header(entry);
    out.push('\n');
    for block in &entry.blocks {
        for line in render_block(block) {
            out.push_str(&line);
            out.push('\n');
        }
    }
    out.push('\n');
    out
}

/// Serialize entries in order (newest-first files keep their order).
pub fn serialize_entries(entries: &[Entry]) -> String {
    entries.iter().map(serialize_entry).collect()
}

/// Render the header line in the current format.
pub fn render_header(entry: &Entry) -> String {
    let title = one_line(&entry.title);
    let title = match entry.url.as_deref() {
        Some(url) if is_linkable_url(url) => render_link(&title, url),
        // Keep a plain title from reading back as a link or an escape
        _ if title.starts_with(['[', '\\']) => format!("\\{}", title),
        _ => title,
    };

    let mut line = format!(
        "- `{}` | `{}` | `{}` | {}",
        entry.entry_type, entry.source, entry.timestamp, title
    );
    if let Some(group) = &entry.tab_group
        && let Some(rendered) = render_tab_group(group)
    {
        line.push_str(&format!(" | `group: {}`", rendered));
    }
    line
}

/// `[label](target)` with the delimiters inside each part escaped
fn render_link(label: &str, target: &str) -> String {
    format!(
        "[{}]({})",
        escape_markdown(label, &['[', ']']),
        escape_markdown(target, &['(', ')'])
    )
}

fn render_tab_group(group: &TabGroup) -> Option<String> {
    match (group.name.trim(), group.color.trim()) {
        ("", "") => None,
        ("", color) => Some(format!("({})", color)),
        (name, "") => Some(name.to_string()),
        (name, color) => Some(format!("{} ({})", name, color)),
    }
}

/// Render a block as one or more complete lines (without trailing newlines).
pub fn render_block(block: &Block) -> Vec<String> {
    let line = |content: String| format!("{}{}", CONTENT_PREFIX, content);

    match block {
        Block::Quote(text) => text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| line(format!("> {}", l)))
            .collect(),
        Block::Screenshot(path) => vec![line(format!("![Screenshot]({})", path))],
        Block::Attachment { label, path } => vec![line(render_link(label, path))],
        Block::Notes(notes) => {
            let mut lines = notes.lines().filter(|l| !l.trim().is_empty());
            let Some(first) = lines.next() else {
                return Vec::new();
            };
            let mut out = vec![line(format!("Notes: {}", first))];
            out.extend(lines.map(|l| format!("{}{}", CONTINUATION_INDENT, l)));
            out
        }
        Block::ParentId(ts) => vec![line(format!("ParentId: {}", ts))],
        Block::Related(refs) => {
            // An empty list still renders, so a later upsert finds and replaces it
            let items: Vec<String> = refs
                .iter()
                .map(|r| format!("{} ({})", r.timestamp, r.entry_type))
                .collect();
            vec![line(format!("Related: {}", items.join(", ")))]
        }
        Block::Similar(refs) => {
            let items: Vec<String> = refs
                .iter()
                .map(|r| format!("{} ({:.2})", r.timestamp, r.score))
                .collect();
            vec![line(format!("Similar: {}", items.join(", ")))]
        }
        Block::Description(text) => vec![line(format!("Description: {}", one_line(text)))],
        Block::Image(url) => vec![line(format!("Image: {}", one_line(url)))],
        Block::Author(text) => vec![line(format!("Author: {}", one_line(text)))],
        Block::Published(text) => vec![line(format!("Published: {}", one_line(text)))],
        Block::ReadTime(minutes) => vec![line(format!("ReadTime: {} min", minutes))],
        Block::Entity(entity) => vec![line(format!("Entity: {}", entity.as_str()))],
        Block::Status(status) => vec![line(format!("Status: {}", one_line(status)))],
        Block::Topics(topics) => vec![line(format!("Topics: {}", topics.join(", ")))],
        Block::People(people) => vec![line(format!("People: {}", people.join(", ")))],
        Block::Category(category) => vec![line(format!("Category: {}", category.as_str()))],
        Block::Summary(text) => vec![line(format!("AI Summary: {}", one_line(text)))],
        Block::Plain(text) => vec![line(one_line(text))],
    }
}

/// Replace line breaks so a value can't spill onto the next line.
fn one_line(s: &str) -> String {
    if s.contains(['\n', '\r']) {
        s.split(['\n', '\r'])
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        s.to_string()
    }
}
