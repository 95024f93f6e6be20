pub mod entry_parser;
pub mod entry_serializer;

pub use entry_parser::{Header, header_timestamp, parse_block, parse_entries, parse_header};
pub use entry_serializer::{
    is_linkable_url, render_block, render_header, serialize_entries, serialize_entry,
};

/// Every content line of an entry starts with this
pub const CONTENT_PREFIX: &str = "  - ";

/// Indent of a Notes continuation line
pub const CONTINUATION_INDENT: &str = "    ";

/// A 4-space-indented line that is not itself a content line
pub fn is_continuation_line(line: &str) -> bool {
    line.starts_with(CONTINUATION_INDENT) && !line.trim().is_empty()
}

/// Backslash-escape `\` and every char in `special`.
pub fn escape_markdown(s: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '\\' || special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
