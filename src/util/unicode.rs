use unicode_segmentation::UnicodeSegmentation;

/// Truncate to at most `max` grapheme clusters, appending `…` if truncated.
pub fn truncate_graphemes(s: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    let mut graphemes = s.graphemes(true);
    let head: String = graphemes.by_ref().take(max).collect();
    if graphemes.next().is_none() {
        return head;
    }
    let mut cut: String = head.graphemes(true).take(max - 1).collect();
    cut.push('\u{2026}');
    cut
}

/// Single-line excerpt: whitespace collapsed, then truncated.
pub fn excerpt(s: &str, max: usize) -> String {
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_graphemes(&collapsed, max)
}

/// Lowercased words, split on Unicode word boundaries.
pub fn words_lower(s: &str) -> Vec<String> {
    s.unicode_words().map(str::to_lowercase).collect()
}
