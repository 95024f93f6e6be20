use kbase::model::{Block, Category, EntityKind, Entry, FieldKind, RelatedRef, SimilarRef};
use kbase::parse::{parse_entries, serialize_entries, serialize_entry};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;

fn read_fixture(fixture_name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(fixture_name);
    fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Could not read fixture {}: {}", fixture_name, e))
}

/// Helper: load a fixture file, parse it, serialize it, and assert byte-for-byte equality
fn assert_round_trip(fixture_name: &str) {
    let source = read_fixture(fixture_name);
    let output = serialize_entries(&parse_entries(&source));
    assert_eq!(
        output, source,
        "Round-trip failed for fixture: {}",
        fixture_name
    );
}

#[test]
fn round_trip_current_format() {
    assert_round_trip("current.md");
}

#[test]
fn round_trip_upgraded_legacy_file() {
    assert_round_trip("legacy_upgraded.md");
}

#[test]
fn legacy_format_is_rewritten_in_current_format() {
    let source = read_fixture("legacy.md");
    let expected = read_fixture("legacy_upgraded.md");
    assert_eq!(serialize_entries(&parse_entries(&source)), expected);
}

#[test]
fn current_fixture_parses_every_field() {
    let entries = parse_entries(&read_fixture("current.md"));
    let timestamps: Vec<&str> = entries.iter().map(|e| e.timestamp.as_str()).collect();
    assert_eq!(
        timestamps,
        vec![
            "2024-03-05 09:15:00",
            "2024-03-04 16:20:00",
            "2024-02-28 11:00:00",
            "2024-02-27 08:00:00",
        ]
    );

    let task = &entries[0];
    assert_eq!(
        task.notes(),
        Some("Book the venue before Friday\nFollow up on the pricing call from yesterday")
    );
    assert_eq!(task.entity(), Some(EntityKind::Task));
    assert_eq!(task.status(), Some("in-progress"));
    assert_eq!(task.topics(), ["team events", "planning"]);
    assert_eq!(task.category(), Some(Category::Work));
    assert_eq!(task.related()[0].timestamp, "2024-03-04 16:20:00");

    let link = &entries[1];
    assert_eq!(link.url.as_deref(), Some("https://example.com/venues/pricing"));
    assert_eq!(link.tab_group.as_ref().map(|g| g.color.as_str()), Some("blue"));
    assert_eq!(link.selected_text(), "Half-day rates start at $400.\nCatering is billed separately.");
    assert_eq!(link.similar().len(), 2);
    assert_eq!(link.block(FieldKind::ReadTime), Some(&Block::ReadTime(3)));

    let shot = &entries[2];
    assert_eq!(shot.side_files(), vec!["screenshots/screenshot_2024-02-28_11-00-00.png"]);
    assert!(shot.blocks.contains(&Block::Plain("Reviewed: yes".into())));

    let pdf = &entries[3];
    assert_eq!(pdf.side_files(), vec!["files/contract_2024-02-27_08-00-00.pdf"]);
}

#[test]
fn garbage_between_entries_is_ignored() {
    let source = format!(
        "stray text before anything\n\n{}\nnot a content line\n  - \n",
        read_fixture("legacy_upgraded.md")
    );
    let entries = parse_entries(&source);
    assert_eq!(entries.len(), 2);
    assert_eq!(serialize_entries(&entries), read_fixture("legacy_upgraded.md"));
}

fn linked(title: &str, url: &str) -> Entry {
    let mut entry = Entry::new("link", "browser", "2024-05-01 12:00:00", title);
    entry.url = Some(url.to_string());
    entry
}

fn note(title: &str) -> Entry {
    Entry::new("note", "widget", "2024-05-01 12:00:00", title)
}

#[test]
fn awkward_values_survive_a_round_trip() {
    let cases: Vec<(&str, Entry)> = vec![
        (
            "brackets in a linked title",
            linked("[2401.00001] Attention Is All You Need", "https://arxiv.org/abs/2401.00001"),
        ),
        (
            "parentheses in a url",
            linked(
                "Rust (programming language)",
                "https://en.wikipedia.org/wiki/Rust_(programming_language)",
            ),
        ),
        (
            "unbalanced delimiters and backslashes",
            linked(r"a \ b ] c [", "https://x.dev/p?q=(1"),
        ),
        ("plain title shaped like a link", note("[x](https://y.dev)")),
        ("plain title starting with a backslash", note(r"\[not escaped]")),
        (
            "empty lists",
            note("Lists")
                .with_block(Block::Related(Vec::new()))
                .with_block(Block::Similar(Vec::new()))
                .with_block(Block::Topics(Vec::new()))
                .with_block(Block::People(Vec::new())),
        ),
        (
            "surrounding whitespace",
            note("Spacing")
                .with_block(Block::Quote("  padded quote  ".into()))
                .with_block(Block::Notes("  indented first\n    deeper second ".into()))
                .with_block(Block::Status("  waiting on review ".into())),
        ),
        (
            "delimiters in an attachment",
            note("Upload").with_block(Block::Attachment {
                label: "Q[1] report".into(),
                path: "files/q(1)_2024-05-01_12-00-00.pdf".into(),
            }),
        ),
        (
            "populated relationship lists",
            note("Links")
                .with_block(Block::Related(vec![RelatedRef {
                    timestamp: "2024-04-30 08:00:00".into(),
                    entry_type: "link".into(),
                }]))
                .with_block(Block::Similar(vec![SimilarRef::new("2024-04-29 08:00:00", 0.75)])),
        ),
    ];

    for (name, entry) in cases {
        let text = serialize_entry(&entry);
        assert_eq!(parse_entries(&text), vec![entry], "{}:\n{}", name, text);
    }
}
