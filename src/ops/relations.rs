use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::model::entry::{Entry, RelatedRef};
use crate::util::unicode::{excerpt, words_lower};

/// Score weights
const TITLE_CONTAINS: u32 = 10;
const TITLE_WORD: u32 = 2;
const TOPIC_MATCH: u32 = 5;
const NOTES_CONTAINS: u32 = 4;
const NOTES_WORD: u32 = 1;

/// Words this short are ignored when matching word overlap
const MIN_WORD_LEN: usize = 3;

/// Most candidates a disambiguator is ever shown
pub const MAX_DISAMBIGUATION_CANDIDATES: usize = 20;

/// A reference to an earlier entry found in free text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Reference {
    /// The words in the notes that make the reference
    pub phrase: String,
    /// What the referenced entry is about
    pub target_description: String,
    /// `project`, `task`, `knowledge`, or `any`
    pub entity_type_filter: Option<String>,
    /// `yesterday`, `recent`, `last_week`, `last_month`
    pub temporal_filter: Option<String>,
}

impl Reference {
    pub fn entity_filter(&self) -> Option<&str> {
        self.entity_type_filter
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty() && !f.eq_ignore_ascii_case("any"))
    }

    pub fn temporal(&self) -> Option<TemporalFilter> {
        self.temporal_filter.as_deref().and_then(TemporalFilter::parse)
    }

    /// Whether the reference narrows by something other than text
    pub fn is_constrained(&self) -> bool {
        self.entity_filter().is_some() || self.temporal().is_some()
    }
}

/// Relative-day windows a reference may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalFilter {
    /// Exactly one calendar day before now
    Yesterday,
    /// Within 7 days
    Recent,
    /// Within 14 days
    LastWeek,
    /// Within 45 days
    LastMonth,
}

impl TemporalFilter {
    pub fn parse(s: &str) -> Option<TemporalFilter> {
        match s.trim().to_ascii_lowercase().replace(' ', "_").as_str() {
            "yesterday" => Some(TemporalFilter::Yesterday),
            "recent" => Some(TemporalFilter::Recent),
            "last_week" => Some(TemporalFilter::LastWeek),
            "last_month" => Some(TemporalFilter::LastMonth),
            _ => None,
        }
    }

    /// Whether an entry `days_ago` calendar days old falls in the window
    pub fn contains(self, days_ago: i64) -> bool {
        match self {
            TemporalFilter::Yesterday => days_ago == 1,
            TemporalFilter::Recent => (0..=7).contains(&days_ago),
            TemporalFilter::LastWeek => (0..=14).contains(&days_ago),
            TemporalFilter::LastMonth => (0..=45).contains(&days_ago),
        }
    }
}

/// How sure the disambiguator is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Disambiguator answer for one reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub timestamp: Option<String>,
    pub confidence: Confidence,
}

/// An entry with its relevance to a reference
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub entry: &'a Entry,
    pub score: u32,
}

/// Rank entries against a reference.
///
/// Entries failing the entity or temporal filter are dropped, as is the
/// entry with `exclude_timestamp`. Unparseable timestamps pass the temporal
/// filter. Zero-score entries are kept only for constrained references.
pub fn find_candidates<'a>(
    entries: &'a [Entry],
    reference: &Reference,
    exclude_timestamp: &str,
    now: NaiveDateTime,
    limit: usize,
) -> Vec<Candidate<'a>> {
    let entity_filter = reference.entity_filter();
    let temporal = reference.temporal();
    let keep_unscored = reference.is_constrained();
    let target = reference.target_description.trim().to_lowercase();
    let target_words: Vec<String> = words_lower(&target)
        .into_iter()
        .filter(|w| w.chars().count() >= MIN_WORD_LEN)
        .collect();

    let mut candidates: Vec<Candidate<'a>> = entries
        .iter()
        .filter(|e| e.timestamp != exclude_timestamp)
        .filter(|e| match entity_filter {
            Some(filter) => e
                .entity()
                .is_some_and(|kind| kind.as_str().eq_ignore_ascii_case(filter)),
            None => true,
        })
        .filter(|e| match (temporal, e.parsed_timestamp()) {
            (Some(window), Some(ts)) => window.contains((now.date() - ts.date()).num_days()),
            _ => true,
        })
        .map(|entry| Candidate {
            entry,
            score: relevance(entry, &target, &target_words),
        })
        .filter(|c| c.score > 0 || keep_unscored)
        .collect();

    // Stable: equal scores keep file order (newest first)
    candidates.sort_by(|a, b| b.score.cmp(&a.score));
    candidates.truncate(limit);
    candidates
}

fn relevance(entry: &Entry, target: &str, target_words: &[String]) -> u32 {
    let mut score = 0;
    let title = entry.title.to_lowercase();
    let title_words = words_lower(&title);

    if !target.is_empty() && title.contains(target) {
        score += TITLE_CONTAINS;
    }
    score += TITLE_WORD * target_words.iter().filter(|w| title_words.contains(w)).count() as u32;

    if !target.is_empty() {
        for topic in entry.topics() {
            let topic = topic.trim().to_lowercase();
            if !topic.is_empty() && (topic.contains(target) || target.contains(&topic)) {
                score += TOPIC_MATCH;
            }
        }
    }

    if let Some(notes) = entry.notes() {
        let notes = notes.to_lowercase();
        if !target.is_empty() && notes.contains(target) {
            score += NOTES_CONTAINS;
        }
        score += NOTES_WORD * target_words.iter().filter(|w| notes.contains(w.as_str())).count() as u32;
    }

    score
}

/// Compact one-line-per-candidate listing shown to the disambiguator
pub fn render_candidates(candidates: &[Candidate<'_>]) -> String {
    candidates
        .iter()
        .map(|c| {
            let e = c.entry;
            format!(
                "{} | {} | {} | {} | topics: {} | notes: {}",
                e.timestamp,
                e.entry_type,
                e.entity().map_or("none", |k| k.as_str()),
                e.title,
                e.topics().join(", "),
                excerpt(e.notes().unwrap_or_default(), 100),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Accept a disambiguator answer: high or medium confidence, naming one of
/// the candidates it was shown.
pub fn accept_resolution(resolution: &Resolution, shown: &[Candidate<'_>]) -> Option<RelatedRef> {
    if resolution.confidence == Confidence::Low {
        return None;
    }
    let timestamp = resolution.timestamp.as_deref()?.trim();
    let entry = shown.iter().find(|c| c.entry.timestamp == timestamp)?.entry;
    Some(RelatedRef {
        timestamp: entry.timestamp.clone(),
        entry_type: entry.entry_type.clone(),
    })
}
