use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::model::entry::{Entry, SimilarRef};
use crate::util::unicode::excerpt;

const SHARED_TOPIC: u32 = 10;
const SAME_ENTITY: u32 = 3;
const SHARED_PERSON: u32 = 2;
const WITHIN_WEEK: u32 = 2;
const WITHIN_MONTH: u32 = 1;

/// Longest content excerpt in a candidate summary
const SUMMARY_EXCERPT: usize = 200;

/// Most candidates a similarity ranker is ever shown
pub const MAX_RANKED_CANDIDATES: usize = 50;

/// A cheaply scored similarity candidate
#[derive(Debug, Clone, Copy)]
pub struct Scored<'a> {
    pub entry: &'a Entry,
    pub score: u32,
}

/// What the similarity ranker sees of each candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSummary {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub title: String,
    pub entity: Option<String>,
    pub topics: Vec<String>,
    pub excerpt: String,
}

impl CandidateSummary {
    pub fn of(entry: &Entry) -> Self {
        let content = entry
            .summary()
            .or(entry.notes())
            .map(str::to_string)
            .unwrap_or_else(|| entry.selected_text());
        CandidateSummary {
            timestamp: entry.timestamp.clone(),
            entry_type: entry.entry_type.clone(),
            title: entry.title.clone(),
            entity: entry.entity().map(|k| k.as_str().to_string()),
            topics: entry.topics().to_vec(),
            excerpt: excerpt(&content, SUMMARY_EXCERPT),
        }
    }
}

/// Ranker answer for one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarMatch {
    pub timestamp: String,
    pub score: f32,
    #[serde(default)]
    pub reason: String,
}

fn lowered_set(items: &[String]) -> HashSet<String> {
    items
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Score the corpus against `current` by shared topics, entity kind,
/// shared people and closeness in time. Only positive scores survive;
/// ties keep file order.
pub fn prefilter<'a>(entries: &'a [Entry], current: &Entry, limit: usize) -> Vec<Scored<'a>> {
    let topics = lowered_set(current.topics());
    let people = lowered_set(current.people());
    let entity = current.entity();
    let when = current.parsed_timestamp();

    let mut scored: Vec<Scored<'a>> = entries
        .iter()
        .filter(|e| e.timestamp != current.timestamp)
        .map(|e| {
            let mut score = 0;
            score += SHARED_TOPIC * lowered_set(e.topics()).intersection(&topics).count() as u32;
            if entity.is_some() && e.entity() == entity {
                score += SAME_ENTITY;
            }
            score += SHARED_PERSON * lowered_set(e.people()).intersection(&people).count() as u32;
            if let (Some(a), Some(b)) = (when, e.parsed_timestamp()) {
                let days = (a - b).num_days().abs();
                if days <= 7 {
                    score += WITHIN_WEEK;
                } else if days <= 30 {
                    score += WITHIN_MONTH;
                }
            }
            Scored { entry: e, score }
        })
        .filter(|s| s.score > 0)
        .collect();

    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(limit);
    scored
}

/// Turn ranker answers into `Similar` links: only shown candidates, each
/// once, scores clamped and rounded, best first, at most `max`.
pub fn finalize_matches(matches: &[SimilarMatch], shown: &[Scored<'_>], max: usize) -> Vec<SimilarRef> {
    let mut seen = HashSet::new();
    let mut refs: Vec<SimilarRef> = matches
        .iter()
        .filter(|m| shown.iter().any(|s| s.entry.timestamp == m.timestamp.trim()))
        .filter(|m| seen.insert(m.timestamp.trim().to_string()))
        .map(|m| SimilarRef::new(m.timestamp.trim(), m.score))
        .filter(|r| r.score > 0.0)
        .collect();
    refs.sort_by(|a, b| b.score.total_cmp(&a.score));
    refs.truncate(max);
    refs
}
