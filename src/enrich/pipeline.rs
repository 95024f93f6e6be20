use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;

use crate::enrich::activity::{ActivityLog, ActivityRecord};
use crate::enrich::capability::{
    Capabilities, CapabilityError, ClassifyRequest, DisambiguationRequest, RankRequest,
};
use crate::enrich::summary::{plan_summary, single_line};
use crate::io::side_store::SideStore;
use crate::io::store::{Store, StoreError};
use crate::io::vocab::{VocabKind, Vocabulary};
use crate::model::config::EnrichConfig;
use crate::model::entry::{Block, EntityKind, Entry, RelatedRef};
use crate::ops::relations::{
    MAX_DISAMBIGUATION_CANDIDATES, accept_resolution, find_candidates, render_candidates,
};
use crate::ops::similarity::{
    CandidateSummary, MAX_RANKED_CANDIDATES, finalize_matches, prefilter,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Summarize,
    Classify,
    Relate,
    Similar,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Summarize, Stage::Classify, Stage::Relate, Stage::Similar];
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Summarize => "summarize",
            Stage::Classify => "classify",
            Stage::Relate => "relate",
            Stage::Similar => "similar",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// Fields were written to the entry
    Written,
    /// Nothing to do
    Skipped(String),
    /// A capability or store write failed
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub timestamp: String,
    pub stages: Vec<(Stage, StageOutcome)>,
}

impl PipelineReport {
    pub fn outcome(&self, stage: Stage) -> Option<&StageOutcome> {
        self.stages.iter().find(|(s, _)| *s == stage).map(|(_, o)| o)
    }
}

fn skipped(reason: impl Into<String>) -> StageOutcome {
    StageOutcome::Skipped(reason.into())
}

/// Background enrichment of one entry.
///
/// Stages run in order, each re-reading the entry so it sees what earlier
/// stages wrote. A stage that fails or has nothing to do is logged and
/// skipped; later stages still run. Cheap to clone into a task.
#[derive(Clone)]
pub struct Pipeline {
    store: Arc<Store>,
    side: SideStore,
    vocab: Arc<Vocabulary>,
    activity: Arc<ActivityLog>,
    capabilities: Capabilities,
    config: EnrichConfig,
}

impl Pipeline {
    pub fn new(
        store: Arc<Store>,
        side: SideStore,
        vocab: Arc<Vocabulary>,
        activity: Arc<ActivityLog>,
        capabilities: Capabilities,
        config: EnrichConfig,
    ) -> Self {
        Pipeline {
            store,
            side,
            vocab,
            activity,
            capabilities,
            config,
        }
    }

    /// Run every stage against the entry with `timestamp`.
    pub async fn run(&self, timestamp: &str) -> PipelineReport {
        let mut stages = Vec::with_capacity(Stage::ALL.len());
        for stage in Stage::ALL {
            let outcome = match stage {
                Stage::Summarize => self.summarize(timestamp).await,
                Stage::Classify => self.classify(timestamp).await,
                Stage::Relate => self.relate(timestamp).await,
                Stage::Similar => self.similar(timestamp).await,
            };
            match &outcome {
                StageOutcome::Written => tracing::info!(%timestamp, %stage, "enrichment written"),
                StageOutcome::Skipped(reason) => {
                    tracing::debug!(%timestamp, %stage, %reason, "enrichment skipped")
                }
                StageOutcome::Failed(error) => {
                    tracing::warn!(%timestamp, %stage, %error, "enrichment failed")
                }
            }
            stages.push((stage, outcome));
        }
        PipelineReport {
            timestamp: timestamp.to_string(),
            stages,
        }
    }

    /// Run a store operation on the blocking pool.
    async fn with_store<T, F>(&self, f: F) -> Result<T, String>
    where
        F: FnOnce(&Store) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || f(&store)).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(e) => Err(format!("store task failed: {}", e)),
        }
    }

    async fn reload(&self, timestamp: &str) -> Result<Option<Entry>, String> {
        let ts = timestamp.to_string();
        self.with_store(move |store| store.find_entry(&ts)).await
    }

    async fn write(&self, timestamp: &str, blocks: Vec<Block>) -> StageOutcome {
        let ts = timestamp.to_string();
        match self
            .with_store(move |store| store.upsert_fields(&ts, &blocks))
            .await
        {
            Ok(true) => StageOutcome::Written,
            Ok(false) => skipped("entry no longer in the store"),
            Err(e) => StageOutcome::Failed(e),
        }
    }

    /// Call a capability with the configured timeout, recording the call.
    async fn call<T, F>(&self, service: &str, action: &str, fut: F) -> Result<T, CapabilityError>
    where
        F: Future<Output = Result<T, CapabilityError>>,
    {
        let limit = self.config.capability_timeout();
        let start = Instant::now();
        let result = match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(CapabilityError::Timeout(limit)),
        };
        self.activity
            .record(ActivityRecord::from_result(service, action, &result, start.elapsed()));
        result
    }

    async fn summarize(&self, timestamp: &str) -> StageOutcome {
        let Some(summarizer) = self.capabilities.summarizer.clone() else {
            return skipped("no summarizer");
        };
        let entry = match self.reload(timestamp).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return skipped("entry not found"),
            Err(e) => return StageOutcome::Failed(e),
        };

        let side_file = entry
            .side_files()
            .first()
            .and_then(|rel| self.side.resolve(rel).ok())
            .filter(|path| path.exists());
        let request = match plan_summary(&entry, side_file) {
            Ok(request) => request,
            Err(reason) => return skipped(reason.to_string()),
        };

        let summary = match self
            .call(summarizer.name(), "summarize", summarizer.summarize(&request))
            .await
        {
            Ok(text) => single_line(&text),
            Err(e) => return StageOutcome::Failed(e.to_string()),
        };
        if summary.is_empty() {
            return skipped("empty summary");
        }

        self.write(timestamp, vec![Block::Summary(summary)]).await
    }

    async fn classify(&self, timestamp: &str) -> StageOutcome {
        let Some(classifier) = self.capabilities.classifier.clone() else {
            return skipped("no classifier");
        };
        let entry = match self.reload(timestamp).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return skipped("entry not found"),
            Err(e) => return StageOutcome::Failed(e),
        };

        let request = ClassifyRequest {
            prior_summary: entry.summary().map(str::to_string),
            existing_topics: self.vocab.topics(),
            existing_people: self.vocab.people(),
            entry,
        };
        let classification = match self
            .call(classifier.name(), "classify", classifier.classify(&request))
            .await
        {
            Ok(c) => c,
            Err(e) => return StageOutcome::Failed(e.to_string()),
        };

        let topics = clean_names(&classification.topics);
        let people = clean_names(&classification.people);

        let mut blocks = Vec::new();
        if let Some(notes) = classification
            .corrected_notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            && Some(notes) != request.entry.notes()
        {
            blocks.push(Block::Notes(notes.to_string()));
        }
        if let Some(entity) = classification.entity {
            blocks.push(Block::Entity(entity));
        }
        if !topics.is_empty() {
            blocks.push(Block::Topics(topics.clone()));
        }
        if !people.is_empty() {
            blocks.push(Block::People(people.clone()));
        }
        if let Some(category) = classification.category {
            blocks.push(Block::Category(category));
        }
        if blocks.is_empty() {
            return skipped("classifier returned nothing");
        }

        let outcome = self.write(timestamp, blocks).await;
        if outcome != StageOutcome::Written {
            return outcome;
        }

        if classification.entity == Some(EntityKind::Task) {
            let ts = timestamp.to_string();
            let status = Block::Status(self.config.default_task_status.clone());
            if let Err(error) = self.with_store(move |store| store.seed_field(&ts, &status)).await {
                tracing::warn!(%timestamp, %error, "could not seed task status");
            }
        }

        for (kind, names) in [(VocabKind::Topics, topics), (VocabKind::People, people)] {
            if let Err(error) = self.vocab.merge(kind, &names) {
                tracing::warn!(file = kind.file_name(), %error, "could not update vocabulary");
            }
        }

        outcome
    }

    async fn relate(&self, timestamp: &str) -> StageOutcome {
        let (Some(extractor), Some(disambiguator)) = (
            self.capabilities.extractor.clone(),
            self.capabilities.disambiguator.clone(),
        ) else {
            return skipped("no reference extractor or disambiguator");
        };
        let entry = match self.reload(timestamp).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return skipped("entry not found"),
            Err(e) => return StageOutcome::Failed(e),
        };

        let notes = entry.notes().unwrap_or_default().trim();
        if notes.chars().count() < self.config.min_notes_chars {
            return skipped("notes too short");
        }

        let references = match self
            .call(extractor.name(), "extract-references", extractor.extract_references(notes))
            .await
        {
            Ok(refs) => refs,
            Err(error) => {
                tracing::warn!(%timestamp, %error, "reference extraction failed");
                Vec::new()
            }
        };
        if references.is_empty() {
            return skipped("no references in notes");
        }

        let entries = match self.with_store(|store| store.load_or_empty()).await {
            Ok(entries) => entries,
            Err(e) => return StageOutcome::Failed(e),
        };
        let now = entry
            .parsed_timestamp()
            .unwrap_or_else(|| Local::now().naive_local());

        let mut related: Vec<RelatedRef> = Vec::new();
        for reference in &references {
            let candidates = find_candidates(
                &entries,
                reference,
                timestamp,
                now,
                self.config
                    .relation_candidate_limit
                    .min(MAX_DISAMBIGUATION_CANDIDATES),
            );
            if candidates.is_empty() {
                tracing::debug!(phrase = %reference.phrase, "no candidates for reference");
                continue;
            }

            let request = DisambiguationRequest {
                phrase: reference.phrase.clone(),
                target_description: reference.target_description.clone(),
                listing: render_candidates(&candidates),
            };
            let resolution = match self
                .call(disambiguator.name(), "disambiguate", disambiguator.disambiguate(&request))
                .await
            {
                Ok(resolution) => resolution,
                Err(error) => {
                    tracing::warn!(phrase = %reference.phrase, %error, "disambiguation failed");
                    continue;
                }
            };

            if let Some(found) = accept_resolution(&resolution, &candidates)
                && !related.iter().any(|r| r.timestamp == found.timestamp)
            {
                related.push(found);
            }
        }

        if related.is_empty() {
            return skipped("no reference resolved");
        }
        self.write(timestamp, vec![Block::Related(related)]).await
    }

    async fn similar(&self, timestamp: &str) -> StageOutcome {
        let Some(ranker) = self.capabilities.ranker.clone() else {
            return skipped("no similarity ranker");
        };
        let entry = match self.reload(timestamp).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return skipped("entry not found"),
            Err(e) => return StageOutcome::Failed(e),
        };
        if !entry.has_content() {
            return skipped("nothing to compare");
        }

        let entries = match self.with_store(|store| store.load_or_empty()).await {
            Ok(entries) => entries,
            Err(e) => return StageOutcome::Failed(e),
        };
        let shown = prefilter(
            &entries,
            &entry,
            self.config
                .similarity_candidate_limit
                .min(MAX_RANKED_CANDIDATES),
        );
        if shown.is_empty() {
            return skipped("no candidates share anything");
        }

        let request = RankRequest {
            entry: CandidateSummary::of(&entry),
            candidates: shown.iter().map(|s| CandidateSummary::of(s.entry)).collect(),
        };
        let matches = match self
            .call(ranker.name(), "rank-similar", ranker.rank_similar(&request))
            .await
        {
            Ok(matches) => matches,
            Err(e) => return StageOutcome::Failed(e.to_string()),
        };

        let similar = finalize_matches(&matches, &shown, self.config.max_similar);
        if similar.is_empty() {
            return skipped("ranker found nothing similar");
        }
        self.write(timestamp, vec![Block::Similar(similar)]).await
    }
}

/// Trimmed, non-empty names without commas (they would split on re-read)
fn clean_names(names: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in names {
        let name = name.replace(',', " ").trim().to_string();
        if !name.is_empty() && !out.contains(&name) {
            out.push(name);
        }
    }
    out
}
