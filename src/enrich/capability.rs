use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::enrich::summary::SummaryRequest;
use crate::model::entry::{Category, EntityKind, Entry};
use crate::ops::relations::{Reference, Resolution};
use crate::ops::similarity::{CandidateSummary, SimilarMatch};

#[derive(Debug, Clone, thiserror::Error)]
pub enum CapabilityError {
    #[error("capability is not configured")]
    Unavailable,
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("call failed: {0}")]
    Failed(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Input to classification
#[derive(Debug, Clone)]
pub struct ClassifyRequest {
    pub entry: Entry,
    /// Known topic names, so the classifier reuses them
    pub existing_topics: Vec<String>,
    /// Known people names
    pub existing_people: Vec<String>,
    /// Summary written by the previous stage, if any
    pub prior_summary: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Classification {
    pub entity: Option<EntityKind>,
    pub topics: Vec<String>,
    pub people: Vec<String>,
    pub category: Option<Category>,
    /// Notes with spelling and grammar fixed
    pub corrected_notes: Option<String>,
}

/// Input to disambiguation of one reference
#[derive(Debug, Clone)]
pub struct DisambiguationRequest {
    pub phrase: String,
    pub target_description: String,
    /// One line per candidate, best first
    pub listing: String,
}

/// Input to similarity ranking
#[derive(Debug, Clone)]
pub struct RankRequest {
    pub entry: CandidateSummary,
    pub candidates: Vec<CandidateSummary>,
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    fn name(&self) -> &str {
        "summarizer"
    }

    async fn summarize(&self, request: &SummaryRequest) -> Result<String, CapabilityError>;
}

#[async_trait]
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str {
        "classifier"
    }

    async fn classify(&self, request: &ClassifyRequest) -> Result<Classification, CapabilityError>;
}

#[async_trait]
pub trait ReferenceExtractor: Send + Sync {
    fn name(&self) -> &str {
        "reference-extractor"
    }

    async fn extract_references(&self, notes: &str) -> Result<Vec<Reference>, CapabilityError>;
}

#[async_trait]
pub trait Disambiguator: Send + Sync {
    fn name(&self) -> &str {
        "disambiguator"
    }

    async fn disambiguate(
        &self,
        request: &DisambiguationRequest,
    ) -> Result<Resolution, CapabilityError>;
}

#[async_trait]
pub trait SimilarityRanker: Send + Sync {
    fn name(&self) -> &str {
        "similarity-ranker"
    }

    async fn rank_similar(&self, request: &RankRequest) -> Result<Vec<SimilarMatch>, CapabilityError>;
}

/// The external services available to a pipeline. Implementations live
/// outside this crate; a missing one skips its stage.
#[derive(Clone, Default)]
pub struct Capabilities {
    pub summarizer: Option<Arc<dyn Summarizer>>,
    pub classifier: Option<Arc<dyn Classifier>>,
    pub extractor: Option<Arc<dyn ReferenceExtractor>>,
    pub disambiguator: Option<Arc<dyn Disambiguator>>,
    pub ranker: Option<Arc<dyn SimilarityRanker>>,
}

impl Capabilities {
    pub fn none() -> Self {
        Capabilities::default()
    }

    pub fn with_summarizer(mut self, s: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(s);
        self
    }

    pub fn with_classifier(mut self, c: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(c);
        self
    }

    pub fn with_extractor(mut self, e: Arc<dyn ReferenceExtractor>) -> Self {
        self.extractor = Some(e);
        self
    }

    pub fn with_disambiguator(mut self, d: Arc<dyn Disambiguator>) -> Self {
        self.disambiguator = Some(d);
        self
    }

    pub fn with_ranker(mut self, r: Arc<dyn SimilarityRanker>) -> Self {
        self.ranker = Some(r);
        self
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("summarizer", &self.summarizer.as_ref().map(|c| c.name().to_string()))
            .field("classifier", &self.classifier.as_ref().map(|c| c.name().to_string()))
            .field("extractor", &self.extractor.as_ref().map(|c| c.name().to_string()))
            .field("disambiguator", &self.disambiguator.as_ref().map(|c| c.name().to_string()))
            .field("ranker", &self.ranker.as_ref().map(|c| c.name().to_string()))
            .finish()
    }
}
