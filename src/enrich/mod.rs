pub mod activity;
pub mod capability;
pub mod pipeline;
pub mod summary;

pub use activity::{ActivityLog, ActivityRecord, CallStatus};
pub use capability::{
    Capabilities, CapabilityError, Classification, Classifier, ClassifyRequest,
    DisambiguationRequest, Disambiguator, RankRequest, ReferenceExtractor, SimilarityRanker,
    Summarizer,
};
pub use pipeline::{Pipeline, PipelineReport, Stage, StageOutcome};
pub use summary::{SummaryRequest, SummaryStrategy};
