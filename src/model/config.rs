use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration from `kb.toml` in the project root. Every field has a default,
/// so a missing file behaves like an empty one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KbConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub enrich: EnrichConfig,
    #[serde(default)]
    pub activity: ActivityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Markdown file holding every entry, relative to the project root
    #[serde(default = "default_file")]
    pub file: String,
    /// How long a writer waits for the store lock
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            file: default_file(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl StoreConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichConfig {
    /// Notes shorter than this (in characters) skip relationship resolution
    #[serde(default = "default_min_notes_chars")]
    pub min_notes_chars: usize,
    /// Candidates shown to the disambiguator per reference
    #[serde(default = "default_relation_candidate_limit")]
    pub relation_candidate_limit: usize,
    /// Candidates shown to the similarity ranker
    #[serde(default = "default_similarity_candidate_limit")]
    pub similarity_candidate_limit: usize,
    /// Most `Similar` links written per entry
    #[serde(default = "default_max_similar")]
    pub max_similar: usize,
    /// Upper bound on any single capability call
    #[serde(default = "default_capability_timeout_secs")]
    pub capability_timeout_secs: u64,
    /// Kanban column a newly classified task starts in
    #[serde(default = "default_task_status")]
    pub default_task_status: String,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        EnrichConfig {
            min_notes_chars: default_min_notes_chars(),
            relation_candidate_limit: default_relation_candidate_limit(),
            similarity_candidate_limit: default_similarity_candidate_limit(),
            max_similar: default_max_similar(),
            capability_timeout_secs: default_capability_timeout_secs(),
            default_task_status: default_task_status(),
        }
    }
}

impl EnrichConfig {
    pub fn capability_timeout(&self) -> Duration {
        Duration::from_secs(self.capability_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityConfig {
    /// Capability calls remembered in the activity log
    #[serde(default = "default_activity_capacity")]
    pub capacity: usize,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        ActivityConfig {
            capacity: default_activity_capacity(),
        }
    }
}

fn default_file() -> String {
    "kb.md".to_string()
}

fn default_lock_timeout_ms() -> u64 {
    5000
}

fn default_min_notes_chars() -> usize {
    10
}

fn default_relation_candidate_limit() -> usize {
    20
}

fn default_similarity_candidate_limit() -> usize {
    50
}

fn default_max_similar() -> usize {
    5
}

fn default_capability_timeout_secs() -> u64 {
    60
}

fn default_task_status() -> String {
    "not-started".to_string()
}

fn default_activity_capacity() -> usize {
    500
}
