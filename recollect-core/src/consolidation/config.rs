use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{RecollectError, Result};

/// Score cutoffs used to classify similarity pairs and groups.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityThresholds {
    /// Pairs at or above this are exact duplicates (default: 0.95)
    pub exact: f64,

    /// Pairs at or above this are semantic duplicates (default: 0.85)
    pub high: f64,

    /// Pairs below this are discarded (default: 0.70)
    pub moderate: f64,
}

impl Default for SimilarityThresholds {
    fn default() -> Self {
        Self {
            exact: 0.95,
            high: 0.85,
            moderate: 0.70,
        }
    }
}

/// Configuration for the consolidation engine.
///
/// Passed to [`super::ConsolidationEngine::new`]; engines never read
/// thresholds from anywhere else.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    pub thresholds: SimilarityThresholds,

    /// Minimum aggregate score for auto-merging non-exact groups (default: 0.9)
    pub auto_merge_threshold: f64,

    /// Upper bound on records compared in one analysis (default: 1000)
    pub max_records_per_analysis: usize,

    /// Records fetched when a request carries no ids (default: 1000)
    pub recent_fetch_limit: usize,

    /// Character-length variance above which MERGE_CONTENT is preferred (default: 10000)
    pub length_variance_threshold: f64,

    /// Maximum records fed to CREATE_SUMMARY (default: 10)
    pub summary_sample_size: usize,

    /// Deadline for each generation call (default: 30s)
    #[serde(with = "humantime_serde")]
    pub generation_timeout: Duration,

    /// Token budget for MERGE_CONTENT (default: 1000)
    pub merge_max_tokens: usize,

    /// Token budget for CREATE_SUMMARY (default: 500)
    pub summary_max_tokens: usize,

    /// Sampling temperature for generation (default: 0.3)
    pub temperature: f32,

    /// Groups merged concurrently during bulk consolidation (default: 4)
    pub max_concurrent_merges: usize,

    /// Compute results without writing them to the store (default: false)
    pub dry_run: bool,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            thresholds: SimilarityThresholds::default(),
            auto_merge_threshold: 0.9,
            max_records_per_analysis: 1000,
            recent_fetch_limit: 1000,
            length_variance_threshold: 10_000.0,
            summary_sample_size: 10,
            generation_timeout: Duration::from_secs(30),
            merge_max_tokens: 1000,
            summary_max_tokens: 500,
            temperature: 0.3,
            max_concurrent_merges: 4,
            dry_run: false,
        }
    }
}

impl ConsolidationConfig {
    /// Create a new consolidation configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(mut self, thresholds: SimilarityThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_auto_merge_threshold(mut self, threshold: f64) -> Self {
        self.auto_merge_threshold = threshold;
        self
    }

    pub fn with_max_records_per_analysis(mut self, max: usize) -> Self {
        self.max_records_per_analysis = max.max(2);
        self
    }

    pub fn with_recent_fetch_limit(mut self, limit: usize) -> Self {
        self.recent_fetch_limit = limit.max(1);
        self
    }

    pub fn with_summary_sample_size(mut self, size: usize) -> Self {
        self.summary_sample_size = size.max(1);
        self
    }

    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    pub fn with_max_concurrent_merges(mut self, max: usize) -> Self {
        self.max_concurrent_merges = max.max(1); // Ensure at least 1
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if thresholds are out of order or outside
    /// [0, 1], or if a size is zero.
    pub fn validate(&self) -> Result<()> {
        let t = &self.thresholds;
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);

        if !(in_unit(t.exact) && in_unit(t.high) && in_unit(t.moderate) && in_unit(self.auto_merge_threshold)) {
            return Err(RecollectError::Configuration(
                "similarity thresholds must be within [0, 1]".to_string(),
            ));
        }
        if !(t.moderate <= t.high && t.high <= t.exact) {
            return Err(RecollectError::Configuration(format!(
                "thresholds must satisfy moderate <= high <= exact (got {} / {} / {})",
                t.moderate, t.high, t.exact
            )));
        }
        if self.max_records_per_analysis < 2
            || self.recent_fetch_limit == 0
            || self.summary_sample_size == 0
            || self.max_concurrent_merges == 0
        {
            return Err(RecollectError::Configuration(
                "record limits, sample size and concurrency must be positive".to_string(),
            ));
        }
        if self.generation_timeout.is_zero() {
            return Err(RecollectError::Configuration(
                "generation_timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// A request to analyze (and optionally consolidate) duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationRequest {
    /// Records to consider; `None` means the most recent embedded records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_ids: Option<Vec<String>>,

    /// Minimum pair similarity to report (default: 0.85)
    #[serde(default = "default_request_threshold")]
    pub threshold: f64,

    /// Allow auto-execution of high-confidence non-exact groups
    #[serde(default)]
    pub auto_merge: bool,
}

fn default_request_threshold() -> f64 {
    0.85
}

impl Default for ConsolidationRequest {
    fn default() -> Self {
        Self {
            memory_ids: None,
            threshold: default_request_threshold(),
            auto_merge: false,
        }
    }
}

impl ConsolidationRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_memory_ids(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.memory_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_auto_merge(mut self, auto_merge: bool) -> Self {
        self.auto_merge = auto_merge;
        self
    }
}
