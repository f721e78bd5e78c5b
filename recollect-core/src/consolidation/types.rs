use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RecollectError;

/// How two records relate, by similarity band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Near-identical vectors and identical normalized text
    Exact,
    /// High similarity, or near-identical vectors with differing text
    Semantic,
    /// Moderate similarity
    Partial,
}

/// A similarity relation between two records. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityEdge {
    pub id_a: String,
    pub id_b: String,
    /// Similarity in [0, 1]
    pub score: f64,
    pub kind: EdgeKind,
}

/// Classification of a whole duplicate group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateType {
    Exact,
    NearDuplicate,
    Similar,
}

impl DuplicateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::NearDuplicate => "near_duplicate",
            Self::Similar => "similar",
        }
    }
}

/// A connected component of at least two similar records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Member ids in discovery order
    pub memory_ids: Vec<String>,

    /// Mean of the component's internal edge scores
    pub similarity_score: f64,

    pub duplicate_type: DuplicateType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_strategy: Option<ConsolidationStrategy>,
}

impl DuplicateGroup {
    pub fn len(&self) -> usize {
        self.memory_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory_ids.is_empty()
    }
}

/// Policy used to resolve a duplicate group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsolidationStrategy {
    KeepNewest,
    KeepOldest,
    MergeContent,
    CreateSummary,
}

impl ConsolidationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeepNewest => "keep_newest",
            Self::KeepOldest => "keep_oldest",
            Self::MergeContent => "merge_content",
            Self::CreateSummary => "create_summary",
        }
    }

    /// Whether the strategy deletes records when it succeeds.
    pub fn is_destructive(&self) -> bool {
        !matches!(self, Self::CreateSummary)
    }
}

impl fmt::Display for ConsolidationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsolidationStrategy {
    type Err = RecollectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "keep_newest" => Ok(Self::KeepNewest),
            "keep_oldest" => Ok(Self::KeepOldest),
            "merge_content" => Ok(Self::MergeContent),
            "create_summary" => Ok(Self::CreateSummary),
            _ => Err(RecollectError::Validation(format!(
                "unknown consolidation strategy: {}",
                s
            ))),
        }
    }
}

/// Outcome of executing a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MergeStatus {
    /// The requested strategy ran as asked
    Completed,
    /// The requested strategy failed and a deterministic fallback ran instead
    FellBack {
        from: ConsolidationStrategy,
        reason: String,
    },
    /// Nothing was produced; no records are affected
    Failed { reason: String },
}

impl MergeStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Records that a fallback replaced the requested strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackInfo {
    pub from: ConsolidationStrategy,
    pub to: ConsolidationStrategy,
    pub reason: String,
}

/// Strategy-specific audit detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MergeDetail {
    Timestamp {
        chosen_timestamp: DateTime<Utc>,
        removed_count: usize,
    },
    Content {
        tags: BTreeSet<String>,
        original_lengths: BTreeMap<String, usize>,
        merged_length: usize,
    },
    Summary {
        summarized_count: usize,
        summary_length: usize,
    },
    None,
}

/// Audit trail attached to every consolidation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeMetadata {
    /// Strategy the caller or selector asked for
    pub requested_strategy: ConsolidationStrategy,

    /// Every record of the group
    pub source_ids: Vec<String>,

    /// Distinct memory kinds among the sources
    pub source_kinds: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackInfo>,

    pub detail: MergeDetail,

    pub consolidated_at: DateTime<Utc>,
}

/// Result of consolidating one group.
///
/// Either a surviving record plus removals, or (summary mode) newly
/// synthesized content with no survivor and no removals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationResult {
    /// Strategy that produced this result (after any fallback)
    pub strategy: ConsolidationStrategy,

    #[serde(flatten)]
    pub status: MergeStatus,

    pub surviving_id: Option<String>,

    pub removed_ids: Vec<String>,

    /// Survivor content (possibly rewritten) or the generated summary
    pub content: Option<String>,

    pub metadata: MergeMetadata,
}

impl ConsolidationResult {
    /// Whether this is summary output meant to be stored as a new record.
    pub fn is_summary(&self) -> bool {
        self.surviving_id.is_none() && !self.status.is_failed() && self.content.is_some()
    }
}

/// What bulk consolidation did with one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum GroupAction {
    Consolidated { result: ConsolidationResult },
    Skipped { reason: String },
    Failed { error: String },
}

/// Per-group entry in a bulk summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupOutcome {
    pub group: DuplicateGroup,
    #[serde(flatten)]
    pub action: GroupAction,
}

/// Aggregate result of `bulk_consolidate`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkConsolidationSummary {
    pub groups_found: usize,
    pub groups_consolidated: usize,
    pub memories_removed: usize,
    pub details: Vec<GroupOutcome>,
}
