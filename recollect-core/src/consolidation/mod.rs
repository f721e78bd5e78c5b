//! Duplicate detection and consolidation of stored memories.
//!
//! The pipeline runs in four stages:
//!
//! 1. [`SimilarityAnalyzer`] scores embedding pairs and classifies them
//! 2. [`DuplicateGrouper`] clusters pairs into connected components
//! 3. [`StrategySelector`] recommends how to resolve each group
//! 4. [`MergeExecutor`] applies a strategy, falling back when generation fails
//!
//! [`ConsolidationEngine`] ties the stages to a [`crate::memory::MemoryStore`]
//! and an [`crate::llm::LLMProvider`], and adds batch consolidation.

pub mod bulk;
pub mod config;
pub mod engine;
pub mod grouping;
pub mod merge;
pub mod similarity;
pub mod strategy;
pub mod types;

pub use bulk::skip_reason;
pub use config::{ConsolidationConfig, ConsolidationRequest, SimilarityThresholds};
pub use engine::ConsolidationEngine;
pub use grouping::DuplicateGrouper;
pub use merge::MergeExecutor;
pub use similarity::{SimilarityAnalyzer, cosine_similarity, normalize_text};
pub use strategy::StrategySelector;
pub use types::{
    BulkConsolidationSummary, ConsolidationResult, ConsolidationStrategy, DuplicateGroup,
    DuplicateType, EdgeKind, FallbackInfo, GroupAction, GroupOutcome, MergeDetail, MergeMetadata,
    MergeStatus, SimilarityEdge,
};

pub mod prelude {
    pub use crate::consolidation::{
        BulkConsolidationSummary, ConsolidationConfig, ConsolidationEngine, ConsolidationRequest,
        ConsolidationResult, ConsolidationStrategy, DuplicateGroup, DuplicateType, MergeStatus,
    };
}
